// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Crucible core
//!
//! Per-user sandboxed code execution for AI agents: container lifecycle,
//! command execution and file I/O over the Docker daemon, skill discovery
//! and prompt rendering, the MCP tool surface, and the OpenAI-compatible
//! streaming agent API.
//!
//! # Architecture
//!
//! - **domain:** value objects, entities, typed errors, provider traits
//! - **application:** services composing domain + infrastructure
//! - **infrastructure:** Docker, MCP client, model client adapters
//! - **presentation:** axum routers for the two server surfaces

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
