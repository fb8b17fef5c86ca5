// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod agent;
pub mod prompt_cache;
pub mod session_store;
pub mod skill_registry;
pub mod tools;
