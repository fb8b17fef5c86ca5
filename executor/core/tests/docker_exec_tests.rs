// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! End-to-end substrate tests against a live Docker daemon.
//!
//! All tests are `#[ignore]`: they need a reachable daemon and the executor
//! image built locally. Run with `cargo test -- --ignored` on a machine
//! with Docker available.

use crucible_core::domain::config::Settings;
use crucible_core::domain::container::UserId;
use crucible_core::domain::exec::TIMEOUT_EXIT_CODE;
use crucible_core::infrastructure::docker::DockerExecutor;
use std::sync::Arc;
use std::time::Instant;

fn executor() -> Arc<DockerExecutor> {
    Arc::new(DockerExecutor::new(&Settings::from_env()).expect("docker daemon reachable"))
}

fn user(tag: &str) -> UserId {
    UserId::new(format!("it-{}-{}", tag, std::process::id())).unwrap()
}

#[tokio::test]
#[ignore]
async fn echo_returns_stdout_and_zero_exit() {
    let executor = executor();
    let u1 = user("echo");

    let out = executor.execute(&u1, "echo hello", 30).await.unwrap();
    assert_eq!(out.exit_code, 0);
    assert_eq!(out.stdout, "hello\n");
    assert_eq!(out.stderr, "");

    executor.remove(&u1).await;
}

#[tokio::test]
#[ignore]
async fn write_then_read_round_trips_with_pagination() {
    let executor = executor();
    let u1 = user("rw");

    let written = executor
        .write_file(&u1, "/workspace/a.txt", b"L1\nL2\nL3\n")
        .await
        .unwrap();
    assert_eq!(written, 9);

    let all = executor
        .read_file(&u1, "/workspace/a.txt", 0, None)
        .await
        .unwrap();
    assert_eq!(all, "L1\nL2\nL3\n");

    let middle = executor
        .read_file(&u1, "/workspace/a.txt", 1, Some(1))
        .await
        .unwrap();
    assert_eq!(middle, "L2\n");

    executor.remove(&u1).await;
}

#[tokio::test]
#[ignore]
async fn docstring_extraction_from_written_module() {
    let executor = executor();
    let u1 = user("doc");

    executor
        .write_file(
            &u1,
            "/workspace/m.py",
            b"def greet(n):\n    \"\"\"Generate a greeting.\"\"\"\n    return n\n",
        )
        .await
        .unwrap();

    let doc = executor
        .read_docstring(&u1, "/workspace/m.py", "greet")
        .await
        .unwrap();
    assert_eq!(doc, "Generate a greeting.");

    // A function without a docstring yields an empty string.
    executor
        .write_file(&u1, "/workspace/bare.py", b"def f():\n    return 1\n")
        .await
        .unwrap();
    let empty = executor
        .read_docstring(&u1, "/workspace/bare.py", "f")
        .await
        .unwrap();
    assert_eq!(empty, "");

    executor.remove(&u1).await;
}

#[tokio::test]
#[ignore]
async fn artifacts_list_and_fetch() {
    let executor = executor();
    let u1 = user("art");

    executor
        .write_file(&u1, "/artifacts/chart.png", b"\x89PNG fake bytes")
        .await
        .unwrap();

    let names = executor.list_artifacts(&u1).await.unwrap();
    assert!(names.contains(&"chart.png".to_string()));

    let bytes = executor.get_artifact(&u1, "chart.png").await.unwrap();
    assert_eq!(bytes, b"\x89PNG fake bytes");

    executor.remove(&u1).await;
}

#[tokio::test]
#[ignore]
async fn workspaces_are_isolated_between_users() {
    let executor = executor();
    let u1 = user("iso1");
    let u2 = user("iso2");

    executor
        .write_file(&u1, "/workspace/secret.txt", b"x")
        .await
        .unwrap();

    let out = executor
        .execute(&u2, "cat /workspace/secret.txt", 30)
        .await
        .unwrap();
    assert_ne!(out.exit_code, 0);
    assert!(out.stderr.contains("No such file"));

    executor.remove(&u1).await;
    executor.remove(&u2).await;
}

#[tokio::test]
#[ignore]
async fn sleep_past_deadline_returns_timeout_sentinel_quickly() {
    let executor = executor();
    let u1 = user("timeout");

    // Warm the container so the measured window is the exec itself.
    executor.execute(&u1, "true", 30).await.unwrap();

    let started = Instant::now();
    let out = executor.execute(&u1, "sleep 5", 1).await.unwrap();
    let elapsed = started.elapsed();

    assert!(elapsed.as_secs_f64() < 3.0, "took {:?}", elapsed);
    assert_eq!(out.exit_code, TIMEOUT_EXIT_CODE);
    assert!(out.is_timeout());

    executor.remove(&u1).await;
}

#[tokio::test]
#[ignore]
async fn same_user_reuses_one_container() {
    let executor = executor();
    let u1 = user("reuse");

    executor
        .execute(&u1, "echo marker > /workspace/marker.txt", 30)
        .await
        .unwrap();
    let out = executor
        .execute(&u1, "cat /workspace/marker.txt", 30)
        .await
        .unwrap();
    assert_eq!(out.stdout, "marker\n");
    assert_eq!(executor.container_count().await, 1);

    executor.remove(&u1).await;
    assert_eq!(executor.container_count().await, 0);
}
