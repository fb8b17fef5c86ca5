// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Docker-backed execution substrate.
//!
//! One container per user id, created lazily on first use and reused until
//! explicit removal or process shutdown. Commands run as execs inside the
//! user's container; file writes go through the daemon's archive upload so
//! content lands bit-exact, with no shell escaping involved.

use crate::domain::artifact::validate_artifact_name;
use crate::domain::config::Settings;
use crate::domain::container::{
    ContainerRecord, ContainerState, ExecutorError, UserId, ARTIFACTS_DIR, CONTAINER_NAME_PREFIX,
    SKILLS_MOUNT, TOOLS_MOUNT, WORKSPACE_DIR,
};
use crate::domain::exec::{ExecOutput, DEFAULT_EXEC_TIMEOUT_SECS};
use base64::Engine;
use bollard::container::{
    Config, CreateContainerOptions, ListContainersOptions, LogOutput, RemoveContainerOptions,
    StartContainerOptions, StopContainerOptions, UploadToContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecOptions, StartExecResults};
use bollard::models::ContainerStateStatusEnum;
use bollard::Docker;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const DAEMON_RETRY_ATTEMPTS: u32 = 3;
const DAEMON_RETRY_BASE_MS: u64 = 200;
const STOP_GRACE_SECS: i64 = 10;
const DOCSTRING_TIMEOUT_SECS: u64 = 10;

/// Container manager, exec engine, and file I/O over one Docker daemon
/// connection. Cheap to share behind an `Arc`.
pub struct DockerExecutor {
    docker: Docker,
    image: String,
    tools_path: String,
    skills_path: String,
    exec_user: String,
    artifact_size_limit: u64,
    containers: Mutex<HashMap<UserId, ContainerRecord>>,
    // Per-user critical sections around create/start/stop/remove. The outer
    // map lock is never held across an await.
    key_locks: std::sync::Mutex<HashMap<UserId, Arc<Mutex<()>>>>,
}

impl DockerExecutor {
    pub fn new(settings: &Settings) -> Result<Self, ExecutorError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| ExecutorError::ContainerUnavailable(format!(
                "failed to connect to Docker daemon: {}",
                e
            )))?;

        Ok(Self {
            docker,
            image: settings.executor_image.clone(),
            tools_path: absolutize(&settings.tools_path),
            skills_path: absolutize(&settings.skills_path),
            exec_user: settings.exec_user.clone(),
            artifact_size_limit: settings.artifact_size_limit_bytes,
            containers: Mutex::new(HashMap::new()),
            key_locks: std::sync::Mutex::new(HashMap::new()),
        })
    }

    /// Verify the daemon answers.
    pub async fn healthcheck(&self) -> Result<(), ExecutorError> {
        self.docker
            .ping()
            .await
            .map(|_| ())
            .map_err(|e| ExecutorError::ContainerUnavailable(e.to_string()))
    }

    /// Remove containers left behind by a crashed predecessor. Records do
    /// not survive a restart, so anything matching our naming convention
    /// and unknown to this process is an orphan.
    pub async fn purge_orphans(&self) {
        let mut filters = HashMap::new();
        filters.insert("name".to_string(), vec![CONTAINER_NAME_PREFIX.to_string()]);
        let options = ListContainersOptions {
            all: true,
            filters,
            ..Default::default()
        };

        let listed = match self.docker.list_containers(Some(options)).await {
            Ok(listed) => listed,
            Err(e) => {
                warn!(error = %e, "Orphan sweep skipped: cannot list containers");
                return;
            }
        };

        for container in listed {
            let Some(id) = container.id else { continue };
            let name = container
                .names
                .unwrap_or_default()
                .into_iter()
                .next()
                .unwrap_or_default();
            info!(container_id = %id, name = %name, "Removing orphaned executor container");
            let options = RemoveContainerOptions {
                force: true,
                ..Default::default()
            };
            if let Err(e) = self.docker.remove_container(&id, Some(options)).await {
                warn!(container_id = %id, error = %e, "Failed to remove orphan");
            }
        }
    }

    fn key_lock(&self, user: &UserId) -> Arc<Mutex<()>> {
        let mut locks = self.key_locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(user.clone()).or_default().clone()
    }

    /// Return the id of a running container for `user`, creating or
    /// restarting one as needed. Serialized per user id.
    async fn acquire(&self, user: &UserId) -> Result<String, ExecutorError> {
        let lock = self.key_lock(user);
        let _guard = lock.lock().await;

        // Reuse the known container when the daemon still has it.
        let known = {
            let containers = self.containers.lock().await;
            containers.get(user).map(|r| r.container_id.clone())
        };

        if let Some(container_id) = known {
            match self.docker.inspect_container(&container_id, None).await {
                Ok(inspect) => {
                    let status = inspect
                        .state
                        .and_then(|s| s.status)
                        .unwrap_or(ContainerStateStatusEnum::DEAD);
                    match status {
                        ContainerStateStatusEnum::RUNNING => {
                            self.mark(user, ContainerState::Running).await;
                            return Ok(container_id);
                        }
                        ContainerStateStatusEnum::EXITED | ContainerStateStatusEnum::CREATED => {
                            debug!(user = %user, container_id = %container_id, "Restarting stopped container");
                            self.docker
                                .start_container(&container_id, None::<StartContainerOptions<String>>)
                                .await
                                .map_err(|e| ExecutorError::ContainerUnavailable(e.to_string()))?;
                            self.mark(user, ContainerState::Running).await;
                            return Ok(container_id);
                        }
                        _ => {
                            // Dead or half-removed: clear it out so the name
                            // is free, then recreate.
                            let options = RemoveContainerOptions {
                                force: true,
                                ..Default::default()
                            };
                            let _ = self
                                .docker
                                .remove_container(&container_id, Some(options))
                                .await;
                            self.forget(user).await;
                        }
                    }
                }
                Err(e) if is_not_found(&e) => {
                    debug!(user = %user, "Container removed externally, recreating");
                    self.forget(user).await;
                }
                Err(e) => return Err(ExecutorError::ContainerUnavailable(e.to_string())),
            }
        }

        self.create_and_start(user).await
    }

    async fn create_and_start(&self, user: &UserId) -> Result<String, ExecutorError> {
        match self.docker.inspect_image(&self.image).await {
            Ok(_) => {}
            Err(e) if is_not_found(&e) => {
                return Err(ExecutorError::ImageUnavailable(self.image.clone()));
            }
            Err(e) => return Err(ExecutorError::ContainerUnavailable(e.to_string())),
        }

        let name = user.container_name();
        let host_config = bollard::service::HostConfig {
            binds: Some(vec![
                format!("{}:{}:ro", self.tools_path, TOOLS_MOUNT),
                format!("{}:{}:ro", self.skills_path, SKILLS_MOUNT),
            ]),
            ..Default::default()
        };

        let config = Config {
            image: Some(self.image.clone()),
            hostname: Some(user.sanitized()),
            tty: Some(true),
            open_stdin: Some(true),
            working_dir: Some(WORKSPACE_DIR.to_string()),
            // Keep PID 1 alive; all work happens through execs.
            cmd: Some(vec![
                "tail".to_string(),
                "-f".to_string(),
                "/dev/null".to_string(),
            ]),
            host_config: Some(host_config),
            ..Default::default()
        };

        let container_id = with_daemon_retry("create_container", || async {
            let options = CreateContainerOptions {
                name: name.clone(),
                platform: None,
            };
            self.docker
                .create_container(Some(options), config.clone())
                .await
                .map(|res| res.id)
        })
        .await?;

        {
            let mut containers = self.containers.lock().await;
            containers.insert(
                user.clone(),
                ContainerRecord::new(container_id.clone(), self.image.clone()),
            );
        }

        let started = with_daemon_retry("start_container", || async {
            self.docker
                .start_container(&container_id, None::<StartContainerOptions<String>>)
                .await
        })
        .await;

        if let Err(e) = started {
            // A failed start leaves no record behind.
            self.forget(user).await;
            let options = RemoveContainerOptions {
                force: true,
                ..Default::default()
            };
            let _ = self.docker.remove_container(&container_id, Some(options)).await;
            return Err(e);
        }

        self.mark(user, ContainerState::Running).await;
        info!(user = %user, container_id = %container_id, "Started executor container");
        Ok(container_id)
    }

    async fn mark(&self, user: &UserId, state: ContainerState) {
        let mut containers = self.containers.lock().await;
        if let Some(record) = containers.get_mut(user) {
            record.state = state;
            record.touch();
        }
    }

    async fn forget(&self, user: &UserId) {
        let mut containers = self.containers.lock().await;
        containers.remove(user);
    }

    /// Execute a shell command in the user's container with a deadline.
    ///
    /// The command is handed to `/bin/bash -c` verbatim; no escaping is
    /// applied here. A timed-out command yields a structured result with
    /// the partial output collected so far and the documented sentinel
    /// exit code, and the in-container process is killed best-effort.
    pub async fn execute(
        &self,
        user: &UserId,
        command: &str,
        timeout_secs: u64,
    ) -> Result<ExecOutput, ExecutorError> {
        let container_id = self.acquire(user).await?;
        self.exec_in(&container_id, shell_cmd(command), timeout_secs)
            .await
    }

    async fn exec_in(
        &self,
        container_id: &str,
        cmd: Vec<String>,
        timeout_secs: u64,
    ) -> Result<ExecOutput, ExecutorError> {
        let options = CreateExecOptions {
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            user: Some(self.exec_user.clone()),
            cmd: Some(cmd),
            ..Default::default()
        };

        let exec = self
            .docker
            .create_exec(container_id, options)
            .await
            .map_err(|e| ExecutorError::ExecFailed(e.to_string()))?;

        let start_options = StartExecOptions {
            detach: false,
            ..Default::default()
        };
        let results = self
            .docker
            .start_exec(&exec.id, Some(start_options))
            .await
            .map_err(|e| ExecutorError::ExecFailed(e.to_string()))?;

        let mut stdout = String::new();
        let mut stderr = String::new();

        let collect = async {
            if let StartExecResults::Attached { mut output, .. } = results {
                while let Some(chunk) = output.next().await {
                    match chunk {
                        Ok(LogOutput::StdOut { message }) => {
                            stdout.push_str(&String::from_utf8_lossy(&message));
                        }
                        Ok(LogOutput::StdErr { message }) => {
                            stderr.push_str(&String::from_utf8_lossy(&message));
                        }
                        Ok(_) => {}
                        Err(e) => return Err(ExecutorError::ExecFailed(e.to_string())),
                    }
                }
            }
            Ok(())
        };

        let deadline = Duration::from_secs(timeout_secs);
        match tokio::time::timeout(deadline, collect).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                self.kill_exec(container_id, &exec.id).await;
                return Ok(ExecOutput::timed_out(stdout, stderr, timeout_secs));
            }
        }

        let inspect = self
            .docker
            .inspect_exec(&exec.id)
            .await
            .map_err(|e| ExecutorError::ExecFailed(format!("failed to inspect exec: {}", e)))?;
        let exit_code = inspect.exit_code.unwrap_or(0);

        Ok(ExecOutput::completed(exit_code, stdout, stderr))
    }

    /// Best-effort termination of a timed-out exec's process tree.
    async fn kill_exec(&self, container_id: &str, exec_id: &str) {
        let pid = match self.docker.inspect_exec(exec_id).await {
            Ok(inspect) => inspect.pid,
            Err(_) => None,
        };
        let Some(pid) = pid else { return };

        let options = CreateExecOptions {
            cmd: Some(vec!["kill".to_string(), "-9".to_string(), pid.to_string()]),
            ..Default::default()
        };
        if let Ok(kill) = self.docker.create_exec::<String>(container_id, options).await {
            let start = StartExecOptions {
                detach: true,
                ..Default::default()
            };
            let _ = self.docker.start_exec(&kill.id, Some(start)).await;
            debug!(container_id = %container_id, pid = pid, "Killed timed-out exec process");
        }
    }

    /// Overwrite `path` inside the user's container with `content`,
    /// creating parent directories as needed. Content travels through the
    /// daemon's archive upload, so bytes land exactly as given. Returns the
    /// number of bytes written.
    pub async fn write_file(
        &self,
        user: &UserId,
        path: &str,
        content: &[u8],
    ) -> Result<u64, ExecutorError> {
        let (dir, file_name) = split_container_path(path)?;
        let container_id = self.acquire(user).await?;

        let mkdir = self
            .exec_in(
                &container_id,
                vec!["mkdir".into(), "-p".into(), dir.clone()],
                DEFAULT_EXEC_TIMEOUT_SECS,
            )
            .await?;
        if !mkdir.is_success() {
            return Err(ExecutorError::ExecFailed(format!(
                "failed to create directory {}: {}",
                dir, mkdir.stderr
            )));
        }

        let mut builder = tar::Builder::new(Vec::new());
        let mut header = tar::Header::new_gnu();
        header
            .set_path(&file_name)
            .map_err(|e| ExecutorError::Internal(format!("failed to set tar path: {}", e)))?;
        header.set_size(content.len() as u64);
        // Uploads land root-owned; keep them writable for the exec user.
        header.set_mode(0o666);
        header.set_cksum();
        builder
            .append(&header, content)
            .map_err(|e| ExecutorError::Internal(format!("failed to build archive: {}", e)))?;
        let archive = builder
            .into_inner()
            .map_err(|e| ExecutorError::Internal(format!("failed to finalize archive: {}", e)))?;

        let options = UploadToContainerOptions {
            path: dir.as_str(),
            ..Default::default()
        };
        self.docker
            .upload_to_container(&container_id, Some(options), archive.into())
            .await
            .map_err(|e| ExecutorError::ExecFailed(format!("failed to upload {}: {}", path, e)))?;

        debug!(user = %user, path = %path, bytes = content.len(), "Wrote file");
        Ok(content.len() as u64)
    }

    /// Read a text file with line pagination: `line_count` lines starting
    /// at 0-indexed `offset_lines`, `None` meaning to end of file. Slicing
    /// happens inside the container, so the byte stream passes through
    /// untouched.
    pub async fn read_file(
        &self,
        user: &UserId,
        path: &str,
        offset_lines: u64,
        line_count: Option<u64>,
    ) -> Result<String, ExecutorError> {
        require_absolute(path)?;
        let command = match line_count {
            Some(count) => format!("tail -n +{} {} | head -n {}", offset_lines + 1, path, count),
            None => format!("tail -n +{} {}", offset_lines + 1, path),
        };

        let output = self.execute(user, &command, DEFAULT_EXEC_TIMEOUT_SECS).await?;
        if !output.is_success() {
            if output.stderr.contains("No such file") {
                return Err(ExecutorError::FileNotFound(path.to_string()));
            }
            return Err(ExecutorError::ExecFailed(format!(
                "failed to read {}: {}",
                path, output.stderr
            )));
        }
        Ok(output.stdout)
    }

    /// Extract the docstring of a top-level function from a Python file in
    /// the user's container by loading the module with the container's
    /// interpreter. Returns `""` when the function has no docstring.
    pub async fn read_docstring(
        &self,
        user: &UserId,
        path: &str,
        function_name: &str,
    ) -> Result<String, ExecutorError> {
        require_absolute(path)?;
        if path.contains('\'') || path.contains('"') || function_name.contains('\'')
            || function_name.contains('"')
        {
            return Err(ExecutorError::InvalidRequest(
                "quotes are not allowed in path or function name".to_string(),
            ));
        }

        let program = format!(
            "import importlib.util; \
             spec = importlib.util.spec_from_file_location('temp_module', '{path}'); \
             module = importlib.util.module_from_spec(spec); \
             spec.loader.exec_module(module); \
             print(getattr(module, '{function_name}').__doc__ or '')"
        );
        let command = format!("python -c \"{}\"", program);

        let output = self.execute(user, &command, DOCSTRING_TIMEOUT_SECS).await?;
        if !output.is_success() {
            return Err(ExecutorError::DocstringExtractionFailed(format!(
                "{}:{}: {}",
                path,
                function_name,
                output.stderr.trim()
            )));
        }
        Ok(output.stdout.trim().to_string())
    }

    /// Names of regular files directly under `/artifacts`, sorted.
    pub async fn list_artifacts(&self, user: &UserId) -> Result<Vec<String>, ExecutorError> {
        let command = format!("find {}/ -maxdepth 1 -type f -printf '%f\\n'", ARTIFACTS_DIR);
        let output = self.execute(user, &command, DEFAULT_EXEC_TIMEOUT_SECS).await?;
        if !output.is_success() {
            return Err(ExecutorError::ExecFailed(format!(
                "failed to list artifacts: {}",
                output.stderr
            )));
        }

        let mut names: Vec<String> = output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        names.sort();
        Ok(names)
    }

    /// Fetch one artifact as raw bytes after name, existence, and size
    /// validation. The size gate runs before any content is read.
    pub async fn get_artifact(&self, user: &UserId, name: &str) -> Result<Vec<u8>, ExecutorError> {
        validate_artifact_name(name)?;
        let path = format!("{}/{}", ARTIFACTS_DIR, name);

        let exists = self
            .execute(user, &format!("test -f {}", path), DEFAULT_EXEC_TIMEOUT_SECS)
            .await?;
        if !exists.is_success() {
            return Err(ExecutorError::FileNotFound(name.to_string()));
        }

        let size_out = self
            .execute(user, &format!("wc -c < {}", path), DEFAULT_EXEC_TIMEOUT_SECS)
            .await?;
        if !size_out.is_success() {
            return Err(ExecutorError::ExecFailed(format!(
                "failed to check artifact size: {}",
                size_out.stderr
            )));
        }
        let size: u64 = size_out
            .stdout
            .trim()
            .parse()
            .map_err(|_| ExecutorError::Internal("unparseable artifact size".to_string()))?;
        if size > self.artifact_size_limit {
            return Err(ExecutorError::ArtifactTooLarge {
                name: name.to_string(),
                size,
                limit: self.artifact_size_limit,
            });
        }

        let encoded = self
            .execute(user, &format!("base64 -w 0 {}", path), DEFAULT_EXEC_TIMEOUT_SECS)
            .await?;
        if !encoded.is_success() {
            return Err(ExecutorError::ExecFailed(format!(
                "failed to encode artifact: {}",
                encoded.stderr
            )));
        }

        base64::engine::general_purpose::STANDARD
            .decode(encoded.stdout.trim())
            .map_err(|e| ExecutorError::Internal(format!("invalid base64 from container: {}", e)))
    }

    /// Best-effort stop and remove of one user's container.
    pub async fn remove(&self, user: &UserId) {
        let lock = self.key_lock(user);
        let _guard = lock.lock().await;

        let record = {
            let mut containers = self.containers.lock().await;
            if let Some(record) = containers.get_mut(user) {
                record.state = ContainerState::Removing;
            }
            containers.get(user).cloned()
        };
        let Some(record) = record else { return };

        let stop = StopContainerOptions { t: STOP_GRACE_SECS };
        if let Err(e) = self.docker.stop_container(&record.container_id, Some(stop)).await {
            if !is_not_found(&e) {
                warn!(user = %user, error = %e, "Failed to stop container");
            }
        }
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        if let Err(e) = self
            .docker
            .remove_container(&record.container_id, Some(options))
            .await
        {
            if !is_not_found(&e) {
                warn!(user = %user, error = %e, "Failed to remove container");
            }
        }

        self.forget(user).await;
        info!(user = %user, "Removed executor container");
    }

    /// Stop and remove every known container. Idempotent; called at
    /// process shutdown.
    pub async fn release_all(&self) {
        let users: Vec<UserId> = {
            let containers = self.containers.lock().await;
            containers.keys().cloned().collect()
        };
        for user in users {
            self.remove(&user).await;
        }
    }

    /// Number of containers this process currently tracks.
    pub async fn container_count(&self) -> usize {
        self.containers.lock().await.len()
    }
}

fn shell_cmd(command: &str) -> Vec<String> {
    vec![
        "/bin/bash".to_string(),
        "-c".to_string(),
        command.to_string(),
    ]
}

fn require_absolute(path: &str) -> Result<(), ExecutorError> {
    if !path.starts_with('/') {
        return Err(ExecutorError::PathViolation(format!(
            "container paths must be absolute, got '{}'",
            path
        )));
    }
    if path.contains('\0') {
        return Err(ExecutorError::PathViolation(
            "path contains null byte".to_string(),
        ));
    }
    Ok(())
}

/// Split an absolute container path into (parent dir, file name).
fn split_container_path(path: &str) -> Result<(String, String), ExecutorError> {
    require_absolute(path)?;
    let trimmed = path.trim_end_matches('/');
    let (dir, name) = trimmed
        .rsplit_once('/')
        .ok_or_else(|| ExecutorError::PathViolation(format!("invalid path '{}'", path)))?;
    if name.is_empty() {
        return Err(ExecutorError::PathViolation(format!(
            "path '{}' has no file name",
            path
        )));
    }
    let dir = if dir.is_empty() { "/" } else { dir };
    Ok((dir.to_string(), name.to_string()))
}

fn is_not_found(error: &bollard::errors::Error) -> bool {
    matches!(
        error,
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404,
            ..
        }
    )
}

fn is_transient(error: &bollard::errors::Error) -> bool {
    match error {
        bollard::errors::Error::DockerResponseServerError { status_code, .. } => {
            *status_code >= 500
        }
        bollard::errors::Error::IOError { .. } | bollard::errors::Error::HyperResponseError { .. } => {
            true
        }
        _ => false,
    }
}

/// Run a daemon call with exponential backoff on transient failures.
/// Non-transient errors surface immediately.
async fn with_daemon_retry<T, F, Fut>(operation: &str, mut call: F) -> Result<T, ExecutorError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, bollard::errors::Error>>,
{
    let mut delay = Duration::from_millis(DAEMON_RETRY_BASE_MS);
    let mut last_err = None;

    for attempt in 1..=DAEMON_RETRY_ATTEMPTS {
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if is_transient(&e) && attempt < DAEMON_RETRY_ATTEMPTS => {
                warn!(
                    operation = operation,
                    attempt = attempt,
                    error = %e,
                    "Transient daemon error, retrying"
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
                last_err = Some(e);
            }
            Err(e) => return Err(ExecutorError::ContainerUnavailable(e.to_string())),
        }
    }

    Err(ExecutorError::ContainerUnavailable(
        last_err.map(|e| e.to_string()).unwrap_or_default(),
    ))
}

fn absolutize(path: &str) -> String {
    match std::fs::canonicalize(path) {
        Ok(abs) => abs.to_string_lossy().into_owned(),
        Err(_) => path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_container_path_basic() {
        let (dir, name) = split_container_path("/workspace/a.txt").unwrap();
        assert_eq!(dir, "/workspace");
        assert_eq!(name, "a.txt");

        let (dir, name) = split_container_path("/top.txt").unwrap();
        assert_eq!(dir, "/");
        assert_eq!(name, "top.txt");

        let (dir, name) = split_container_path("/artifacts/sub/chart.png").unwrap();
        assert_eq!(dir, "/artifacts/sub");
        assert_eq!(name, "chart.png");
    }

    #[test]
    fn split_container_path_rejects_relative_and_bare() {
        assert!(split_container_path("workspace/a.txt").is_err());
        assert!(split_container_path("/").is_err());
    }

    #[test]
    fn shell_cmd_passes_command_verbatim() {
        let cmd = shell_cmd("echo 'a b' | wc -l");
        assert_eq!(cmd, vec!["/bin/bash", "-c", "echo 'a b' | wc -l"]);
    }

    #[test]
    fn require_absolute_rejects_null_bytes() {
        assert!(require_absolute("/ok/path").is_ok());
        assert!(require_absolute("relative").is_err());
        assert!(require_absolute("/bad\0path").is_err());
    }
}
