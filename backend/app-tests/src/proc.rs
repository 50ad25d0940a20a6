//! Lifecycle control for the application under test.

use async_trait::async_trait;
use resilience::{presets, with_timeout_result};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("no command configured for {0}")]
    EmptyCommand(String),
    #[error("{0} is already running")]
    AlreadyRunning(String),
    #[error("failed to prepare log file {path}: {source}")]
    Logs {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{name} exited during startup with {status}")]
    ExitedEarly { name: String, status: ExitStatus },
    #[error("failed to stop {name}: {reason}")]
    Stop { name: String, reason: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Starts and stops the external application a test talks to.
#[async_trait]
pub trait AppController: Send + Sync {
    fn name(&self) -> &str;

    async fn start(&self) -> Result<(), ControllerError>;

    async fn stop(&self) -> Result<(), ControllerError>;
}

/// Runs the application as a child process with its output captured to
/// `<logs_path>/<name>.stdout.log` and `<logs_path>/<name>.stderr.log`.
pub struct SubprocessAppController {
    command: Vec<String>,
    name: String,
    scope_path: PathBuf,
    logs_path: PathBuf,
    start_wait: Duration,
    stop_timeout: Duration,
    child: Mutex<Option<Child>>,
}

impl SubprocessAppController {
    pub fn new(
        command: Vec<String>,
        name: impl Into<String>,
        scope_path: impl Into<PathBuf>,
        logs_path: impl Into<PathBuf>,
        start_wait: Duration,
    ) -> Self {
        Self {
            command,
            name: name.into(),
            scope_path: scope_path.into(),
            logs_path: logs_path.into(),
            start_wait,
            stop_timeout: presets::process_stop_config().timeout.duration,
            child: Mutex::new(None),
        }
    }

    pub fn stdout_log(&self) -> PathBuf {
        self.logs_path.join(format!("{}.stdout.log", self.name))
    }

    pub fn stderr_log(&self) -> PathBuf {
        self.logs_path.join(format!("{}.stderr.log", self.name))
    }

    pub async fn is_running(&self) -> bool {
        let mut guard = self.child.lock().await;
        match guard.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    fn open_log(path: &Path) -> Result<std::fs::File, ControllerError> {
        std::fs::File::create(path).map_err(|source| ControllerError::Logs {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[async_trait]
impl AppController for SubprocessAppController {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self) -> Result<(), ControllerError> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| ControllerError::EmptyCommand(self.name.clone()))?;

        let mut guard = self.child.lock().await;
        if guard.is_some() {
            return Err(ControllerError::AlreadyRunning(self.name.clone()));
        }

        tokio::fs::create_dir_all(&self.logs_path)
            .await
            .map_err(|source| ControllerError::Logs {
                path: self.logs_path.clone(),
                source,
            })?;
        let stdout = Self::open_log(&self.stdout_log())?;
        let stderr = Self::open_log(&self.stderr_log())?;

        info!(
            name = %self.name,
            program = %program,
            scope = %self.scope_path.display(),
            "Starting application"
        );

        let mut child = Command::new(program)
            .args(args)
            .current_dir(&self.scope_path)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ControllerError::Spawn {
                program: program.clone(),
                source,
            })?;

        info!(
            name = %self.name,
            wait_secs = self.start_wait.as_secs_f64(),
            "Waiting for application to come up"
        );
        tokio::time::sleep(self.start_wait).await;

        if let Some(status) = child.try_wait()? {
            warn!(name = %self.name, %status, "Application exited during startup");
            return Err(ControllerError::ExitedEarly {
                name: self.name.clone(),
                status,
            });
        }

        *guard = Some(child);
        Ok(())
    }

    async fn stop(&self) -> Result<(), ControllerError> {
        let Some(mut child) = self.child.lock().await.take() else {
            return Ok(());
        };

        if let Some(status) = child.try_wait()? {
            info!(name = %self.name, %status, "Application already exited");
            return Ok(());
        }

        info!(name = %self.name, "Stopping application");
        child.start_kill()?;

        let status = with_timeout_result(self.stop_timeout, child.wait())
            .await
            .map_err(|e| ControllerError::Stop {
                name: self.name.clone(),
                reason: e.to_string(),
            })?;

        info!(name = %self.name, %status, "Application stopped");
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    #[tokio::test]
    async fn start_captures_output_and_stop_kills() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs");
        let controller = SubprocessAppController::new(
            sh("echo started; echo oops >&2; exec sleep 30"),
            "sleeper",
            dir.path(),
            &logs,
            Duration::from_millis(200),
        );

        controller.start().await.unwrap();
        assert!(controller.is_running().await);

        controller.stop().await.unwrap();
        assert!(!controller.is_running().await);

        let stdout = std::fs::read_to_string(controller.stdout_log()).unwrap();
        let stderr = std::fs::read_to_string(controller.stderr_log()).unwrap();
        assert_eq!(stdout.trim(), "started");
        assert_eq!(stderr.trim(), "oops");
    }

    #[tokio::test]
    async fn process_that_dies_during_startup_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let controller = SubprocessAppController::new(
            sh("exit 3"),
            "crasher",
            dir.path(),
            dir.path(),
            Duration::from_millis(200),
        );

        let err = controller.start().await.unwrap_err();
        assert!(matches!(err, ControllerError::ExitedEarly { .. }));
        assert!(!controller.is_running().await);
    }

    #[tokio::test]
    async fn empty_command_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let controller = SubprocessAppController::new(
            vec![],
            "nothing",
            dir.path(),
            dir.path(),
            Duration::ZERO,
        );

        assert!(matches!(
            controller.start().await,
            Err(ControllerError::EmptyCommand(_))
        ));
    }

    #[tokio::test]
    async fn missing_program_fails_to_spawn() {
        let dir = tempfile::tempdir().unwrap();
        let controller = SubprocessAppController::new(
            vec!["/nonexistent/docker-entrypoint.sh".to_string()],
            "elastic",
            dir.path(),
            dir.path(),
            Duration::ZERO,
        );

        assert!(matches!(
            controller.start().await,
            Err(ControllerError::Spawn { .. })
        ));
    }

    #[tokio::test]
    async fn double_start_and_idle_stop() {
        let dir = tempfile::tempdir().unwrap();
        let controller = SubprocessAppController::new(
            sh("exec sleep 30"),
            "sleeper",
            dir.path(),
            dir.path(),
            Duration::from_millis(50),
        );

        controller.stop().await.unwrap();
        controller.start().await.unwrap();
        assert!(matches!(
            controller.start().await,
            Err(ControllerError::AlreadyRunning(_))
        ));
        controller.stop().await.unwrap();
    }
}
