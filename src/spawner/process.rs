//! Process management for mysqld
//!
//! Runs the one-shot `--initialize-insecure` pass and launches the
//! long-running server with its stderr exposed for readiness detection.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::{Child, ChildStderr, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{MysqlTestError, Result};

/// Lines of init output kept for the failure message
const INIT_OUTPUT_TAIL_LINES: usize = 20;

/// Builds and runs mysqld invocations for one base directory
#[derive(Debug, Clone)]
pub struct MysqldSpawner {
    binary: PathBuf,
    base_dir: PathBuf,
    verbose: bool,
}

/// Handle to a running mysqld
pub struct ServerProcess {
    child: Child,
    /// Task draining the child's stderr
    drain: Option<JoinHandle<()>>,
}

impl MysqldSpawner {
    pub fn new(binary: impl Into<PathBuf>, base_dir: impl Into<PathBuf>, verbose: bool) -> Self {
        Self {
            binary: binary.into(),
            base_dir: base_dir.into(),
            verbose,
        }
    }

    /// Create the on-disk data structures and wait for the initializer to exit
    pub async fn run_init_once(&self, config_file: &Path) -> Result<()> {
        let mut cmd = Command::new(&self.binary);
        cmd.arg(defaults_file_arg(config_file))
            .arg("--initialize-insecure")
            .arg(format!("--basedir={}", self.base_dir.display()))
            .stdin(Stdio::null())
            .kill_on_drop(true);

        info!(config = %config_file.display(), "Initializing mysqld data directory");

        if self.verbose {
            cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
            let status = cmd.status().await.map_err(|e| self.spawn_error(e))?;
            if !status.success() {
                return Err(MysqlTestError::InitFailed {
                    status,
                    output: "(output mirrored above)".to_string(),
                });
            }
        } else {
            let output = cmd.output().await.map_err(|e| self.spawn_error(e))?;
            if !output.status.success() {
                let captured = if output.stderr.is_empty() {
                    &output.stdout
                } else {
                    &output.stderr
                };
                return Err(MysqlTestError::InitFailed {
                    status: output.status,
                    output: output_tail(captured, INIT_OUTPUT_TAIL_LINES),
                });
            }
        }

        debug!("mysqld initialization complete");
        Ok(())
    }

    /// Start the long-running server without waiting for it.
    ///
    /// The returned stderr must be drained by the caller.
    pub fn launch(&self, config_file: &Path) -> Result<(ServerProcess, ChildStderr)> {
        let mut cmd = Command::new(&self.binary);
        cmd.arg(defaults_file_arg(config_file))
            .arg("--basedir")
            .arg(&self.base_dir)
            .stdin(Stdio::null())
            .stdout(if self.verbose {
                Stdio::inherit()
            } else {
                Stdio::null()
            })
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| self.spawn_error(e))?;
        let stderr = child.stderr.take().ok_or_else(|| {
            MysqlTestError::Io(std::io::Error::other("mysqld stderr was not captured"))
        })?;

        info!(pid = ?child.id(), config = %config_file.display(), "Launched mysqld");
        Ok((ServerProcess { child, drain: None }, stderr))
    }

    fn spawn_error(&self, source: std::io::Error) -> MysqlTestError {
        MysqlTestError::Spawn {
            binary: self.binary.display().to_string(),
            source,
        }
    }
}

impl ServerProcess {
    /// OS process id, or None once the process has been reaped
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    pub(crate) fn attach_drain(&mut self, drain: JoinHandle<()>) {
        self.drain = Some(drain);
    }

    /// False once mysqld has exited; reaps it in that case
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Kill the process immediately. An already-exited process is only reaped.
    pub async fn terminate(&mut self) {
        let pid = self.child.id();
        if !self.is_running() {
            debug!(pid = ?pid, "mysqld already exited");
        } else {
            match self.child.kill().await {
                Ok(()) => debug!(pid = ?pid, "Killed mysqld"),
                Err(e) => debug!(pid = ?pid, error = %e, "mysqld already gone"),
            }
        }
        if let Some(drain) = self.drain.take() {
            drain.abort();
        }
    }
}

impl Drop for ServerProcess {
    fn drop(&mut self) {
        if let Some(drain) = self.drain.take() {
            drain.abort();
        }
        if self.child.id().is_some() {
            warn!(pid = ?self.child.id(), "Dropping live mysqld handle, killing it");
        }
    }
}

fn defaults_file_arg(config_file: &Path) -> String {
    format!("--defaults-file={}", config_file.display())
}

/// Last `lines` lines of captured output, lossily decoded
fn output_tail(bytes: &[u8], lines: usize) -> String {
    let text = String::from_utf8_lossy(bytes);
    let all: Vec<&str> = text.trim_end().lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_output_tail_keeps_last_lines() {
        let out = b"one\ntwo\nthree\nfour\n";
        assert_eq!(output_tail(out, 2), "three\nfour");
        assert_eq!(output_tail(out, 10), "one\ntwo\nthree\nfour");
        assert_eq!(output_tail(b"", 3), "");
    }

    #[test]
    fn test_defaults_file_arg() {
        assert_eq!(
            defaults_file_arg(Path::new("/tmp/x/my.cnf")),
            "--defaults-file=/tmp/x/my.cnf"
        );
    }

    #[tokio::test]
    async fn test_init_missing_binary() {
        let spawner = MysqldSpawner::new("/nonexistent/mysqld", "/opt/mysql", false);
        let err = spawner
            .run_init_once(Path::new("/tmp/my.cnf"))
            .await
            .unwrap_err();
        assert!(matches!(err, MysqlTestError::Spawn { .. }));
        assert!(err.to_string().contains("/nonexistent/mysqld"));
    }

    #[tokio::test]
    async fn test_launch_missing_binary() {
        let spawner = MysqldSpawner::new("/nonexistent/mysqld", "/opt/mysql", false);
        let err = spawner.launch(Path::new("/tmp/my.cnf")).err().unwrap();
        assert!(matches!(err, MysqlTestError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_init_nonzero_exit_is_init_failure() {
        let spawner = MysqldSpawner::new("false", "/opt/mysql", false);
        let err = spawner
            .run_init_once(Path::new("/tmp/my.cnf"))
            .await
            .unwrap_err();
        assert!(matches!(err, MysqlTestError::InitFailed { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_verbose_init_failure_points_at_mirrored_output() {
        let spawner = MysqldSpawner::new("false", "/opt/mysql", true);
        let err = spawner
            .run_init_once(Path::new("/tmp/my.cnf"))
            .await
            .unwrap_err();
        match err {
            MysqlTestError::InitFailed { status, output } => {
                assert!(!status.success());
                assert_eq!(output, "(output mirrored above)");
            }
            other => panic!("expected InitFailed, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_terminate_reaps_exited_process() {
        let spawner = MysqldSpawner::new("true", "/opt/mysql", false);
        let (mut process, _stderr) = spawner.launch(Path::new("/tmp/my.cnf")).unwrap();

        let mut waited = 0;
        while process.is_running() {
            assert!(waited < 500, "`true` did not exit");
            tokio::time::sleep(Duration::from_millis(10)).await;
            waited += 1;
        }
        assert!(process.id().is_none());

        process.terminate().await;
        assert!(!process.is_running());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_init_success() {
        let spawner = MysqldSpawner::new("true", "/opt/mysql", false);
        spawner
            .run_init_once(Path::new("/tmp/my.cnf"))
            .await
            .unwrap();
    }
}
