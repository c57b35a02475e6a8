//! Test mysqld instance lifecycle
//!
//! A [`Server`] owns one isolated mysqld: a reserved port, a fresh temp
//! directory holding `my.cnf`, the data directory and the socket, and the
//! running process.
//!
//! ```text
//! Unstarted -> Initializing -> Starting -> Ready -> Stopped
//! ```
//!
//! A failure while initializing or starting leaves the server where it
//! failed; its directory stays on disk until [`Server::stop`] is called.

pub mod mycnf;
pub mod port;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use tracing::{debug, info, warn};

use crate::config::{MysqlTestConfig, basedir};
use crate::error::{MysqlTestError, Result, fatal};
use crate::spawner::{MYSQLD_READY_MARKER, MysqldSpawner, ReadinessWatcher, ServerProcess};
use crate::supervisor::Startable;
use mycnf::{MycnfParams, render_mycnf};
use port::{PortLease, allocate_port};

/// Address mysqld binds to and clients connect to
pub const HOST: &str = "127.0.0.1";

/// Account created by `--initialize-insecure` (no password)
pub const USER: &str = "root";

const TEMP_PREFIX: &str = "mysql-datadir-";

/// Lifecycle state of a [`Server`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Unstarted,
    Initializing,
    Starting,
    Ready,
    Stopped,
}

impl ServerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerState::Unstarted => "unstarted",
            ServerState::Initializing => "initializing",
            ServerState::Starting => "starting",
            ServerState::Ready => "ready",
            ServerState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resources assigned to one instance, fixed once allocated
#[derive(Debug)]
struct Instance {
    lease: PortLease,
    root: PathBuf,
    data_dir: PathBuf,
    socket: PathBuf,
    config_file: PathBuf,
}

/// One isolated mysqld instance
pub struct Server {
    config: MysqlTestConfig,
    state: ServerState,
    instance: Option<Instance>,
    process: Option<ServerProcess>,
}

impl Server {
    pub fn new(config: MysqlTestConfig) -> Self {
        Self {
            config,
            state: ServerState::Unstarted,
            instance: None,
            process: None,
        }
    }

    pub fn config(&self) -> &MysqlTestConfig {
        &self.config
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    pub fn port(&self) -> Option<u16> {
        self.instance.as_ref().map(|i| i.lease.port())
    }

    /// Temp directory holding my.cnf, the data directory and the socket
    pub fn root_dir(&self) -> Option<&Path> {
        self.instance.as_ref().map(|i| i.root.as_path())
    }

    pub fn data_dir(&self) -> Option<&Path> {
        self.instance.as_ref().map(|i| i.data_dir.as_path())
    }

    pub fn socket(&self) -> Option<&Path> {
        self.instance.as_ref().map(|i| i.socket.as_path())
    }

    pub fn config_file(&self) -> Option<&Path> {
        self.instance.as_ref().map(|i| i.config_file.as_path())
    }

    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().and_then(|p| p.id())
    }

    /// Reserve a port, create the instance directory and write my.cnf.
    ///
    /// This is the first half of [`Server::start`]; calling it ahead of time
    /// fixes the instance's port and paths before any process runs.
    pub fn allocate(&mut self) -> Result<()> {
        if self.instance.is_some()
            || !matches!(self.state, ServerState::Unstarted | ServerState::Initializing)
        {
            return Err(MysqlTestError::InvalidState {
                action: "allocate",
                state: self.state,
            });
        }

        let lease = allocate_port()?;
        let port = lease.port();

        let mut builder = tempfile::Builder::new();
        builder.prefix(TEMP_PREFIX);
        let dir = match &self.config.temp_root {
            Some(parent) => builder.tempdir_in(parent),
            None => builder.tempdir(),
        }
        .map_err(|source| MysqlTestError::Directory {
            path: self
                .config
                .temp_root
                .clone()
                .unwrap_or_else(std::env::temp_dir),
            source,
        })?;
        let root = dir.keep();

        let instance = Instance {
            lease,
            data_dir: root.join("data"),
            socket: root.join("socket"),
            config_file: root.join("my.cnf"),
            root,
        };

        let cnf = render_mycnf(&MycnfParams {
            data_dir: &instance.data_dir,
            socket: &instance.socket,
            port,
        });
        let config_file = instance.config_file.clone();
        debug!(port, root = %instance.root.display(), "Allocated instance");
        // Record before writing so stop() can clean up a half-made instance
        self.instance = Some(instance);

        std::fs::write(&config_file, cnf).map_err(|source| MysqlTestError::ConfigWrite {
            path: config_file,
            source,
        })
    }

    /// Start mysqld and return once it is ready for connections.
    ///
    /// Waits on readiness without a deadline; see
    /// [`start_with_retry`](crate::supervisor::start_with_retry) for the bounded version.
    pub async fn start(&mut self) -> Result<()> {
        if self.state != ServerState::Unstarted {
            return Err(MysqlTestError::InvalidState {
                action: "start",
                state: self.state,
            });
        }
        self.state = ServerState::Initializing;

        let base_dir = basedir::resolve(&self.config).await?;
        if self.instance.is_none() {
            self.allocate()?;
        }
        let (port, config_file) = match &self.instance {
            Some(i) => (i.lease.port(), i.config_file.clone()),
            None => {
                return Err(MysqlTestError::InvalidState {
                    action: "start",
                    state: self.state,
                });
            }
        };

        let spawner = MysqldSpawner::new(&self.config.mysqld, base_dir, self.config.verbose);
        spawner.run_init_once(&config_file).await?;

        self.state = ServerState::Starting;
        let (mut process, stderr) = spawner.launch(&config_file)?;
        let (watcher, readiness) = ReadinessWatcher::new(MYSQLD_READY_MARKER);
        process.attach_drain(watcher.spawn_drain(stderr, self.config.verbose));
        let pid = process.id();
        self.process = Some(process);

        readiness.wait().await?;

        self.state = ServerState::Ready;
        info!(port, pid = ?pid, "mysqld ready for connections");
        Ok(())
    }

    /// Kill mysqld and remove the instance directory.
    ///
    /// Best effort: failures are logged, never returned. Safe to call on a
    /// server that never started or was already stopped.
    pub async fn stop(&mut self) {
        if let Some(mut process) = self.process.take() {
            process.terminate().await;
        }

        if let Some(instance) = self.instance.as_mut() {
            match tokio::fs::remove_dir_all(&instance.root).await {
                Ok(()) => debug!(root = %instance.root.display(), "Removed instance directory"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(
                    root = %instance.root.display(),
                    error = %e,
                    "Failed to remove instance directory"
                ),
            }
            instance.lease.release();
        }

        if self.state != ServerState::Stopped {
            info!(port = ?self.port(), "mysqld stopped");
        }
        self.state = ServerState::Stopped;
    }

    /// Go-driver style DSN, e.g. `root@tcp(127.0.0.1:3306)/mydb?parseTime=true`.
    ///
    /// The suffix is a database name optionally followed by parameters. Port 0
    /// stands in until the instance is allocated.
    pub fn dsn(&self, suffix: &str) -> String {
        format!("{USER}@tcp({HOST}:{})/{suffix}", self.port().unwrap_or(0))
    }

    /// sqlx connection URL for the same target as [`Server::dsn`]
    pub fn connection_url(&self, suffix: &str) -> String {
        format!("mysql://{USER}@{HOST}:{}/{suffix}", self.port().unwrap_or(0))
    }

    /// Pooled handle for `suffix`. Connects lazily, so it does not prove the
    /// server is reachable.
    pub fn try_db(&self, suffix: &str) -> Result<MySqlPool> {
        let url = self.connection_url(suffix);
        let options = match MySqlConnectOptions::from_str(&url) {
            Ok(options) => options,
            Err(source) => return Err(MysqlTestError::ConnectOptions { url, source }),
        };
        Ok(MySqlPoolOptions::new()
            .max_connections(5)
            .connect_lazy_with(options))
    }

    /// Like [`Server::try_db`], failing the calling test on error
    pub fn db(&self, suffix: &str) -> MySqlPool {
        match self.try_db(suffix) {
            Ok(pool) => pool,
            Err(e) => fatal("open connection handle", &e),
        }
    }
}

#[async_trait]
impl Startable for Server {
    async fn start(&mut self) -> Result<()> {
        Server::start(self).await
    }

    async fn stop(&mut self) {
        Server::stop(self).await
    }
}
