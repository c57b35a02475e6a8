//! mysqld spawner
//!
//! Starts mysqld subprocesses and tells when they are ready.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Server::start                             │
//! │  • allocates port, directories, my.cnf                       │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    MysqldSpawner                             │
//! │  • run_init_once() - mysqld --initialize-insecure (blocking) │
//! │  • launch() - mysqld, stderr piped                           │
//! └─────────────────────────────────────────────────────────────┘
//!                               │ stderr
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    ReadinessWatcher (drain task)             │
//! │  • scans output for "mysqld: ready for connections"          │
//! │  • fires Readiness once                                      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! let spawner = MysqldSpawner::new("mysqld", base_dir, false);
//! spawner.run_init_once(&cnf).await?;
//!
//! let (mut process, stderr) = spawner.launch(&cnf)?;
//! let (watcher, readiness) = ReadinessWatcher::new(MYSQLD_READY_MARKER);
//! let _drain = watcher.spawn_drain(stderr, false);
//! readiness.wait().await?;
//!
//! process.terminate().await;
//! ```

mod process;
mod stream;

pub use process::{MysqldSpawner, ServerProcess};
pub use stream::{MYSQLD_READY_MARKER, Readiness, ReadinessWatcher};
