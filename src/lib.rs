// src/lib.rs
// mysqltest - disposable mysqld instances for integration tests

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod config;
pub mod error;
pub mod harness;
pub mod loader;
pub mod server;
pub mod spawner;
pub mod supervisor;

pub use config::MysqlTestConfig;
pub use error::{MysqlTestError, Result};
pub use harness::{new_server_db, new_started_server};
pub use loader::load;
pub use server::{Server, ServerState};
