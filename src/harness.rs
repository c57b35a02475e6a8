// src/harness.rs
// One-call helpers for tests: a ready server or a failed test

use sqlx::Executor;
use sqlx::mysql::MySqlPool;
use tracing::info;

use crate::config::MysqlTestConfig;
use crate::error::{Result, fatal};
use crate::server::Server;
use crate::supervisor::start_with_retry;

/// Start a server configured from the environment, failing the test on error
pub async fn new_started_server() -> Server {
    new_started_server_with(MysqlTestConfig::from_env()).await
}

pub async fn new_started_server_with(config: MysqlTestConfig) -> Server {
    match try_new_started_server(config).await {
        Ok(server) => server,
        Err(e) => fatal("start mysqld", &e),
    }
}

/// Bounded-retry start that returns the error instead of failing the test
pub async fn try_new_started_server(config: MysqlTestConfig) -> Result<Server> {
    let timeout = config.start_timeout;
    start_with_retry(move || Server::new(config.clone()), timeout).await
}

/// Start a server, create database `name` and return a pool bound to it
pub async fn new_server_db(name: &str) -> (Server, MySqlPool) {
    new_server_db_with(MysqlTestConfig::from_env(), name).await
}

pub async fn new_server_db_with(config: MysqlTestConfig, name: &str) -> (Server, MySqlPool) {
    let server = new_started_server_with(config).await;
    if let Err(e) = create_database(&server, name).await {
        fatal("create database", &e);
    }
    let pool = server.db(name);
    (server, pool)
}

/// `CREATE DATABASE` through a root connection with no default database
pub async fn create_database(server: &Server, name: &str) -> Result<()> {
    let root = server.try_db("")?;
    let sql = format!("CREATE DATABASE `{name}`");
    root.execute(sql.as_str()).await?;
    root.close().await;
    info!(database = name, port = ?server.port(), "Created database");
    Ok(())
}
