// src/loader.rs
// Apply ';'-separated SQL from a stream, one statement at a time

use async_trait::async_trait;
use sqlx::Executor;
use sqlx::mysql::MySqlPool;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{debug, trace};

use crate::error::{MysqlTestError, Result};

/// Statement terminator. Not escaped: a ';' inside a string literal or
/// comment splits the statement.
pub const TERMINATOR: u8 = b';';

/// Target that executes one SQL statement
#[async_trait]
pub trait StatementSink: Send + Sync {
    async fn exec(&self, statement: &str) -> std::result::Result<(), sqlx::Error>;
}

#[async_trait]
impl StatementSink for MySqlPool {
    async fn exec(&self, statement: &str) -> std::result::Result<(), sqlx::Error> {
        // &str runs over the text protocol, which accepts DDL the prepared one rejects
        self.execute(statement).await.map(|_| ())
    }
}

/// Read statements from `reader` and execute them against `sink` in order.
///
/// Each segment between terminators is trimmed and skipped when empty; text
/// after the last terminator runs as a final statement. Stops at the first
/// failing statement, reporting its text. Otherwise returns the reader's own
/// error, if any.
pub async fn load<S, R>(sink: &S, reader: R) -> Result<()>
where
    S: StatementSink + ?Sized,
    R: AsyncRead + Unpin + Send,
{
    let mut segments = BufReader::new(reader).split(TERMINATOR);
    let mut executed = 0usize;

    while let Some(segment) = segments.next_segment().await? {
        executed += apply(sink, &segment).await?;
    }

    debug!(statements = executed, "Loaded SQL");
    Ok(())
}

/// Execute one raw segment; returns how many statements ran (0 or 1)
async fn apply<S>(sink: &S, segment: &[u8]) -> Result<usize>
where
    S: StatementSink + ?Sized,
{
    let text = String::from_utf8_lossy(segment);
    let statement = text.trim();
    if statement.is_empty() {
        return Ok(0);
    }

    trace!(statement, "Executing statement");
    sink.exec(statement)
        .await
        .map_err(|source| MysqlTestError::Statement {
            statement: statement.to_string(),
            source,
        })?;
    Ok(1)
}
