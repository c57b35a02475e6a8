// src/supervisor.rs
// Bounded start: race each attempt against a deadline, replace hung ones

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{MysqlTestError, Result};

/// Something that can be started once and torn down
#[async_trait]
pub trait Startable: Send + 'static {
    /// Bring the instance up. May wait indefinitely.
    async fn start(&mut self) -> Result<()>;

    /// Release everything the instance holds. Must tolerate partial starts.
    async fn stop(&mut self);
}

/// Start fresh instances from `make` until one becomes ready within `timeout`.
///
/// Each attempt runs on its own task. When an attempt times out or fails with
/// a retryable error, it is cancelled and stopped (process killed, directory
/// removed) before the next one begins. There is no overall deadline. Errors
/// that are not retryable are returned as-is.
pub async fn start_with_retry<S, F>(mut make: F, timeout: Duration) -> Result<S>
where
    S: Startable,
    F: FnMut() -> S,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        let cancel = CancellationToken::new();
        let mut task = tokio::spawn(run_attempt(make(), cancel.clone()));

        match tokio::time::timeout(timeout, &mut task).await {
            Ok(Ok(Ok(instance))) => {
                info!(attempt, "Start attempt succeeded");
                return Ok(instance);
            }
            Ok(Ok(Err(e))) if e.is_retryable() => {
                warn!(attempt, error = %e, "Start attempt failed, retrying with a fresh instance");
            }
            Ok(Ok(Err(e))) => return Err(e),
            Ok(Err(join_err)) => return Err(join_err.into()),
            Err(_) => {
                warn!(
                    attempt,
                    timeout = ?timeout,
                    "Start attempt timed out, retrying with a fresh instance"
                );
                cancel.cancel();
                // Wait for the abandoned attempt to tear itself down
                match task.await {
                    Ok(Ok(mut instance)) => {
                        // Became ready just as we gave up on it
                        instance.stop().await;
                    }
                    Ok(Err(e)) => debug!(attempt, error = %e, "Abandoned attempt finished"),
                    Err(e) => debug!(attempt, error = %e, "Abandoned attempt task failed"),
                }
            }
        }
    }
}

async fn run_attempt<S: Startable>(mut instance: S, cancel: CancellationToken) -> Result<S> {
    let outcome = tokio::select! {
        res = instance.start() => Some(res),
        _ = cancel.cancelled() => None,
    };

    match outcome {
        Some(Ok(())) => Ok(instance),
        Some(Err(e)) => {
            // Fatal failures keep their directory around for inspection
            if e.is_retryable() {
                instance.stop().await;
            }
            Err(e)
        }
        None => {
            instance.stop().await;
            Err(MysqlTestError::Cancelled)
        }
    }
}
