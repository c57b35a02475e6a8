//! Readiness detection over mysqld's diagnostic output
//!
//! mysqld announces that it accepts connections by writing a fixed line to
//! stderr. [`ReadinessWatcher`] scans every chunk written to it for that
//! marker, carrying enough trailing bytes between chunks that a marker split
//! across two reads is still found, and fires a one-shot [`Readiness`] signal
//! the first time it appears.

use std::io::{self, Write};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::error::{MysqlTestError, Result};

/// Printed by mysqld once it accepts connections
pub const MYSQLD_READY_MARKER: &[u8] = b"mysqld: ready for connections";

const READ_CHUNK: usize = 4096;

/// Write sink that watches for the readiness marker
pub struct ReadinessWatcher {
    marker: Vec<u8>,
    /// Unmatched tail of everything written so far, at most `marker.len() - 1` bytes
    window: Vec<u8>,
    /// Taken when the marker is first seen
    signal: Option<oneshot::Sender<()>>,
}

/// Waiting half of a [`ReadinessWatcher`]
pub struct Readiness {
    rx: oneshot::Receiver<()>,
}

impl ReadinessWatcher {
    pub fn new(marker: impl Into<Vec<u8>>) -> (Self, Readiness) {
        let (tx, rx) = oneshot::channel();
        let watcher = Self {
            marker: marker.into(),
            window: Vec::new(),
            signal: Some(tx),
        };
        (watcher, Readiness { rx })
    }

    /// Scan one chunk. Returns true only for the write that fires the signal.
    pub fn observe(&mut self, chunk: &[u8]) -> bool {
        if self.signal.is_none() {
            return false;
        }

        self.window.extend_from_slice(chunk);
        if contains(&self.window, &self.marker) {
            self.window = Vec::new();
            if let Some(tx) = self.signal.take() {
                // Receiver may already be gone (attempt abandoned); nothing to tell.
                let _ = tx.send(());
            }
            return true;
        }

        let keep = self.marker.len().saturating_sub(1);
        if self.window.len() > keep {
            let excess = self.window.len() - keep;
            self.window.drain(..excess);
        }
        false
    }

    pub fn has_fired(&self) -> bool {
        self.signal.is_none()
    }

    /// Drain `reader` to EOF on a background task, feeding every chunk through
    /// the watcher and optionally mirroring it to our stderr.
    ///
    /// Draining continues after readiness so the child never blocks on a full
    /// pipe. If the stream ends before the marker, the watcher is dropped
    /// unfired and [`Readiness::wait`] reports [`MysqlTestError::ExitedBeforeReady`].
    pub fn spawn_drain<R>(mut self, mut reader: R, mirror: bool) -> JoinHandle<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        tokio::spawn(async move {
            let mut buf = vec![0u8; READ_CHUNK];
            loop {
                let n = match reader.read(&mut buf).await {
                    Ok(0) => break,
                    Ok(n) => n,
                    Err(e) => {
                        warn!(error = %e, "Failed to read mysqld output");
                        break;
                    }
                };
                let chunk = &buf[..n];

                if mirror {
                    // One locked write per chunk so concurrent mirrors don't interleave mid-chunk
                    let _ = io::stderr().lock().write_all(chunk);
                }

                trace!(bytes = n, "mysqld output chunk");
                if self.observe(chunk) {
                    debug!("Readiness marker observed");
                }
            }
            debug!(ready = self.has_fired(), "mysqld output stream closed");
        })
    }
}

impl Write for ReadinessWatcher {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.observe(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Readiness {
    /// Wait until the marker has been seen.
    ///
    /// There is no deadline here; callers race this against their own timeout.
    pub async fn wait(self) -> Result<()> {
        self.rx
            .await
            .map_err(|_| MysqlTestError::ExitedBeforeReady)
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() {
        return true;
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const LINE: &[u8] =
        b"2024-05-01T10:00:00Z 0 [System] [MY-010931] /usr/sbin/mysqld: ready for connections. Version: '8.0.36'\n";

    #[tokio::test]
    async fn test_marker_in_single_write() {
        let (mut watcher, readiness) = ReadinessWatcher::new(MYSQLD_READY_MARKER);
        assert!(watcher.observe(LINE));
        readiness.wait().await.unwrap();
    }

    #[tokio::test]
    async fn test_marker_split_at_every_point() {
        for split in 0..=MYSQLD_READY_MARKER.len() {
            let (mut watcher, readiness) = ReadinessWatcher::new(MYSQLD_READY_MARKER);
            let mut first = b"[System] /usr/sbin/".to_vec();
            first.extend_from_slice(&MYSQLD_READY_MARKER[..split]);
            let mut second = MYSQLD_READY_MARKER[split..].to_vec();
            second.extend_from_slice(b". Version: '8.0.36'\n");

            let fired_first = watcher.observe(&first);
            let fired_second = watcher.observe(&second);
            assert!(
                fired_first ^ fired_second,
                "split {split}: expected exactly one firing write"
            );
            assert!(watcher.has_fired(), "split {split}");
            readiness.wait().await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_marker_written_byte_by_byte() {
        let (mut watcher, readiness) = ReadinessWatcher::new(MYSQLD_READY_MARKER);
        for byte in LINE {
            watcher.write_all(std::slice::from_ref(byte)).unwrap();
        }
        assert!(watcher.has_fired());
        readiness.wait().await.unwrap();
    }

    #[tokio::test]
    async fn test_output_without_marker_never_fires() {
        let (mut watcher, readiness) = ReadinessWatcher::new(MYSQLD_READY_MARKER);
        let noise: [&[u8]; 4] = [
            b"[Note] InnoDB: Buffer pool(s) load completed\n",
            b"mysqld: ready for connect",
            b"ing soon; mysqld: ready for",
            b" nothing\n",
        ];
        for chunk in noise {
            assert!(!watcher.observe(chunk));
        }
        assert!(!watcher.has_fired());

        let waited = tokio::time::timeout(Duration::from_millis(50), readiness.wait()).await;
        assert!(waited.is_err(), "wait must not return without the marker");
        drop(watcher);
    }

    #[test]
    fn test_fires_at_most_once() {
        let (mut watcher, _readiness) = ReadinessWatcher::new(MYSQLD_READY_MARKER);
        assert!(watcher.observe(LINE));
        assert!(!watcher.observe(LINE));
        assert!(!watcher.observe(MYSQLD_READY_MARKER));
        assert!(watcher.has_fired());
    }

    #[test]
    fn test_fire_after_waiter_dropped_is_harmless() {
        let (mut watcher, readiness) = ReadinessWatcher::new(MYSQLD_READY_MARKER);
        drop(readiness);
        assert!(watcher.observe(LINE));
    }

    #[test]
    fn test_window_stays_bounded() {
        let (mut watcher, _readiness) = ReadinessWatcher::new(MYSQLD_READY_MARKER);
        for _ in 0..100 {
            watcher.observe(&[b'x'; 1000]);
        }
        assert!(watcher.window.len() < MYSQLD_READY_MARKER.len());
    }

    #[tokio::test]
    async fn test_drain_signals_readiness() {
        let (watcher, readiness) = ReadinessWatcher::new(MYSQLD_READY_MARKER);
        let handle = watcher.spawn_drain(LINE, false);
        readiness.wait().await.unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_mirrored_drain_signals_readiness() {
        let (watcher, readiness) = ReadinessWatcher::new(MYSQLD_READY_MARKER);
        let handle = watcher.spawn_drain(LINE, true);
        readiness.wait().await.unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_mirrored_drain_eof_before_marker() {
        let (watcher, readiness) = ReadinessWatcher::new(MYSQLD_READY_MARKER);
        let output: &'static [u8] = b"[ERROR] [MY-010262] Can't start server\n";
        let handle = watcher.spawn_drain(output, true);
        let err = readiness.wait().await.unwrap_err();
        assert!(matches!(err, MysqlTestError::ExitedBeforeReady));
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_drain_eof_before_marker() {
        let (watcher, readiness) = ReadinessWatcher::new(MYSQLD_READY_MARKER);
        let output: &'static [u8] = b"[ERROR] [MY-010273] Could not create unix socket lock file\n";
        let handle = watcher.spawn_drain(output, false);
        let err = readiness.wait().await.unwrap_err();
        assert!(matches!(err, MysqlTestError::ExitedBeforeReady));
        handle.await.unwrap();
    }

    #[test]
    fn test_empty_marker_fires_on_first_write() {
        let (mut watcher, _readiness) = ReadinessWatcher::new(Vec::new());
        assert!(watcher.observe(b""));
        assert!(watcher.has_fired());
    }
}
