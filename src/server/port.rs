// src/server/port.rs
// Free-port allocation with a process-wide reservation set

use std::collections::HashSet;
use std::net::{Ipv4Addr, TcpListener};
use std::sync::Mutex;

use once_cell::sync::Lazy;
use tracing::{debug, trace};

use crate::error::{MysqlTestError, Result};

/// Ports handed to live instances in this process
static RESERVED: Lazy<Mutex<HashSet<u16>>> = Lazy::new(|| Mutex::new(HashSet::new()));

/// Give up after this many ephemeral ports that were already reserved
const MAX_ATTEMPTS: usize = 32;

/// A port reserved for one instance; released on `release()` or drop
#[derive(Debug)]
pub struct PortLease {
    port: u16,
    released: bool,
}

impl PortLease {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn release(&mut self) {
        if !self.released {
            reserved().remove(&self.port);
            self.released = true;
            trace!(port = self.port, "Released port");
        }
    }
}

impl Drop for PortLease {
    fn drop(&mut self) {
        self.release();
    }
}

/// Ask the OS for an unused loopback port that no other live instance holds
pub fn allocate_port() -> Result<PortLease> {
    for _ in 0..MAX_ATTEMPTS {
        let port = {
            let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
                .map_err(|e| MysqlTestError::PortUnavailable(e.to_string()))?;
            listener
                .local_addr()
                .map_err(|e| MysqlTestError::PortUnavailable(e.to_string()))?
                .port()
        };

        if reserved().insert(port) {
            debug!(port, "Allocated port");
            return Ok(PortLease {
                port,
                released: false,
            });
        }
        trace!(port, "Port already reserved, retrying");
    }

    Err(MysqlTestError::PortUnavailable(format!(
        "{MAX_ATTEMPTS} candidate ports were already reserved"
    )))
}

fn reserved() -> std::sync::MutexGuard<'static, HashSet<u16>> {
    RESERVED.lock().unwrap_or_else(|e| e.into_inner())
}
