// src/config/basedir.rs
// Discovery of the mysqld installation root (--basedir)

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::MysqlTestConfig;
use crate::error::{MysqlTestError, Result};

/// `basedir` row of the variables table printed by `mysqld --help --verbose`
#[allow(clippy::expect_used)]
static BASEDIR_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^basedir[ \t]+(\S.*?)\s*$").expect("valid regex"));

/// Discovered once per process, on first use
static DISCOVERED: OnceCell<PathBuf> = OnceCell::const_new();

/// Base directory for `config`: the injected one, or the memoized discovery result.
///
/// A failed discovery is not memoized, so a later call retries it.
pub async fn resolve(config: &MysqlTestConfig) -> Result<PathBuf> {
    if let Some(dir) = &config.base_dir {
        return Ok(dir.clone());
    }
    DISCOVERED
        .get_or_try_init(|| discover(&config.mysqld))
        .await
        .cloned()
}

/// Run `mysqld --help --verbose` and parse the reported base directory
pub async fn discover(mysqld: &Path) -> Result<PathBuf> {
    debug!(mysqld = %mysqld.display(), "Discovering mysqld base directory");

    let output = Command::new(mysqld)
        .arg("--help")
        .arg("--verbose")
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| MysqlTestError::Spawn {
            binary: mysqld.display().to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(MysqlTestError::BaseDir(format!(
            "{} --help --verbose exited with {}",
            mysqld.display(),
            output.status
        )));
    }

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));

    let dir = parse_base_dir(&combined).ok_or_else(|| {
        MysqlTestError::BaseDir(format!(
            "no basedir line in {} --help --verbose output",
            mysqld.display()
        ))
    })?;

    info!(base_dir = %dir.display(), "Discovered mysqld base directory");
    Ok(dir)
}

/// Extract the basedir value from `mysqld --help --verbose` output
pub fn parse_base_dir(output: &str) -> Option<PathBuf> {
    BASEDIR_LINE
        .captures(output)
        .and_then(|caps| caps.get(1))
        .map(|m| PathBuf::from(m.as_str()))
}
