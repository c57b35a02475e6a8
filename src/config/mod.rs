// src/config/mod.rs
// Settings shared by every instance a test process starts

pub mod basedir;
pub mod env;

use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

/// How long one start attempt may take before it is replaced
pub const DEFAULT_START_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for provisioning test mysqld instances
#[derive(Debug, Clone)]
pub struct MysqlTestConfig {
    /// mysqld binary to run (default: "mysqld" from PATH)
    pub mysqld: PathBuf,
    /// Installation root passed as --basedir; discovered when unset
    pub base_dir: Option<PathBuf>,
    /// Mirror subprocess output to our own stdout/stderr
    pub verbose: bool,
    /// Per-attempt deadline for reaching readiness
    pub start_timeout: Duration,
    /// Parent directory for instance directories (default: system temp dir)
    pub temp_root: Option<PathBuf>,
}

impl Default for MysqlTestConfig {
    fn default() -> Self {
        Self {
            mysqld: PathBuf::from("mysqld"),
            base_dir: None,
            verbose: false,
            start_timeout: DEFAULT_START_TIMEOUT,
            temp_root: None,
        }
    }
}

impl MysqlTestConfig {
    /// Defaults, with output mirroring taken from MYSQLTEST_VERBOSE
    pub fn from_env() -> Self {
        let verbose = env::verbose_from_env();
        if verbose {
            debug!("{} set, mirroring mysqld output", env::VERBOSE_ENV);
        }
        Self {
            verbose,
            ..Self::default()
        }
    }

    pub fn with_mysqld(mut self, mysqld: impl Into<PathBuf>) -> Self {
        self.mysqld = mysqld.into();
        self
    }

    /// Skip `mysqld --help --verbose` discovery and use this base directory
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_start_timeout(mut self, timeout: Duration) -> Self {
        self.start_timeout = timeout;
        self
    }

    pub fn with_temp_root(mut self, temp_root: impl Into<PathBuf>) -> Self {
        self.temp_root = Some(temp_root.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MysqlTestConfig::default();
        assert_eq!(config.mysqld, PathBuf::from("mysqld"));
        assert!(config.base_dir.is_none());
        assert!(!config.verbose);
        assert_eq!(config.start_timeout, Duration::from_secs(30));
        assert!(config.temp_root.is_none());
    }

    #[test]
    fn test_builder_overrides() {
        let config = MysqlTestConfig::default()
            .with_mysqld("/opt/mysql/bin/mysqld")
            .with_base_dir("/opt/mysql")
            .with_verbose(true)
            .with_start_timeout(Duration::from_secs(5))
            .with_temp_root("/var/tmp");

        assert_eq!(config.mysqld, PathBuf::from("/opt/mysql/bin/mysqld"));
        assert_eq!(config.base_dir, Some(PathBuf::from("/opt/mysql")));
        assert!(config.verbose);
        assert_eq!(config.start_timeout, Duration::from_secs(5));
        assert_eq!(config.temp_root, Some(PathBuf::from("/var/tmp")));
    }

    #[test]
    fn test_from_env_reads_verbose_flag() {
        let original = std::env::var(env::VERBOSE_ENV).ok();

        // SAFETY: the only test in this binary that touches MYSQLTEST_VERBOSE
        unsafe { std::env::set_var(env::VERBOSE_ENV, "yes") };
        let config = MysqlTestConfig::from_env();
        assert!(config.verbose);
        assert_eq!(config.start_timeout, DEFAULT_START_TIMEOUT);

        unsafe { std::env::set_var(env::VERBOSE_ENV, "off") };
        assert!(!MysqlTestConfig::from_env().verbose);

        unsafe { std::env::remove_var(env::VERBOSE_ENV) };
        assert!(!MysqlTestConfig::from_env().verbose);

        if let Some(val) = original {
            unsafe { std::env::set_var(env::VERBOSE_ENV, val) };
        }
    }
}
