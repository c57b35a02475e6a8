// src/main.rs

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use mysqltest::config::DEFAULT_START_TIMEOUT;
use mysqltest::harness::{create_database, try_new_started_server};
use mysqltest::{MysqlTestConfig, load};

/// Run a throwaway mysqld until Ctrl-C
#[derive(Parser, Debug)]
#[command(name = "mysqltest", version, about)]
struct Cli {
    /// mysqld binary to run
    #[arg(long, default_value = "mysqld")]
    mysqld: PathBuf,

    /// Installation root; discovered from `mysqld --help --verbose` when omitted
    #[arg(long)]
    basedir: Option<PathBuf>,

    /// Create this database once the server is up
    #[arg(long)]
    database: Option<String>,

    /// SQL file to apply to --database (statements separated by ';')
    #[arg(long, requires = "database")]
    load: Option<PathBuf>,

    /// Seconds one start attempt may take before a fresh instance is tried
    #[arg(
        long,
        default_value_t = DEFAULT_START_TIMEOUT.as_secs(),
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    timeout: u64,

    /// Debug logging and mirrored mysqld output (also MYSQLTEST_VERBOSE=1)
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = MysqlTestConfig::from_env()
        .with_mysqld(&cli.mysqld)
        .with_start_timeout(Duration::from_secs(cli.timeout));
    if cli.verbose {
        config = config.with_verbose(true);
    }
    if let Some(dir) = &cli.basedir {
        config = config.with_base_dir(dir);
    }

    let subscriber = FmtSubscriber::builder()
        .with_max_level(if config.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut server = try_new_started_server(config)
        .await
        .context("Failed to start mysqld")?;

    let result = serve(&server, &cli).await;
    server.stop().await;
    result
}

async fn serve(server: &mysqltest::Server, cli: &Cli) -> anyhow::Result<()> {
    let suffix = cli.database.clone().unwrap_or_default();

    if let Some(name) = &cli.database {
        create_database(server, name)
            .await
            .with_context(|| format!("Failed to create database {name}"))?;
    }

    if let Some(path) = &cli.load {
        let file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let pool = server.try_db(&suffix)?;
        load(&pool, file)
            .await
            .with_context(|| format!("Failed to load {}", path.display()))?;
        pool.close().await;
        info!(file = %path.display(), "Loaded SQL file");
    }

    println!("dsn: {}", server.dsn(&suffix));
    println!("url: {}", server.connection_url(&suffix));
    if let Some(socket) = server.socket() {
        println!("socket: {}", socket.display());
    }

    info!("Press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    Ok(())
}
