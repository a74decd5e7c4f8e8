//! linesync Daemon (linesyncd)
//!
//! Serves collaborative plain-text documents over TCP.
//!
//! # Usage
//!
//! ```bash
//! # Start with defaults (TCP on 7380, in-memory only)
//! linesyncd
//!
//! # Custom port
//! linesyncd --port 7000
//!
//! # With persistence
//! linesyncd --db /var/lib/linesync/data.db
//!
//! # With authentication
//! linesyncd --password mysecret
//!
//! # With configuration file
//! linesyncd --config /etc/linesync/linesync.toml
//! ```

mod config;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use linesync_core::EditorService;
use linesync_storage::{SqliteStorage, Storage};
use linesync_transport::TcpServer;

use crate::config::{PartialConfig, Settings};

/// How long shutdown waits for queued commits to reach storage
const JOURNAL_FLUSH_TIMEOUT: Duration = Duration::from_secs(10);

/// linesync Daemon - collaborative plain-text editing server
#[derive(Parser, Debug)]
#[command(name = "linesyncd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TCP port to listen on [default: 7380]
    #[arg(long, env = "LINESYNC_PORT")]
    port: Option<u16>,

    /// Bind address [default: 0.0.0.0]
    #[arg(long, env = "LINESYNC_BIND")]
    bind: Option<String>,

    /// Configuration file path
    #[arg(short, long, env = "LINESYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error) [default: info]
    #[arg(long, env = "LINESYNC_LOG_LEVEL")]
    log_level: Option<String>,

    /// SQLite database path for persistence (default: in-memory only)
    #[arg(long, env = "LINESYNC_DB")]
    db: Option<PathBuf>,

    /// Require authentication with this password
    #[arg(long, env = "LINESYNC_PASSWORD")]
    password: Option<String>,
}

impl Args {
    fn overrides(&self) -> PartialConfig {
        PartialConfig {
            port: self.port,
            bind: self.bind.clone(),
            log_level: self.log_level.clone(),
            db: self.db.clone(),
            password: self.password.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let file = match &args.config {
        Some(path) => PartialConfig::load(path)?,
        None => PartialConfig::default(),
    };
    let settings = Settings::resolve(args.overrides().or(file));

    // Initialize logging
    let level = match settings.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    // Print banner
    print_banner();

    if let Some(path) = &args.config {
        info!(path = %path.display(), "Loaded configuration file");
    }

    // Initialize SQLite storage if path provided
    let storage: Option<Arc<dyn Storage>> = if let Some(db_path) = &settings.db {
        info!(path = %db_path.display(), "Initializing SQLite persistence");
        match SqliteStorage::new(db_path) {
            Ok(storage) => {
                let storage: Arc<dyn Storage> = Arc::new(storage);
                info!("SQLite persistence enabled");
                Some(storage)
            }
            Err(e) => {
                warn!(error = %e, "Failed to initialize SQLite, running in-memory only");
                None
            }
        }
    } else {
        info!("Running in-memory only (no --db specified)");
        None
    };

    // Restore persisted history, then journal everything new
    let (service, writer) = match &storage {
        Some(storage) => {
            let (journal, entries) = mpsc::unbounded_channel();
            let service = EditorService::new().with_journal(journal);
            linesync_storage::restore(storage.as_ref(), &service)
                .await
                .context("Failed to restore documents from storage")?;
            log_storage_stats(storage.as_ref(), "Persisted history loaded").await;
            let writer = linesync_storage::spawn_writer(storage.clone(), entries);
            (service, Some(writer))
        }
        None => (EditorService::new(), None),
    };
    let service = Arc::new(service);

    let addr = settings.addr()?;
    info!(
        addr = %addr,
        persistent = storage.is_some(),
        documents = service.stats().document_count,
        "Starting linesync daemon"
    );

    // Log auth status
    if settings.password.is_some() {
        info!("Authentication enabled");
    }

    let tcp_server = Arc::new(match &settings.password {
        Some(pwd) => TcpServer::with_password(service.clone(), addr, pwd.clone()),
        None => TcpServer::new(service.clone(), addr),
    });
    let mut server = tokio::spawn({
        let tcp_server = tcp_server.clone();
        async move {
            if let Err(e) = tcp_server.run().await {
                error!(error = %e, "TCP server error");
            }
        }
    });

    // Wait for shutdown signal or a server failure
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("Shutting down...");
        }
        _ = &mut server => {
            anyhow::bail!("TCP server stopped");
        }
    }

    // Connections release the service as they close, which closes the journal
    tcp_server.shutdown();
    let _ = server.await;
    drop(tcp_server);
    drop(service);

    if let (Some(storage), Some(writer)) = (&storage, writer) {
        match tokio::time::timeout(JOURNAL_FLUSH_TIMEOUT, writer).await {
            Ok(Ok(failed)) if failed.is_empty() => {
                log_storage_stats(storage.as_ref(), "Journal flushed").await;
            }
            Ok(Ok(failed)) => {
                error!(documents = ?failed, "Journal flushed, some documents were not fully persisted");
            }
            Ok(Err(e)) => error!(error = %e, "Journal writer failed"),
            Err(_) => warn!(
                timeout_secs = JOURNAL_FLUSH_TIMEOUT.as_secs(),
                "Timed out flushing the journal, recent commits may not be persisted"
            ),
        }
    }

    Ok(())
}

async fn log_storage_stats(storage: &dyn Storage, message: &str) {
    match storage.stats().await {
        Ok(stats) => info!(
            documents = stats.document_count,
            commits = stats.commit_count,
            bytes = stats.total_size_bytes,
            "{}",
            message
        ),
        Err(e) => warn!(error = %e, "Failed to read storage statistics"),
    }
}

fn print_banner() {
    println!(
        r#"
  ╦  ╦╔╗╔╔═╗╔═╗╦ ╦╔╗╔╔═╗
  ║  ║║║║║╣ ╚═╗╚╦╝║║║║
  ╩═╝╩╝╚╝╚═╝╚═╝ ╩ ╝╚╝╚═╝
  Collaborative plain-text editing
  Version {}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
