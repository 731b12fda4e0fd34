//! Command-line and environment configuration

use crate::storage::{LoadPolicy, PersistenceOptions, SnapshotFile};
use clap::{Parser, ValueEnum};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Console verbosity; each mode is a threshold that also shows more severe levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogMode {
    /// Everything from debug up
    All,
    /// Warnings and errors
    Warning,
    /// Errors only
    Error,
    /// No console output
    Disable,
}

impl LogMode {
    /// Filter directive for the console layer
    pub fn directive(&self) -> &'static str {
        match self {
            LogMode::All => "info,postkeep_server=debug,tower_http=debug",
            LogMode::Warning => "warn",
            LogMode::Error => "error",
            LogMode::Disable => "off",
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "postkeep-server")]
#[command(version, about = "Postkeep - stores scraped posts and serves them over HTTP", long_about = None)]
pub struct Config {
    /// Port of HTTP server
    #[arg(env = "POSTKEEP_PORT")]
    pub port: u16,

    /// Address to listen on
    #[arg(long, env = "POSTKEEP_HOST", default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    pub host: IpAddr,

    /// Seconds between snapshot flushes
    #[arg(long, env = "POSTKEEP_COOLDOWN", default_value_t = 60, value_parser = clap::value_parser!(u64).range(1..))]
    pub cooldown: u64,

    /// Directory holding snapshots and the log file
    #[arg(long, env = "POSTKEEP_DATA_DIR", default_value = ".")]
    pub data_dir: PathBuf,

    /// Snapshot file name prefix
    #[arg(long, env = "POSTKEEP_SNAPSHOT_PREFIX", default_value = "reddit")]
    pub snapshot_prefix: String,

    /// Console log verbosity
    #[arg(long, env = "POSTKEEP_LOG_MODE", value_enum, default_value_t = LogMode::All)]
    pub log_mode: LogMode,

    /// Log file name inside the data directory
    #[arg(long, env = "POSTKEEP_LOG_FILE", default_value = "app.log")]
    pub log_file: String,

    /// Answer unmatched requests with 404 instead of an empty 200
    #[arg(long, env = "POSTKEEP_STRICT_ROUTES")]
    pub strict_routes: bool,

    /// Abort startup on a malformed snapshot line instead of skipping it
    #[arg(long, env = "POSTKEEP_STRICT_SNAPSHOT")]
    pub strict_snapshot: bool,

    /// Start from the newest earlier snapshot when today's does not exist
    #[arg(long, env = "POSTKEEP_CARRY_OVER")]
    pub carry_over: bool,
}

impl Config {
    pub fn bind_address(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn snapshot_file(&self) -> SnapshotFile {
        SnapshotFile::new(&self.data_dir, &self.snapshot_prefix)
    }

    pub fn persistence_options(&self) -> PersistenceOptions {
        PersistenceOptions {
            cooldown: Duration::from_secs(self.cooldown),
            load_policy: if self.strict_snapshot {
                LoadPolicy::Abort
            } else {
                LoadPolicy::Skip
            },
            carry_over: self.carry_over,
        }
    }
}
