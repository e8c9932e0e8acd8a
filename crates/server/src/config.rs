// crates/server/src/config.rs
//! Command line and environment configuration.

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use lada_core::memory::Seed;
use lada_server_jobs::RegistryConfig;

/// Default port for the server.
pub const DEFAULT_PORT: u16 = 47880;

#[derive(Parser, Debug, Clone)]
#[command(name = "lada-server")]
#[command(version)]
#[command(about = "Asynchronous import and export jobs for LADA records", long_about = None)]
pub struct Config {
    /// Address to bind (default: 127.0.0.1)
    ///
    /// Can also be set via LADA_HOST environment variable
    #[arg(long, env = "LADA_HOST", default_value = "127.0.0.1")]
    pub host: IpAddr,

    /// Port to listen on (default: 47880)
    ///
    /// Can also be set via LADA_PORT environment variable
    #[arg(short = 'p', long, env = "LADA_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Maximum number of jobs running at the same time (default: 4, valid range: 1-256)
    ///
    /// Can also be set via LADA_WORKER_POOL_SIZE environment variable
    #[arg(long, env = "LADA_WORKER_POOL_SIZE", default_value_t = 4, value_parser = clap::value_parser!(u16).range(1..=256))]
    pub worker_pool_size: u16,

    /// Seconds a finished job is kept for download (default: 3600)
    ///
    /// Can also be set via LADA_RETENTION_SECS environment variable
    #[arg(long, env = "LADA_RETENTION_SECS", default_value_t = 3600)]
    pub retention_secs: u64,

    /// Seconds between two sweeps for expired jobs (default: 60, minimum: 1)
    ///
    /// Can also be set via LADA_REAPER_INTERVAL_SECS environment variable
    #[arg(long, env = "LADA_REAPER_INTERVAL_SECS", default_value_t = 60, value_parser = clap::value_parser!(u64).range(1..))]
    pub reaper_interval_secs: u64,

    /// Directory for job result files (default: <tmp>/lada-results)
    ///
    /// Can also be set via LADA_RESULT_DIR environment variable
    #[arg(long, env = "LADA_RESULT_DIR")]
    pub result_dir: Option<PathBuf>,

    /// Encoding of exported files when the request names none (default: iso-8859-15)
    ///
    /// Can also be set via LADA_DEFAULT_CHARSET environment variable
    #[arg(long, env = "LADA_DEFAULT_CHARSET", default_value = "iso-8859-15")]
    pub default_charset: String,

    /// Language ranges used when a request has no Accept-Language (default: de-DE)
    ///
    /// Can also be set via LADA_DEFAULT_LOCALE environment variable
    #[arg(long, env = "LADA_DEFAULT_LOCALE", default_value = "de-DE")]
    pub default_locale: String,

    /// JSON seed file for the in-memory collaborators (default: built-in demo data)
    ///
    /// Can also be set via LADA_SEED environment variable
    #[arg(long, env = "LADA_SEED")]
    pub seed: Option<PathBuf>,
}

/// Request defaults applied at the service boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub default_charset: String,
    pub default_locale: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            default_charset: "iso-8859-15".to_string(),
            default_locale: "de-DE".to_string(),
        }
    }
}

impl Config {
    pub fn registry_config(&self) -> RegistryConfig {
        let defaults = RegistryConfig::default();
        RegistryConfig {
            worker_pool_size: usize::from(self.worker_pool_size),
            retention: Duration::from_secs(self.retention_secs),
            reaper_interval: Duration::from_secs(self.reaper_interval_secs),
            result_dir: self.result_dir.clone().unwrap_or(defaults.result_dir),
        }
    }

    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            default_charset: self.default_charset.clone(),
            default_locale: self.default_locale.clone(),
        }
    }

    /// Load the seed file, or the demo data when none is configured.
    pub fn load_seed(&self) -> anyhow::Result<Seed> {
        let Some(path) = &self.seed else {
            return Ok(Seed::demo());
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed reading seed file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed parsing seed file {}", path.display()))
    }
}
