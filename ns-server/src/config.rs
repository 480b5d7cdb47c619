//! Server configuration
//!
//! Every setting resolves in the same order: command line, environment
//! (both handled by clap), `ns-server.toml`, compiled default.

use clap::Parser;
use ns_common::config::{LoggingConfig, RootFolderResolver, DATABASE_FILE};
use serde::Deserialize;
use std::path::PathBuf;

/// Module name, also the TOML file stem
pub const MODULE_NAME: &str = "ns-server";

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_ML_SERVICE_URL: &str = "http://localhost:8000";
pub const DEFAULT_TOKEN_TTL_DAYS: i64 = 7;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 200 * 1024 * 1024;
/// Per inference call; three calls fit inside the upload deadline
pub const DEFAULT_ML_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_UPLOAD_DEADLINE_SECS: u64 = ns_common::api::UPLOAD_PROCESSING_DEADLINE_SECS;

/// Command-line arguments
#[derive(Parser, Debug, Default)]
#[command(name = "ns-server")]
#[command(about = "NeuroShield assessment backend")]
#[command(version)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "NS_SERVER_PORT")]
    pub port: Option<u16>,

    /// Address to bind
    #[arg(long, env = "NS_SERVER_BIND")]
    pub bind: Option<String>,

    /// Root folder holding the database
    #[arg(short, long, env = "NS_ROOT_FOLDER")]
    pub root_folder: Option<PathBuf>,

    /// Explicit database file (overrides the root folder default)
    #[arg(long, env = "NS_DATABASE_PATH")]
    pub database: Option<PathBuf>,

    /// Config file (defaults to <config dir>/neuroshield/ns-server.toml)
    #[arg(short, long, env = "NS_SERVER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Base URL of the inference service
    #[arg(long, env = "ML_SERVICE_URL")]
    pub ml_service_url: Option<String>,

    /// Token signing secret (otherwise stored in the database)
    #[arg(long, env = "NS_TOKEN_SECRET", hide_env_values = true)]
    pub token_secret: Option<String>,
}

/// Contents of `ns-server.toml`; every key is optional
#[derive(Debug, Default, Deserialize)]
pub struct ServerToml {
    pub root_folder: Option<PathBuf>,
    pub port: Option<u16>,
    pub bind: Option<String>,
    pub database_path: Option<PathBuf>,
    pub ml_service_url: Option<String>,
    pub token_secret: Option<String>,
    pub token_ttl_days: Option<i64>,
    pub max_upload_bytes: Option<usize>,
    pub ml_timeout_secs: Option<u64>,
    pub upload_deadline_secs: Option<u64>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Fully resolved settings
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub port: u16,
    pub bind: String,
    pub root_folder: PathBuf,
    pub database_path: PathBuf,
    pub ml_service_url: String,
    /// Explicit secret; `None` means load or generate it in the database
    pub token_secret: Option<String>,
    pub token_ttl_days: i64,
    pub max_upload_bytes: usize,
    pub ml_timeout_secs: u64,
    /// Total inference budget for one upload; nothing is persisted past it
    pub upload_deadline_secs: u64,
    pub logging: LoggingConfig,
}

impl ServerSettings {
    /// Merge command line/environment over the TOML file over defaults
    pub fn resolve(args: &Args, toml: ServerToml) -> Self {
        let root_folder = match (&args.root_folder, &toml.root_folder) {
            (Some(cli), _) => cli.clone(),
            (None, Some(file)) => file.clone(),
            (None, None) => RootFolderResolver::new(MODULE_NAME).resolve(),
        };

        let database_path = args
            .database
            .clone()
            .or(toml.database_path)
            .unwrap_or_else(|| root_folder.join(DATABASE_FILE));

        let ml_service_url = args
            .ml_service_url
            .clone()
            .or(toml.ml_service_url)
            .unwrap_or_else(|| DEFAULT_ML_SERVICE_URL.to_string());

        let token_secret = args
            .token_secret
            .clone()
            .or(toml.token_secret)
            .filter(|s| !s.trim().is_empty());

        Self {
            port: args.port.or(toml.port).unwrap_or(DEFAULT_PORT),
            bind: args
                .bind
                .clone()
                .or(toml.bind)
                .unwrap_or_else(|| DEFAULT_BIND.to_string()),
            root_folder,
            database_path,
            ml_service_url: ml_service_url.trim_end_matches('/').to_string(),
            token_secret,
            token_ttl_days: toml
                .token_ttl_days
                .filter(|d| *d > 0)
                .unwrap_or(DEFAULT_TOKEN_TTL_DAYS),
            max_upload_bytes: toml.max_upload_bytes.unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            ml_timeout_secs: toml.ml_timeout_secs.unwrap_or(DEFAULT_ML_TIMEOUT_SECS),
            upload_deadline_secs: toml
                .upload_deadline_secs
                .filter(|s| *s > 0)
                .unwrap_or(DEFAULT_UPLOAD_DEADLINE_SECS),
            logging: toml.logging,
        }
    }

    /// Settings for tests and embedded use: defaults with a fixed root folder
    pub fn with_root(root_folder: PathBuf) -> Self {
        let args = Args {
            root_folder: Some(root_folder),
            ..Default::default()
        };
        Self::resolve(&args, ServerToml::default())
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    /// Token lifetime in milliseconds
    pub fn token_ttl_ms(&self) -> i64 {
        self.token_ttl_days * 24 * 60 * 60 * 1000
    }
}
