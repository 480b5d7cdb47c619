//! Client configuration
//!
//! Resolution order matches the backend: command line, environment (both via
//! clap), `ns-capture.toml`, compiled default.

use clap::{Parser, Subcommand};
use ns_common::api::UPLOAD_PROCESSING_DEADLINE_SECS;
use ns_common::config::{LoggingConfig, RootFolderResolver};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::assessment::AssessmentConfig;
use crate::auth::CREDENTIALS_FILE;
use crate::ffmpeg::FfmpegSettings;

/// Module name, also the TOML file stem
pub const MODULE_NAME: &str = "ns-capture";

pub const DEFAULT_API_URL: &str = "http://localhost:5000";
pub const DEFAULT_RECORDING_SECS: u32 = 30;
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 1000;
/// Time allowed for sending the recording and reading the reply
pub const UPLOAD_TRANSFER_ALLOWANCE_SECS: u64 = 60;
/// Outlasts the backend's processing deadline for one upload
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 =
    UPLOAD_PROCESSING_DEADLINE_SECS + UPLOAD_TRANSFER_ALLOWANCE_SECS;

/// Command-line interface
#[derive(Parser, Debug)]
#[command(name = "ns-capture")]
#[command(about = "NeuroShield assessment client")]
#[command(version)]
pub struct Cli {
    /// Backend base URL
    #[arg(long, global = true, env = "NS_API_URL")]
    pub api_url: Option<String>,

    /// Root folder holding the saved credential
    #[arg(short, long, global = true, env = "NS_ROOT_FOLDER")]
    pub root_folder: Option<PathBuf>,

    /// Config file (defaults to <config dir>/neuroshield/ns-capture.toml)
    #[arg(short, long, global = true, env = "NS_CAPTURE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create an account and sign in
    Register {
        email: String,
        /// Prompted for when omitted
        #[arg(long, env = "NS_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Sign in to an existing account
    Login {
        email: String,
        #[arg(long, env = "NS_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Forget the saved credential
    Logout,
    /// List past assessments, newest first
    History,
    /// Record and submit a new assessment
    Assess {
        /// Start with the back camera
        #[arg(long)]
        back_camera: bool,
    },
}

/// Contents of `ns-capture.toml`; every key is optional
#[derive(Debug, Default, Deserialize)]
pub struct ClientToml {
    pub root_folder: Option<PathBuf>,
    pub api_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub recording_secs: Option<u32>,
    pub settle_delay_ms: Option<u64>,
    #[serde(default)]
    pub ffmpeg: FfmpegSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Fully resolved client settings
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub api_url: String,
    pub root_folder: PathBuf,
    pub credentials_path: PathBuf,
    pub request_timeout: Duration,
    pub recording_secs: u32,
    pub settle_delay: Duration,
    pub ffmpeg: FfmpegSettings,
    pub logging: LoggingConfig,
}

impl ClientSettings {
    pub fn resolve(cli: &Cli, toml: ClientToml) -> Self {
        let root_folder = match (&cli.root_folder, &toml.root_folder) {
            (Some(cli), _) => cli.clone(),
            (None, Some(file)) => file.clone(),
            (None, None) => RootFolderResolver::new(MODULE_NAME).resolve(),
        };

        let api_url = cli
            .api_url
            .clone()
            .or(toml.api_url)
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            credentials_path: root_folder.join(CREDENTIALS_FILE),
            root_folder,
            request_timeout: Duration::from_secs(
                toml.request_timeout_secs
                    .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            ),
            recording_secs: toml
                .recording_secs
                .filter(|s| *s > 0)
                .unwrap_or(DEFAULT_RECORDING_SECS),
            settle_delay: Duration::from_millis(
                toml.settle_delay_ms.unwrap_or(DEFAULT_SETTLE_DELAY_MS),
            ),
            ffmpeg: toml.ffmpeg,
            logging: toml.logging,
        }
    }

    /// Controller timing: one tick per recorded second
    pub fn assessment_config(&self) -> AssessmentConfig {
        AssessmentConfig {
            recording_ticks: self.recording_secs,
            settle_delay: self.settle_delay,
            ..AssessmentConfig::default()
        }
    }
}
