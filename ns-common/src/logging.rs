//! Tracing subscriber setup shared by the NeuroShield binaries

use crate::config::LoggingConfig;
use crate::{Error, Result};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build default filter directives for a crate, e.g. `ns_server=info,tower_http=info`
pub fn default_directives(crates: &[&str], level: &str) -> String {
    crates
        .iter()
        .map(|c| format!("{}={}", c, level))
        .collect::<Vec<_>>()
        .join(",")
}

/// Initialize the global tracing subscriber
///
/// `RUST_LOG` wins over `default_directives`. When `logging.file` is set,
/// output is appended to that file instead of stderr.
pub fn init_tracing(default_directives: &str, logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives));

    let registry = tracing_subscriber::registry().with(filter);

    let result = match &logging.file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            registry
                .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .try_init()
        }
        None => registry.with(fmt::layer()).try_init(),
    };

    result.map_err(|e| Error::Internal(format!("Failed to initialize tracing: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives() {
        assert_eq!(
            default_directives(&["ns_server", "tower_http"], "debug"),
            "ns_server=debug,tower_http=debug"
        );
    }

    #[test]
    fn test_default_directives_single_crate() {
        assert_eq!(default_directives(&["ns_capture"], "info"), "ns_capture=info");
    }
}
