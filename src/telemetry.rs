use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};
use crate::error::{EngineError, Result};

/// `RUST_LOG` wins over the configured level.
pub fn env_filter(level: &str) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(level)
            .map_err(|err| EngineError::Config(format!("invalid log level `{level}`: {err}"))),
    }
}

/// Installs the global subscriber. Call once, from the binary.
pub fn init_tracing(cfg: &LoggingConfig) -> Result<()> {
    let filter = env_filter(&cfg.level)?;
    let installed = match cfg.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE)
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).try_init(),
    };
    installed.map_err(|err| EngineError::Config(format!("failed to install logger: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_directives() {
        assert!(EnvFilter::try_new("debug,sqlx=warn").is_ok());
        assert!(env_filter("info").is_ok());
    }
}
