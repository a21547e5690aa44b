//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

use grouplcm_core::config::{LogConfig, LogFormat};

/// Build the filter: `RUST_LOG` wins, then the configured directives.
pub fn env_filter(config: &LogConfig) -> anyhow::Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => Ok(EnvFilter::try_new(&config.filter)?),
    }
}

/// Install the global subscriber. Call once, before anything logs.
///
/// Logs go to stderr; stdout is reserved for command output.
pub fn init(config: &LogConfig) -> anyhow::Result<()> {
    let filter = env_filter(config)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match config.format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_directives_parse() {
        assert!(EnvFilter::try_new(&LogConfig::default().filter).is_ok());
    }

    #[test]
    fn unknown_level_is_rejected() {
        assert!(EnvFilter::try_new("grouplcm=loud").is_err());
    }
}
