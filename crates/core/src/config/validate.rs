use tracing::warn;

use super::{Config, ConfigError};

/// Validate a loaded configuration beyond what deserialization checks.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.upstream.base_url.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "upstream.base_url must not be empty".to_string(),
        ));
    }

    if !config.upstream.base_url.starts_with("http://")
        && !config.upstream.base_url.starts_with("https://")
    {
        return Err(ConfigError::Invalid(format!(
            "upstream.base_url must be an http(s) URL, got '{}'",
            config.upstream.base_url
        )));
    }

    if config.worker.workers == 0 {
        return Err(ConfigError::Invalid(
            "worker.workers must be at least 1".to_string(),
        ));
    }

    if config.worker.max_attempts == 0 {
        return Err(ConfigError::Invalid(
            "worker.max_attempts must be at least 1".to_string(),
        ));
    }

    if config.worker.retry_base_ms > config.worker.retry_max_delay_ms {
        return Err(ConfigError::Invalid(format!(
            "worker.retry_base_ms ({}) exceeds worker.retry_max_delay_ms ({})",
            config.worker.retry_base_ms, config.worker.retry_max_delay_ms
        )));
    }

    if config.callback.max_attempts == 0 {
        return Err(ConfigError::Invalid(
            "callback.max_attempts must be at least 1".to_string(),
        ));
    }

    if config.worker.max_attempts > 10 {
        warn!(
            "worker.max_attempts = {} is unusually high; transient portal outages will hold tasks for a long time",
            config.worker.max_attempts
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;

    fn valid_config() -> Config {
        load_config_from_str(
            r#"
[upstream]
base_url = "https://desafio.cotefacil.net"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_empty_base_url_rejected() {
        let mut config = valid_config();
        config.upstream.base_url = "  ".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_non_http_base_url_rejected() {
        let mut config = valid_config();
        config.upstream.base_url = "ftp://portal".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut config = valid_config();
        config.worker.workers = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let mut config = valid_config();
        config.worker.max_attempts = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_base_above_cap_rejected() {
        let mut config = valid_config();
        config.worker.retry_base_ms = 120_000;
        config.worker.retry_max_delay_ms = 60_000;
        assert!(validate_config(&config).is_err());
    }
}
