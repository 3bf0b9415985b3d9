use super::{types::Config, ConfigError, QueueBackend};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Dispatch timing values are non-zero
/// - HTTP queue backend has a usable URL
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    // Dispatch validation
    if config.dispatch.job_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "dispatch.job_timeout_secs cannot be 0".to_string(),
        ));
    }
    if config.dispatch.poll_interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "dispatch.poll_interval_secs cannot be 0".to_string(),
        ));
    }
    if config.dispatch.batch_size <= 0 {
        return Err(ConfigError::ValidationError(
            "dispatch.batch_size must be positive".to_string(),
        ));
    }

    // Queue validation
    if config.queue.backend == QueueBackend::Http {
        match &config.queue.http {
            None => {
                return Err(ConfigError::ValidationError(
                    "queue.backend = \"http\" requires a [queue.http] section".to_string(),
                ));
            }
            Some(http) => {
                if !http.url.starts_with("http://") && !http.url.starts_with("https://") {
                    return Err(ConfigError::ValidationError(format!(
                        "queue.http.url must be an http(s) URL, got: {}",
                        http.url
                    )));
                }
            }
        }
    }

    Ok(())
}
