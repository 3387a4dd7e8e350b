use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Worker pool, party size and price ceiling are positive
/// - Hours are within 0..=23
/// - Holiday ranges are ordered
/// - Proxy URLs parse
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let search = &config.search;

    if search.max_workers == 0 {
        return Err(ConfigError::ValidationError(
            "search.max_workers cannot be 0".to_string(),
        ));
    }

    if search.adults == 0 {
        return Err(ConfigError::ValidationError(
            "search.adults cannot be 0".to_string(),
        ));
    }

    if !(search.max_price > 0.0) {
        return Err(ConfigError::ValidationError(
            "search.max_price must be positive".to_string(),
        ));
    }

    if search.min_departure_hour > 23 {
        return Err(ConfigError::ValidationError(format!(
            "search.min_departure_hour must be 0-23, got {}",
            search.min_departure_hour
        )));
    }

    if let Some(hour) = search.max_return_hour {
        if hour > 23 {
            return Err(ConfigError::ValidationError(format!(
                "search.max_return_hour must be 0-23, got {}",
                hour
            )));
        }
    }

    for holiday in &search.holidays {
        if holiday.start > holiday.end {
            return Err(ConfigError::ValidationError(format!(
                "holiday {} ends before it starts",
                holiday.name.as_deref().unwrap_or("<unnamed>")
            )));
        }
        if holiday.min_departure_hour > 23 {
            return Err(ConfigError::ValidationError(format!(
                "holiday min_departure_hour must be 0-23, got {}",
                holiday.min_departure_hour
            )));
        }
    }

    if config.upstream.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "upstream.timeout_secs cannot be 0".to_string(),
        ));
    }

    let pause = config.identity.warmup_pause;
    if pause.min_ms > pause.max_ms {
        return Err(ConfigError::ValidationError(
            "identity.warmup_pause.min_ms exceeds max_ms".to_string(),
        ));
    }

    for proxy in &config.identity.proxies {
        if reqwest::Url::parse(proxy).is_err() {
            return Err(ConfigError::ValidationError(format!(
                "invalid proxy URL: {}",
                super::redact_proxy_url(proxy)
            )));
        }
    }

    Ok(())
}
