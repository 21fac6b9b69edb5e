//! 配置校验模块
//!
//! Rules:
//! - upstream: base_url is http(s), timeouts > 0
//! - store: path non-empty, max_readers >= 1, write_queue_capacity >= 1
//! - reconstruction: tolerances non-empty, positive, strictly increasing;
//!   min_drivers >= 1; telemetry windows > 0; margin >= 0

use contracts::{ContractError, ReconstructionConfig, ServiceConfig, StoreConfig, UpstreamConfig};

/// Validate a ServiceConfig
///
/// Returns the first error encountered.
pub fn validate(config: &ServiceConfig) -> Result<(), ContractError> {
    validate_upstream(&config.upstream)?;
    validate_store(&config.store)?;
    validate_reconstruction(&config.reconstruction)?;
    Ok(())
}

fn validate_upstream(upstream: &UpstreamConfig) -> Result<(), ContractError> {
    let url = upstream.base_url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ContractError::config_validation(
            "upstream.base_url",
            format!("must be an http(s) URL, got '{}'", upstream.base_url),
        ));
    }
    if upstream.timeout_secs == 0 {
        return Err(ContractError::config_validation(
            "upstream.timeout_secs",
            "must be > 0",
        ));
    }
    if upstream.fetch_timeout_secs == 0 {
        return Err(ContractError::config_validation(
            "upstream.fetch_timeout_secs",
            "must be > 0",
        ));
    }
    Ok(())
}

fn validate_store(store: &StoreConfig) -> Result<(), ContractError> {
    if store.path.trim().is_empty() {
        return Err(ContractError::config_validation(
            "store.path",
            "database path cannot be empty",
        ));
    }
    if store.max_readers == 0 {
        return Err(ContractError::config_validation(
            "store.max_readers",
            "must be >= 1",
        ));
    }
    if store.write_queue_capacity == 0 {
        return Err(ContractError::config_validation(
            "store.write_queue_capacity",
            "must be >= 1",
        ));
    }
    Ok(())
}

fn validate_reconstruction(cfg: &ReconstructionConfig) -> Result<(), ContractError> {
    if cfg.tolerances_s.is_empty() {
        return Err(ContractError::config_validation(
            "reconstruction.tolerances_s",
            "at least one tolerance is required",
        ));
    }
    for (idx, tolerance) in cfg.tolerances_s.iter().enumerate() {
        if !(*tolerance > 0.0) {
            return Err(ContractError::config_validation(
                format!("reconstruction.tolerances_s[{idx}]"),
                format!("tolerance must be > 0, got {tolerance}"),
            ));
        }
    }
    if let Some(idx) = cfg.tolerances_s.windows(2).position(|w| w[1] <= w[0]) {
        return Err(ContractError::config_validation(
            format!("reconstruction.tolerances_s[{}]", idx + 1),
            "tolerances must be strictly increasing",
        ));
    }
    if cfg.min_drivers == 0 {
        return Err(ContractError::config_validation(
            "reconstruction.min_drivers",
            "must be >= 1",
        ));
    }
    if !(cfg.match_telemetry_window_s > 0.0) {
        return Err(ContractError::config_validation(
            "reconstruction.match_telemetry_window_s",
            "must be > 0",
        ));
    }
    if !(cfg.fallback_telemetry_window_s > 0.0) {
        return Err(ContractError::config_validation(
            "reconstruction.fallback_telemetry_window_s",
            "must be > 0",
        ));
    }
    if !(cfg.end_of_session_margin_s >= 0.0) {
        return Err(ContractError::config_validation(
            "reconstruction.end_of_session_margin_s",
            "must be >= 0",
        ));
    }
    Ok(())
}
