//! 配置解析模块
//!
//! TOML is the primary format, JSON is accepted for tooling.

use contracts::{ContractError, ServiceConfig};

/// Config file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML (recommended)
    Toml,
    Json,
}

impl ConfigFormat {
    /// Infer format from a file extension (case-insensitive)
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

fn parse_toml(content: &str) -> Result<ServiceConfig, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

fn parse_json(content: &str) -> Result<ServiceConfig, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Parse config content in the given format
pub fn parse(content: &str, format: ConfigFormat) -> Result<ServiceConfig, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_sections() {
        let content = r#"
[upstream]
base_url = "http://localhost:9999/v1"
timeout_secs = 5

[reconstruction]
tolerances_s = [2.0, 20.0]
min_drivers = 3
"#;
        let config = parse(content, ConfigFormat::Toml).unwrap();
        assert_eq!(config.upstream.base_url, "http://localhost:9999/v1");
        assert_eq!(config.upstream.timeout_secs, 5);
        assert_eq!(config.upstream.fetch_timeout_secs, 120);
        assert_eq!(config.reconstruction.tolerances_s, vec![2.0, 20.0]);
        assert_eq!(config.reconstruction.leader_max_position, 3);
    }

    #[test]
    fn json_sections() {
        let content = r#"{ "server": { "host": "127.0.0.1", "port": 8080 } }"#;
        let config = parse(content, ConfigFormat::Json).unwrap();
        assert_eq!(config.server.bind_addr(), "127.0.0.1:8080");
    }

    #[test]
    fn toml_syntax_error() {
        let err = parse("invalid toml [[[", ConfigFormat::Toml).unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn wrong_field_type() {
        let err = parse("[store]\nmax_readers = \"four\"\n", ConfigFormat::Toml).unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(ConfigFormat::from_extension("TOML"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("json"), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
