use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::err::ReError;

/// Options parsed out of a connection URI's query string
/// (`?timeout=5&ssl=true&charset=utf8mb4`), handed to a driver factory at
/// `create_session` time. Unknown keys are ignored, matching the original's
/// tolerant URI handling.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionOptions {
    pub timeout_secs: Option<u64>,
    pub params: Option<String>,
    pub ssl: bool,
    pub charset: Option<String>,
}

impl SessionOptions {
    /// Parses a `k=v&k=v` query string (the part after `?` in a connection
    /// URI). Malformed pairs (no `=`) are skipped rather than rejected.
    pub fn from_query_string(query: &str) -> SessionOptions {
        let mut options = SessionOptions::default();

        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };

            match key {
                "timeout" => options.timeout_secs = value.parse::<u64>().ok(),
                "params" => options.params = Some(value.to_string()),
                "ssl" => options.ssl = value == "true" || value == "1",
                "charset" => options.charset = Some(value.to_string()),
                _ => {}
            }
        }

        options
    }
}

/// Top-level on-disk configuration (TOML), grounded in the teacher's
/// `FConfig`/`RepConfig` pair — reduced to what this crate's driver layer
/// actually needs outside of the URI itself: a default connection string
/// and a logging directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub app_name: String,
    pub default_uri: Option<String>,
    pub base: BaseConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseConfig {
    /// log output directory; `None` logs to stdout only.
    pub log_dir: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            app_name: String::new(),
            default_uri: None,
            base: BaseConfig::default(),
        }
    }
}

impl Default for BaseConfig {
    fn default() -> Self {
        BaseConfig { log_dir: None }
    }
}

/// Reads and parses a TOML config file at `path`.
pub fn read_config<P: AsRef<Path>>(path: P) -> Result<AppConfig, ReError> {
    let mut file = File::open(path.as_ref())?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;

    toml::from_str(contents.as_str()).map_err(|e| ReError::ConfigParseErr(e.to_string()))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn query_string_parses_known_keys_and_ignores_unknown() {
        let options = SessionOptions::from_query_string("timeout=5&ssl=true&bogus=1&charset=utf8mb4");
        assert_eq!(options.timeout_secs, Some(5));
        assert!(options.ssl);
        assert_eq!(options.charset.as_deref(), Some("utf8mb4"));
    }

    #[test]
    fn malformed_pairs_are_skipped() {
        let options = SessionOptions::from_query_string("timeout&ssl=1");
        assert_eq!(options.timeout_secs, None);
        assert!(options.ssl);
    }
}
