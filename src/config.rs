use std::env;
use thiserror::Error;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_GATEWAY_PATH: &str = "/api/gemini";
pub const DEFAULT_UPSTREAM: &str = "https://generativelanguage.googleapis.com";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{var} must be a number, got {value:?}")]
    NotANumber { var: &'static str, value: String },
    #[error("GATEWAY_PATH must start with '/', got {0:?}")]
    BadPath(String),
}

/// Process-wide settings, read once at start-up.
#[derive(Debug, Clone)]
pub struct Config {
    /// Upstream credential. Left unset the server still boots, but every
    /// gateway request fails with a configuration error.
    pub api_key: Option<String>,
    pub port: u16,
    pub gateway_path: String,
    pub upstream_base_url: String,
    pub default_model: String,
    pub max_body_bytes: usize,
    pub google_client_id: Option<String>,
    pub signing_secret: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            port: 8081,
            gateway_path: DEFAULT_GATEWAY_PATH.into(),
            upstream_base_url: DEFAULT_UPSTREAM.into(),
            default_model: DEFAULT_MODEL.into(),
            max_body_bytes: 25 * 1024 * 1024,
            google_client_id: None,
            signing_secret: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|k| env::var(k).ok())
    }

    fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Config::default();
        let non_empty = |k: &str| get(k).filter(|v| !v.trim().is_empty());

        cfg.api_key = non_empty("API_KEY");
        if let Some(v) = non_empty("PORT") {
            cfg.port = v.trim().parse().map_err(|_| ConfigError::NotANumber { var: "PORT", value: v })?;
        }
        if let Some(v) = non_empty("MAX_BODY_BYTES") {
            cfg.max_body_bytes = v
                .trim()
                .parse()
                .map_err(|_| ConfigError::NotANumber { var: "MAX_BODY_BYTES", value: v })?;
        }
        if let Some(p) = non_empty("GATEWAY_PATH") {
            if !p.starts_with('/') {
                return Err(ConfigError::BadPath(p));
            }
            cfg.gateway_path = p;
        }
        if let Some(u) = non_empty("GEMINI_BASE_URL") {
            cfg.upstream_base_url = u.trim_end_matches('/').to_string();
        }
        if let Some(m) = non_empty("DEFAULT_MODEL") {
            cfg.default_model = m;
        }
        cfg.google_client_id = non_empty("GOOGLE_CLIENT_ID");
        cfg.signing_secret = non_empty("AUTH_SIGNING_SECRET");
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let cfg = Config::from_lookup(lookup(&[])).unwrap();
        assert!(cfg.api_key.is_none());
        assert_eq!(cfg.port, 8081);
        assert_eq!(cfg.gateway_path, "/api/gemini");
        assert_eq!(cfg.default_model, "gemini-2.5-flash");
    }

    #[test]
    fn blank_api_key_counts_as_unset() {
        let cfg = Config::from_lookup(lookup(&[("API_KEY", "  ")])).unwrap();
        assert!(cfg.api_key.is_none());
    }

    #[test]
    fn overrides_are_read() {
        let cfg = Config::from_lookup(lookup(&[
            ("API_KEY", "k"),
            ("PORT", "9000"),
            ("GATEWAY_PATH", "/.netlify/functions/gemini"),
            ("GEMINI_BASE_URL", "http://localhost:1234/"),
        ]))
        .unwrap();
        assert_eq!(cfg.api_key.as_deref(), Some("k"));
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.gateway_path, "/.netlify/functions/gemini");
        assert_eq!(cfg.upstream_base_url, "http://localhost:1234");
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(matches!(
            Config::from_lookup(lookup(&[("PORT", "eighty")])),
            Err(ConfigError::NotANumber { var: "PORT", .. })
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[("GATEWAY_PATH", "gemini")])),
            Err(ConfigError::BadPath(_))
        ));
    }
}
