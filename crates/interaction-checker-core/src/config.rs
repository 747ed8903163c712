//! Checker configuration.
//!
//! Defaults match the hosted product. Values can come from a JSON file,
//! from the environment, or both (environment wins).

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{0} is not configured")]
    Missing(&'static str),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to read config file: {0}")]
    Io(String),
}

/// Tunables for search, caching and checking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CheckerConfig {
    /// Database REST base, e.g. `https://xyz.supabase.co`
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    /// Serverless functions base, e.g. `https://site/.netlify/functions`
    pub functions_base: Option<String>,

    pub request_timeout_ms: u64,
    pub debounce_ms: u64,
    pub autocomplete_limit: usize,
    pub cache_capacity: usize,
    pub cache_ttl_ms: u64,

    pub fuzzy_min_score: u8,
    pub fuzzy_limit: usize,

    /// Pair lookups in flight at once
    pub check_concurrency: usize,
    pub pair_timeout_ms: u64,
    /// Extra attempts after a transient pair failure
    pub pair_retries: u32,

    /// Send a lookup log after each check
    pub log_lookups: bool,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            supabase_url: None,
            supabase_anon_key: None,
            functions_base: None,
            request_timeout_ms: 10_000,
            debounce_ms: 150,
            autocomplete_limit: 12,
            cache_capacity: crate::cache::DEFAULT_CAPACITY,
            cache_ttl_ms: crate::cache::DEFAULT_TTL.as_millis() as u64,
            fuzzy_min_score: crate::resolver::MIN_FUZZY_SCORE,
            fuzzy_limit: crate::resolver::MAX_FUZZY_RESULTS,
            check_concurrency: 4,
            pair_timeout_ms: 10_000,
            pair_retries: 1,
            log_lookups: true,
        }
    }
}

/// Resolved remote endpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteEndpoints {
    pub supabase_url: String,
    pub anon_key: String,
    pub functions_base: String,
}

impl CheckerConfig {
    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load from a JSON file. Missing keys take defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.as_ref().display())))?;
        let config: Self = serde_json::from_str(&raw).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay values from an environment lookup.
    ///
    /// `SUPABASE_URL` and `SUPABASE_ANON_KEY` take precedence over their
    /// `VITE_` prefixed forms.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |keys: &[&str]| {
            keys.iter()
                .filter_map(|k| lookup(k))
                .map(|v| v.trim().to_string())
                .find(|v| !v.is_empty())
        };

        if let Some(url) = get(&["SUPABASE_URL", "VITE_SUPABASE_URL"]) {
            self.supabase_url = Some(url);
        }
        if let Some(key) = get(&["SUPABASE_ANON_KEY", "VITE_SUPABASE_ANON_KEY"]) {
            self.supabase_anon_key = Some(key);
        }
        if let Some(base) = get(&["CHECKER_FUNCTIONS_BASE"]) {
            self.functions_base = Some(base);
        }

        if let Some(v) = get(&["CHECKER_REQUEST_TIMEOUT_MS"]) {
            self.request_timeout_ms = parse_var("CHECKER_REQUEST_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = get(&["CHECKER_DEBOUNCE_MS"]) {
            self.debounce_ms = parse_var("CHECKER_DEBOUNCE_MS", &v)?;
        }
        if let Some(v) = get(&["CHECKER_CACHE_TTL_MS"]) {
            self.cache_ttl_ms = parse_var("CHECKER_CACHE_TTL_MS", &v)?;
        }
        if let Some(v) = get(&["CHECKER_CONCURRENCY"]) {
            self.check_concurrency = parse_var("CHECKER_CONCURRENCY", &v)?;
        }
        if let Some(v) = get(&["CHECKER_PAIR_RETRIES"]) {
            self.pair_retries = parse_var("CHECKER_PAIR_RETRIES", &v)?;
        }

        self.validate()
    }

    /// Reject values the checker cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.check_concurrency == 0 {
            return Err(ConfigError::Invalid("check_concurrency must be at least 1".into()));
        }
        if self.autocomplete_limit == 0 {
            return Err(ConfigError::Invalid("autocomplete_limit must be at least 1".into()));
        }
        if self.pair_timeout_ms == 0 || self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid("timeouts must be non-zero".into()));
        }
        if self.fuzzy_min_score > 100 {
            return Err(ConfigError::Invalid("fuzzy_min_score must be 0-100".into()));
        }
        for (name, url) in [
            ("supabase_url", &self.supabase_url),
            ("functions_base", &self.functions_base),
        ] {
            if let Some(url) = url {
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(ConfigError::Invalid(format!("{name} must be an http(s) URL: {url}")));
                }
            }
        }
        Ok(())
    }

    /// Remote endpoints, when all three are configured.
    pub fn remote(&self) -> Result<RemoteEndpoints, ConfigError> {
        Ok(RemoteEndpoints {
            supabase_url: self.supabase_url.clone().ok_or(ConfigError::Missing("SUPABASE_URL"))?,
            anon_key: self
                .supabase_anon_key
                .clone()
                .ok_or(ConfigError::Missing("SUPABASE_ANON_KEY"))?,
            functions_base: self
                .functions_base
                .clone()
                .ok_or(ConfigError::Missing("CHECKER_FUNCTIONS_BASE"))?,
        })
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    pub fn pair_timeout(&self) -> Duration {
        Duration::from_millis(self.pair_timeout_ms)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{name}={value} is not a valid number")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = CheckerConfig::default();
        assert_eq!(config.debounce(), Duration::from_millis(150));
        assert_eq!(config.cache_ttl(), Duration::from_secs(60));
        assert_eq!(config.cache_capacity, 10);
        assert_eq!(config.autocomplete_limit, 12);
        assert!(config.validate().is_ok());
        assert!(matches!(config.remote(), Err(ConfigError::Missing(_))));
    }

    #[test]
    fn test_env_prefers_unprefixed() {
        let mut config = CheckerConfig::default();
        config
            .apply_env(env(&[
                ("SUPABASE_URL", "https://primary.example.com"),
                ("VITE_SUPABASE_URL", "https://vite.example.com"),
                ("VITE_SUPABASE_ANON_KEY", "anon"),
                ("CHECKER_FUNCTIONS_BASE", "https://site.example.com/.netlify/functions"),
                ("CHECKER_CONCURRENCY", "8"),
            ]))
            .unwrap();

        let remote = config.remote().unwrap();
        assert_eq!(remote.supabase_url, "https://primary.example.com");
        assert_eq!(remote.anon_key, "anon");
        assert_eq!(config.check_concurrency, 8);
    }

    #[test]
    fn test_env_rejects_bad_values() {
        let mut config = CheckerConfig::default();
        assert!(config.apply_env(env(&[("CHECKER_DEBOUNCE_MS", "soon")])).is_err());

        let mut config = CheckerConfig::default();
        assert!(config.apply_env(env(&[("CHECKER_CONCURRENCY", "0")])).is_err());

        let mut config = CheckerConfig::default();
        assert!(config.apply_env(env(&[("SUPABASE_URL", "db.example.com")])).is_err());
    }

    #[test]
    fn test_json_file_partial() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checker.json");
        std::fs::write(&path, r#"{"debounce_ms": 300, "pair_retries": 0}"#).unwrap();

        let config = CheckerConfig::from_json_file(&path).unwrap();
        assert_eq!(config.debounce_ms, 300);
        assert_eq!(config.pair_retries, 0);
        assert_eq!(config.autocomplete_limit, 12);
    }
}
