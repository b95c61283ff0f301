//! Runtime settings
//!
//! Loaded from `.env` (if present) and the process environment.

use std::time::Duration;

use crate::error::EstimationError;
use crate::providers::openai::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::Result;

const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone)]
pub struct Settings {
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: String,
    pub mock_delay_min: Duration,
    pub mock_delay_max: Duration,
    pub port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_model: DEFAULT_MODEL.to_string(),
            openai_base_url: DEFAULT_BASE_URL.to_string(),
            mock_delay_min: Duration::from_secs(2),
            mock_delay_max: Duration::from_secs(5),
            port: DEFAULT_PORT,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key → value source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = match get("PORT").or_else(|| get("API_PORT")) {
            Some(p) => p
                .parse()
                .map_err(|_| EstimationError::Config(format!("invalid port: {}", p)))?,
            None => defaults.port,
        };

        let mock_delay_min = match get("MOCK_DELAY_MIN_SECS") {
            Some(v) => parse_secs("MOCK_DELAY_MIN_SECS", &v)?,
            None => defaults.mock_delay_min,
        };
        let mock_delay_max = match get("MOCK_DELAY_MAX_SECS") {
            Some(v) => parse_secs("MOCK_DELAY_MAX_SECS", &v)?,
            None => defaults.mock_delay_max.max(mock_delay_min),
        };
        if mock_delay_max < mock_delay_min {
            return Err(EstimationError::Config(
                "MOCK_DELAY_MAX_SECS must not be below MOCK_DELAY_MIN_SECS".to_string(),
            ));
        }

        Ok(Self {
            openai_api_key: get("OPENAI_API_KEY"),
            openai_model: get("OPENAI_MODEL").unwrap_or(defaults.openai_model),
            openai_base_url: get("OPENAI_BASE_URL").unwrap_or(defaults.openai_base_url),
            mock_delay_min,
            mock_delay_max,
            port,
        })
    }

    /// The API key, if it looks like a real OpenAI secret key
    pub fn production_key(&self) -> Option<&str> {
        self.openai_api_key
            .as_deref()
            .filter(|k| k.starts_with("sk-") && k.len() > 20)
    }
}

fn parse_secs(key: &str, value: &str) -> Result<Duration> {
    let secs: f64 = value
        .parse()
        .map_err(|_| EstimationError::Config(format!("{} must be a number of seconds", key)))?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(EstimationError::Config(format!(
            "{} must be a non-negative number of seconds",
            key
        )));
    }
    Ok(Duration::from_secs_f64(secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(pairs: &[(&str, &str)]) -> Result<Settings> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn test_defaults() {
        let s = settings(&[]).unwrap();
        assert_eq!(s.port, 8080);
        assert_eq!(s.openai_model, "gpt-4o-mini");
        assert_eq!(s.mock_delay_min, Duration::from_secs(2));
        assert_eq!(s.mock_delay_max, Duration::from_secs(5));
        assert!(s.production_key().is_none());
    }

    #[test]
    fn test_overrides() {
        let s = settings(&[
            ("API_PORT", "9090"),
            ("MOCK_DELAY_MIN_SECS", "0"),
            ("MOCK_DELAY_MAX_SECS", "0.5"),
            ("OPENAI_MODEL", "gpt-4o"),
        ])
        .unwrap();
        assert_eq!(s.port, 9090);
        assert_eq!(s.mock_delay_max, Duration::from_millis(500));
        assert_eq!(s.openai_model, "gpt-4o");
    }

    #[test]
    fn test_production_key_shape() {
        let real = settings(&[("OPENAI_API_KEY", "sk-proj-abcdefghijklmnopqrstuvwxyz")]).unwrap();
        assert!(real.production_key().is_some());

        let short = settings(&[("OPENAI_API_KEY", "sk-short")]).unwrap();
        assert!(short.production_key().is_none());

        let wrong_prefix = settings(&[("OPENAI_API_KEY", "key-abcdefghijklmnopqrstuvwxyz")]).unwrap();
        assert!(wrong_prefix.production_key().is_none());
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(settings(&[("PORT", "eighty")]), Err(EstimationError::Config(_))));
        assert!(matches!(
            settings(&[("MOCK_DELAY_MIN_SECS", "3"), ("MOCK_DELAY_MAX_SECS", "1")]),
            Err(EstimationError::Config(_))
        ));
        assert!(settings(&[("MOCK_DELAY_MIN_SECS", "-1")]).is_err());
    }
}
