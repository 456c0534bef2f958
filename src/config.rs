use anyhow::{bail, Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::api_connection::connection::DEFAULT_TIMEOUT;
use crate::api_connection::endpoints::DEFAULT_API_BASE_URL;

pub const API_URL_VAR: &str = "MEAL_PLANNER_API_URL";
pub const SESSION_FILE_VAR: &str = "MEAL_PLANNER_SESSION_FILE";
pub const LOG_VAR: &str = "MEAL_PLANNER_LOG";
pub const TIMEOUT_VAR: &str = "MEAL_PLANNER_TIMEOUT_SECS";

const DEFAULT_LOG_LEVEL: &str = "warn";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub api_url: String,
    pub session_file: PathBuf,
    pub log_level: String,
    pub timeout: Duration,
}

impl Settings {
    /// Reads the process environment. Call `dotenv::dotenv()` first to pick up
    /// a `.env` file.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let session_file = match var(SESSION_FILE_VAR) {
            Some(path) => PathBuf::from(path),
            None => default_session_file()?,
        };

        let timeout = match var(TIMEOUT_VAR) {
            Some(raw) => {
                let secs: u64 = raw
                    .parse()
                    .with_context(|| format!("{} must be a whole number of seconds, got '{}'", TIMEOUT_VAR, raw))?;
                if secs == 0 {
                    bail!("{} must be greater than zero", TIMEOUT_VAR);
                }
                Duration::from_secs(secs)
            }
            None => DEFAULT_TIMEOUT,
        };

        Ok(Self {
            api_url: var(API_URL_VAR).unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            session_file,
            log_level: var(LOG_VAR).unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            timeout,
        })
    }

    /// Command-line flags win over the environment.
    pub fn with_overrides(mut self, api_url: Option<String>, session_file: Option<PathBuf>) -> Self {
        if let Some(api_url) = api_url {
            self.api_url = api_url;
        }
        if let Some(session_file) = session_file {
            self.session_file = session_file;
        }
        self
    }
}

fn default_session_file() -> Result<PathBuf> {
    let base = dirs::data_dir()
        .or_else(dirs::home_dir)
        .context("Could not determine a data directory; set MEAL_PLANNER_SESSION_FILE")?;
    Ok(base.join("meal_planner").join("session.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_explicit_values() {
        let settings = Settings::from_lookup(lookup(&[
            (API_URL_VAR, "https://planner.example.com/api"),
            (SESSION_FILE_VAR, "/tmp/mp/session.json"),
            (LOG_VAR, "meal_planner=debug"),
            (TIMEOUT_VAR, "5"),
        ]))
        .unwrap();
        assert_eq!(settings.api_url, "https://planner.example.com/api");
        assert_eq!(settings.session_file, PathBuf::from("/tmp/mp/session.json"));
        assert_eq!(settings.log_level, "meal_planner=debug");
        assert_eq!(settings.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_defaults() {
        let settings =
            Settings::from_lookup(lookup(&[(SESSION_FILE_VAR, "/tmp/s.json"), (API_URL_VAR, "  ")])).unwrap();
        assert_eq!(settings.api_url, DEFAULT_API_BASE_URL);
        assert_eq!(settings.log_level, "warn");
        assert_eq!(settings.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_bad_timeout_is_rejected() {
        assert!(Settings::from_lookup(lookup(&[(SESSION_FILE_VAR, "/tmp/s.json"), (TIMEOUT_VAR, "soon")])).is_err());
        assert!(Settings::from_lookup(lookup(&[(SESSION_FILE_VAR, "/tmp/s.json"), (TIMEOUT_VAR, "0")])).is_err());
    }

    #[test]
    fn test_flags_override_environment() {
        let settings = Settings::from_lookup(lookup(&[(SESSION_FILE_VAR, "/tmp/s.json")]))
            .unwrap()
            .with_overrides(Some("http://10.0.0.2:8000/api/".to_string()), None);
        assert_eq!(settings.api_url, "http://10.0.0.2:8000/api/");
        assert_eq!(settings.session_file, PathBuf::from("/tmp/s.json"));
    }
}
