use std::collections::HashMap;

use serde::Deserialize;

const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:5000";

/// Configuration for the detector backend.
///
/// Deserializable so the CLI can read the same struct from a `[detector]`
/// config-file section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DetectorSettings {
    /// Base URL of the classification service.
    pub endpoint: String,
    /// Request timeout in seconds (default 30).
    pub timeout_secs: Option<u64>,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: None,
        }
    }
}

impl DetectorSettings {
    const ENDPOINT_ENV: &'static str = "AIMARK_ENDPOINT";
    const TIMEOUT_ENV: &'static str = "AIMARK_TIMEOUT_SECS";

    /// Load settings from environment variables.
    ///
    /// * `AIMARK_ENDPOINT` — Base URL of the detector (default `http://127.0.0.1:5000`).
    /// * `AIMARK_TIMEOUT_SECS` — Request timeout in seconds.
    pub fn from_env() -> Self {
        Self::from_map(std::env::vars().collect())
    }

    fn from_map(vars: HashMap<String, String>) -> Self {
        let endpoint = vars
            .get(Self::ENDPOINT_ENV)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let timeout_secs = vars
            .get(Self::TIMEOUT_ENV)
            .and_then(|value| value.trim().parse::<u64>().ok());
        Self {
            endpoint,
            timeout_secs,
        }
    }
}
