//! Runtime configuration, loaded from environment variables at startup.
//! A `.env` file is honored for local development.

use std::collections::HashMap;
use std::path::PathBuf;

use url::Url;

use crate::types::errors::ConfigError;

const DEFAULT_PROVIDER: &str = "github";
const DEFAULT_REDIRECT_URL: &str = "http://localhost:3000";

/// Holds all configuration loaded from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the hosted backend, e.g. `https://abc.supabase.co`.
    pub supabase_url: String,
    /// The project's public (anon) API key.
    pub anon_key: String,
    /// Directory holding the local session vault database.
    pub data_dir: PathBuf,
    /// OAuth provider name passed to the authorize endpoint.
    pub provider: String,
    /// Where the provider redirects after consent.
    pub redirect_url: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// Looks for a `.env` file in the current directory for development;
    /// skipped under test so tests stay hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_vars(&vars)
    }

    /// Builds a configuration from an explicit variable map.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let supabase_url = require(vars, "SUPABASE_URL")?;
        let parsed = Url::parse(&supabase_url).map_err(|e| {
            ConfigError::InvalidValue("SUPABASE_URL".to_string(), e.to_string())
        })?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(ConfigError::InvalidValue(
                "SUPABASE_URL".to_string(),
                format!("unsupported scheme '{}'", parsed.scheme()),
            ));
        }

        let anon_key = require(vars, "SUPABASE_ANON_KEY")?;

        // Prefer an explicit data dir, fall back to the executable's
        // directory so relative launches still find the same vault.
        let data_dir = match vars.get("SMARTMARK_DATA_DIR") {
            Some(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
            _ => match std::env::current_exe() {
                Ok(exe) => exe
                    .parent()
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(".")),
                Err(_) => PathBuf::from("."),
            },
        };

        let provider = vars
            .get("SMARTMARK_PROVIDER")
            .filter(|v| !v.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| DEFAULT_PROVIDER.to_string());

        let redirect_url = vars
            .get("SMARTMARK_REDIRECT_URL")
            .filter(|v| !v.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| DEFAULT_REDIRECT_URL.to_string());

        Ok(Self {
            supabase_url: supabase_url.trim_end_matches('/').to_string(),
            anon_key,
            data_dir,
            provider,
            redirect_url,
        })
    }

    /// Path of the local session vault database.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("smartmark.db")
    }
}

fn require(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    match vars.get(name) {
        Some(value) if !value.trim().is_empty() => Ok(value.clone()),
        _ => Err(ConfigError::MissingVar(name.to_string())),
    }
}
