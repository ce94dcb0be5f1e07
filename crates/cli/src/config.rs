//! CLI configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SUPABASE_URL` - Project URL (e.g., `https://abcd.supabase.co`)
//! - `SUPABASE_ANON_KEY` - Public anon key of the project
//!
//! ## Optional
//! - `ELVORA_DATA_DIR` - Directory for the cart, device id and session (default: `.elvora`)
//! - `ELVORA_MEDIA_BUCKET` - Storage bucket for product media (default: `product-media`)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::path::PathBuf;

use elvora_admin::state::DEFAULT_MEDIA_BUCKET;
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const DEFAULT_DATA_DIR: &str = ".elvora";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "insert",
    "put-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// CLI configuration.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Supabase project URL
    pub supabase_url: Url,
    /// Supabase anon key (sent as `apikey` on every request)
    pub anon_key: SecretString,
    /// Directory holding the local key/value store
    pub data_dir: PathBuf,
    /// Storage bucket for product media
    pub media_bucket: String,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

impl CliConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid, or
    /// if the anon key looks like a placeholder.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let supabase_url = parse_project_url(&get_required_env("SUPABASE_URL")?)?;
        let anon_key = get_required_env("SUPABASE_ANON_KEY")?;
        validate_not_placeholder(&anon_key, "SUPABASE_ANON_KEY")?;

        Ok(Self {
            supabase_url,
            anon_key: SecretString::from(anon_key),
            data_dir: PathBuf::from(get_env_or_default("ELVORA_DATA_DIR", DEFAULT_DATA_DIR)),
            media_bucket: get_env_or_default("ELVORA_MEDIA_BUCKET", DEFAULT_MEDIA_BUCKET),
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse the project URL; only `http` and `https` are accepted.
fn parse_project_url(value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value.trim())
        .map_err(|e| ConfigError::InvalidEnvVar("SUPABASE_URL".to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            "SUPABASE_URL".to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(url)
}

fn validate_not_placeholder(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_project_url_accepts_https() {
        let url = parse_project_url(" https://abcd.supabase.co ").unwrap();
        assert_eq!(url.host_str(), Some("abcd.supabase.co"));
    }

    #[test]
    fn test_project_url_rejects_other_schemes() {
        assert!(matches!(
            parse_project_url("ftp://abcd.supabase.co"),
            Err(ConfigError::InvalidEnvVar(_, _))
        ));
        assert!(parse_project_url("not a url").is_err());
    }

    #[test]
    fn test_placeholder_anon_key_rejected() {
        let result = validate_not_placeholder("your-anon-key", "SUPABASE_ANON_KEY");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
        assert!(validate_not_placeholder("eyJhbGciOiJIUzI1NiJ9.e30.sig", "SUPABASE_ANON_KEY").is_ok());
    }
}
