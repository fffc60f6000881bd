//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Settings threaded into the flow controller at construction.
#[derive(Debug, Clone)]
pub struct FlowConfig {
    /// Skip the evidence-completeness check on the terminal step (development only).
    pub bypass_evidence_check: bool,
    /// Country codes whose applicants go through remote identity verification.
    pub identity_jurisdictions: Vec<String>,
    /// Minimum password length when creating an account.
    pub min_password_length: usize,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            bypass_evidence_check: false,
            identity_jurisdictions: vec!["GB".to_string()],
            min_password_length: 8,
        }
    }
}

impl FlowConfig {
    /// Whether applicants from `country` need remote identity verification.
    pub fn requires_identity_check(&self, country: &str) -> bool {
        let country = country.trim();
        self.identity_jurisdictions
            .iter()
            .any(|c| c.eq_ignore_ascii_case(country))
    }
}

/// Portal process configuration.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    /// Base URL of the case-management service.
    pub api_base_url: String,
    /// Optional bearer token for the case-management service.
    pub api_key: Option<SecretString>,
    /// Local mirror database path.
    pub db_path: PathBuf,
    /// Port for the REST surface.
    pub port: u16,
    /// Transport timeout for every remote call.
    pub request_timeout: Duration,
    /// Directory for rolling log files, if any.
    pub log_dir: Option<PathBuf>,
    pub flow: FlowConfig,
}

impl PortalConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_base_url = lookup("KYC_API_BASE_URL")
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("KYC_API_BASE_URL".into()))?;

        if !api_base_url.starts_with("http://") && !api_base_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                key: "KYC_API_BASE_URL".into(),
                message: format!("expected an http(s) URL, got {api_base_url}"),
            });
        }

        let api_key = lookup("KYC_API_KEY")
            .filter(|s| !s.trim().is_empty())
            .map(SecretString::from);

        let db_path = lookup("KYC_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data/kyc-onboard.db"));

        let port = parse_or(&lookup, "KYC_PORT", 8080u16)?;
        let timeout_secs = parse_or(&lookup, "KYC_REQUEST_TIMEOUT_SECS", 30u64)?;

        let defaults = FlowConfig::default();
        let bypass_evidence_check = lookup("KYC_BYPASS_EVIDENCE")
            .map(|s| matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let identity_jurisdictions = match lookup("KYC_IDENTITY_JURISDICTIONS") {
            Some(raw) => raw
                .split(',')
                .map(|s| s.trim().to_ascii_uppercase())
                .filter(|s| !s.is_empty())
                .collect(),
            None => defaults.identity_jurisdictions,
        };

        let min_password_length =
            parse_or(&lookup, "KYC_MIN_PASSWORD_LENGTH", defaults.min_password_length)?;

        Ok(Self {
            api_base_url,
            api_key,
            db_path,
            port,
            request_timeout: Duration::from_secs(timeout_secs),
            log_dir: lookup("KYC_LOG_DIR").map(PathBuf::from),
            flow: FlowConfig {
                bypass_evidence_check,
                identity_jurisdictions,
                min_password_length,
            },
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        None => Ok(default),
    }
}
