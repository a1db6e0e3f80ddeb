//! Configuration types, built from environment variables.

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default origin the browser app is served from.
pub const DEFAULT_SITE_URL: &str = "http://localhost:3000";

/// Default port for the JSON API.
pub const DEFAULT_PORT: u16 = 8080;

/// Which session provider backs the app.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// Hosted Supabase project.
    Supabase,
    /// In-process provider, for local development without a project.
    Memory,
}

impl std::str::FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "supabase" => Ok(Self::Supabase),
            "memory" => Ok(Self::Memory),
            other => Err(ConfigError::InvalidValue {
                key: "KARIGAR_PROVIDER".to_string(),
                message: format!("unknown provider '{other}' (expected 'supabase' or 'memory')"),
            }),
        }
    }
}

/// Connection settings for the hosted session provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Project URL, e.g. `https://xyzcompany.supabase.co`.
    pub url: String,
    /// Public anonymous key sent as `apikey` on every request.
    pub anon_key: SecretString,
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub provider: ProviderKind,
    /// Present when `provider` is `Supabase`.
    pub supabase: Option<ProviderConfig>,
    /// Origin used to build post-authentication redirect targets.
    pub site_url: String,
    pub port: u16,
}

impl AppConfig {
    /// Build config from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let provider = match lookup("KARIGAR_PROVIDER") {
            Some(value) => value.parse()?,
            None => ProviderKind::Supabase,
        };

        let supabase = match provider {
            ProviderKind::Supabase => {
                let url = lookup("KARIGAR_SUPABASE_URL")
                    .filter(|v| !v.trim().is_empty())
                    .ok_or_else(|| ConfigError::MissingEnvVar("KARIGAR_SUPABASE_URL".into()))?;
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err(ConfigError::InvalidValue {
                        key: "KARIGAR_SUPABASE_URL".to_string(),
                        message: format!("'{url}' is not an http(s) URL"),
                    });
                }
                let anon_key = lookup("KARIGAR_SUPABASE_ANON_KEY")
                    .filter(|v| !v.trim().is_empty())
                    .ok_or_else(|| {
                        ConfigError::MissingEnvVar("KARIGAR_SUPABASE_ANON_KEY".into())
                    })?;
                Some(ProviderConfig {
                    url: url.trim_end_matches('/').to_string(),
                    anon_key: SecretString::from(anon_key),
                })
            }
            ProviderKind::Memory => None,
        };

        let site_url = lookup("KARIGAR_SITE_URL")
            .unwrap_or_else(|| DEFAULT_SITE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let port = match lookup("KARIGAR_PORT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "KARIGAR_PORT".to_string(),
                message: format!("'{raw}' is not a port number"),
            })?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            provider,
            supabase,
            site_url,
            port,
        })
    }
}
