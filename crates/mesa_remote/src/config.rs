use std::time::Duration;

use mesa_core::error::AppError;

pub const ENV_API_URL: &str = "MESA_API_URL";
pub const ENV_API_TOKEN: &str = "MESA_API_TOKEN";
pub const ENV_API_TIMEOUT_MS: &str = "MESA_API_TIMEOUT_MS";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Where the report service lives and the bearer credential presented on every call.
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    pub base_url: String,
    pub token: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl RemoteConfig {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`RemoteConfig::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| {
                    AppError::validation("CONFIG_ENV_MISSING", "Required environment variable is not set")
                        .with_details(key.to_string())
                })
        };
        let base_url = required(ENV_API_URL)?;
        let token = required(ENV_API_TOKEN)?;
        let timeout = match lookup(ENV_API_TIMEOUT_MS) {
            None => DEFAULT_TIMEOUT,
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => Duration::from_millis(ms),
                _ => {
                    return Err(AppError::validation("CONFIG_INVALID", "Invalid request timeout")
                        .with_details(format!("{ENV_API_TIMEOUT_MS}={raw}")))
                }
            },
        };
        Ok(Self {
            base_url,
            token,
            timeout,
        })
    }
}
