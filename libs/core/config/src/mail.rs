use crate::{env_parse_or, env_required, ConfigError, FromEnv};
use std::time::Duration;

const DEFAULT_CACHE_EXPIRATION_SECS: u64 = 3600;
const ACCEPTED_KEY_LENGTHS: [usize; 2] = [32, 64];

/// Settings read by the mail domain: secret codec key, credential cache TTL
/// and the public base URL used to build OAuth2 redirect URIs.
#[derive(Clone)]
pub struct MailConfig {
    /// AES-256 key: 32 raw bytes or 64 hex characters
    pub password_encryption_key: String,
    pub cache_expiration: Duration,
    /// Always ends with `/`
    pub domain_name: String,
}

impl MailConfig {
    pub fn new(
        password_encryption_key: impl Into<String>,
        cache_expiration: Duration,
        domain_name: impl Into<String>,
    ) -> Self {
        Self {
            password_encryption_key: password_encryption_key.into(),
            cache_expiration,
            domain_name: normalize_base_url(domain_name.into()),
        }
    }

    /// Redirect URI for the OAuth2 callback of a provider collection
    /// (`gmails`, `azures`).
    pub fn oauth_redirect_url(&self, collection: &str) -> String {
        format!("{}v1/oauth2/{}/callback", self.domain_name, collection)
    }
}

impl std::fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailConfig")
            .field("password_encryption_key", &"<redacted>")
            .field("cache_expiration", &self.cache_expiration)
            .field("domain_name", &self.domain_name)
            .finish()
    }
}

impl FromEnv for MailConfig {
    /// Requires PASSWORD_ENCRYPTION_KEY and DOMAIN_NAME.
    /// CACHE_EXPIRATION_SECS defaults to one hour.
    ///
    /// PASSWORD_ENCRYPTION_KEY must be 32 raw bytes or 64 hex characters.
    /// 16- and 24-byte AES-128/192 keys are refused here rather than at the
    /// first password write.
    fn from_env() -> Result<Self, ConfigError> {
        let key = env_required("PASSWORD_ENCRYPTION_KEY")?;
        if !ACCEPTED_KEY_LENGTHS.contains(&key.len()) {
            return Err(ConfigError::ParseError {
                key: "PASSWORD_ENCRYPTION_KEY".to_string(),
                details: format!(
                    "must be 32 raw bytes or 64 hex characters, got {} bytes",
                    key.len()
                ),
            });
        }
        let domain_name = env_required("DOMAIN_NAME")?;
        let ttl = env_parse_or("CACHE_EXPIRATION_SECS", DEFAULT_CACHE_EXPIRATION_SECS)?;

        if ttl == 0 {
            return Err(ConfigError::ParseError {
                key: "CACHE_EXPIRATION_SECS".to_string(),
                details: "must be greater than zero".to_string(),
            });
        }

        Ok(Self::new(key, Duration::from_secs(ttl), domain_name))
    }
}

fn normalize_base_url(mut url: String) -> String {
    if !url.ends_with('/') {
        url.push('/');
    }
    url
}
