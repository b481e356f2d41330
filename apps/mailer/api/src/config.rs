use core_config::{AppInfo, FromEnv, app_info, mail::MailConfig, server::ServerConfig};

use database::postgres::PostgresConfig;
use database::redis::RedisConfig;

pub use core_config::Environment;

/// Mailer configuration, composed from the shared config components
#[derive(Clone, Debug)]
pub struct Config {
    pub app: AppInfo,
    pub database: PostgresConfig,
    pub redis: RedisConfig,
    pub server: ServerConfig,
    pub mail: MailConfig,
    pub environment: Environment,
}

impl Config {
    pub fn from_env() -> eyre::Result<Self> {
        let environment = Environment::from_env();
        let database = PostgresConfig::from_env()?; // DATABASE_URL is required
        let redis = RedisConfig::from_env()?;
        let server = ServerConfig::from_env()?;
        let mail = MailConfig::from_env()?;

        Ok(Self {
            app: app_info!(),
            database,
            redis,
            server,
            mail,
            environment,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        temp_env::with_vars(
            [
                ("DATABASE_URL", Some("postgresql://localhost/mail")),
                ("REDIS_URL", Some("redis://localhost:6379")),
                ("PASSWORD_ENCRYPTION_KEY", Some("0123456789abcdef0123456789abcdef")),
                ("DOMAIN_NAME", Some("https://mail.example.com/api")),
                ("PORT", Some("9000")),
            ],
            || {
                let config = Config::from_env().unwrap();
                assert_eq!(config.app.name, "mailer_api");
                assert_eq!(config.server.port, 9000);
                assert_eq!(
                    config.mail.oauth_redirect_url("gmails"),
                    "https://mail.example.com/api/v1/oauth2/gmails/callback"
                );
            },
        );
    }

    #[test]
    fn test_config_requires_encryption_key() {
        temp_env::with_vars(
            [
                ("DATABASE_URL", Some("postgresql://localhost/mail")),
                ("REDIS_URL", Some("redis://localhost:6379")),
                ("PASSWORD_ENCRYPTION_KEY", None),
                ("DOMAIN_NAME", Some("https://mail.example.com/api/")),
            ],
            || {
                let err = Config::from_env().unwrap_err();
                assert!(err.to_string().contains("PASSWORD_ENCRYPTION_KEY"));
            },
        );
    }
}
