use super::{
    Credential, CredentialRequest, CredentialUpdate, DkimCanonicalization, Provider, ProviderType,
    SortValue,
};
use crate::crypto::SecretCodec;
use crate::error::MailResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// SMTP submission settings. The password is always ciphertext.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Smtp {
    pub username: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub dkim_private_key: Option<String>,
    pub dkim_domain: Option<String>,
    pub dkim_canonicalization: Option<DkimCanonicalization>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateSmtp {
    #[validate(length(min = 1, max = 255))]
    pub app: String,
    #[validate(email)]
    pub mail: String,
    #[validate(length(min = 1, max = 255))]
    pub username: String,
    #[validate(length(min = 1))]
    pub password: String,
    #[validate(length(min = 1, max = 255))]
    pub host: String,
    #[validate(range(min = 1))]
    pub port: u16,
    pub dkim_private_key: Option<String>,
    pub dkim_domain: Option<String>,
    pub dkim_canonicalization: Option<DkimCanonicalization>,
    #[serde(default)]
    pub primary: bool,
}

/// Full replacement of the SMTP settings. An empty or missing password keeps
/// the stored one.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSmtp {
    #[validate(length(min = 1, max = 255))]
    pub username: String,
    pub password: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub host: String,
    #[validate(range(min = 1))]
    pub port: u16,
    pub dkim_private_key: Option<String>,
    pub dkim_domain: Option<String>,
    pub dkim_canonicalization: Option<DkimCanonicalization>,
    #[serde(default)]
    pub primary: bool,
    pub updated_at: DateTime<Utc>,
}

impl CredentialRequest for CreateSmtp {
    fn app(&self) -> &str {
        &self.app
    }

    fn mail(&self) -> &str {
        &self.mail
    }

    fn primary(&self) -> bool {
        self.primary
    }
}

impl CredentialUpdate for UpdateSmtp {
    fn primary(&self) -> bool {
        self.primary
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl Provider for Smtp {
    const TYPE: ProviderType = ProviderType::Smtp;
    const SORT_COLUMNS: &'static [&'static str] = &[
        "id",
        "username",
        "host",
        "port",
        "created_at",
        "updated_at",
        "primary_type",
        "app_name",
    ];

    type Create = CreateSmtp;
    type Update = UpdateSmtp;

    fn from_request(request: CreateSmtp, codec: &SecretCodec) -> MailResult<Self> {
        Ok(Self {
            username: request.username,
            password: codec.encrypt(&request.password)?,
            host: request.host,
            port: request.port,
            dkim_private_key: request.dkim_private_key,
            dkim_domain: request.dkim_domain,
            dkim_canonicalization: request.dkim_canonicalization,
        })
    }

    fn apply_update(&mut self, request: UpdateSmtp, codec: &SecretCodec) -> MailResult<()> {
        if let Some(password) = request.password.filter(|p| !p.is_empty()) {
            self.password = codec.encrypt(&password)?;
        }
        self.username = request.username;
        self.host = request.host;
        self.port = request.port;
        self.dkim_private_key = request.dkim_private_key;
        self.dkim_domain = request.dkim_domain;
        self.dkim_canonicalization = request.dkim_canonicalization;
        Ok(())
    }

    fn sort_value(&self, column: &str) -> SortValue {
        match column {
            "username" => SortValue::Text(self.username.clone()),
            "host" => SortValue::Text(self.host.clone()),
            "port" => SortValue::Int(i64::from(self.port)),
            _ => SortValue::Null,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SmtpResponse {
    pub id: i64,
    pub app_mail_id: i64,
    pub app: String,
    pub mail: String,
    pub username: String,
    pub host: String,
    pub port: u16,
    pub dkim_private_key: Option<String>,
    pub dkim_domain: Option<String>,
    pub dkim_canonicalization: Option<DkimCanonicalization>,
    pub primary: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Credential<Smtp>> for SmtpResponse {
    fn from(credential: Credential<Smtp>) -> Self {
        let primary = credential.is_primary();
        let Credential {
            id,
            app_mail,
            settings,
            created_at,
            updated_at,
            ..
        } = credential;

        Self {
            id,
            app_mail_id: app_mail.id,
            app: app_mail.app,
            mail: app_mail.mail,
            username: settings.username,
            host: settings.host,
            port: settings.port,
            dkim_private_key: settings.dkim_private_key,
            dkim_domain: settings.dkim_domain,
            dkim_canonicalization: settings.dkim_canonicalization,
            primary,
            created_at,
            updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> SecretCodec {
        SecretCodec::new("0123456789abcdef0123456789abcdef").unwrap()
    }

    fn update(password: Option<&str>) -> UpdateSmtp {
        UpdateSmtp {
            username: "mailer".into(),
            password: password.map(str::to_string),
            host: "smtp.example.com".into(),
            port: 465,
            dkim_private_key: None,
            dkim_domain: None,
            dkim_canonicalization: None,
            primary: false,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_from_request_encrypts_password() {
        let codec = codec();
        let request = CreateSmtp {
            app: "Admin".into(),
            mail: "noreply@example.com".into(),
            username: "mailer".into(),
            password: "hunter2".into(),
            host: "smtp.example.com".into(),
            port: 587,
            dkim_private_key: None,
            dkim_domain: None,
            dkim_canonicalization: None,
            primary: true,
        };

        let smtp = Smtp::from_request(request, &codec).unwrap();
        assert_ne!(smtp.password, "hunter2");
        assert_eq!(codec.decrypt(&smtp.password).unwrap(), "hunter2");
    }

    #[test]
    fn test_update_keeps_password_when_empty() {
        let codec = codec();
        let mut smtp = Smtp {
            username: "old".into(),
            password: codec.encrypt("original").unwrap(),
            host: "old.example.com".into(),
            port: 25,
            dkim_private_key: None,
            dkim_domain: None,
            dkim_canonicalization: None,
        };
        let before = smtp.password.clone();

        smtp.apply_update(update(Some("")), &codec).unwrap();
        assert_eq!(smtp.password, before);
        assert_eq!(smtp.host, "smtp.example.com");

        smtp.apply_update(update(None), &codec).unwrap();
        assert_eq!(smtp.password, before);

        smtp.apply_update(update(Some("rotated")), &codec).unwrap();
        assert_eq!(codec.decrypt(&smtp.password).unwrap(), "rotated");
    }

    #[test]
    fn test_create_smtp_validation() {
        let request: CreateSmtp = serde_json::from_value(serde_json::json!({
            "app": "Admin",
            "mail": "not-an-address",
            "username": "mailer",
            "password": "secret",
            "host": "smtp.example.com",
            "port": 587
        }))
        .unwrap();

        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("mail"));
        assert!(!request.primary);
    }
}
