use super::ProviderType;
use crate::error::{MailError, MailResult};
use serde::Deserialize;
use std::str::FromStr;
use utoipa::ToSchema;
use validator::{Validate, ValidateEmail, ValidationError};

fn validate_addresses(addresses: &[String]) -> Result<(), ValidationError> {
    if addresses.iter().all(|address| address.validate_email()) {
        Ok(())
    } else {
        Err(ValidationError::new("email"))
    }
}

/// Body of `POST /mail/send`.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendMailRequest {
    #[validate(length(min = 1, max = 255))]
    pub app: String,
    /// Registered mail of the pairing; `fromMail` is used when absent
    #[validate(email)]
    pub mail: Option<String>,
    /// Explicit provider: `SMTP`, `Gmail` or `Azure`
    #[serde(rename = "type")]
    pub provider_type: Option<String>,
    #[serde(default)]
    pub from_name: String,
    #[validate(email)]
    pub from_mail: Option<String>,
    #[validate(email)]
    pub to: String,
    #[validate(length(min = 1))]
    pub subject: String,
    #[validate(length(min = 1))]
    pub body: String,
    /// `text/plain` sends a plain body; anything else, or nothing, is HTML
    pub mime_type: Option<String>,
    #[serde(default)]
    #[validate(custom(function = "validate_addresses"))]
    pub ccs: Vec<String>,
    #[serde(default)]
    #[validate(custom(function = "validate_addresses"))]
    pub bccs: Vec<String>,
    #[serde(default)]
    #[validate(nested)]
    pub attachments: Vec<AttachmentRequest>,
    /// Skip writing the send record
    #[serde(default)]
    pub disable_save: bool,
}

impl SendMailRequest {
    /// Mail address that selects the app and mail pairing.
    pub fn pairing_mail(&self) -> MailResult<&str> {
        self.mail
            .as_deref()
            .or(self.from_mail.as_deref())
            .filter(|mail| !mail.is_empty())
            .ok_or_else(|| MailError::Validation("mail or fromMail is required".to_string()))
    }

    pub fn explicit_type(&self) -> MailResult<Option<ProviderType>> {
        match self.provider_type.as_deref() {
            None | Some("") => Ok(None),
            Some(raw) => ProviderType::from_str(raw)
                .map(Some)
                .map_err(|_| MailError::Validation(format!("unknown mail type: {raw}"))),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentRequest {
    #[validate(length(min = 1, max = 255))]
    pub file_name: String,
    #[validate(length(min = 1, max = 255))]
    pub file_type: String,
    #[validate(range(min = 1))]
    pub file_size: i64,
    /// Base64 encoded content
    #[serde(deserialize_with = "base64_bytes::deserialize")]
    #[schema(value_type = String, format = Byte)]
    pub file_data: Vec<u8>,
}

/// Attachment as stored and handed to transports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub file_type: String,
    pub file_size: i64,
    pub data: Vec<u8>,
}

impl From<AttachmentRequest> for Attachment {
    fn from(request: AttachmentRequest) -> Self {
        Self {
            file_name: request.file_name,
            file_type: request.file_type,
            file_size: request.file_size,
            data: request.file_data,
        }
    }
}

/// Write-once audit row of an accepted send request.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSendRecord {
    pub app_mail_id: i64,
    pub provider_type: ProviderType,
    pub from_name: String,
    pub from_mail: String,
    pub to: String,
    pub subject: String,
    pub body: String,
    pub mime_type: String,
    pub ccs: Vec<String>,
    pub bccs: Vec<String>,
    pub attachments: Vec<Attachment>,
}

mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(value: serde_json::Value) -> SendMailRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_pairing_mail_falls_back_to_from_mail() {
        let req = request(json!({
            "app": "Admin",
            "fromMail": "noreply@example.com",
            "to": "user@example.com",
            "subject": "Hi",
            "body": "Hello"
        }));
        assert_eq!(req.pairing_mail().unwrap(), "noreply@example.com");

        let req = request(json!({
            "app": "Admin",
            "to": "user@example.com",
            "subject": "Hi",
            "body": "Hello"
        }));
        assert!(matches!(req.pairing_mail(), Err(MailError::Validation(_))));
    }

    #[test]
    fn test_explicit_type_must_be_known() {
        let mut req = request(json!({
            "app": "Admin",
            "mail": "noreply@example.com",
            "type": "SMTP",
            "to": "user@example.com",
            "subject": "Hi",
            "body": "Hello"
        }));
        assert_eq!(req.explicit_type().unwrap(), Some(ProviderType::Smtp));

        req.provider_type = Some("Pigeon".into());
        assert!(matches!(req.explicit_type(), Err(MailError::Validation(_))));
    }

    #[test]
    fn test_attachment_data_is_base64() {
        let req = request(json!({
            "app": "Admin",
            "mail": "noreply@example.com",
            "to": "user@example.com",
            "subject": "Report",
            "body": "See attached",
            "ccs": ["cc@example.com"],
            "attachments": [{
                "fileName": "report.txt",
                "fileType": "text/plain",
                "fileSize": 5,
                "fileData": "aGVsbG8="
            }]
        }));

        assert!(req.validate().is_ok());
        assert_eq!(req.attachments[0].file_data, b"hello");
    }

    #[test]
    fn test_invalid_cc_rejected() {
        let req = request(json!({
            "app": "Admin",
            "mail": "noreply@example.com",
            "to": "user@example.com",
            "subject": "Hi",
            "body": "Hello",
            "ccs": ["nope"]
        }));

        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("ccs"));
    }
}
