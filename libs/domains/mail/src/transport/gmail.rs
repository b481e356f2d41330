use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

use super::{OutgoingMail, build_message};
use crate::error::{MailError, MailResult};

const GMAIL_API_URL: &str = "https://gmail.googleapis.com/gmail/v1/users/me/messages/send";

/// Gmail API send request
#[derive(Debug, Serialize)]
struct GmailSendRequest {
    raw: String,
}

#[derive(Debug, Deserialize)]
struct GmailSendResponse {
    id: String,
}

/// Sends through the Gmail API as the authorized user.
#[derive(Debug, Clone)]
pub struct GmailTransport {
    client: reqwest::Client,
}

impl GmailTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub async fn send(&self, access_token: &str, mail: &OutgoingMail) -> MailResult<()> {
        let request = GmailSendRequest {
            raw: encode_raw(mail)?,
        };

        let response = self
            .client
            .post(GMAIL_API_URL)
            .bearer_auth(access_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| MailError::SendMail(format!("Gmail API request failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            let sent: GmailSendResponse = response
                .json()
                .await
                .map_err(|e| MailError::SendMail(format!("Failed to parse Gmail response: {e}")))?;
            tracing::info!(message_id = %sent.id, "Email sent via Gmail");
            return Ok(());
        }

        let error_body = response.text().await.unwrap_or_default();
        tracing::error!(status = %status, error = %error_body, "Gmail API error");

        Err(MailError::SendMail(match status.as_u16() {
            429 => "Gmail rate limit exceeded".to_string(),
            400 => format!("Gmail rejected the message: {error_body}"),
            401 | 403 => format!("Gmail authentication failed: {error_body}"),
            _ => format!("Gmail error ({status}): {error_body}"),
        }))
    }
}

/// RFC 5322 message, Bcc included, base64url encoded without padding.
fn encode_raw(mail: &OutgoingMail) -> MailResult<String> {
    let message = build_message(mail, true)?;
    Ok(URL_SAFE_NO_PAD.encode(message.formatted()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TEXT_HTML;
    use crate::transport::tests::outgoing;

    #[test]
    fn test_raw_message_keeps_bcc() {
        let raw = encode_raw(&outgoing(TEXT_HTML)).unwrap();
        assert!(!raw.contains('+') && !raw.contains('/') && !raw.ends_with('='));

        let decoded = String::from_utf8(URL_SAFE_NO_PAD.decode(raw).unwrap()).unwrap();
        assert!(decoded.contains("Bcc: audit@example.com"));
        assert!(decoded.contains("Subject: Welcome"));
    }
}
