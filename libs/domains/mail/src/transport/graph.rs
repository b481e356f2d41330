use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::StatusCode;
use serde::Serialize;

use super::{OutgoingMail, TEXT_PLAIN};
use crate::error::{MailError, MailResult};

const GRAPH_SEND_URL: &str = "https://graph.microsoft.com/v1.0/me/sendMail";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendMailBody {
    message: GraphMessage,
    save_to_sent_items: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphMessage {
    subject: String,
    body: ItemBody,
    to_recipients: Vec<Recipient>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    cc_recipients: Vec<Recipient>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    bcc_recipients: Vec<Recipient>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<FileAttachment>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ItemBody {
    content_type: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Recipient {
    email_address: EmailAddress,
}

#[derive(Debug, Serialize)]
struct EmailAddress {
    address: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileAttachment {
    #[serde(rename = "@odata.type")]
    odata_type: &'static str,
    name: String,
    content_type: String,
    content_bytes: String,
}

fn recipients(addresses: &[String]) -> Vec<Recipient> {
    addresses
        .iter()
        .map(|address| Recipient {
            email_address: EmailAddress {
                address: address.clone(),
            },
        })
        .collect()
}

impl From<&OutgoingMail> for SendMailBody {
    /// Only `text/plain` is sent as Text, matching the SMTP and Gmail bodies.
    fn from(mail: &OutgoingMail) -> Self {
        let content_type = if mail.mime_type == TEXT_PLAIN {
            "Text"
        } else {
            "HTML"
        };

        Self {
            message: GraphMessage {
                subject: mail.subject.clone(),
                body: ItemBody {
                    content_type,
                    content: mail.body.clone(),
                },
                to_recipients: recipients(std::slice::from_ref(&mail.to)),
                cc_recipients: recipients(&mail.ccs),
                bcc_recipients: recipients(&mail.bccs),
                attachments: mail
                    .attachments
                    .iter()
                    .map(|attachment| FileAttachment {
                        odata_type: "#microsoft.graph.fileAttachment",
                        name: attachment.file_name.clone(),
                        content_type: attachment.file_type.clone(),
                        content_bytes: STANDARD.encode(&attachment.data),
                    })
                    .collect(),
            },
            save_to_sent_items: false,
        }
    }
}

/// Sends through Microsoft Graph as the signed-in user.
#[derive(Debug, Clone)]
pub struct GraphTransport {
    client: reqwest::Client,
}

impl GraphTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub async fn send(&self, access_token: &str, mail: &OutgoingMail) -> MailResult<()> {
        let response = self
            .client
            .post(GRAPH_SEND_URL)
            .bearer_auth(access_token)
            .json(&SendMailBody::from(mail))
            .send()
            .await
            .map_err(|e| MailError::SendMail(format!("Graph request failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::ACCEPTED {
            tracing::info!("Email sent via Microsoft Graph");
            return Ok(());
        }

        let error_body = response.text().await.unwrap_or_default();
        tracing::error!(status = %status, error = %error_body, "Graph sendMail error");
        Err(MailError::SendMail(format!(
            "Graph sendMail failed ({status}): {error_body}"
        )))
    }
}
