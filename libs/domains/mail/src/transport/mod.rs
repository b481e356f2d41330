//! Outbound delivery through SMTP, the Gmail API and Microsoft Graph.

mod gmail;
mod graph;
mod smtp;

pub use gmail::GmailTransport;
pub use graph::GraphTransport;
pub use smtp::SmtpTransport;

use async_trait::async_trait;
use lettre::Message;
use lettre::message::header::ContentType;
use lettre::message::{Mailbox, MultiPart, SinglePart};

use crate::error::{MailError, MailResult};
use crate::models::{Attachment, DkimCanonicalization};

pub const TEXT_PLAIN: &str = "text/plain";
pub const TEXT_HTML: &str = "text/html";

/// A message after provider resolution; addresses are already validated.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMail {
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

/// Decrypted, ready-to-use credential of the selected provider.
#[derive(Clone, PartialEq, Eq)]
pub enum ResolvedCredential {
    Smtp(SmtpSettings),
    Gmail { access_token: String },
    Azure { access_token: String },
}

impl std::fmt::Debug for ResolvedCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Smtp(settings) => f
                .debug_struct("Smtp")
                .field("host", &settings.host)
                .field("port", &settings.port)
                .field("username", &settings.username)
                .finish_non_exhaustive(),
            Self::Gmail { .. } => f.write_str("Gmail"),
            Self::Azure { .. } => f.write_str("Azure"),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    /// Plaintext
    pub password: String,
    pub dkim: Option<DkimSettings>,
}

#[derive(Clone, PartialEq, Eq)]
pub struct DkimSettings {
    pub private_key: String,
    pub domain: String,
    pub canonicalization: DkimCanonicalization,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, credential: ResolvedCredential, mail: &OutgoingMail) -> MailResult<()>;
}

/// Routes each resolved credential to its transport.
#[derive(Clone)]
pub struct ProviderTransports {
    smtp: SmtpTransport,
    gmail: GmailTransport,
    graph: GraphTransport,
}

impl ProviderTransports {
    pub fn new() -> MailResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| MailError::SendMail(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            smtp: SmtpTransport,
            gmail: GmailTransport::new(http.clone()),
            graph: GraphTransport::new(http),
        })
    }
}

#[async_trait]
impl MailTransport for ProviderTransports {
    async fn send(&self, credential: ResolvedCredential, mail: &OutgoingMail) -> MailResult<()> {
        match credential {
            ResolvedCredential::Smtp(settings) => self.smtp.send(&settings, mail).await,
            ResolvedCredential::Gmail { access_token } => {
                self.gmail.send(&access_token, mail).await
            }
            ResolvedCredential::Azure { access_token } => {
                self.graph.send(&access_token, mail).await
            }
        }
    }
}

/// Build the RFC 5322 message. `text/plain` gives a plain body, anything else
/// is sent as HTML.
pub(crate) fn build_message(mail: &OutgoingMail, keep_bcc: bool) -> MailResult<Message> {
    let from_address = mail
        .from_mail
        .parse()
        .map_err(|e| MailError::SendMail(format!("Invalid from address: {e}")))?;
    let from_name = (!mail.from_name.is_empty()).then(|| mail.from_name.clone());
    let to: Mailbox = mail
        .to
        .parse()
        .map_err(|e| MailError::SendMail(format!("Invalid to address: {e}")))?;

    let mut builder = Message::builder()
        .from(Mailbox::new(from_name, from_address))
        .to(to)
        .subject(&mail.subject);

    for cc in &mail.ccs {
        let cc_mailbox: Mailbox = cc
            .parse()
            .map_err(|e| MailError::SendMail(format!("Invalid CC address: {e}")))?;
        builder = builder.cc(cc_mailbox);
    }

    for bcc in &mail.bccs {
        let bcc_mailbox: Mailbox = bcc
            .parse()
            .map_err(|e| MailError::SendMail(format!("Invalid BCC address: {e}")))?;
        builder = builder.bcc(bcc_mailbox);
    }

    if keep_bcc {
        builder = builder.keep_bcc();
    }

    let content_type = if mail.mime_type == TEXT_PLAIN {
        ContentType::TEXT_PLAIN
    } else {
        ContentType::TEXT_HTML
    };

    let message = if mail.attachments.is_empty() {
        builder.header(content_type).body(mail.body.clone())
    } else {
        let mut multipart = MultiPart::mixed().singlepart(
            SinglePart::builder()
                .header(content_type)
                .body(mail.body.clone()),
        );
        for attachment in &mail.attachments {
            let attachment_type = ContentType::parse(&attachment.file_type)
                .or_else(|_| ContentType::parse("application/octet-stream"))
                .map_err(|e| MailError::SendMail(format!("Invalid attachment type: {e}")))?;
            multipart = multipart.singlepart(
                lettre::message::Attachment::new(attachment.file_name.clone())
                    .body(attachment.data.clone(), attachment_type),
            );
        }
        builder.multipart(multipart)
    };

    message.map_err(|e| MailError::SendMail(format!("Failed to build message: {e}")))
}
