use lettre::message::dkim::{
    DkimCanonicalization as LettreCanonicalization, DkimCanonicalizationType, DkimConfig,
    DkimSigningAlgorithm, DkimSigningKey,
};
use lettre::message::header::HeaderName;
use lettre::transport::smtp::authentication::{Credentials, Mechanism};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;

use super::{DkimSettings, OutgoingMail, SmtpSettings, build_message};
use crate::error::{MailError, MailResult};
use crate::models::DkimCanonicalization;

const SMTP_TIMEOUT: Duration = Duration::from_secs(10);
const DKIM_SELECTOR: &str = "default";

/// Submits mail over SMTP with one connection per message.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmtpTransport;

impl SmtpTransport {
    pub async fn send(&self, settings: &SmtpSettings, mail: &OutgoingMail) -> MailResult<()> {
        let mut message = build_message(mail, false)?;
        if let Some(dkim) = &settings.dkim {
            sign(&mut message, dkim)?;
        }

        let transport = Self::transport(settings)?;
        transport
            .send(message)
            .await
            .map_err(|e| MailError::SendMail(format!("Failed to send email via SMTP: {e}")))?;

        tracing::info!(host = %settings.host, port = settings.port, "Email sent via SMTP");
        Ok(())
    }

    /// 465 is implicit TLS, 587 is STARTTLS, anything else is plain text.
    fn transport(settings: &SmtpSettings) -> MailResult<AsyncSmtpTransport<Tokio1Executor>> {
        let builder = match settings.port {
            465 => AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host),
            587 => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host),
            _ => Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(
                &settings.host,
            )),
        }
        .map_err(|e| MailError::SendMail(format!("Failed to create SMTP relay: {e}")))?;

        let creds = Credentials::new(settings.username.clone(), settings.password.clone());
        Ok(builder
            .port(settings.port)
            .credentials(creds)
            .authentication(vec![Mechanism::Login])
            .timeout(Some(SMTP_TIMEOUT))
            .build())
    }
}

fn sign(message: &mut Message, dkim: &DkimSettings) -> MailResult<()> {
    let key = DkimSigningKey::new(&dkim.private_key, DkimSigningAlgorithm::Rsa)
        .map_err(|e| MailError::SendMail(format!("Invalid DKIM private key: {e}")))?;

    let canonicalization = || match dkim.canonicalization {
        DkimCanonicalization::Simple => DkimCanonicalizationType::Simple,
        DkimCanonicalization::Relaxed => DkimCanonicalizationType::Relaxed,
    };

    let config = DkimConfig::new(
        DKIM_SELECTOR.to_string(),
        dkim.domain.clone(),
        key,
        vec![
            HeaderName::new_from_ascii_str("From"),
            HeaderName::new_from_ascii_str("Date"),
            HeaderName::new_from_ascii_str("MIME-Version"),
        ],
        LettreCanonicalization {
            header: canonicalization(),
            body: canonicalization(),
        },
    );

    message.sign(&config);
    Ok(())
}
