//! Provider resolution and dispatch of a send request.
//!
//! A request names an app and a mail address, optionally a provider. The
//! provider is the explicit one, else the pairing's primary, else the first
//! of Azure, Gmail and SMTP that has a live credential. An explicit provider
//! without a credential is an error; a primary one whose credential is gone
//! falls through to the probe.

use std::sync::Arc;
use tracing::instrument;
use validator::Validate;

use crate::error::{MailError, MailResult};
use crate::models::{
    AppMail, Attachment, Azure, Credential, Gmail, NewSendRecord, ProviderType, SendMailRequest,
    Smtp,
};
use crate::repository::{AppMailRepository, SendRecordRepository};
use crate::service::{CredentialService, OauthService};
use crate::transport::{
    DkimSettings, MailTransport, OutgoingMail, ResolvedCredential, SmtpSettings, TEXT_HTML,
    TEXT_PLAIN,
};

/// Credential picked for a send, before secrets are unwrapped.
enum Selected {
    Smtp(Credential<Smtp>),
    Gmail(Credential<Gmail>),
    Azure(Credential<Azure>),
}

#[derive(Clone)]
pub struct MailDispatcher {
    links: Arc<dyn AppMailRepository>,
    records: Arc<dyn SendRecordRepository>,
    transport: Arc<dyn MailTransport>,
    smtps: CredentialService<Smtp>,
    gmails: OauthService<Gmail>,
    azures: OauthService<Azure>,
}

impl MailDispatcher {
    pub fn new(
        links: Arc<dyn AppMailRepository>,
        records: Arc<dyn SendRecordRepository>,
        transport: Arc<dyn MailTransport>,
        smtps: CredentialService<Smtp>,
        gmails: OauthService<Gmail>,
        azures: OauthService<Azure>,
    ) -> Self {
        Self {
            links,
            records,
            transport,
            smtps,
            gmails,
            azures,
        }
    }

    #[instrument(skip(self, request), fields(app = %request.app))]
    pub async fn send(&self, request: SendMailRequest) -> MailResult<()> {
        request
            .validate()
            .map_err(|e| MailError::Validation(e.to_string()))?;

        let mail = request.pairing_mail()?.to_string();
        if !self.links.app_exists(&request.app).await? {
            return Err(MailError::NotFound(format!("app {}", request.app)));
        }
        if !self.links.mail_exists(&mail).await? {
            return Err(MailError::NotFound(format!("mail {mail}")));
        }

        let link = self
            .links
            .find(&request.app, &mail)
            .await?
            .ok_or_else(|| MailError::NotFound(format!("{} / {mail}", request.app)))?;
        let explicit = request.explicit_type()?;

        let selected = self.select(&link, explicit).await?;
        let provider = selected.provider_type();
        tracing::info!(
            mail = %mail,
            provider = provider.as_str(),
            credential_id = selected.id(),
            "Resolved mail provider"
        );

        let outgoing = outgoing_mail(request, &mail);
        if !outgoing.disable_save {
            self.records
                .insert(send_record(link.id, provider, &outgoing.mail))
                .await?;
        }

        let credential = self.unwrap_secrets(selected).await?;
        self.transport.send(credential, &outgoing.mail).await
    }

    async fn select(&self, link: &AppMail, explicit: Option<ProviderType>) -> MailResult<Selected> {
        if let Some(provider) = explicit {
            return self.load(provider, link.id).await?.ok_or_else(|| {
                MailError::NotFound(format!(
                    "{provider} for {} / {} not found",
                    link.app, link.mail
                ))
            });
        }

        if let Some(provider) = link.primary_type {
            if let Some(selected) = self.load(provider, link.id).await? {
                return Ok(selected);
            }
            tracing::warn!(
                app_mail_id = link.id,
                provider = provider.as_str(),
                "Primary provider has no live credential"
            );
        }

        for provider in ProviderType::PROBE_ORDER {
            if let Some(selected) = self.load(provider, link.id).await? {
                return Ok(selected);
            }
        }

        Err(MailError::NoProviderConfigured {
            app: link.app.clone(),
            mail: link.mail.clone(),
        })
    }

    async fn load(&self, provider: ProviderType, app_mail_id: i64) -> MailResult<Option<Selected>> {
        Ok(match provider {
            ProviderType::Smtp => self
                .smtps
                .load_for_send(app_mail_id)
                .await?
                .map(Selected::Smtp),
            ProviderType::Gmail => self
                .gmails
                .credentials()
                .load_for_send(app_mail_id)
                .await?
                .map(Selected::Gmail),
            ProviderType::Azure => self
                .azures
                .credentials()
                .load_for_send(app_mail_id)
                .await?
                .map(Selected::Azure),
        })
    }

    async fn unwrap_secrets(&self, selected: Selected) -> MailResult<ResolvedCredential> {
        match selected {
            Selected::Smtp(credential) => {
                let settings = credential.settings;
                let password = self.smtps.codec().decrypt(&settings.password)?;
                let dkim = match (
                    settings.dkim_private_key,
                    settings.dkim_domain,
                    settings.dkim_canonicalization,
                ) {
                    (Some(private_key), Some(domain), Some(canonicalization))
                        if !private_key.is_empty() && !domain.is_empty() =>
                    {
                        Some(DkimSettings {
                            private_key,
                            domain,
                            canonicalization,
                        })
                    }
                    _ => None,
                };

                Ok(ResolvedCredential::Smtp(SmtpSettings {
                    host: settings.host,
                    port: settings.port,
                    username: settings.username,
                    password,
                    dkim,
                }))
            }
            Selected::Gmail(credential) => Ok(ResolvedCredential::Gmail {
                access_token: self.gmails.access_token(credential).await?,
            }),
            Selected::Azure(credential) => Ok(ResolvedCredential::Azure {
                access_token: self.azures.access_token(credential).await?,
            }),
        }
    }
}

impl Selected {
    fn provider_type(&self) -> ProviderType {
        match self {
            Self::Smtp(_) => ProviderType::Smtp,
            Self::Gmail(_) => ProviderType::Gmail,
            Self::Azure(_) => ProviderType::Azure,
        }
    }

    fn id(&self) -> i64 {
        match self {
            Self::Smtp(c) => c.id,
            Self::Gmail(c) => c.id,
            Self::Azure(c) => c.id,
        }
    }
}

struct Prepared {
    mail: OutgoingMail,
    disable_save: bool,
}

fn outgoing_mail(request: SendMailRequest, pairing_mail: &str) -> Prepared {
    let from_mail = request
        .from_mail
        .filter(|from| !from.is_empty())
        .unwrap_or_else(|| pairing_mail.to_string());

    Prepared {
        mail: OutgoingMail {
            from_name: request.from_name,
            from_mail,
            to: request.to,
            subject: request.subject,
            body: request.body,
            mime_type: body_type(request.mime_type.as_deref()).to_string(),
            ccs: request.ccs,
            bccs: request.bccs,
            attachments: request.attachments.into_iter().map(Attachment::from).collect(),
        },
        disable_save: request.disable_save,
    }
}

/// `text/plain` in any case and with any parameters stays plain; everything
/// else, including no type at all, is HTML.
fn body_type(mime_type: Option<&str>) -> &'static str {
    let essence = mime_type
        .and_then(|mime| mime.split(';').next())
        .map(str::trim)
        .unwrap_or_default();
    if essence.eq_ignore_ascii_case(TEXT_PLAIN) {
        TEXT_PLAIN
    } else {
        TEXT_HTML
    }
}

fn send_record(app_mail_id: i64, provider: ProviderType, mail: &OutgoingMail) -> NewSendRecord {
    NewSendRecord {
        app_mail_id,
        provider_type: provider,
        from_name: mail.from_name.clone(),
        from_mail: mail.from_mail.clone(),
        to: mail.to.clone(),
        subject: mail.subject.clone(),
        body: mail.body.clone(),
        mime_type: mail.mime_type.clone(),
        ccs: mail.ccs.clone(),
        bccs: mail.bccs.clone(),
        attachments: mail.attachments.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCache;
    use crate::crypto::SecretCodec;
    use crate::models::{CreateAzure, CreateGmail, CreateSmtp, TokenBundle};
    use crate::oauth::MockTokenExchanger;
    use crate::repository::{
        InMemoryAppMailRepository, InMemoryCredentialRepository, InMemorySendRecordRepository,
        MockAppMailRepository, MockSendRecordRepository,
    };
    use crate::transport::MockMailTransport;
    use chrono::{Duration as ChronoDuration, Utc};
    use core_config::mail::MailConfig;
    use serde_json::json;
    use std::time::Duration;

    const KEY: &str = "0123456789abcdef0123456789abcdef";

    struct Harness {
        links: InMemoryAppMailRepository,
        records: InMemorySendRecordRepository,
        smtps: CredentialService<Smtp>,
        gmails: OauthService<Gmail>,
        azures: OauthService<Azure>,
    }

    impl Harness {
        fn new() -> Self {
            let links = InMemoryAppMailRepository::new();
            let cache = Arc::new(InMemoryCache::new());
            let codec = Arc::new(SecretCodec::new(KEY).unwrap());
            let config = MailConfig::new(KEY, Duration::from_secs(60), "https://mail.example.com");
            let ttl = Duration::from_secs(60);

            let smtps = CredentialService::new(
                Arc::new(links.clone()),
                Arc::new(InMemoryCredentialRepository::<Smtp>::new(links.clone())),
                cache.clone(),
                codec.clone(),
                ttl,
            );
            let gmails = OauthService::new(
                CredentialService::new(
                    Arc::new(links.clone()),
                    Arc::new(InMemoryCredentialRepository::<Gmail>::new(links.clone())),
                    cache.clone(),
                    codec.clone(),
                    ttl,
                ),
                Arc::new(MockTokenExchanger::new()),
                &config,
            );
            let azures = OauthService::new(
                CredentialService::new(
                    Arc::new(links.clone()),
                    Arc::new(InMemoryCredentialRepository::<Azure>::new(links.clone())),
                    cache,
                    codec,
                    ttl,
                ),
                Arc::new(MockTokenExchanger::new()),
                &config,
            );

            Self {
                links,
                records: InMemorySendRecordRepository::new(),
                smtps,
                gmails,
                azures,
            }
        }

        fn dispatcher(&self, transport: MockMailTransport) -> MailDispatcher {
            self.dispatcher_with(Arc::new(self.records.clone()), transport)
        }

        fn dispatcher_with(
            &self,
            records: Arc<dyn SendRecordRepository>,
            transport: MockMailTransport,
        ) -> MailDispatcher {
            MailDispatcher::new(
                Arc::new(self.links.clone()),
                records,
                Arc::new(transport),
                self.smtps.clone(),
                self.gmails.clone(),
                self.azures.clone(),
            )
        }

        async fn smtp(&self, primary: bool) -> Credential<Smtp> {
            self.smtps
                .create(CreateSmtp {
                    app: "Admin".into(),
                    mail: "noreply@example.com".into(),
                    username: "mailer".into(),
                    password: "hunter2".into(),
                    host: "smtp.example.com".into(),
                    port: 587,
                    dkim_private_key: None,
                    dkim_domain: None,
                    dkim_canonicalization: None,
                    primary,
                })
                .await
                .unwrap()
        }

        async fn gmail(&self, authorized: bool) -> Credential<Gmail> {
            let mut created = self
                .gmails
                .credentials()
                .create(CreateGmail {
                    app: "Admin".into(),
                    mail: "noreply@example.com".into(),
                    client_id: "client".into(),
                    secret: "secret".into(),
                    user: "me".into(),
                    primary: false,
                })
                .await
                .unwrap();
            if authorized {
                created.settings.token = Some(TokenBundle {
                    access_token: "gmail-access".into(),
                    refresh_token: Some("refresh".into()),
                    token_type: "Bearer".into(),
                    expiry: Some(Utc::now() + ChronoDuration::hours(1)),
                    expires_in: Some(3600),
                });
                created = self.gmails.credentials().save(created).await.unwrap();
            }
            created
        }

        async fn azure(&self) -> Credential<Azure> {
            self.azures
                .credentials()
                .create(CreateAzure {
                    app: "Admin".into(),
                    mail: "noreply@example.com".into(),
                    client_id: "client".into(),
                    tenant_id: "tenant".into(),
                    secret: "secret".into(),
                    user: "me".into(),
                    primary: false,
                })
                .await
                .unwrap()
        }
    }

    fn request(extra: serde_json::Value) -> SendMailRequest {
        let mut body = json!({
            "app": "Admin",
            "mail": "noreply@example.com",
            "to": "user@example.com",
            "subject": "Hello",
            "body": "<p>Hi</p>"
        });
        if let (Some(body), Some(extra)) = (body.as_object_mut(), extra.as_object()) {
            body.extend(extra.clone());
        }
        serde_json::from_value(body).unwrap()
    }

    fn expect_send(
        transport: &mut MockMailTransport,
        check: impl Fn(&ResolvedCredential) -> bool + Send + 'static,
    ) {
        transport
            .expect_send()
            .withf(move |credential, _| check(credential))
            .times(1)
            .returning(|_, _| Ok(()));
    }

    #[test]
    fn test_body_type_is_plain_or_html() {
        for (given, expected) in [
            (None, TEXT_HTML),
            (Some(""), TEXT_HTML),
            (Some("text/html"), TEXT_HTML),
            (Some("application/json"), TEXT_HTML),
            (Some("text/plain"), TEXT_PLAIN),
            (Some("Text/Plain"), TEXT_PLAIN),
            (Some(" text/plain; charset=utf-8"), TEXT_PLAIN),
        ] {
            assert_eq!(body_type(given), expected, "{given:?}");
        }
    }

    #[tokio::test]
    async fn test_mime_type_reaches_transport_and_record_normalized() {
        let harness = Harness::new();
        harness.smtp(true).await;

        let mut transport = MockMailTransport::new();
        transport
            .expect_send()
            .withf(|_, mail| mail.mime_type == TEXT_PLAIN)
            .times(1)
            .returning(|_, _| Ok(()));

        harness
            .dispatcher(transport)
            .send(request(json!({ "mimeType": "TEXT/PLAIN; charset=utf-8" })))
            .await
            .unwrap();

        let records = harness.records.records().await;
        assert_eq!(records[0].mime_type, TEXT_PLAIN);
    }

    #[tokio::test]
    async fn test_primary_smtp_receives_decrypted_password() {
        let harness = Harness::new();
        harness.smtp(true).await;

        let mut transport = MockMailTransport::new();
        transport
            .expect_send()
            .withf(|credential, mail| {
                matches!(credential, ResolvedCredential::Smtp(s) if s.password == "hunter2")
                    && mail.from_mail == "noreply@example.com"
                    && mail.mime_type == TEXT_HTML
            })
            .times(1)
            .returning(|_, _| Ok(()));

        harness
            .dispatcher(transport)
            .send(request(json!({})))
            .await
            .unwrap();

        let records = harness.records.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].provider_type, ProviderType::Smtp);
    }

    #[tokio::test]
    async fn test_probe_prefers_gmail_over_smtp() {
        let harness = Harness::new();
        harness.smtp(false).await;
        harness.gmail(true).await;

        let mut transport = MockMailTransport::new();
        expect_send(&mut transport, |credential| {
            matches!(credential, ResolvedCredential::Gmail { access_token } if access_token == "gmail-access")
        });

        harness
            .dispatcher(transport)
            .send(request(json!({})))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_explicit_type_overrides_primary() {
        let harness = Harness::new();
        harness.smtp(false).await;
        harness.gmail(true).await;
        harness
            .links
            .set_primary_type(1, Some(ProviderType::Gmail))
            .await
            .unwrap();

        let mut transport = MockMailTransport::new();
        expect_send(&mut transport, |credential| {
            matches!(credential, ResolvedCredential::Smtp(_))
        });

        harness
            .dispatcher(transport)
            .send(request(json!({ "type": "SMTP" })))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_explicit_type_without_credential_is_not_found() {
        let harness = Harness::new();
        harness.smtp(false).await;

        let result = harness
            .dispatcher(MockMailTransport::new())
            .send(request(json!({ "type": "Azure" })))
            .await;

        assert!(matches!(result, Err(MailError::NotFound(_))));
        assert!(harness.records.records().await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_type_is_validation_error() {
        let harness = Harness::new();
        harness.smtp(false).await;

        let result = harness
            .dispatcher(MockMailTransport::new())
            .send(request(json!({ "type": "Pigeon" })))
            .await;
        assert!(matches!(result, Err(MailError::Validation(_))));
    }

    #[tokio::test]
    async fn test_no_provider_configured() {
        let harness = Harness::new();
        let created = harness.smtp(false).await;
        harness.smtps.delete(created.id).await.unwrap();

        let result = harness
            .dispatcher(MockMailTransport::new())
            .send(request(json!({})))
            .await;
        assert!(matches!(result, Err(MailError::NoProviderConfigured { .. })));
    }

    #[tokio::test]
    async fn test_unknown_app_or_mail_is_not_found() {
        let harness = Harness::new();
        harness.smtp(true).await;
        let dispatcher = harness.dispatcher(MockMailTransport::new());

        let result = dispatcher.send(request(json!({ "app": "Other" }))).await;
        assert!(matches!(result, Err(MailError::NotFound(_))));

        let result = dispatcher
            .send(request(json!({ "mail": "other@example.com" })))
            .await;
        assert!(matches!(result, Err(MailError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_from_mail_selects_pairing() {
        let harness = Harness::new();
        harness.smtp(true).await;

        let mut transport = MockMailTransport::new();
        expect_send(&mut transport, |_| true);

        let mut req = request(json!({ "fromMail": "noreply@example.com" }));
        req.mail = None;
        harness.dispatcher(transport).send(req).await.unwrap();
    }

    #[tokio::test]
    async fn test_unauthorized_oauth_fails_after_record() {
        let harness = Harness::new();
        harness.azure().await;

        let result = harness
            .dispatcher(MockMailTransport::new())
            .send(request(json!({})))
            .await;

        assert!(matches!(result, Err(MailError::SendMail(msg)) if msg == "not authenticated"));
        let records = harness.records.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].provider_type, ProviderType::Azure);
    }

    #[tokio::test]
    async fn test_transport_failure_keeps_record() {
        let harness = Harness::new();
        harness.smtp(true).await;

        let mut transport = MockMailTransport::new();
        transport
            .expect_send()
            .returning(|_, _| Err(MailError::SendMail("connection refused".into())));

        let result = harness.dispatcher(transport).send(request(json!({}))).await;
        assert!(matches!(result, Err(MailError::SendMail(_))));
        assert_eq!(harness.records.records().await.len(), 1);
    }

    #[tokio::test]
    async fn test_disable_save_skips_record() {
        let harness = Harness::new();
        harness.smtp(true).await;

        let mut records = MockSendRecordRepository::new();
        records.expect_insert().never();
        let mut transport = MockMailTransport::new();
        expect_send(&mut transport, |_| true);

        harness
            .dispatcher_with(Arc::new(records), transport)
            .send(request(json!({ "disableSave": true })))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_deleted_primary_falls_back_to_probe() {
        let harness = Harness::new();
        let smtp = harness.smtp(true).await;
        harness.gmail(true).await;
        harness.smtps.delete(smtp.id).await.unwrap();

        let mut transport = MockMailTransport::new();
        expect_send(&mut transport, |credential| {
            matches!(credential, ResolvedCredential::Gmail { .. })
        });

        harness
            .dispatcher(transport)
            .send(request(json!({})))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_store_failure_stops_before_transport() {
        let harness = Harness::new();
        let mut links = MockAppMailRepository::new();
        links
            .expect_app_exists()
            .returning(|_| Err(MailError::Store("connection reset".into())));
        let mut transport = MockMailTransport::new();
        transport.expect_send().never();

        let dispatcher = MailDispatcher::new(
            Arc::new(links),
            Arc::new(harness.records.clone()),
            Arc::new(transport),
            harness.smtps.clone(),
            harness.gmails.clone(),
            harness.azures.clone(),
        );

        let result = dispatcher.send(request(json!({}))).await;
        assert!(matches!(result, Err(MailError::Store(_))));
        assert!(harness.records.records().await.is_empty());
    }
}
