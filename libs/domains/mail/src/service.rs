use chrono::Utc;
use core_config::mail::MailConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;
use validator::Validate;

use crate::cache::{self, CredentialCache};
use crate::crypto::SecretCodec;
use crate::error::{MailError, MailResult};
use crate::models::{
    AppResponse, CreateApp, Credential, CredentialRequest, CredentialUpdate, ListQuery, Page,
    Provider,
};
use crate::oauth::{self, OauthProvider, TokenExchanger, TokenGrant};
use crate::repository::{AppMailRepository, CredentialRepository};

/// Lifecycle of one provider's credentials: create, read, update, soft
/// delete and restore, with the cache kept in step.
///
/// The cache is best-effort. Its errors are logged and never fail a call.
pub struct CredentialService<S: Provider> {
    links: Arc<dyn AppMailRepository>,
    repository: Arc<dyn CredentialRepository<S>>,
    cache: Arc<dyn CredentialCache>,
    codec: Arc<SecretCodec>,
    cache_ttl: Duration,
}

impl<S: Provider> Clone for CredentialService<S> {
    fn clone(&self) -> Self {
        Self {
            links: self.links.clone(),
            repository: self.repository.clone(),
            cache: self.cache.clone(),
            codec: self.codec.clone(),
            cache_ttl: self.cache_ttl,
        }
    }
}

impl<S: Provider> CredentialService<S> {
    pub fn new(
        links: Arc<dyn AppMailRepository>,
        repository: Arc<dyn CredentialRepository<S>>,
        cache: Arc<dyn CredentialCache>,
        codec: Arc<SecretCodec>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            links,
            repository,
            cache,
            codec,
            cache_ttl,
        }
    }

    /// Whether a live credential of this provider exists for the pair.
    pub async fn is_available(&self, app: &str, mail: &str) -> MailResult<bool> {
        match self.links.find(app, mail).await? {
            Some(link) => Ok(self
                .repository
                .find_live_id_by_app_mail(link.id)
                .await?
                .is_some()),
            None => Ok(false),
        }
    }

    #[instrument(skip(self, request), fields(provider = S::TYPE.as_str(), app = %request.app(), mail = %request.mail()))]
    pub async fn create(&self, request: S::Create) -> MailResult<Credential<S>> {
        request
            .validate()
            .map_err(|e| MailError::Validation(e.to_string()))?;

        let (app, mail) = (request.app().to_string(), request.mail().to_string());
        if self.is_available(&app, &mail).await? {
            return Err(MailError::Conflict(format!(
                "{} already configured for {app} / {mail}",
                S::TYPE
            )));
        }

        let primary = request.primary();
        let settings = S::from_request(request, &self.codec)?;

        self.links.ensure_app(&app).await?;
        self.links.ensure_mail(&mail).await?;
        let link = self.links.find_or_create(&app, &mail).await?;
        let mut credential = self
            .repository
            .insert(Credential::new(link, settings))
            .await?;
        if primary {
            credential.app_mail = self
                .links
                .set_primary_type(credential.app_mail.id, Some(S::TYPE))
                .await?;
        }

        tracing::info!(credential_id = credential.id, primary, "Created credential");
        Ok(credential)
    }

    pub async fn get(&self, id: i64, include_deleted: bool) -> MailResult<Credential<S>> {
        self.repository
            .find_by_id(id, include_deleted)
            .await?
            .ok_or_else(|| MailError::NotFound(format!("{} {id}", S::TYPE)))
    }

    pub async fn list(&self, query: &ListQuery) -> MailResult<Page<Credential<S>>> {
        let filter = query.to_filter::<S>()?;
        let (items, total) = self.repository.list(&filter).await?;
        Ok(Page::new(items, filter.page, filter.limit, total))
    }

    /// Overwrite `existing` with the request and apply the primary flag.
    ///
    /// The caller has already loaded `existing` and checked `updatedAt`. The
    /// flag is only touched once the row is saved.
    #[instrument(skip(self, existing, request), fields(provider = S::TYPE.as_str(), credential_id = existing.id))]
    pub async fn update(
        &self,
        mut existing: Credential<S>,
        request: S::Update,
    ) -> MailResult<Credential<S>> {
        request
            .validate()
            .map_err(|e| MailError::Validation(e.to_string()))?;

        let current = existing.app_mail.primary_type;
        let primary = match (request.primary(), current) {
            (true, current) if current != Some(S::TYPE) => Some(Some(S::TYPE)),
            (false, Some(current)) if current == S::TYPE => Some(None),
            _ => None,
        };

        existing.settings.apply_update(request, &self.codec)?;
        let mut updated = self.repository.save(existing).await?;
        if let Some(primary_type) = primary {
            updated.app_mail = self
                .links
                .set_primary_type(updated.app_mail.id, primary_type)
                .await?;
        }
        self.refresh_cached(&updated).await;

        tracing::info!("Updated credential");
        Ok(updated)
    }

    /// Full save that keeps a cached copy in step.
    pub(crate) async fn save(&self, credential: Credential<S>) -> MailResult<Credential<S>> {
        let saved = self.repository.save(credential).await?;
        self.refresh_cached(&saved).await;
        Ok(saved)
    }

    #[instrument(skip(self), fields(provider = S::TYPE.as_str()))]
    pub async fn delete(&self, id: i64) -> MailResult<()> {
        let credential = self.get(id, false).await?;
        self.repository
            .set_deleted_at(credential.id, Some(Utc::now()))
            .await?;
        self.evict(&credential.cache_key()).await;

        tracing::info!(credential_id = id, "Deleted credential");
        Ok(())
    }

    #[instrument(skip(self), fields(provider = S::TYPE.as_str()))]
    pub async fn restore(&self, id: i64) -> MailResult<Credential<S>> {
        let credential = self.get(id, true).await?;
        if credential.deleted_at.is_none() {
            return Ok(credential);
        }

        if let Some(live) = self
            .repository
            .find_live_id_by_app_mail(credential.app_mail.id)
            .await?
        {
            return Err(MailError::Conflict(format!(
                "{} {live} is already live for {} / {}",
                S::TYPE,
                credential.app_mail.app,
                credential.app_mail.mail
            )));
        }

        let restored = self.repository.set_deleted_at(id, None).await?;
        tracing::info!(credential_id = id, "Restored credential");
        Ok(restored)
    }

    pub async fn find_live_id(&self, app_mail_id: i64) -> MailResult<Option<i64>> {
        self.repository.find_live_id_by_app_mail(app_mail_id).await
    }

    /// Live credential of a link for the send path: cache first, store on a
    /// miss, then populate the cache.
    pub async fn load_for_send(&self, app_mail_id: i64) -> MailResult<Option<Credential<S>>> {
        let Some(id) = self.find_live_id(app_mail_id).await? else {
            return Ok(None);
        };

        let key = S::TYPE.cache_key(id);
        match cache::get_credential::<S>(self.cache.as_ref(), &key).await {
            Ok(credential) => {
                tracing::debug!(%key, "Credential served from cache");
                return Ok(Some(credential));
            }
            Err(MailError::CacheMiss(_)) => {}
            Err(e) => tracing::warn!(%key, error = %e, "Cache read failed, using store"),
        }

        let credential = self.get(id, false).await?;
        if let Err(e) = cache::set_credential(self.cache.as_ref(), &credential, self.cache_ttl).await {
            tracing::warn!(%key, error = %e, "Failed to populate cache");
        }
        Ok(Some(credential))
    }

    pub fn codec(&self) -> &SecretCodec {
        &self.codec
    }

    async fn refresh_cached(&self, credential: &Credential<S>) {
        let key = credential.cache_key();
        match self.cache.exists(&key).await {
            Ok(true) => {
                if let Err(e) =
                    cache::set_credential(self.cache.as_ref(), credential, self.cache_ttl).await
                {
                    tracing::warn!(%key, error = %e, "Failed to refresh cached credential");
                }
            }
            Ok(false) => {}
            Err(e) => tracing::warn!(%key, error = %e, "Cache lookup failed"),
        }
    }

    async fn evict(&self, key: &str) {
        match self.cache.exists(key).await {
            Ok(true) => {
                if let Err(e) = self.cache.delete(key).await {
                    tracing::warn!(%key, error = %e, "Failed to evict cached credential");
                }
            }
            Ok(false) => {}
            Err(e) => tracing::warn!(%key, error = %e, "Cache lookup failed"),
        }
    }
}

/// Credential service of an OAuth2 provider plus its token handling.
pub struct OauthService<S: OauthProvider> {
    credentials: CredentialService<S>,
    exchanger: Arc<dyn TokenExchanger>,
    redirect_url: String,
}

impl<S: OauthProvider> Clone for OauthService<S> {
    fn clone(&self) -> Self {
        Self {
            credentials: self.credentials.clone(),
            exchanger: self.exchanger.clone(),
            redirect_url: self.redirect_url.clone(),
        }
    }
}

impl<S: OauthProvider> OauthService<S> {
    pub fn new(
        credentials: CredentialService<S>,
        exchanger: Arc<dyn TokenExchanger>,
        config: &MailConfig,
    ) -> Self {
        Self {
            credentials,
            exchanger,
            redirect_url: config.oauth_redirect_url(S::CALLBACK_COLLECTION),
        }
    }

    pub fn credentials(&self) -> &CredentialService<S> {
        &self.credentials
    }

    pub fn authorization_url(&self, credential: &Credential<S>) -> MailResult<String> {
        oauth::authorization_url(&credential.settings.client(), &self.redirect_url, credential.id)
    }

    /// Complete the authorization-code grant for the credential named by
    /// `state`.
    #[instrument(skip(self, code), fields(provider = S::TYPE.as_str()))]
    pub async fn callback(&self, state: &str, code: &str) -> MailResult<Credential<S>> {
        let id: i64 = state
            .parse()
            .map_err(|_| MailError::Validation(format!("state must be a credential id: {state}")))?;

        let credential = self.credentials.get(id, false).await?;
        let grant = self
            .exchanger
            .exchange_code(&credential.settings.client(), &self.redirect_url, code)
            .await?;

        let credential = self.persist_token(credential, grant).await?;
        tracing::info!(credential_id = id, "Stored OAuth2 token");
        Ok(credential)
    }

    pub async fn persist_token(
        &self,
        mut credential: Credential<S>,
        grant: TokenGrant,
    ) -> MailResult<Credential<S>> {
        let token = oauth::merge_grant(credential.settings.token(), grant, Utc::now());
        credential.settings.set_token(token);
        self.credentials.save(credential).await
    }

    /// Access token usable right now, refreshing an expired one first.
    pub async fn access_token(&self, credential: Credential<S>) -> MailResult<String> {
        let Some(token) = credential.settings.token() else {
            return Err(MailError::SendMail("not authenticated".to_string()));
        };

        if !token.is_expired(Utc::now()) {
            return Ok(token.access_token.clone());
        }

        let Some(refresh_token) = token.refresh_token.clone() else {
            tracing::warn!(
                credential_id = credential.id,
                "Access token expired and no refresh token is stored"
            );
            return Ok(token.access_token.clone());
        };

        let grant = self
            .exchanger
            .refresh(&credential.settings.client(), &refresh_token)
            .await?;
        let refreshed = self.persist_token(credential, grant).await?;
        tracing::info!(credential_id = refreshed.id, "Refreshed OAuth2 token");

        refreshed
            .settings
            .token()
            .map(|token| token.access_token.clone())
            .ok_or_else(|| MailError::SendMail("not authenticated".to_string()))
    }
}

/// Explicit registration of apps.
#[derive(Clone)]
pub struct AppService {
    links: Arc<dyn AppMailRepository>,
}

impl AppService {
    pub fn new(links: Arc<dyn AppMailRepository>) -> Self {
        Self { links }
    }

    /// Idempotent: an existing app is left untouched.
    pub async fn create(&self, request: CreateApp) -> MailResult<AppResponse> {
        request
            .validate()
            .map_err(|e| MailError::Validation(e.to_string()))?;

        self.links.ensure_app(&request.name).await?;
        tracing::info!(app = %request.name, "Registered app");
        Ok(AppResponse { name: request.name })
    }

    pub async fn exists(&self, name: &str) -> MailResult<bool> {
        self.links.app_exists(name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{InMemoryCache, MockCredentialCache};
    use crate::models::{
        Azure, CreateAzure, CreateGmail, CreateSmtp, Gmail, ListFilter, ProviderType, Smtp,
        TokenBundle, UpdateSmtp,
    };
    use crate::oauth::MockTokenExchanger;
    use crate::repository::{InMemoryAppMailRepository, InMemoryCredentialRepository};
    use async_trait::async_trait;
    use chrono::DateTime;

    const KEY: &str = "0123456789abcdef0123456789abcdef";

    struct Fixture {
        links: InMemoryAppMailRepository,
        cache: InMemoryCache,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                links: InMemoryAppMailRepository::new(),
                cache: InMemoryCache::new(),
            }
        }

        fn service<S: Provider>(&self, cache: Arc<dyn CredentialCache>) -> CredentialService<S> {
            CredentialService::new(
                Arc::new(self.links.clone()),
                Arc::new(InMemoryCredentialRepository::<S>::new(self.links.clone())),
                cache,
                Arc::new(SecretCodec::new(KEY).unwrap()),
                Duration::from_secs(60),
            )
        }

        fn smtps(&self) -> CredentialService<Smtp> {
            self.service(Arc::new(self.cache.clone()))
        }
    }

    fn create_smtp(primary: bool) -> CreateSmtp {
        CreateSmtp {
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
        }
    }

    fn create_gmail_request(primary: bool) -> CreateGmail {
        CreateGmail {
            app: "Admin".into(),
            mail: "noreply@example.com".into(),
            client_id: "client".into(),
            secret: "secret".into(),
            user: "me".into(),
            primary,
        }
    }

    fn create_azure_request(primary: bool) -> CreateAzure {
        CreateAzure {
            app: "Admin".into(),
            mail: "noreply@example.com".into(),
            client_id: "client".into(),
            tenant_id: "tenant".into(),
            secret: "secret".into(),
            user: "me".into(),
            primary,
        }
    }

    /// Store that loses every write, as if a concurrent request got there
    /// first.
    struct LosingRepository;

    #[async_trait]
    impl CredentialRepository<Smtp> for LosingRepository {
        async fn insert(&self, _credential: Credential<Smtp>) -> MailResult<Credential<Smtp>> {
            Err(MailError::Conflict("SMTP already configured".into()))
        }

        async fn find_by_id(
            &self,
            _id: i64,
            _include_deleted: bool,
        ) -> MailResult<Option<Credential<Smtp>>> {
            Ok(None)
        }

        async fn find_live_id_by_app_mail(&self, _app_mail_id: i64) -> MailResult<Option<i64>> {
            Ok(None)
        }

        async fn save(&self, credential: Credential<Smtp>) -> MailResult<Credential<Smtp>> {
            Err(MailError::NotFound(format!("SMTP {}", credential.id)))
        }

        async fn set_deleted_at(
            &self,
            id: i64,
            _deleted_at: Option<DateTime<Utc>>,
        ) -> MailResult<Credential<Smtp>> {
            Err(MailError::NotFound(format!("SMTP {id}")))
        }

        async fn list(&self, _filter: &ListFilter) -> MailResult<(Vec<Credential<Smtp>>, u64)> {
            Ok((Vec::new(), 0))
        }
    }

    fn losing_service(fixture: &Fixture) -> CredentialService<Smtp> {
        CredentialService::new(
            Arc::new(fixture.links.clone()),
            Arc::new(LosingRepository),
            Arc::new(fixture.cache.clone()),
            Arc::new(SecretCodec::new(KEY).unwrap()),
            Duration::from_secs(60),
        )
    }

    fn update_smtp(host: &str, primary: bool, updated_at: DateTime<Utc>) -> UpdateSmtp {
        UpdateSmtp {
            username: "mailer".into(),
            password: None,
            host: host.into(),
            port: 465,
            dkim_private_key: None,
            dkim_domain: None,
            dkim_canonicalization: None,
            primary,
            updated_at,
        }
    }

    fn failing_cache() -> MockCredentialCache {
        let mut cache = MockCredentialCache::new();
        cache
            .expect_exists()
            .returning(|_| Err(MailError::Cache("connection refused".into())));
        cache
            .expect_get()
            .returning(|_| Err(MailError::Cache("connection refused".into())));
        cache
            .expect_set()
            .returning(|_, _, _| Err(MailError::Cache("connection refused".into())));
        cache
            .expect_delete()
            .returning(|_| Err(MailError::Cache("connection refused".into())));
        cache
    }

    #[tokio::test]
    async fn test_create_sets_primary_and_encrypts() {
        let fixture = Fixture::new();
        let service = fixture.smtps();

        let created = service.create(create_smtp(true)).await.unwrap();

        assert!(created.is_primary());
        assert_ne!(created.settings.password, "hunter2");
        assert_eq!(
            service.codec().decrypt(&created.settings.password).unwrap(),
            "hunter2"
        );
        assert!(service.is_available("Admin", "noreply@example.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_create_conflicts_without_mutation() {
        let fixture = Fixture::new();
        let service = fixture.smtps();
        service.create(create_smtp(false)).await.unwrap();

        let result = service.create(create_smtp(true)).await;
        assert!(matches!(result, Err(MailError::Conflict(_))));

        let link = fixture
            .links
            .find("Admin", "noreply@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(link.primary_type, None);
        assert_eq!(service.list(&ListQuery::default()).await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn test_duplicate_oauth_creates_conflict() {
        let fixture = Fixture::new();
        let gmails = fixture.service::<Gmail>(Arc::new(fixture.cache.clone()));
        let azures = fixture.service::<Azure>(Arc::new(fixture.cache.clone()));

        gmails.create(create_gmail_request(false)).await.unwrap();
        assert!(matches!(
            gmails.create(create_gmail_request(true)).await,
            Err(MailError::Conflict(_))
        ));

        // Another provider on the same pair is fine until it repeats too
        azures.create(create_azure_request(false)).await.unwrap();
        assert!(matches!(
            azures.create(create_azure_request(true)).await,
            Err(MailError::Conflict(_))
        ));

        let link = fixture
            .links
            .find("Admin", "noreply@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(link.primary_type, None);
        assert_eq!(gmails.list(&ListQuery::default()).await.unwrap().total, 1);
        assert_eq!(azures.list(&ListQuery::default()).await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn test_lost_insert_leaves_primary_untouched() {
        let fixture = Fixture::new();
        let service = losing_service(&fixture);

        let result = service.create(create_smtp(true)).await;
        assert!(matches!(result, Err(MailError::Conflict(_))));

        let link = fixture
            .links
            .find("Admin", "noreply@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(link.primary_type, None);
    }

    #[tokio::test]
    async fn test_lost_save_leaves_primary_untouched() {
        let fixture = Fixture::new();
        let created = fixture.smtps().create(create_smtp(false)).await.unwrap();

        let result = losing_service(&fixture)
            .update(created.clone(), update_smtp("relay.example.com", true, created.updated_at))
            .await;
        assert!(matches!(result, Err(MailError::NotFound(_))));

        let link = fixture
            .links
            .find_by_id(created.app_mail.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(link.primary_type, None);
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_request() {
        let fixture = Fixture::new();
        let mut request = create_smtp(false);
        request.mail = "not-a-mail".into();

        let result = fixture.smtps().create(request).await;
        assert!(matches!(result, Err(MailError::Validation(_))));
        assert!(!fixture.links.app_exists("Admin").await.unwrap());
    }

    #[tokio::test]
    async fn test_primary_flag_rules() {
        let fixture = Fixture::new();
        let smtps = fixture.smtps();
        let gmails = fixture.service::<Gmail>(Arc::new(fixture.cache.clone()));

        let smtp = smtps.create(create_smtp(true)).await.unwrap();
        let gmail = gmails
            .create(crate::models::CreateGmail {
                app: "Admin".into(),
                mail: "noreply@example.com".into(),
                client_id: "client".into(),
                secret: "secret".into(),
                user: "me".into(),
                primary: false,
            })
            .await
            .unwrap();
        assert_eq!(gmail.app_mail.primary_type, Some(ProviderType::Smtp));

        // A non-owner clearing the flag changes nothing
        let gmail = gmails
            .update(
                gmail.clone(),
                crate::models::UpdateGmail {
                    client_id: "client".into(),
                    secret: "secret".into(),
                    user: "me".into(),
                    primary: false,
                    updated_at: gmail.updated_at,
                },
            )
            .await
            .unwrap();
        assert_eq!(gmail.app_mail.primary_type, Some(ProviderType::Smtp));

        // The owner clearing the flag resets it
        let smtp = smtps
            .update(smtp.clone(), update_smtp("smtp.example.com", false, smtp.updated_at))
            .await
            .unwrap();
        assert_eq!(smtp.app_mail.primary_type, None);

        // Setting it takes over
        let smtp = smtps
            .update(smtp.clone(), update_smtp("smtp.example.com", true, smtp.updated_at))
            .await
            .unwrap();
        assert!(smtp.is_primary());
    }

    #[tokio::test]
    async fn test_update_refreshes_cached_copy() {
        let fixture = Fixture::new();
        let service = fixture.smtps();
        let created = service.create(create_smtp(true)).await.unwrap();

        // Warm the cache through the send path
        service.load_for_send(created.app_mail.id).await.unwrap();
        assert!(fixture.cache.exists(&created.cache_key()).await.unwrap());

        service
            .update(created.clone(), update_smtp("relay.example.com", true, created.updated_at))
            .await
            .unwrap();

        let cached: Credential<Smtp> =
            cache::get_credential(&fixture.cache, &created.cache_key())
                .await
                .unwrap();
        assert_eq!(cached.settings.host, "relay.example.com");
        assert_eq!(cached.settings.port, 465);
    }

    #[tokio::test]
    async fn test_update_does_not_populate_cache() {
        let fixture = Fixture::new();
        let service = fixture.smtps();
        let created = service.create(create_smtp(false)).await.unwrap();

        service
            .update(created.clone(), update_smtp("relay.example.com", false, created.updated_at))
            .await
            .unwrap();

        assert!(!fixture.cache.exists(&created.cache_key()).await.unwrap());
    }

    #[tokio::test]
    async fn test_soft_delete_and_restore() {
        let fixture = Fixture::new();
        let service = fixture.smtps();
        let created = service.create(create_smtp(false)).await.unwrap();
        service.load_for_send(created.app_mail.id).await.unwrap();

        service.delete(created.id).await.unwrap();

        assert!(matches!(
            service.get(created.id, false).await,
            Err(MailError::NotFound(_))
        ));
        let tombstoned = service.get(created.id, true).await.unwrap();
        assert!(tombstoned.deleted_at.is_some());
        assert!(!fixture.cache.exists(&created.cache_key()).await.unwrap());
        assert!(matches!(
            service.delete(created.id).await,
            Err(MailError::NotFound(_))
        ));

        let restored = service.restore(created.id).await.unwrap();
        assert!(restored.deleted_at.is_none());
        assert!(service.get(created.id, false).await.is_ok());
    }

    #[tokio::test]
    async fn test_restore_conflicts_with_live_replacement() {
        let fixture = Fixture::new();
        let service = fixture.smtps();
        let first = service.create(create_smtp(false)).await.unwrap();
        service.delete(first.id).await.unwrap();
        service.create(create_smtp(false)).await.unwrap();

        assert!(matches!(
            service.restore(first.id).await,
            Err(MailError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_cache_failures_do_not_fail_operations() {
        let fixture = Fixture::new();
        let service = fixture.service::<Smtp>(Arc::new(failing_cache()));

        let created = service.create(create_smtp(true)).await.unwrap();
        let loaded = service
            .load_for_send(created.app_mail.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.id, created.id);

        service
            .update(created.clone(), update_smtp("relay.example.com", true, created.updated_at))
            .await
            .unwrap();
        service.delete(created.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_load_for_send_prefers_cache() {
        let fixture = Fixture::new();
        let service = fixture.smtps();
        let created = service.create(create_smtp(true)).await.unwrap();

        let mut stale = created.clone();
        stale.settings.host = "cached.example.com".into();
        cache::set_credential(&fixture.cache, &stale, Duration::from_secs(60))
            .await
            .unwrap();

        let loaded = service
            .load_for_send(created.app_mail.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.settings.host, "cached.example.com");
    }

    #[tokio::test]
    async fn test_list_paginates() {
        let fixture = Fixture::new();
        let service = fixture.smtps();
        for i in 0..3 {
            let mut request = create_smtp(false);
            request.mail = format!("user{i}@example.com");
            service.create(request).await.unwrap();
        }

        let page = service
            .list(&ListQuery {
                page: Some(2),
                limit: Some(2),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.page_count, 2);
        assert_eq!(page.items.len(), 1);
    }

    #[tokio::test]
    async fn test_list_rejects_page_past_range() {
        let fixture = Fixture::new();
        let service = fixture.smtps();
        service.create(create_smtp(false)).await.unwrap();

        let result = service
            .list(&ListQuery {
                page: Some(i64::MAX),
                limit: Some(10),
                ..Default::default()
            })
            .await;
        assert!(matches!(result, Err(MailError::Validation(_))));

        let page = service
            .list(&ListQuery {
                limit: Some(i64::MAX),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.limit, 100);
        assert_eq!(page.items.len(), 1);
    }

    #[tokio::test]
    async fn test_list_filters_and_sorts() {
        let fixture = Fixture::new();
        let service = fixture.smtps();
        for (app, host, primary) in [
            ("Admin", "b.example.com", true),
            ("Shop", "c.example.com", false),
            ("Admin", "a.example.com", false),
        ] {
            let mut request = create_smtp(primary);
            request.app = app.into();
            request.mail = format!("{}@example.com", &host[..1]);
            request.host = host.into();
            service.create(request).await.unwrap();
        }

        let hosts = |page: Page<Credential<Smtp>>| -> Vec<String> {
            page.items.into_iter().map(|c| c.settings.host).collect()
        };

        let sorted = service
            .list(&ListQuery {
                sort: Some("host".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(hosts(sorted), ["a.example.com", "b.example.com", "c.example.com"]);

        let admin = service
            .list(&ListQuery {
                app: Some("Admin".into()),
                sort: Some("-host".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(admin.total, 2);
        assert_eq!(hosts(admin), ["b.example.com", "a.example.com"]);

        let primaries = service
            .list(&ListQuery {
                primary_type: Some("SMTP".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(hosts(primaries), ["b.example.com"]);

        let by_mail = service
            .list(&ListQuery {
                mail: Some("c@example.com".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(hosts(by_mail), ["c.example.com"]);

        let unsortable = service
            .list(&ListQuery {
                sort: Some("password".into()),
                ..Default::default()
            })
            .await;
        assert!(matches!(unsortable, Err(MailError::Validation(_))));
    }

    fn gmail_service(fixture: &Fixture, exchanger: MockTokenExchanger) -> OauthService<Gmail> {
        let config = MailConfig::new(KEY, Duration::from_secs(60), "https://mail.example.com");
        OauthService::new(
            fixture.service::<Gmail>(Arc::new(fixture.cache.clone())),
            Arc::new(exchanger),
            &config,
        )
    }

    async fn create_gmail(service: &OauthService<Gmail>) -> Credential<Gmail> {
        service
            .credentials()
            .create(crate::models::CreateGmail {
                app: "Admin".into(),
                mail: "noreply@example.com".into(),
                client_id: "client".into(),
                secret: "secret".into(),
                user: "me".into(),
                primary: true,
            })
            .await
            .unwrap()
    }

    fn grant(access: &str, refresh: Option<&str>) -> TokenGrant {
        TokenGrant {
            access_token: access.into(),
            refresh_token: refresh.map(str::to_string),
            token_type: "Bearer".into(),
            expires_in: Some(3600),
            ext_expires_in: None,
        }
    }

    #[tokio::test]
    async fn test_callback_persists_token() {
        let fixture = Fixture::new();
        let mut exchanger = MockTokenExchanger::new();
        exchanger
            .expect_exchange_code()
            .withf(|client, redirect, code| {
                client.client_id == "client"
                    && redirect.to_string() == "https://mail.example.com/v1/oauth2/gmails/callback"
                    && code.to_string() == "auth-code"
            })
            .times(1)
            .returning(|_, _, _| Ok(grant("access-1", Some("refresh-1"))));
        let service = gmail_service(&fixture, exchanger);
        let created = create_gmail(&service).await;

        let authorized = service
            .callback(&created.id.to_string(), "auth-code")
            .await
            .unwrap();

        let token = authorized.settings.token.unwrap();
        assert_eq!(token.access_token, "access-1");
        assert_eq!(token.refresh_token.as_deref(), Some("refresh-1"));
        assert!(token.expiry.is_some());
    }

    #[tokio::test]
    async fn test_callback_rejects_non_numeric_state() {
        let fixture = Fixture::new();
        let service = gmail_service(&fixture, MockTokenExchanger::new());

        assert!(matches!(
            service.callback("abc", "code").await,
            Err(MailError::Validation(_))
        ));
        assert!(matches!(
            service.callback("999", "code").await,
            Err(MailError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_access_token_requires_authorization() {
        let fixture = Fixture::new();
        let service = gmail_service(&fixture, MockTokenExchanger::new());
        let created = create_gmail(&service).await;

        let result = service.access_token(created).await;
        assert!(matches!(result, Err(MailError::SendMail(msg)) if msg == "not authenticated"));
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed() {
        let fixture = Fixture::new();
        let mut exchanger = MockTokenExchanger::new();
        exchanger
            .expect_refresh()
            .withf(|_, refresh| refresh.to_string() == "refresh-1")
            .times(1)
            .returning(|_, _| Ok(grant("access-2", None)));
        let service = gmail_service(&fixture, exchanger);

        let mut created = create_gmail(&service).await;
        created.settings.token = Some(TokenBundle {
            access_token: "access-1".into(),
            refresh_token: Some("refresh-1".into()),
            token_type: "Bearer".into(),
            expiry: Some(Utc::now() - chrono::Duration::minutes(5)),
            expires_in: Some(3600),
        });
        let created = service.credentials().save(created).await.unwrap();

        let access = service.access_token(created.clone()).await.unwrap();
        assert_eq!(access, "access-2");

        let stored = service.credentials().get(created.id, false).await.unwrap();
        let token = stored.settings.token.unwrap();
        assert_eq!(token.access_token, "access-2");
        assert_eq!(token.refresh_token.as_deref(), Some("refresh-1"));
    }

    #[tokio::test]
    async fn test_app_service_is_idempotent() {
        let links = InMemoryAppMailRepository::new();
        let service = AppService::new(Arc::new(links));

        let request = CreateApp {
            name: "Admin".into(),
        };
        service.create(request.clone()).await.unwrap();
        service.create(request).await.unwrap();
        assert!(service.exists("Admin").await.unwrap());

        let invalid = service.create(CreateApp { name: String::new() }).await;
        assert!(matches!(invalid, Err(MailError::Validation(_))));
    }
}
