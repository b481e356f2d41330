use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{MailError, MailResult};
use crate::models::{AppMail, Credential, ListFilter, NewSendRecord, Provider, ProviderType};

/// Apps, mails and the links between them.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AppMailRepository: Send + Sync {
    /// Insert the app unless it already exists
    async fn ensure_app(&self, name: &str) -> MailResult<()>;

    /// Insert the mail unless it already exists
    async fn ensure_mail(&self, name: &str) -> MailResult<()>;

    async fn app_exists(&self, name: &str) -> MailResult<bool>;

    async fn mail_exists(&self, name: &str) -> MailResult<bool>;

    async fn find(&self, app: &str, mail: &str) -> MailResult<Option<AppMail>>;

    async fn find_by_id(&self, id: i64) -> MailResult<Option<AppMail>>;

    /// Link an existing app and mail, returning the existing link if present
    async fn find_or_create(&self, app: &str, mail: &str) -> MailResult<AppMail>;

    async fn set_primary_type(
        &self,
        id: i64,
        primary_type: Option<ProviderType>,
    ) -> MailResult<AppMail>;
}

/// Storage of one provider's credentials.
///
/// Every returned credential carries the current state of its link. Rows with
/// a tombstone are hidden unless a method says otherwise.
#[async_trait]
pub trait CredentialRepository<S: Provider>: Send + Sync {
    /// Persist a new credential; `id` and timestamps are assigned here
    async fn insert(&self, credential: Credential<S>) -> MailResult<Credential<S>>;

    async fn find_by_id(&self, id: i64, include_deleted: bool) -> MailResult<Option<Credential<S>>>;

    /// Id of the live credential of a link, if any
    async fn find_live_id_by_app_mail(&self, app_mail_id: i64) -> MailResult<Option<i64>>;

    /// Overwrite every settings column and bump `updated_at`
    async fn save(&self, credential: Credential<S>) -> MailResult<Credential<S>>;

    /// Set or clear the tombstone, ignoring the soft-delete filter
    async fn set_deleted_at(
        &self,
        id: i64,
        deleted_at: Option<DateTime<Utc>>,
    ) -> MailResult<Credential<S>>;

    /// One page of the live credentials passing `filter`, with the total
    /// count of matching rows
    async fn list(&self, filter: &ListFilter) -> MailResult<(Vec<Credential<S>>, u64)>;
}

/// Write-once audit log of accepted send requests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SendRecordRepository: Send + Sync {
    async fn insert(&self, record: NewSendRecord) -> MailResult<i64>;
}

#[derive(Debug, Default)]
struct LinkState {
    apps: BTreeSet<String>,
    mails: BTreeSet<String>,
    links: BTreeMap<i64, AppMail>,
    next_id: i64,
}

/// In-memory implementation of AppMailRepository (for development/testing)
#[derive(Debug, Default, Clone)]
pub struct InMemoryAppMailRepository {
    state: Arc<RwLock<LinkState>>,
}

impl InMemoryAppMailRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AppMailRepository for InMemoryAppMailRepository {
    async fn ensure_app(&self, name: &str) -> MailResult<()> {
        self.state.write().await.apps.insert(name.to_string());
        Ok(())
    }

    async fn ensure_mail(&self, name: &str) -> MailResult<()> {
        self.state.write().await.mails.insert(name.to_string());
        Ok(())
    }

    async fn app_exists(&self, name: &str) -> MailResult<bool> {
        Ok(self.state.read().await.apps.contains(name))
    }

    async fn mail_exists(&self, name: &str) -> MailResult<bool> {
        Ok(self.state.read().await.mails.contains(name))
    }

    async fn find(&self, app: &str, mail: &str) -> MailResult<Option<AppMail>> {
        let state = self.state.read().await;
        Ok(state
            .links
            .values()
            .find(|link| link.app == app && link.mail == mail)
            .cloned())
    }

    async fn find_by_id(&self, id: i64) -> MailResult<Option<AppMail>> {
        Ok(self.state.read().await.links.get(&id).cloned())
    }

    async fn find_or_create(&self, app: &str, mail: &str) -> MailResult<AppMail> {
        let mut state = self.state.write().await;

        if let Some(link) = state
            .links
            .values()
            .find(|link| link.app == app && link.mail == mail)
        {
            return Ok(link.clone());
        }

        if !state.apps.contains(app) || !state.mails.contains(mail) {
            return Err(MailError::Store(format!(
                "cannot link unknown app {app} and mail {mail}"
            )));
        }

        state.next_id += 1;
        let link = AppMail {
            id: state.next_id,
            app: app.to_string(),
            mail: mail.to_string(),
            primary_type: None,
        };
        state.links.insert(link.id, link.clone());
        Ok(link)
    }

    async fn set_primary_type(
        &self,
        id: i64,
        primary_type: Option<ProviderType>,
    ) -> MailResult<AppMail> {
        let mut state = self.state.write().await;
        let link = state
            .links
            .get_mut(&id)
            .ok_or_else(|| MailError::NotFound(format!("app mail {id}")))?;
        link.primary_type = primary_type;
        Ok(link.clone())
    }
}

#[derive(Debug)]
struct CredentialRows<S> {
    rows: BTreeMap<i64, Credential<S>>,
    next_id: i64,
}

/// In-memory implementation of CredentialRepository (for development/testing)
///
/// Shares the link store so returned credentials reflect the current primary
/// type, the same way the joined SQL read does.
#[derive(Debug, Clone)]
pub struct InMemoryCredentialRepository<S> {
    links: InMemoryAppMailRepository,
    rows: Arc<RwLock<CredentialRows<S>>>,
}

impl<S: Provider> InMemoryCredentialRepository<S> {
    pub fn new(links: InMemoryAppMailRepository) -> Self {
        Self {
            links,
            rows: Arc::new(RwLock::new(CredentialRows {
                rows: BTreeMap::new(),
                next_id: 0,
            })),
        }
    }

    async fn hydrate(&self, mut credential: Credential<S>) -> MailResult<Credential<S>> {
        let id = credential.app_mail.id;
        credential.app_mail = self
            .links
            .find_by_id(id)
            .await?
            .ok_or_else(|| MailError::Store(format!("app mail {id} vanished")))?;
        Ok(credential)
    }

    fn live_conflict(rows: &BTreeMap<i64, Credential<S>>, app_mail_id: i64, id: i64) -> bool {
        rows.values().any(|row| {
            row.id != id && row.app_mail.id == app_mail_id && row.deleted_at.is_none()
        })
    }
}

#[async_trait]
impl<S: Provider> CredentialRepository<S> for InMemoryCredentialRepository<S> {
    async fn insert(&self, mut credential: Credential<S>) -> MailResult<Credential<S>> {
        let stored = {
            let mut rows = self.rows.write().await;
            if Self::live_conflict(&rows.rows, credential.app_mail.id, 0) {
                return Err(MailError::Conflict(format!(
                    "{} already configured for app mail {}",
                    S::TYPE,
                    credential.app_mail.id
                )));
            }

            rows.next_id += 1;
            let now = Utc::now();
            credential.id = rows.next_id;
            credential.created_at = now;
            credential.updated_at = now;
            credential.deleted_at = None;
            rows.rows.insert(credential.id, credential.clone());
            credential
        };

        self.hydrate(stored).await
    }

    async fn find_by_id(&self, id: i64, include_deleted: bool) -> MailResult<Option<Credential<S>>> {
        let found = self
            .rows
            .read()
            .await
            .rows
            .get(&id)
            .filter(|row| include_deleted || row.deleted_at.is_none())
            .cloned();

        match found {
            Some(credential) => self.hydrate(credential).await.map(Some),
            None => Ok(None),
        }
    }

    async fn find_live_id_by_app_mail(&self, app_mail_id: i64) -> MailResult<Option<i64>> {
        let rows = self.rows.read().await;
        Ok(rows
            .rows
            .values()
            .find(|row| row.app_mail.id == app_mail_id && row.deleted_at.is_none())
            .map(|row| row.id))
    }

    async fn save(&self, mut credential: Credential<S>) -> MailResult<Credential<S>> {
        let saved = {
            let mut rows = self.rows.write().await;
            let row = rows
                .rows
                .get_mut(&credential.id)
                .ok_or_else(|| MailError::NotFound(format!("{} {}", S::TYPE, credential.id)))?;
            credential.created_at = row.created_at;
            credential.deleted_at = row.deleted_at;
            credential.updated_at = Utc::now();
            *row = credential.clone();
            credential
        };

        self.hydrate(saved).await
    }

    async fn set_deleted_at(
        &self,
        id: i64,
        deleted_at: Option<DateTime<Utc>>,
    ) -> MailResult<Credential<S>> {
        let updated = {
            let mut rows = self.rows.write().await;
            let app_mail_id = rows
                .rows
                .get(&id)
                .map(|row| row.app_mail.id)
                .ok_or_else(|| MailError::NotFound(format!("{} {}", S::TYPE, id)))?;

            if deleted_at.is_none() && Self::live_conflict(&rows.rows, app_mail_id, id) {
                return Err(MailError::Conflict(format!(
                    "{} already configured for app mail {app_mail_id}",
                    S::TYPE
                )));
            }

            let row = rows
                .rows
                .get_mut(&id)
                .ok_or_else(|| MailError::NotFound(format!("{} {}", S::TYPE, id)))?;
            row.deleted_at = deleted_at;
            row.updated_at = Utc::now();
            row.clone()
        };

        self.hydrate(updated).await
    }

    async fn list(&self, filter: &ListFilter) -> MailResult<(Vec<Credential<S>>, u64)> {
        let live: Vec<Credential<S>> = self
            .rows
            .read()
            .await
            .rows
            .values()
            .filter(|row| row.deleted_at.is_none())
            .cloned()
            .collect();

        // Filters and sorts may look at the pairing, so hydrate first.
        let mut matching = Vec::with_capacity(live.len());
        for credential in live {
            let credential = self.hydrate(credential).await?;
            if filter.matches(&credential) {
                matching.push(credential);
            }
        }
        matching.sort_by(|a, b| filter.compare(a, b));

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(usize::try_from(filter.offset).unwrap_or(usize::MAX))
            .take(usize::try_from(filter.limit).unwrap_or(usize::MAX))
            .collect();
        Ok((items, total))
    }
}

/// In-memory implementation of SendRecordRepository (for development/testing)
#[derive(Debug, Default, Clone)]
pub struct InMemorySendRecordRepository {
    records: Arc<RwLock<Vec<NewSendRecord>>>,
}

impl InMemorySendRecordRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, oldest first
    pub async fn records(&self) -> Vec<NewSendRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl SendRecordRepository for InMemorySendRecordRepository {
    async fn insert(&self, record: NewSendRecord) -> MailResult<i64> {
        let mut records = self.records.write().await;
        records.push(record);
        Ok(records.len() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Smtp, Sort};

    fn smtp(host: &str) -> Smtp {
        Smtp {
            username: "mailer".into(),
            password: "cipher".into(),
            host: host.into(),
            port: 587,
            dkim_private_key: None,
            dkim_domain: None,
            dkim_canonicalization: None,
        }
    }

    async fn linked(links: &InMemoryAppMailRepository) -> AppMail {
        links.ensure_app("Admin").await.unwrap();
        links.ensure_mail("noreply@example.com").await.unwrap();
        links
            .find_or_create("Admin", "noreply@example.com")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_find_or_create_is_idempotent() {
        let links = InMemoryAppMailRepository::new();
        let first = linked(&links).await;
        let second = links
            .find_or_create("Admin", "noreply@example.com")
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert!(links.app_exists("Admin").await.unwrap());
        assert!(!links.mail_exists("other@example.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_link_requires_app_and_mail() {
        let links = InMemoryAppMailRepository::new();
        links.ensure_app("Admin").await.unwrap();

        let result = links.find_or_create("Admin", "nobody@example.com").await;
        assert!(matches!(result, Err(MailError::Store(_))));
    }

    #[tokio::test]
    async fn test_credentials_reflect_primary_type() {
        let links = InMemoryAppMailRepository::new();
        let repo = InMemoryCredentialRepository::<Smtp>::new(links.clone());
        let link = linked(&links).await;

        let created = repo
            .insert(Credential::new(link.clone(), smtp("smtp.example.com")))
            .await
            .unwrap();
        assert!(!created.is_primary());

        links
            .set_primary_type(link.id, Some(ProviderType::Smtp))
            .await
            .unwrap();
        let fetched = repo.find_by_id(created.id, false).await.unwrap().unwrap();
        assert!(fetched.is_primary());
    }

    #[tokio::test]
    async fn test_soft_delete_hides_row() {
        let links = InMemoryAppMailRepository::new();
        let repo = InMemoryCredentialRepository::<Smtp>::new(links.clone());
        let link = linked(&links).await;
        let created = repo
            .insert(Credential::new(link.clone(), smtp("smtp.example.com")))
            .await
            .unwrap();

        repo.set_deleted_at(created.id, Some(Utc::now())).await.unwrap();

        assert!(repo.find_by_id(created.id, false).await.unwrap().is_none());
        assert!(repo.find_by_id(created.id, true).await.unwrap().is_some());
        assert_eq!(repo.find_live_id_by_app_mail(link.id).await.unwrap(), None);
        assert_eq!(repo.list(&ListFilter::default()).await.unwrap().1, 0);

        repo.set_deleted_at(created.id, None).await.unwrap();
        assert_eq!(
            repo.find_live_id_by_app_mail(link.id).await.unwrap(),
            Some(created.id)
        );
    }

    #[tokio::test]
    async fn test_one_live_credential_per_link() {
        let links = InMemoryAppMailRepository::new();
        let repo = InMemoryCredentialRepository::<Smtp>::new(links.clone());
        let link = linked(&links).await;

        let first = repo
            .insert(Credential::new(link.clone(), smtp("a.example.com")))
            .await
            .unwrap();
        let duplicate = repo
            .insert(Credential::new(link.clone(), smtp("b.example.com")))
            .await;
        assert!(matches!(duplicate, Err(MailError::Conflict(_))));

        repo.set_deleted_at(first.id, Some(Utc::now())).await.unwrap();
        let second = repo
            .insert(Credential::new(link, smtp("b.example.com")))
            .await
            .unwrap();

        let restore = repo.set_deleted_at(first.id, None).await;
        assert!(matches!(restore, Err(MailError::Conflict(_))));
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let links = InMemoryAppMailRepository::new();
        let repo = InMemoryCredentialRepository::<Smtp>::new(links.clone());
        links.ensure_app("Admin").await.unwrap();

        for i in 0..3 {
            let mail = format!("user{i}@example.com");
            links.ensure_mail(&mail).await.unwrap();
            let link = links.find_or_create("Admin", &mail).await.unwrap();
            repo.insert(Credential::new(link, smtp(&format!("smtp{i}.example.com"))))
                .await
                .unwrap();
        }

        let page = |offset| ListFilter {
            limit: 2,
            offset,
            ..Default::default()
        };
        let (items, total) = repo.list(&page(0)).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].settings.host, "smtp2.example.com");

        let (rest, _) = repo.list(&page(2)).await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].settings.host, "smtp0.example.com");
    }

    #[tokio::test]
    async fn test_list_filters_and_sorts_by_pairing() {
        let links = InMemoryAppMailRepository::new();
        let repo = InMemoryCredentialRepository::<Smtp>::new(links.clone());

        for (app, port) in [("Admin", 587), ("Shop", 25), ("Admin", 465)] {
            let mail = format!("port{port}@example.com");
            links.ensure_app(app).await.unwrap();
            links.ensure_mail(&mail).await.unwrap();
            let link = links.find_or_create(app, &mail).await.unwrap();
            let mut settings = smtp("smtp.example.com");
            settings.port = port;
            repo.insert(Credential::new(link, settings)).await.unwrap();
        }
        let shop = links.find("Shop", "port25@example.com").await.unwrap().unwrap();
        links
            .set_primary_type(shop.id, Some(ProviderType::Smtp))
            .await
            .unwrap();

        let by_port = ListFilter {
            sort: Sort::parse::<Smtp>("port").unwrap(),
            ..Default::default()
        };
        let (items, total) = repo.list(&by_port).await.unwrap();
        assert_eq!(total, 3);
        let ports: Vec<u16> = items.iter().map(|c| c.settings.port).collect();
        assert_eq!(ports, vec![25, 465, 587]);

        let admin_desc = ListFilter {
            app: Some("Admin".into()),
            sort: Sort::parse::<Smtp>("-port").unwrap(),
            ..Default::default()
        };
        let (items, total) = repo.list(&admin_desc).await.unwrap();
        assert_eq!(total, 2);
        let ports: Vec<u16> = items.iter().map(|c| c.settings.port).collect();
        assert_eq!(ports, vec![587, 465]);

        let primaries = ListFilter {
            primary_type: Some(ProviderType::Smtp),
            ..Default::default()
        };
        let (items, total) = repo.list(&primaries).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].app_mail.app, "Shop");

        // Pairings without a primary type sort after those with one.
        let by_primary = ListFilter {
            sort: Sort::parse::<Smtp>("primary_type").unwrap(),
            ..Default::default()
        };
        let (items, _) = repo.list(&by_primary).await.unwrap();
        assert_eq!(items[0].app_mail.app, "Shop");
    }
}
