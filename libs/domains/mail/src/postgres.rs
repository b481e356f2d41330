use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, JoinType, Order,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, SqlErr, TransactionTrait,
};
use std::collections::HashMap;
use std::str::FromStr;

use crate::entity::{self, app, app_mail, mail, send_mail, send_mail_attachment};
use crate::error::{MailError, MailResult};
use crate::models::{
    AppMail, Azure, Credential, Gmail, ListFilter, NewSendRecord, ProviderType, Smtp, SortColumn,
};
use crate::repository::{AppMailRepository, CredentialRepository, SendRecordRepository};

/// Unique violations become conflicts, everything else is a store error.
fn map_write_err(err: DbErr, what: impl FnOnce() -> String) -> MailError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => MailError::Conflict(what()),
        _ => MailError::from(err),
    }
}

#[derive(Clone)]
pub struct PgAppMailRepository {
    db: DatabaseConnection,
}

impl PgAppMailRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AppMailRepository for PgAppMailRepository {
    async fn ensure_app(&self, name: &str) -> MailResult<()> {
        app::Entity::insert(app::ActiveModel {
            name: Set(name.to_string()),
        })
        .on_conflict(OnConflict::column(app::Column::Name).do_nothing().to_owned())
        .exec_without_returning(&self.db)
        .await?;
        Ok(())
    }

    async fn ensure_mail(&self, name: &str) -> MailResult<()> {
        mail::Entity::insert(mail::ActiveModel {
            name: Set(name.to_string()),
        })
        .on_conflict(OnConflict::column(mail::Column::Name).do_nothing().to_owned())
        .exec_without_returning(&self.db)
        .await?;
        Ok(())
    }

    async fn app_exists(&self, name: &str) -> MailResult<bool> {
        Ok(app::Entity::find_by_id(name.to_string())
            .one(&self.db)
            .await?
            .is_some())
    }

    async fn mail_exists(&self, name: &str) -> MailResult<bool> {
        Ok(mail::Entity::find_by_id(name.to_string())
            .one(&self.db)
            .await?
            .is_some())
    }

    async fn find(&self, app: &str, mail: &str) -> MailResult<Option<AppMail>> {
        let model = app_mail::Entity::find()
            .filter(app_mail::Column::AppName.eq(app))
            .filter(app_mail::Column::MailName.eq(mail))
            .one(&self.db)
            .await?;
        Ok(model.map(Into::into))
    }

    async fn find_by_id(&self, id: i64) -> MailResult<Option<AppMail>> {
        Ok(app_mail::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .map(Into::into))
    }

    async fn find_or_create(&self, app: &str, mail: &str) -> MailResult<AppMail> {
        if let Some(existing) = self.find(app, mail).await? {
            return Ok(existing);
        }

        app_mail::Entity::insert(app_mail::ActiveModel {
            id: NotSet,
            app_name: Set(app.to_string()),
            mail_name: Set(mail.to_string()),
            primary_type: Set(None),
        })
        .on_conflict(
            OnConflict::columns([app_mail::Column::AppName, app_mail::Column::MailName])
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(&self.db)
        .await?;

        let link = self
            .find(app, mail)
            .await?
            .ok_or_else(|| MailError::Store(format!("failed to link {app} and {mail}")))?;
        tracing::info!(app_mail_id = link.id, app, mail, "Linked app and mail");
        Ok(link)
    }

    async fn set_primary_type(
        &self,
        id: i64,
        primary_type: Option<ProviderType>,
    ) -> MailResult<AppMail> {
        let model = app_mail::ActiveModel {
            id: Set(id),
            primary_type: Set(primary_type.map(|t| t.as_str().to_string())),
            ..Default::default()
        }
        .update(&self.db)
        .await
        .map_err(|e| match e {
            DbErr::RecordNotUpdated => MailError::NotFound(format!("app mail {id}")),
            other => other.into(),
        })?;
        Ok(model.into())
    }
}

async fn load_link(db: &DatabaseConnection, id: i64) -> MailResult<AppMail> {
    app_mail::Entity::find_by_id(id)
        .one(db)
        .await?
        .map(Into::into)
        .ok_or_else(|| MailError::Store(format!("app mail {id} vanished")))
}

async fn load_links(db: &DatabaseConnection, ids: Vec<i64>) -> MailResult<HashMap<i64, AppMail>> {
    let models = app_mail::Entity::find()
        .filter(app_mail::Column::Id.is_in(ids))
        .all(db)
        .await?;
    Ok(models.into_iter().map(|m| (m.id, m.into())).collect())
}

/// One repository per credential table; the tables only differ in their
/// settings columns.
macro_rules! pg_credential_repository {
    ($(#[$meta:meta])* $name:ident, $provider:ty, $table:ident) => {
        $(#[$meta])*
        #[derive(Clone)]
        pub struct $name {
            db: DatabaseConnection,
        }

        impl $name {
            pub fn new(db: DatabaseConnection) -> Self {
                Self { db }
            }
        }

        #[async_trait]
        impl CredentialRepository<$provider> for $name {
            async fn insert(
                &self,
                credential: Credential<$provider>,
            ) -> MailResult<Credential<$provider>> {
                let app_mail = credential.app_mail.clone();
                let model = entity::$table::active_model(&credential)
                    .insert(&self.db)
                    .await
                    .map_err(|e| {
                        map_write_err(e, || {
                            format!(
                                "{} already configured for {} / {}",
                                <$provider as crate::models::Provider>::TYPE,
                                app_mail.app,
                                app_mail.mail
                            )
                        })
                    })?;

                tracing::info!(credential_id = model.id, app_mail_id = app_mail.id, "Inserted credential");
                model.into_credential(load_link(&self.db, app_mail.id).await?)
            }

            async fn find_by_id(
                &self,
                id: i64,
                include_deleted: bool,
            ) -> MailResult<Option<Credential<$provider>>> {
                let mut query = entity::$table::Entity::find_by_id(id);
                if !include_deleted {
                    query = query.filter(entity::$table::Column::DeletedAt.is_null());
                }

                match query.one(&self.db).await? {
                    Some(model) => {
                        let link = load_link(&self.db, model.app_mail_id).await?;
                        model.into_credential(link).map(Some)
                    }
                    None => Ok(None),
                }
            }

            async fn find_live_id_by_app_mail(&self, app_mail_id: i64) -> MailResult<Option<i64>> {
                let model = entity::$table::Entity::find()
                    .filter(entity::$table::Column::AppMailId.eq(app_mail_id))
                    .filter(entity::$table::Column::DeletedAt.is_null())
                    .one(&self.db)
                    .await?;
                Ok(model.map(|m| m.id))
            }

            async fn save(
                &self,
                credential: Credential<$provider>,
            ) -> MailResult<Credential<$provider>> {
                let id = credential.id;
                let mut active = entity::$table::active_model(&credential);
                active.created_at = NotSet;
                active.deleted_at = NotSet;
                active.updated_at = Set(Utc::now().into());

                let model = active.update(&self.db).await.map_err(|e| match e {
                    DbErr::RecordNotUpdated => MailError::NotFound(format!(
                        "{} {id}",
                        <$provider as crate::models::Provider>::TYPE
                    )),
                    other => other.into(),
                })?;

                let link = load_link(&self.db, model.app_mail_id).await?;
                model.into_credential(link)
            }

            async fn set_deleted_at(
                &self,
                id: i64,
                deleted_at: Option<DateTime<Utc>>,
            ) -> MailResult<Credential<$provider>> {
                let model = entity::$table::ActiveModel {
                    id: Set(id),
                    deleted_at: Set(deleted_at.map(Into::into)),
                    updated_at: Set(Utc::now().into()),
                    ..Default::default()
                }
                .update(&self.db)
                .await
                .map_err(|e| match e {
                    DbErr::RecordNotUpdated => MailError::NotFound(format!(
                        "{} {id}",
                        <$provider as crate::models::Provider>::TYPE
                    )),
                    other => map_write_err(other, || {
                        format!(
                            "another {} is live for this app mail",
                            <$provider as crate::models::Provider>::TYPE
                        )
                    }),
                })?;

                let link = load_link(&self.db, model.app_mail_id).await?;
                model.into_credential(link)
            }

            async fn list(
                &self,
                filter: &ListFilter,
            ) -> MailResult<(Vec<Credential<$provider>>, u64)> {
                let mut query = entity::$table::Entity::find()
                    .join(JoinType::InnerJoin, entity::$table::Relation::AppMail.def())
                    .filter(entity::$table::Column::DeletedAt.is_null());
                if let Some(app) = &filter.app {
                    query = query.filter(app_mail::Column::AppName.eq(app.as_str()));
                }
                if let Some(mail) = &filter.mail {
                    query = query.filter(app_mail::Column::MailName.eq(mail.as_str()));
                }
                if let Some(primary_type) = filter.primary_type {
                    query = query.filter(app_mail::Column::PrimaryType.eq(primary_type.as_str()));
                }

                let total = query.clone().count(&self.db).await?;

                let order = if filter.sort.descending { Order::Desc } else { Order::Asc };
                query = match filter.sort.column {
                    SortColumn::Id => query,
                    SortColumn::CreatedAt => {
                        query.order_by(entity::$table::Column::CreatedAt, order.clone())
                    }
                    SortColumn::UpdatedAt => {
                        query.order_by(entity::$table::Column::UpdatedAt, order.clone())
                    }
                    SortColumn::AppName => query.order_by(app_mail::Column::AppName, order.clone()),
                    SortColumn::MailName => query.order_by(app_mail::Column::MailName, order.clone()),
                    SortColumn::PrimaryType => {
                        query.order_by(app_mail::Column::PrimaryType, order.clone())
                    }
                    SortColumn::Setting(name) => {
                        let column = entity::$table::Column::from_str(name).map_err(|_| {
                            MailError::Validation(format!("cannot sort by {name}"))
                        })?;
                        query.order_by(column, order.clone())
                    }
                };

                let models = query
                    .order_by(entity::$table::Column::Id, order)
                    .offset(filter.offset)
                    .limit(filter.limit)
                    .all(&self.db)
                    .await?;

                let links =
                    load_links(&self.db, models.iter().map(|m| m.app_mail_id).collect()).await?;
                let items = models
                    .into_iter()
                    .map(|model| {
                        let link = links.get(&model.app_mail_id).cloned().ok_or_else(|| {
                            MailError::Store(format!("app mail {} vanished", model.app_mail_id))
                        })?;
                        model.into_credential(link)
                    })
                    .collect::<MailResult<Vec<_>>>()?;

                Ok((items, total))
            }
        }
    };
}

pg_credential_repository!(
    /// SMTP credentials in `smtps`.
    PgSmtpRepository,
    Smtp,
    smtp
);
pg_credential_repository!(
    /// Gmail credentials in `gmails`.
    PgGmailRepository,
    Gmail,
    gmail
);
pg_credential_repository!(
    /// Azure credentials in `azures`.
    PgAzureRepository,
    Azure,
    azure
);

#[derive(Clone)]
pub struct PgSendRecordRepository {
    db: DatabaseConnection,
}

impl PgSendRecordRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SendRecordRepository for PgSendRecordRepository {
    async fn insert(&self, record: NewSendRecord) -> MailResult<i64> {
        let txn = self.db.begin().await?;

        let saved = send_mail::ActiveModel {
            id: NotSet,
            app_mail_id: Set(record.app_mail_id),
            primary_type: Set(record.provider_type.as_str().to_string()),
            from_name: Set(record.from_name),
            from_mail: Set(record.from_mail),
            to: Set(record.to),
            subject: Set(record.subject),
            body: Set(record.body),
            mime_type: Set(record.mime_type),
            ccs: Set(record.ccs.into()),
            bccs: Set(record.bccs.into()),
            created_at: Set(Utc::now().into()),
        }
        .insert(&txn)
        .await?;

        if !record.attachments.is_empty() {
            let attachments = record.attachments.into_iter().map(|attachment| {
                send_mail_attachment::ActiveModel {
                    id: NotSet,
                    send_mail_id: Set(saved.id),
                    file_name: Set(attachment.file_name),
                    file_type: Set(attachment.file_type),
                    file_size: Set(attachment.file_size),
                    file_data: Set(attachment.data),
                }
            });
            send_mail_attachment::Entity::insert_many(attachments)
                .exec_without_returning(&txn)
                .await?;
        }

        txn.commit().await?;
        tracing::debug!(send_mail_id = saved.id, "Recorded send request");
        Ok(saved.id)
    }
}
