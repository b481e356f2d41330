use super::to_utc;
use crate::error::{MailError, MailResult};
use crate::models::{AppMail, Credential, DkimCanonicalization, Smtp};
use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::entity::prelude::*;
use std::str::FromStr;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "smtps")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub app_mail_id: i64,
    pub username: String,
    #[sea_orm(column_type = "Text")]
    pub password: String,
    pub host: String,
    pub port: i32,
    #[sea_orm(column_type = "Text", nullable)]
    pub dkim_private_key: Option<String>,
    pub dkim_domain: Option<String>,
    pub dkim_canonicalization_name: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
    pub deleted_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::app_mail::Entity",
        from = "Column::AppMailId",
        to = "super::app_mail::Column::Id"
    )]
    AppMail,
}

impl Related<super::app_mail::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AppMail.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub(crate) fn into_credential(self, app_mail: AppMail) -> MailResult<Credential<Smtp>> {
        let port = u16::try_from(self.port).map_err(|_| {
            MailError::Store(format!("smtp {} has invalid port {}", self.id, self.port))
        })?;

        Ok(Credential {
            id: self.id,
            app_mail,
            settings: Smtp {
                username: self.username,
                password: self.password,
                host: self.host,
                port,
                dkim_private_key: self.dkim_private_key,
                dkim_domain: self.dkim_domain,
                dkim_canonicalization: self
                    .dkim_canonicalization_name
                    .as_deref()
                    .and_then(|name| DkimCanonicalization::from_str(name).ok()),
            },
            created_at: to_utc(self.created_at),
            updated_at: to_utc(self.updated_at),
            deleted_at: self.deleted_at.map(to_utc),
        })
    }
}

pub(crate) fn active_model(credential: &Credential<Smtp>) -> ActiveModel {
    let settings = &credential.settings;
    ActiveModel {
        id: if credential.id == 0 { NotSet } else { Set(credential.id) },
        app_mail_id: Set(credential.app_mail.id),
        username: Set(settings.username.clone()),
        password: Set(settings.password.clone()),
        host: Set(settings.host.clone()),
        port: Set(i32::from(settings.port)),
        dkim_private_key: Set(settings.dkim_private_key.clone()),
        dkim_domain: Set(settings.dkim_domain.clone()),
        dkim_canonicalization_name: Set(settings.dkim_canonicalization.map(|c| c.to_string())),
        created_at: Set(credential.created_at.into()),
        updated_at: Set(credential.updated_at.into()),
        deleted_at: Set(credential.deleted_at.map(Into::into)),
    }
}
