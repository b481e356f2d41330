use super::{TokenColumns, to_utc};
use crate::error::MailResult;
use crate::models::{AppMail, Credential, Gmail};
use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "gmails")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub app_mail_id: i64,
    pub client_id: String,
    #[sea_orm(column_type = "Text")]
    pub secret: String,
    pub user: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub access_token: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub refresh_token: Option<String>,
    pub token_type: Option<String>,
    pub expiry: Option<DateTimeWithTimeZone>,
    pub expires_in: Option<i64>,
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
    pub(crate) fn into_credential(self, app_mail: AppMail) -> MailResult<Credential<Gmail>> {
        let token = TokenColumns {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            token_type: self.token_type,
            expiry: self.expiry,
            expires_in: self.expires_in,
        }
        .into_bundle();

        Ok(Credential {
            id: self.id,
            app_mail,
            settings: Gmail {
                client_id: self.client_id,
                secret: self.secret,
                user: self.user,
                token,
            },
            created_at: to_utc(self.created_at),
            updated_at: to_utc(self.updated_at),
            deleted_at: self.deleted_at.map(to_utc),
        })
    }
}

pub(crate) fn active_model(credential: &Credential<Gmail>) -> ActiveModel {
    let settings = &credential.settings;
    let token = TokenColumns::from_bundle(settings.token.as_ref());
    ActiveModel {
        id: if credential.id == 0 { NotSet } else { Set(credential.id) },
        app_mail_id: Set(credential.app_mail.id),
        client_id: Set(settings.client_id.clone()),
        secret: Set(settings.secret.clone()),
        user: Set(settings.user.clone()),
        access_token: Set(token.access_token),
        refresh_token: Set(token.refresh_token),
        token_type: Set(token.token_type),
        expiry: Set(token.expiry),
        expires_in: Set(token.expires_in),
        created_at: Set(credential.created_at.into()),
        updated_at: Set(credential.updated_at.into()),
        deleted_at: Set(credential.deleted_at.map(Into::into)),
    }
}
