use crate::models::{AppMail, ProviderType};
use sea_orm::entity::prelude::*;
use std::str::FromStr;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "app_mails")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub app_name: String,
    pub mail_name: String,
    pub primary_type: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for AppMail {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            app: model.app_name,
            mail: model.mail_name,
            primary_type: model
                .primary_type
                .as_deref()
                .and_then(|name| ProviderType::from_str(name).ok()),
        }
    }
}
