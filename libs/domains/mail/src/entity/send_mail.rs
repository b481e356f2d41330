use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "send_mails")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub app_mail_id: i64,
    pub primary_type: String,
    pub from_name: String,
    pub from_mail: String,
    pub to: String,
    #[sea_orm(column_type = "Text")]
    pub subject: String,
    #[sea_orm(column_type = "Text")]
    pub body: String,
    pub mime_type: String,
    pub ccs: Json,
    pub bccs: Json,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
