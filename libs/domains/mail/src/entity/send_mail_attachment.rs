use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "send_mail_attachments")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub send_mail_id: i64,
    pub file_name: String,
    pub file_type: String,
    pub file_size: i64,
    pub file_data: Vec<u8>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
