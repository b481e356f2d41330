use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SendMails::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SendMails::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SendMails::AppMailId).big_integer().not_null())
                    .col(ColumnDef::new(SendMails::PrimaryType).string_len(32).not_null())
                    .col(ColumnDef::new(SendMails::FromName).string_len(255).not_null().default(""))
                    .col(ColumnDef::new(SendMails::FromMail).string_len(255).not_null().default(""))
                    .col(ColumnDef::new(SendMails::To).string_len(255).not_null())
                    .col(ColumnDef::new(SendMails::Subject).text().not_null())
                    .col(ColumnDef::new(SendMails::Body).text().not_null())
                    .col(ColumnDef::new(SendMails::MimeType).string_len(64).not_null())
                    .col(ColumnDef::new(SendMails::Ccs).json_binary().not_null())
                    .col(ColumnDef::new(SendMails::Bccs).json_binary().not_null())
                    .col(
                        ColumnDef::new(SendMails::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_send_mails_app_mail")
                            .from(SendMails::Table, SendMails::AppMailId)
                            .to(AppMails::Table, AppMails::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_send_mails_primary_type")
                            .from(SendMails::Table, SendMails::PrimaryType)
                            .to(AppMailPrimaryTypes::Table, AppMailPrimaryTypes::Name),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SendMailAttachments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SendMailAttachments::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SendMailAttachments::SendMailId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SendMailAttachments::FileName).string_len(255).not_null())
                    .col(ColumnDef::new(SendMailAttachments::FileType).string_len(255).not_null())
                    .col(ColumnDef::new(SendMailAttachments::FileSize).big_integer().not_null())
                    .col(ColumnDef::new(SendMailAttachments::FileData).binary().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_send_mail_attachments_send_mail")
                            .from(SendMailAttachments::Table, SendMailAttachments::SendMailId)
                            .to(SendMails::Table, SendMails::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_send_mails_app_mail_id")
                    .table(SendMails::Table)
                    .col(SendMails::AppMailId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SendMailAttachments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SendMails::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum AppMails {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum AppMailPrimaryTypes {
    Table,
    Name,
}

#[derive(DeriveIden)]
enum SendMails {
    Table,
    Id,
    AppMailId,
    PrimaryType,
    FromName,
    FromMail,
    To,
    Subject,
    Body,
    MimeType,
    Ccs,
    Bccs,
    CreatedAt,
}

#[derive(DeriveIden)]
enum SendMailAttachments {
    Table,
    Id,
    SendMailId,
    FileName,
    FileType,
    FileSize,
    FileData,
}
