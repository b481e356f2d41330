use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AppMails::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AppMails::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AppMails::AppName).string_len(255).not_null())
                    .col(ColumnDef::new(AppMails::MailName).string_len(255).not_null())
                    .col(ColumnDef::new(AppMails::PrimaryType).string_len(32).null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_app_mails_app")
                            .from(AppMails::Table, AppMails::AppName)
                            .to(Apps::Table, Apps::Name)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_app_mails_mail")
                            .from(AppMails::Table, AppMails::MailName)
                            .to(Mails::Table, Mails::Name)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_app_mails_primary_type")
                            .from(AppMails::Table, AppMails::PrimaryType)
                            .to(AppMailPrimaryTypes::Table, AppMailPrimaryTypes::Name)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_app_mails_app_mail")
                    .table(AppMails::Table)
                    .col(AppMails::AppName)
                    .col(AppMails::MailName)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AppMails::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Apps {
    Table,
    Name,
}

#[derive(DeriveIden)]
enum Mails {
    Table,
    Name,
}

#[derive(DeriveIden)]
enum AppMailPrimaryTypes {
    Table,
    Name,
}

#[derive(DeriveIden)]
enum AppMails {
    Table,
    Id,
    AppName,
    MailName,
    PrimaryType,
}
