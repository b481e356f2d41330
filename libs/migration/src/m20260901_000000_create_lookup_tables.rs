use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Apps::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Apps::Name).string_len(255).not_null().primary_key())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Mails::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Mails::Name).string_len(255).not_null().primary_key())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AppMailPrimaryTypes::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AppMailPrimaryTypes::Name)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(DkimCanonicalizations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DkimCanonicalizations::Name)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .get_connection()
            .execute_unprepared(
                r#"
                INSERT INTO app_mail_primary_types (name)
                VALUES ('Azure'), ('Gmail'), ('SMTP')
                ON CONFLICT (name) DO NOTHING
                "#,
            )
            .await?;

        manager
            .get_connection()
            .execute_unprepared(
                r#"
                INSERT INTO dkim_canonicalizations (name)
                VALUES ('Simple'), ('Relaxed')
                ON CONFLICT (name) DO NOTHING
                "#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DkimCanonicalizations::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AppMailPrimaryTypes::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Mails::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Apps::Table).to_owned())
            .await?;

        Ok(())
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
enum DkimCanonicalizations {
    Table,
    Name,
}
