use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let mut smtps = Table::create();
        smtps
            .table(Smtps::Table)
            .if_not_exists()
            .col(id_column())
            .col(app_mail_column())
            .col(ColumnDef::new(Smtps::Username).string_len(255).not_null())
            .col(ColumnDef::new(Smtps::Password).text().not_null())
            .col(ColumnDef::new(Smtps::Host).string_len(255).not_null())
            .col(ColumnDef::new(Smtps::Port).integer().not_null())
            .col(ColumnDef::new(Smtps::DkimPrivateKey).text().null())
            .col(ColumnDef::new(Smtps::DkimDomain).string_len(255).null())
            .col(ColumnDef::new(Smtps::DkimCanonicalizationName).string_len(32).null())
            .foreign_key(
                ForeignKey::create()
                    .name("fk_smtps_app_mail")
                    .from(Smtps::Table, Common::AppMailId)
                    .to(AppMails::Table, AppMails::Id)
                    .on_delete(ForeignKeyAction::Cascade),
            )
            .foreign_key(
                ForeignKey::create()
                    .name("fk_smtps_dkim_canonicalization")
                    .from(Smtps::Table, Smtps::DkimCanonicalizationName)
                    .to(DkimCanonicalizations::Table, DkimCanonicalizations::Name)
                    .on_delete(ForeignKeyAction::SetNull),
            );
        add_lifecycle_columns(&mut smtps);
        manager.create_table(smtps.to_owned()).await?;

        let mut gmails = Table::create();
        gmails
            .table(Gmails::Table)
            .if_not_exists()
            .col(id_column())
            .col(app_mail_column())
            .col(ColumnDef::new(Gmails::ClientId).string_len(255).not_null())
            .col(ColumnDef::new(Gmails::Secret).text().not_null())
            .col(ColumnDef::new(Gmails::User).string_len(255).not_null())
            .foreign_key(
                ForeignKey::create()
                    .name("fk_gmails_app_mail")
                    .from(Gmails::Table, Common::AppMailId)
                    .to(AppMails::Table, AppMails::Id)
                    .on_delete(ForeignKeyAction::Cascade),
            );
        add_token_columns(&mut gmails);
        add_lifecycle_columns(&mut gmails);
        manager.create_table(gmails.to_owned()).await?;

        let mut azures = Table::create();
        azures
            .table(Azures::Table)
            .if_not_exists()
            .col(id_column())
            .col(app_mail_column())
            .col(ColumnDef::new(Azures::ClientId).string_len(255).not_null())
            .col(ColumnDef::new(Azures::TenantId).string_len(255).not_null())
            .col(ColumnDef::new(Azures::Secret).text().not_null())
            .col(ColumnDef::new(Azures::User).string_len(255).not_null())
            .foreign_key(
                ForeignKey::create()
                    .name("fk_azures_app_mail")
                    .from(Azures::Table, Common::AppMailId)
                    .to(AppMails::Table, AppMails::Id)
                    .on_delete(ForeignKeyAction::Cascade),
            );
        add_token_columns(&mut azures);
        add_lifecycle_columns(&mut azures);
        manager.create_table(azures.to_owned()).await?;

        // One live credential per provider and pairing; tombstoned rows do not count.
        for table in ["smtps", "gmails", "azures"] {
            manager
                .get_connection()
                .execute_unprepared(&format!(
                    "CREATE UNIQUE INDEX IF NOT EXISTS idx_{table}_app_mail_live \
                     ON {table} (app_mail_id) WHERE deleted_at IS NULL"
                ))
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Azures::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Gmails::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Smtps::Table).to_owned())
            .await?;

        Ok(())
    }
}

fn id_column() -> ColumnDef {
    ColumnDef::new(Common::Id)
        .big_integer()
        .not_null()
        .auto_increment()
        .primary_key()
        .to_owned()
}

fn app_mail_column() -> ColumnDef {
    ColumnDef::new(Common::AppMailId)
        .big_integer()
        .not_null()
        .to_owned()
}

fn add_token_columns(table: &mut TableCreateStatement) {
    table
        .col(ColumnDef::new(Token::AccessToken).text().null())
        .col(ColumnDef::new(Token::RefreshToken).text().null())
        .col(ColumnDef::new(Token::TokenType).string_len(64).null())
        .col(ColumnDef::new(Token::Expiry).timestamp_with_time_zone().null())
        .col(ColumnDef::new(Token::ExpiresIn).big_integer().null());
}

fn add_lifecycle_columns(table: &mut TableCreateStatement) {
    table
        .col(
            ColumnDef::new(Common::CreatedAt)
                .timestamp_with_time_zone()
                .not_null()
                .default(Expr::current_timestamp()),
        )
        .col(
            ColumnDef::new(Common::UpdatedAt)
                .timestamp_with_time_zone()
                .not_null()
                .default(Expr::current_timestamp()),
        )
        .col(ColumnDef::new(Common::DeletedAt).timestamp_with_time_zone().null());
}

#[derive(DeriveIden)]
enum AppMails {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum DkimCanonicalizations {
    Table,
    Name,
}

#[derive(DeriveIden)]
enum Common {
    Id,
    AppMailId,
    CreatedAt,
    UpdatedAt,
    DeletedAt,
}

#[derive(DeriveIden)]
enum Token {
    AccessToken,
    RefreshToken,
    TokenType,
    Expiry,
    ExpiresIn,
}

#[derive(DeriveIden)]
enum Smtps {
    Table,
    Username,
    Password,
    Host,
    Port,
    DkimPrivateKey,
    DkimDomain,
    DkimCanonicalizationName,
}

#[derive(DeriveIden)]
enum Gmails {
    Table,
    ClientId,
    Secret,
    User,
}

#[derive(DeriveIden)]
enum Azures {
    Table,
    ClientId,
    TenantId,
    Secret,
    User,
}
