pub use sea_orm_migration::prelude::*;

mod m20260901_000000_create_lookup_tables;
mod m20260901_000001_create_app_mails;
mod m20260901_000002_create_credentials;
mod m20260901_000003_create_send_mails;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260901_000000_create_lookup_tables::Migration),
            Box::new(m20260901_000001_create_app_mails::Migration),
            Box::new(m20260901_000002_create_credentials::Migration),
            Box::new(m20260901_000003_create_send_mails::Migration),
        ]
    }
}
