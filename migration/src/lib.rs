pub use sea_orm_migration::prelude::*;

mod m20240301_000001_create_users;
mod m20240301_000002_create_cars;
mod m20240301_000003_create_test_drives;
mod m20240301_000004_create_saved_cars;
mod m20240301_000005_create_dealership;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_users::Migration),
            Box::new(m20240301_000002_create_cars::Migration),
            Box::new(m20240301_000003_create_test_drives::Migration),
            Box::new(m20240301_000004_create_saved_cars::Migration),
            Box::new(m20240301_000005_create_dealership::Migration),
        ]
    }
}
