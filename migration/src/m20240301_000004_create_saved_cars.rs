use sea_orm_migration::{prelude::*, schema::*};

use super::m20240301_000001_create_users::User;
use super::m20240301_000002_create_cars::Car;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UserSavedCar::Table)
                    .if_not_exists()
                    .col(uuid(UserSavedCar::UserId).not_null())
                    .col(uuid(UserSavedCar::CarId).not_null())
                    .col(
                        timestamp_with_time_zone(UserSavedCar::SavedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .primary_key(
                        Index::create()
                            .col(UserSavedCar::UserId)
                            .col(UserSavedCar::CarId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_saved_car_user")
                            .from(UserSavedCar::Table, UserSavedCar::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_saved_car_car")
                            .from(UserSavedCar::Table, UserSavedCar::CarId)
                            .to(Car::Table, Car::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UserSavedCar::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum UserSavedCar {
    Table,
    UserId,
    CarId,
    SavedAt,
}
