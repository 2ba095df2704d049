use sea_orm_migration::{prelude::*, schema::*, sea_orm::sea_query::extension::postgres::Type};

use super::m20240301_000001_create_users::User;
use super::m20240301_000002_create_cars::Car;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create booking status enum
        manager
            .create_type(
                Type::create()
                    .as_enum(BookingStatus::Enum)
                    .values([
                        BookingStatus::Pending,
                        BookingStatus::Confirmed,
                        BookingStatus::Completed,
                        BookingStatus::Cancelled,
                        BookingStatus::NoShow,
                    ])
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TestDriveBooking::Table)
                    .if_not_exists()
                    .col(uuid(TestDriveBooking::Id).primary_key())
                    .col(uuid(TestDriveBooking::CarId).not_null())
                    .col(uuid(TestDriveBooking::UserId).not_null())
                    .col(date(TestDriveBooking::BookingDate).not_null())
                    .col(string_len(TestDriveBooking::StartTime, 5).not_null())
                    .col(string_len(TestDriveBooking::EndTime, 5).not_null())
                    .col(
                        ColumnDef::new(TestDriveBooking::Status)
                            .custom(BookingStatus::Enum)
                            .not_null(),
                    )
                    .col(text_null(TestDriveBooking::Notes))
                    .col(
                        timestamp_with_time_zone(TestDriveBooking::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(TestDriveBooking::UpdatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_test_drive_car")
                            .from(TestDriveBooking::Table, TestDriveBooking::CarId)
                            .to(Car::Table, Car::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_test_drive_user")
                            .from(TestDriveBooking::Table, TestDriveBooking::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Partial unique index: at most one active booking per exact slot.
        // Backstop for the conflict check inside the booking transaction.
        manager
            .get_connection()
            .execute_unprepared(
                "CREATE UNIQUE INDEX ux_test_drive_active_slot \
                 ON test_drive_booking (car_id, booking_date, start_time) \
                 WHERE status IN ('pending', 'confirmed')",
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TestDriveBooking::Table).to_owned())
            .await?;

        manager
            .drop_type(Type::drop().name(BookingStatus::Enum).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum TestDriveBooking {
    Table,
    Id,
    CarId,
    UserId,
    BookingDate,
    StartTime,
    EndTime,
    Status,
    Notes,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub enum BookingStatus {
    #[sea_orm(iden = "booking_status")]
    Enum,
    #[sea_orm(iden = "pending")]
    Pending,
    #[sea_orm(iden = "confirmed")]
    Confirmed,
    #[sea_orm(iden = "completed")]
    Completed,
    #[sea_orm(iden = "cancelled")]
    Cancelled,
    #[sea_orm(iden = "no_show")]
    NoShow,
}
