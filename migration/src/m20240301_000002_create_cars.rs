use sea_orm_migration::{prelude::*, schema::*, sea_orm::sea_query::extension::postgres::Type};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create car status enum
        manager
            .create_type(
                Type::create()
                    .as_enum(CarStatus::Enum)
                    .values([CarStatus::Available, CarStatus::Unavailable, CarStatus::Sold])
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Car::Table)
                    .if_not_exists()
                    .col(uuid(Car::Id).primary_key())
                    .col(string_len(Car::Make, 100).not_null())
                    .col(string_len(Car::Model, 100).not_null())
                    .col(integer(Car::Year).not_null())
                    .col(decimal_len(Car::Price, 10, 2).not_null())
                    .col(integer(Car::Mileage).not_null())
                    .col(string_len(Car::Color, 50).not_null())
                    .col(string_len(Car::FuelType, 50).not_null())
                    .col(string_len(Car::Transmission, 50).not_null())
                    .col(string_len(Car::BodyType, 50).not_null())
                    .col(integer_null(Car::Seats))
                    .col(text(Car::Description).not_null())
                    .col(
                        ColumnDef::new(Car::Status)
                            .custom(CarStatus::Enum)
                            .not_null(),
                    )
                    .col(boolean(Car::Featured).not_null().default(false))
                    .col(
                        ColumnDef::new(Car::Images)
                            .array(ColumnType::Text)
                            .not_null(),
                    )
                    .col(
                        timestamp_with_time_zone(Car::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(Car::UpdatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Browsing filters hit make/model constantly
        manager
            .create_index(
                Index::create()
                    .name("idx_car_make_model")
                    .table(Car::Table)
                    .col(Car::Make)
                    .col(Car::Model)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Car::Table).to_owned())
            .await?;

        manager
            .drop_type(Type::drop().name(CarStatus::Enum).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Car {
    Table,
    Id,
    Make,
    Model,
    Year,
    Price,
    Mileage,
    Color,
    FuelType,
    Transmission,
    BodyType,
    Seats,
    Description,
    Status,
    Featured,
    Images,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub enum CarStatus {
    #[sea_orm(iden = "car_status")]
    Enum,
    #[sea_orm(iden = "available")]
    Available,
    #[sea_orm(iden = "unavailable")]
    Unavailable,
    #[sea_orm(iden = "sold")]
    Sold,
}
