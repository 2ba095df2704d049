use sea_orm_migration::{prelude::*, schema::*, sea_orm::sea_query::extension::postgres::Type};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DealershipInfo::Table)
                    .if_not_exists()
                    .col(uuid(DealershipInfo::Id).primary_key())
                    .col(string_len(DealershipInfo::Name, 100).not_null())
                    .col(string_len(DealershipInfo::Address, 255).not_null())
                    .col(string_len(DealershipInfo::Phone, 30).not_null())
                    .col(string_len(DealershipInfo::Email, 255).not_null())
                    .col(
                        timestamp_with_time_zone(DealershipInfo::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(DealershipInfo::UpdatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Create day-of-week enum
        manager
            .create_type(
                Type::create()
                    .as_enum(DayOfWeek::Enum)
                    .values([
                        DayOfWeek::Monday,
                        DayOfWeek::Tuesday,
                        DayOfWeek::Wednesday,
                        DayOfWeek::Thursday,
                        DayOfWeek::Friday,
                        DayOfWeek::Saturday,
                        DayOfWeek::Sunday,
                    ])
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(WorkingHour::Table)
                    .if_not_exists()
                    .col(uuid(WorkingHour::Id).primary_key())
                    .col(uuid(WorkingHour::DealershipId).not_null())
                    .col(
                        ColumnDef::new(WorkingHour::DayOfWeek)
                            .custom(DayOfWeek::Enum)
                            .not_null(),
                    )
                    .col(string_len(WorkingHour::OpenTime, 5).not_null())
                    .col(string_len(WorkingHour::CloseTime, 5).not_null())
                    .col(boolean(WorkingHour::IsOpen).not_null().default(true))
                    .col(
                        timestamp_with_time_zone(WorkingHour::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(WorkingHour::UpdatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_working_hour_dealership")
                            .from(WorkingHour::Table, WorkingHour::DealershipId)
                            .to(DealershipInfo::Table, DealershipInfo::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("ux_working_hour_day")
                    .table(WorkingHour::Table)
                    .col(WorkingHour::DealershipId)
                    .col(WorkingHour::DayOfWeek)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(WorkingHour::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(DealershipInfo::Table).to_owned())
            .await?;

        manager
            .drop_type(Type::drop().name(DayOfWeek::Enum).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum DealershipInfo {
    Table,
    Id,
    Name,
    Address,
    Phone,
    Email,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub enum WorkingHour {
    Table,
    Id,
    DealershipId,
    DayOfWeek,
    OpenTime,
    CloseTime,
    IsOpen,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub enum DayOfWeek {
    #[sea_orm(iden = "day_of_week")]
    Enum,
    #[sea_orm(iden = "monday")]
    Monday,
    #[sea_orm(iden = "tuesday")]
    Tuesday,
    #[sea_orm(iden = "wednesday")]
    Wednesday,
    #[sea_orm(iden = "thursday")]
    Thursday,
    #[sea_orm(iden = "friday")]
    Friday,
    #[sea_orm(iden = "saturday")]
    Saturday,
    #[sea_orm(iden = "sunday")]
    Sunday,
}
