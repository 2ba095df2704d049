use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "car_status")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CarStatus {
    #[sea_orm(string_value = "available")]
    Available,
    #[sea_orm(string_value = "unavailable")]
    Unavailable,
    #[sea_orm(string_value = "sold")]
    Sold,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "car")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub price: Decimal,
    pub mileage: i32,
    pub color: String,
    pub fuel_type: String,
    pub transmission: String,
    pub body_type: String,
    pub seats: Option<i32>,
    pub description: String,
    pub status: CarStatus,
    pub featured: bool,
    pub images: Vec<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::test_drive::Entity")]
    TestDrives,
    #[sea_orm(has_many = "super::saved_car::Entity")]
    SavedCars,
}

impl Related<super::test_drive::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TestDrives.def()
    }
}

impl Related<super::saved_car::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SavedCars.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
