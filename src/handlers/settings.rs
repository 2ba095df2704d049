use axum::{extract::State, Json};
use chrono::{NaiveTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::entities::dealership;
use crate::entities::working_hour::{self, DayOfWeek};
use crate::error::{AppError, AppResult};
use crate::handlers::cars::{dealership_with_hours, DealershipResponse};
use crate::AppState;

const DEFAULT_HOURS: [(DayOfWeek, &str, &str, bool); 7] = [
    (DayOfWeek::Monday, "09:00", "18:00", true),
    (DayOfWeek::Tuesday, "09:00", "18:00", true),
    (DayOfWeek::Wednesday, "09:00", "18:00", true),
    (DayOfWeek::Thursday, "09:00", "18:00", true),
    (DayOfWeek::Friday, "09:00", "18:00", true),
    (DayOfWeek::Saturday, "10:00", "16:00", true),
    (DayOfWeek::Sunday, "10:00", "16:00", false),
];

async fn create_default_dealership(
    db: &sea_orm::DatabaseConnection,
) -> AppResult<dealership::Model> {
    let txn = db.begin().await?;
    let now = Utc::now();

    let info = dealership::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set("Vehiql Motors".to_string()),
        address: Set("69 Car Street, Autoville, CA 69420".to_string()),
        phone: Set("+1 (555) 123-4567".to_string()),
        email: Set("contact@vehiql.com".to_string()),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    };
    let info = info.insert(&txn).await?;

    for (day, open, close, is_open) in DEFAULT_HOURS {
        let hour = working_hour::ActiveModel {
            id: Set(Uuid::new_v4()),
            dealership_id: Set(info.id),
            day_of_week: Set(day),
            open_time: Set(open.to_string()),
            close_time: Set(close.to_string()),
            is_open: Set(is_open),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };
        hour.insert(&txn).await?;
    }

    txn.commit().await?;
    Ok(info)
}

/// Dealership info with working hours, creating the default record on
/// first read
pub async fn get_dealership(State(state): State<AppState>) -> AppResult<Json<DealershipResponse>> {
    if dealership::Entity::find().one(&state.db).await?.is_none() {
        create_default_dealership(&state.db).await?;
    }

    dealership_with_hours(&state.db)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::Internal("Failed to create dealership info".to_string()))
}

#[derive(Debug, Deserialize)]
pub struct UpdateDealershipRequest {
    pub name: String,
    pub address: String,
    pub phone: String,
    pub email: String,
}

/// Update dealership contact details
pub async fn update_dealership(
    State(state): State<AppState>,
    Json(payload): Json<UpdateDealershipRequest>,
) -> AppResult<Json<DealershipResponse>> {
    let info = match dealership::Entity::find().one(&state.db).await? {
        Some(info) => info,
        None => create_default_dealership(&state.db).await?,
    };

    let mut active: dealership::ActiveModel = info.into();
    active.name = Set(payload.name);
    active.address = Set(payload.address);
    active.phone = Set(payload.phone);
    active.email = Set(payload.email);
    active.updated_at = Set(Utc::now().into());
    active.update(&state.db).await?;

    dealership_with_hours(&state.db)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::Internal("Failed to load dealership info".to_string()))
}

#[derive(Debug, Deserialize)]
pub struct WorkingHourPayload {
    pub day_of_week: DayOfWeek,
    pub open_time: String,
    pub close_time: String,
    pub is_open: bool,
}

#[derive(Debug, Deserialize)]
pub struct SaveWorkingHoursRequest {
    pub working_hours: Vec<WorkingHourPayload>,
}

/// Replace the weekly working-hour schedule
pub async fn save_working_hours(
    State(state): State<AppState>,
    Json(payload): Json<SaveWorkingHoursRequest>,
) -> AppResult<Json<DealershipResponse>> {
    for hour in &payload.working_hours {
        let open = NaiveTime::parse_from_str(&hour.open_time, "%H:%M");
        let close = NaiveTime::parse_from_str(&hour.close_time, "%H:%M");
        if open.is_err() || close.is_err() {
            return Err(AppError::BadRequest(
                "Working hours must use HH:MM times".to_string(),
            ));
        }
    }

    let info = dealership::Entity::find()
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Dealership info not found".to_string()))?;

    let txn = state.db.begin().await?;
    let now = Utc::now();

    working_hour::Entity::delete_many()
        .filter(working_hour::Column::DealershipId.eq(info.id))
        .exec(&txn)
        .await?;

    for hour in payload.working_hours {
        let record = working_hour::ActiveModel {
            id: Set(Uuid::new_v4()),
            dealership_id: Set(info.id),
            day_of_week: Set(hour.day_of_week),
            open_time: Set(hour.open_time),
            close_time: Set(hour.close_time),
            is_open: Set(hour.is_open),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };
        record.insert(&txn).await?;
    }

    txn.commit().await?;

    dealership_with_hours(&state.db)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::Internal("Failed to load dealership info".to_string()))
}
