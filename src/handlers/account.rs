use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::booking::{self, BookTestDrive, Caller};
use crate::entities::test_drive::{self, BookingStatus};
use crate::entities::{car, saved_car};
use crate::error::{AppError, AppResult};
use crate::handlers::cars::{car_response, CarResponse};
use crate::utils::jwt::Claims;
use crate::AppState;

fn caller_from(claims: &Claims) -> Caller {
    Caller {
        id: claims.sub,
        role: claims.role,
    }
}

// ============ Test Drives ============

#[derive(Debug, Deserialize)]
pub struct BookTestDriveRequest {
    pub car_id: Uuid,
    pub booking_date: String,
    pub start_time: String,
    pub end_time: String,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BookingResponse {
    pub id: Uuid,
    pub car_id: Uuid,
    pub booking_date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub status: BookingStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub fn booking_response(booking: test_drive::Model) -> BookingResponse {
    BookingResponse {
        id: booking.id,
        car_id: booking.car_id,
        booking_date: booking.booking_date,
        start_time: booking.start_time,
        end_time: booking.end_time,
        status: booking.status,
        notes: booking.notes,
        created_at: booking.created_at.with_timezone(&Utc),
    }
}

/// Book a test drive for a car
pub async fn book_test_drive(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<BookTestDriveRequest>,
) -> AppResult<Json<BookingResponse>> {
    let booking = booking::book_test_drive(
        &state.db,
        &caller_from(&claims),
        BookTestDrive {
            car_id: payload.car_id,
            booking_date: payload.booking_date,
            start_time: payload.start_time,
            end_time: payload.end_time,
            notes: payload.notes,
        },
    )
    .await?;

    Ok(Json(booking_response(booking)))
}

#[derive(Debug, Serialize)]
pub struct ReservationResponse {
    #[serde(flatten)]
    pub booking: BookingResponse,
    pub car: CarResponse,
}

/// List the caller's test-drive reservations, newest booking date first
pub async fn my_reservations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<Vec<ReservationResponse>>> {
    let reservations = test_drive::Entity::find()
        .filter(test_drive::Column::UserId.eq(claims.sub))
        .find_also_related(car::Entity)
        .order_by_desc(test_drive::Column::BookingDate)
        .all(&state.db)
        .await?;

    let responses: Vec<ReservationResponse> = reservations
        .into_iter()
        .filter_map(|(booking, car)| {
            let car = car?;
            Some(ReservationResponse {
                booking: booking_response(booking),
                car: car_response(car, false),
            })
        })
        .collect();

    Ok(Json(responses))
}

/// Cancel a test-drive booking
pub async fn cancel_reservation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(booking_id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    booking::cancel_test_drive(&state.db, &caller_from(&claims), booking_id).await?;

    Ok(Json(serde_json::json!({
        "message": "Test drive cancelled successfully"
    })))
}

// ============ Saved Cars ============

#[derive(Debug, Serialize)]
pub struct ToggleSavedResponse {
    pub saved: bool,
    pub message: String,
}

/// Add a car to the wishlist, or remove it when already saved
pub async fn toggle_saved_car(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(car_id): Path<Uuid>,
) -> AppResult<Json<ToggleSavedResponse>> {
    car::Entity::find_by_id(car_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Car not found".to_string()))?;

    let existing = saved_car::Entity::find_by_id((claims.sub, car_id))
        .one(&state.db)
        .await?;

    if existing.is_some() {
        saved_car::Entity::delete_by_id((claims.sub, car_id))
            .exec(&state.db)
            .await?;

        return Ok(Json(ToggleSavedResponse {
            saved: false,
            message: "Car removed from favorites".to_string(),
        }));
    }

    let entry = saved_car::ActiveModel {
        user_id: Set(claims.sub),
        car_id: Set(car_id),
        saved_at: Set(Utc::now().into()),
    };
    entry.insert(&state.db).await?;

    Ok(Json(ToggleSavedResponse {
        saved: true,
        message: "Car added to favorites".to_string(),
    }))
}

/// List the caller's saved cars, most recently saved first
pub async fn saved_cars(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<Vec<CarResponse>>> {
    let saved = saved_car::Entity::find()
        .filter(saved_car::Column::UserId.eq(claims.sub))
        .find_also_related(car::Entity)
        .order_by_desc(saved_car::Column::SavedAt)
        .all(&state.db)
        .await?;

    let responses: Vec<CarResponse> = saved
        .into_iter()
        .filter_map(|(_, car)| Some(car_response(car?, true)))
        .collect();

    Ok(Json(responses))
}
