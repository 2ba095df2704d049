use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use base64::Engine;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ai;
use crate::booking::{self, Caller};
use crate::entities::car::{self, CarStatus};
use crate::entities::test_drive::{self, BookingStatus};
use crate::entities::user::{self, UserRole};
use crate::error::{AppError, AppResult};
use crate::handlers::cars::{car_response, CarResponse};
use crate::storage::{parse_image_data_url, ObjectStore};
use crate::utils::jwt::Claims;
use crate::AppState;

fn caller_from(claims: &Claims) -> Caller {
    Caller {
        id: claims.sub,
        role: claims.role,
    }
}

// ============ Inventory Management ============

#[derive(Debug, Deserialize)]
pub struct CarPayload {
    pub make: String,
    pub model: String,
    pub year: i32,
    pub price: f64,
    pub mileage: i32,
    pub color: String,
    pub fuel_type: String,
    pub transmission: String,
    pub body_type: String,
    pub seats: Option<i32>,
    pub description: String,
    pub status: CarStatus,
    #[serde(default)]
    pub featured: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateCarRequest {
    pub car: CarPayload,
    /// `data:image/...;base64,...` payloads from the listing form
    pub images: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateCarResponse {
    pub car_id: Uuid,
}

/// Create a listing: upload its images to the object store, then insert
/// the row
pub async fn create_car(
    State(state): State<AppState>,
    Json(payload): Json<CreateCarRequest>,
) -> AppResult<Json<CreateCarResponse>> {
    let store = ObjectStore::from_config(state.http.clone(), &state.config)
        .ok_or_else(|| AppError::Internal("Object store not configured".to_string()))?;

    let price = Decimal::from_f64(payload.car.price)
        .filter(|p| !p.is_sign_negative())
        .ok_or_else(|| AppError::BadRequest("Invalid price".to_string()))?;

    let car_id = Uuid::new_v4();
    let mut image_urls = Vec::new();

    for (index, data_url) in payload.images.iter().enumerate() {
        let Some((extension, bytes)) = parse_image_data_url(data_url) else {
            tracing::warn!("skipping invalid image data");
            continue;
        };

        let url = store
            .upload_car_image(car_id, index, &extension, bytes)
            .await?;
        image_urls.push(url);
    }

    if image_urls.is_empty() {
        return Err(AppError::BadRequest(
            "No valid images were uploaded".to_string(),
        ));
    }

    let now = Utc::now();
    let new_car = car::ActiveModel {
        id: Set(car_id),
        make: Set(payload.car.make),
        model: Set(payload.car.model),
        year: Set(payload.car.year),
        price: Set(price),
        mileage: Set(payload.car.mileage),
        color: Set(payload.car.color),
        fuel_type: Set(payload.car.fuel_type),
        transmission: Set(payload.car.transmission),
        body_type: Set(payload.car.body_type),
        seats: Set(payload.car.seats),
        description: Set(payload.car.description),
        status: Set(payload.car.status),
        featured: Set(payload.car.featured),
        images: Set(image_urls),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    };

    let car = new_car.insert(&state.db).await?;

    Ok(Json(CreateCarResponse { car_id: car.id }))
}

#[derive(Debug, Deserialize)]
pub struct ScanCarImageRequest {
    /// `data:image/...;base64,...` payload
    pub image: String,
}

/// Extract listing details from a car photo via the AI service
pub async fn scan_car_image(
    State(state): State<AppState>,
    Json(payload): Json<ScanCarImageRequest>,
) -> AppResult<Json<ai::CarScan>> {
    let api_key = state
        .config
        .gemini_api_key
        .as_deref()
        .ok_or_else(|| AppError::Internal("Gemini API key not configured".to_string()))?;

    let (extension, bytes) = parse_image_data_url(&payload.image)
        .ok_or_else(|| AppError::BadRequest("Invalid image data".to_string()))?;

    let image_base64 = base64::engine::general_purpose::STANDARD.encode(&bytes);

    let scan = ai::scan_car_image(
        &state.http,
        api_key,
        &state.config.gemini_model,
        &format!("image/{}", extension),
        image_base64,
    )
    .await?;

    Ok(Json(scan))
}

/// Delete a listing; its stored images are removed best-effort afterwards
pub async fn delete_car(
    State(state): State<AppState>,
    Path(car_id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    let car = car::Entity::find_by_id(car_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Car not found".to_string()))?;

    car::Entity::delete_by_id(car_id).exec(&state.db).await?;

    if let Some(store) = ObjectStore::from_config(state.http.clone(), &state.config) {
        store.remove_images(&car.images).await;
    }

    Ok(Json(serde_json::json!({ "message": "Car deleted successfully" })))
}

#[derive(Debug, Deserialize)]
pub struct UpdateCarStatusRequest {
    pub status: Option<CarStatus>,
    pub featured: Option<bool>,
}

/// Update a listing's availability status and/or featured flag
pub async fn update_car_status(
    State(state): State<AppState>,
    Path(car_id): Path<Uuid>,
    Json(payload): Json<UpdateCarStatusRequest>,
) -> AppResult<Json<CarResponse>> {
    if payload.status.is_none() && payload.featured.is_none() {
        return Err(AppError::BadRequest("No fields to update".to_string()));
    }

    let car = car::Entity::find_by_id(car_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Car not found".to_string()))?;

    let mut active: car::ActiveModel = car.into();

    if let Some(status) = payload.status {
        active.status = Set(status);
    }
    if let Some(featured) = payload.featured {
        active.featured = Set(featured);
    }
    active.updated_at = Set(Utc::now().into());

    let updated = active.update(&state.db).await?;

    Ok(Json(car_response(updated, false)))
}

/// List all listings, including unavailable and sold ones
pub async fn list_all_cars(State(state): State<AppState>) -> AppResult<Json<Vec<CarResponse>>> {
    let cars = car::Entity::find()
        .order_by_desc(car::Column::CreatedAt)
        .all(&state.db)
        .await?;

    Ok(Json(
        cars.into_iter().map(|c| car_response(c, false)).collect(),
    ))
}

// ============ Test-Drive Management ============

#[derive(Debug, Deserialize)]
pub struct ListTestDrivesQuery {
    #[serde(default)]
    pub search: String,
    pub status: Option<BookingStatus>,
}

#[derive(Debug, Serialize)]
pub struct BookingUserInfo {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AdminTestDriveResponse {
    pub id: Uuid,
    pub booking_date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub status: BookingStatus,
    pub notes: Option<String>,
    pub car: CarResponse,
    pub user: BookingUserInfo,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// List test drives with optional status filter and free-text search
/// across car make/model and requester name/email
pub async fn list_test_drives(
    State(state): State<AppState>,
    Query(params): Query<ListTestDrivesQuery>,
) -> AppResult<Json<Vec<AdminTestDriveResponse>>> {
    let mut query = test_drive::Entity::find();
    if let Some(status) = params.status {
        query = query.filter(test_drive::Column::Status.eq(status));
    }

    let bookings = query
        .order_by_desc(test_drive::Column::BookingDate)
        .order_by_asc(test_drive::Column::StartTime)
        .all(&state.db)
        .await?;

    let cars = car::Entity::find().all(&state.db).await?;
    let users = user::Entity::find().all(&state.db).await?;

    let search = params.search.to_lowercase();

    let responses: Vec<AdminTestDriveResponse> = bookings
        .into_iter()
        .filter_map(|b| {
            let car = cars.iter().find(|c| c.id == b.car_id)?;
            let user = users.iter().find(|u| u.id == b.user_id)?;

            if !search.is_empty() {
                let hit = car.make.to_lowercase().contains(&search)
                    || car.model.to_lowercase().contains(&search)
                    || user.name.to_lowercase().contains(&search)
                    || user.email.to_lowercase().contains(&search);
                if !hit {
                    return None;
                }
            }

            Some(AdminTestDriveResponse {
                id: b.id,
                booking_date: b.booking_date,
                start_time: b.start_time,
                end_time: b.end_time,
                status: b.status,
                notes: b.notes,
                car: car_response(car.clone(), false),
                user: BookingUserInfo {
                    id: user.id,
                    name: user.name.clone(),
                    email: user.email.clone(),
                    phone: user.phone.clone(),
                },
                created_at: b.created_at.with_timezone(&Utc),
                updated_at: b.updated_at.with_timezone(&Utc),
            })
        })
        .collect();

    Ok(Json(responses))
}

#[derive(Debug, Deserialize)]
pub struct UpdateTestDriveStatusRequest {
    pub status: BookingStatus,
}

/// Set a booking to any status, bypassing lifecycle checks (admin
/// correction path)
pub async fn update_test_drive_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(booking_id): Path<Uuid>,
    Json(payload): Json<UpdateTestDriveStatusRequest>,
) -> AppResult<Json<serde_json::Value>> {
    booking::override_status(&state.db, &caller_from(&claims), booking_id, payload.status).await?;

    Ok(Json(serde_json::json!({
        "message": "Test drive status updated successfully"
    })))
}

// ============ User Management ============

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub image_url: Option<String>,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

fn user_response(user: user::Model) -> UserResponse {
    UserResponse {
        id: user.id,
        email: user.email,
        name: user.name,
        phone: user.phone,
        image_url: user.image_url,
        role: user.role,
        created_at: user.created_at.with_timezone(&Utc),
    }
}

/// List all users, newest first
pub async fn list_users(State(state): State<AppState>) -> AppResult<Json<Vec<UserResponse>>> {
    let users = user::Entity::find()
        .order_by_desc(user::Column::CreatedAt)
        .all(&state.db)
        .await?;

    Ok(Json(users.into_iter().map(user_response).collect()))
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: UserRole,
}

/// Change a user's role
pub async fn update_user_role(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<UpdateRoleRequest>,
) -> AppResult<Json<UserResponse>> {
    let user = user::Entity::find_by_id(user_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let mut active: user::ActiveModel = user.into();
    active.role = Set(payload.role);
    active.updated_at = Set(Utc::now().into());

    let updated = active.update(&state.db).await?;

    Ok(Json(user_response(updated)))
}

// ============ Dashboard ============

#[derive(Debug, Serialize)]
pub struct CarStats {
    pub total: usize,
    pub available: usize,
    pub sold: usize,
    pub unavailable: usize,
    pub featured: usize,
}

#[derive(Debug, Serialize)]
pub struct TestDriveStats {
    pub total: usize,
    pub pending: usize,
    pub confirmed: usize,
    pub completed: usize,
    pub cancelled: usize,
    pub no_show: usize,
    pub conversion_rate: f64,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub cars: CarStats,
    pub test_drives: TestDriveStats,
}

/// Inventory and test-drive statistics for the admin dashboard
pub async fn dashboard(State(state): State<AppState>) -> AppResult<Json<DashboardResponse>> {
    let cars = car::Entity::find().all(&state.db).await?;
    let test_drives = test_drive::Entity::find().all(&state.db).await?;

    let count_cars = |status: CarStatus| cars.iter().filter(|c| c.status == status).count();
    let count_drives =
        |status: BookingStatus| test_drives.iter().filter(|t| t.status == status).count();

    let completed = count_drives(BookingStatus::Completed);

    // Listings sold after a completed test drive, as a share of all
    // completed test drives
    let completed_car_ids: Vec<Uuid> = test_drives
        .iter()
        .filter(|t| t.status == BookingStatus::Completed)
        .map(|t| t.car_id)
        .collect();

    let sold_after_test_drive = cars
        .iter()
        .filter(|c| c.status == CarStatus::Sold && completed_car_ids.contains(&c.id))
        .count();

    let conversion_rate = if completed > 0 {
        let rate = sold_after_test_drive as f64 / completed as f64 * 100.0;
        (rate * 100.0).round() / 100.0
    } else {
        0.0
    };

    Ok(Json(DashboardResponse {
        cars: CarStats {
            total: cars.len(),
            available: count_cars(CarStatus::Available),
            sold: count_cars(CarStatus::Sold),
            unavailable: count_cars(CarStatus::Unavailable),
            featured: cars.iter().filter(|c| c.featured).count(),
        },
        test_drives: TestDriveStats {
            total: test_drives.len(),
            pending: count_drives(BookingStatus::Pending),
            confirmed: count_drives(BookingStatus::Confirmed),
            completed,
            cancelled: count_drives(BookingStatus::Cancelled),
            no_show: count_drives(BookingStatus::NoShow),
            conversion_rate,
        },
    }))
}
