use std::collections::HashSet;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::booking;
use crate::entities::car::{self, CarStatus};
use crate::entities::dealership;
use crate::entities::saved_car;
use crate::entities::test_drive::{self, BookingStatus};
use crate::entities::working_hour::{self, DayOfWeek};
use crate::error::{AppError, AppResult};
use crate::handlers::account::{booking_response, BookingResponse};
use crate::utils::jwt::verify_token;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct CarResponse {
    pub id: Uuid,
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
    pub featured: bool,
    pub images: Vec<String>,
    pub wishlisted: bool,
    pub created_at: DateTime<Utc>,
}

pub fn car_response(car: car::Model, wishlisted: bool) -> CarResponse {
    CarResponse {
        id: car.id,
        make: car.make,
        model: car.model,
        year: car.year,
        price: car.price.to_f64().unwrap_or_default(),
        mileage: car.mileage,
        color: car.color,
        fuel_type: car.fuel_type,
        transmission: car.transmission,
        body_type: car.body_type,
        seats: car.seats,
        description: car.description,
        status: car.status,
        featured: car.featured,
        images: car.images,
        wishlisted,
        created_at: car.created_at.with_timezone(&Utc),
    }
}

/// Public car routes work anonymously, but when a valid bearer token is
/// present the responses reflect the caller's wishlist. Invalid tokens
/// are treated as anonymous rather than rejected.
fn caller_id(bearer: Option<&str>, jwt_secret: &str) -> Option<Uuid> {
    verify_token(bearer?, jwt_secret).ok().map(|claims| claims.sub)
}

async fn wishlist_ids(
    db: &sea_orm::DatabaseConnection,
    user_id: Option<Uuid>,
) -> AppResult<HashSet<Uuid>> {
    let Some(user_id) = user_id else {
        return Ok(HashSet::new());
    };

    Ok(saved_car::Entity::find()
        .filter(saved_car::Column::UserId.eq(user_id))
        .select_only()
        .column(saved_car::Column::CarId)
        .into_tuple::<Uuid>()
        .all(db)
        .await?
        .into_iter()
        .collect())
}

// ============ Browsing & Filtering ============

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortBy {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
}

fn default_page() -> u64 {
    1
}

fn default_limit() -> u64 {
    12
}

#[derive(Debug, Deserialize)]
pub struct ListCarsQuery {
    #[serde(default)]
    pub search: String,
    pub make: Option<String>,
    pub body_type: Option<String>,
    pub fuel_type: Option<String>,
    pub transmission: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    #[serde(default)]
    pub sort_by: SortBy,
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub pages: u64,
}

#[derive(Debug, Serialize)]
pub struct CarListResponse {
    pub data: Vec<CarResponse>,
    pub pagination: Pagination,
}

/// List available cars with marketplace filters
pub async fn list_cars(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    Query(params): Query<ListCarsQuery>,
) -> AppResult<Json<CarListResponse>> {
    let caller = caller_id(auth.as_ref().map(|h| h.token()), &state.config.jwt_secret);
    let mut query = car::Entity::find().filter(car::Column::Status.eq(CarStatus::Available));

    if !params.search.is_empty() {
        let pattern = format!("%{}%", params.search);
        query = query.filter(
            Condition::any()
                .add(Expr::col(car::Column::Make).ilike(pattern.clone()))
                .add(Expr::col(car::Column::Model).ilike(pattern.clone()))
                .add(Expr::col(car::Column::Description).ilike(pattern)),
        );
    }

    if let Some(make) = &params.make {
        query = query.filter(Expr::col(car::Column::Make).ilike(make.clone()));
    }
    if let Some(body_type) = &params.body_type {
        query = query.filter(Expr::col(car::Column::BodyType).ilike(body_type.clone()));
    }
    if let Some(fuel_type) = &params.fuel_type {
        query = query.filter(Expr::col(car::Column::FuelType).ilike(fuel_type.clone()));
    }
    if let Some(transmission) = &params.transmission {
        query = query.filter(Expr::col(car::Column::Transmission).ilike(transmission.clone()));
    }

    if let Some(min_price) = params.min_price.and_then(Decimal::from_f64) {
        query = query.filter(car::Column::Price.gte(min_price));
    }
    if let Some(max_price) = params.max_price.and_then(Decimal::from_f64) {
        query = query.filter(car::Column::Price.lte(max_price));
    }

    query = match params.sort_by {
        SortBy::Newest => query.order_by_desc(car::Column::CreatedAt),
        SortBy::PriceAsc => query.order_by_asc(car::Column::Price),
        SortBy::PriceDesc => query.order_by_desc(car::Column::Price),
    };

    let limit = params.limit.clamp(1, 100);
    let page = params.page.max(1);

    let paginator = query.paginate(&state.db, limit);
    let total = paginator.num_items().await?;
    let pages = paginator.num_pages().await?;
    let cars = paginator.fetch_page(page - 1).await?;

    let wishlist = wishlist_ids(&state.db, caller).await?;

    Ok(Json(CarListResponse {
        data: cars
            .into_iter()
            .map(|c| {
                let wishlisted = wishlist.contains(&c.id);
                car_response(c, wishlisted)
            })
            .collect(),
        pagination: Pagination {
            total,
            page,
            limit,
            pages,
        },
    }))
}

#[derive(Debug, Serialize)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Serialize)]
pub struct CarFiltersResponse {
    pub makes: Vec<String>,
    pub body_types: Vec<String>,
    pub fuel_types: Vec<String>,
    pub transmissions: Vec<String>,
    pub price_range: PriceRange,
}

async fn distinct_values(
    db: &sea_orm::DatabaseConnection,
    column: car::Column,
) -> AppResult<Vec<String>> {
    Ok(car::Entity::find()
        .select_only()
        .column(column)
        .distinct()
        .filter(car::Column::Status.eq(CarStatus::Available))
        .order_by_asc(column)
        .into_tuple()
        .all(db)
        .await?)
}

/// Facet values and price range for the marketplace filter sidebar
pub async fn get_car_filters(State(state): State<AppState>) -> AppResult<Json<CarFiltersResponse>> {
    let makes = distinct_values(&state.db, car::Column::Make).await?;
    let body_types = distinct_values(&state.db, car::Column::BodyType).await?;
    let fuel_types = distinct_values(&state.db, car::Column::FuelType).await?;
    let transmissions = distinct_values(&state.db, car::Column::Transmission).await?;

    let price_bounds: Option<(Option<Decimal>, Option<Decimal>)> = car::Entity::find()
        .select_only()
        .column_as(car::Column::Price.min(), "min_price")
        .column_as(car::Column::Price.max(), "max_price")
        .filter(car::Column::Status.eq(CarStatus::Available))
        .into_tuple()
        .one(&state.db)
        .await?;

    let (min, max) = price_bounds.unwrap_or((None, None));

    Ok(Json(CarFiltersResponse {
        makes,
        body_types,
        fuel_types,
        transmissions,
        price_range: PriceRange {
            min: min.and_then(|d| d.to_f64()).unwrap_or(0.0),
            max: max.and_then(|d| d.to_f64()).unwrap_or(100_000.0),
        },
    }))
}

#[derive(Debug, Deserialize)]
pub struct FeaturedQuery {
    #[serde(default = "default_featured_limit")]
    pub limit: u64,
}

fn default_featured_limit() -> u64 {
    6
}

/// Featured cars for the homepage
pub async fn featured_cars(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    Query(params): Query<FeaturedQuery>,
) -> AppResult<Json<Vec<CarResponse>>> {
    let caller = caller_id(auth.as_ref().map(|h| h.token()), &state.config.jwt_secret);

    let cars = car::Entity::find()
        .filter(car::Column::Status.eq(CarStatus::Available))
        .filter(car::Column::Featured.eq(true))
        .order_by_desc(car::Column::CreatedAt)
        .limit(params.limit.clamp(1, 24))
        .all(&state.db)
        .await?;

    let wishlist = wishlist_ids(&state.db, caller).await?;

    Ok(Json(
        cars.into_iter()
            .map(|c| {
                let wishlisted = wishlist.contains(&c.id);
                car_response(c, wishlisted)
            })
            .collect(),
    ))
}

// ============ Car Detail ============

#[derive(Debug, Serialize)]
pub struct WorkingHourResponse {
    pub day_of_week: DayOfWeek,
    pub open_time: String,
    pub close_time: String,
    pub is_open: bool,
}

#[derive(Debug, Serialize)]
pub struct DealershipResponse {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub phone: String,
    pub email: String,
    pub working_hours: Vec<WorkingHourResponse>,
}

#[derive(Debug, Serialize)]
pub struct CarDetailResponse {
    #[serde(flatten)]
    pub car: CarResponse,
    pub dealership: Option<DealershipResponse>,
    /// The caller's own active (pending or confirmed) test drive for
    /// this car, when authenticated.
    pub user_test_drive: Option<BookingResponse>,
}

pub async fn dealership_with_hours(
    db: &sea_orm::DatabaseConnection,
) -> AppResult<Option<DealershipResponse>> {
    let Some(info) = dealership::Entity::find().one(db).await? else {
        return Ok(None);
    };

    let mut hours = working_hour::Entity::find()
        .filter(working_hour::Column::DealershipId.eq(info.id))
        .all(db)
        .await?;
    hours.sort_by_key(|h| h.day_of_week);

    Ok(Some(DealershipResponse {
        id: info.id,
        name: info.name,
        address: info.address,
        phone: info.phone,
        email: info.email,
        working_hours: hours
            .into_iter()
            .map(|h| WorkingHourResponse {
                day_of_week: h.day_of_week,
                open_time: h.open_time,
                close_time: h.close_time,
                is_open: h.is_open,
            })
            .collect(),
    }))
}

/// Get car details, including dealership info for test-drive scheduling.
/// Authenticated callers also see their wishlist flag and any active
/// test drive they already hold for this car.
pub async fn get_car(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    Path(car_id): Path<Uuid>,
) -> AppResult<Json<CarDetailResponse>> {
    let caller = caller_id(auth.as_ref().map(|h| h.token()), &state.config.jwt_secret);

    let car = car::Entity::find_by_id(car_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Car not found".to_string()))?;

    let dealership = dealership_with_hours(&state.db).await?;
    let wishlist = wishlist_ids(&state.db, caller).await?;

    let user_test_drive = match caller {
        Some(user_id) => test_drive::Entity::find()
            .filter(test_drive::Column::CarId.eq(car_id))
            .filter(test_drive::Column::UserId.eq(user_id))
            .filter(
                test_drive::Column::Status
                    .is_in([BookingStatus::Pending, BookingStatus::Confirmed]),
            )
            .order_by_asc(test_drive::Column::BookingDate)
            .one(&state.db)
            .await?
            .map(booking_response),
        None => None,
    };

    Ok(Json(CarDetailResponse {
        car: car_response(car, wishlist.contains(&car_id)),
        dealership,
        user_test_drive,
    }))
}

// ============ Slot Availability ============

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub date: String,
}

#[derive(Debug, Serialize)]
pub struct BookedSlot {
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub car_id: Uuid,
    pub date: NaiveDate,
    pub booked_slots: Vec<BookedSlot>,
    pub working_hour: Option<WorkingHourResponse>,
}

/// Which slots are taken for a car on a given day, plus that weekday's
/// opening hours
pub async fn car_availability(
    State(state): State<AppState>,
    Path(car_id): Path<Uuid>,
    Query(params): Query<AvailabilityQuery>,
) -> AppResult<Json<AvailabilityResponse>> {
    let date = NaiveDate::parse_from_str(&params.date, "%Y-%m-%d")
        .map_err(|_| AppError::BadRequest("Invalid date".to_string()))?;

    car::Entity::find_by_id(car_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Car not found".to_string()))?;

    let bookings = booking::active_bookings_for_day(&state.db, car_id, date)
        .await
        .map_err(AppError::from)?;

    let working_hour = match dealership::Entity::find().one(&state.db).await? {
        Some(info) => working_hour::Entity::find()
            .filter(working_hour::Column::DealershipId.eq(info.id))
            .filter(working_hour::Column::DayOfWeek.eq(DayOfWeek::from_date(date)))
            .one(&state.db)
            .await?
            .map(|h| WorkingHourResponse {
                day_of_week: h.day_of_week,
                open_time: h.open_time,
                close_time: h.close_time,
                is_open: h.is_open,
            }),
        None => None,
    };

    Ok(Json(AvailabilityResponse {
        car_id,
        date,
        booked_slots: bookings
            .into_iter()
            .map(|b| BookedSlot {
                start_time: b.start_time,
                end_time: b.end_time,
            })
            .collect(),
        working_hour,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::user::UserRole;
    use crate::utils::jwt::create_token;

    #[test]
    fn test_caller_id_resolves_valid_token() {
        let user_id = Uuid::new_v4();
        let token = create_token(user_id, "jane@example.com", UserRole::User, "secret", 1)
            .expect("token creation failed");

        assert_eq!(caller_id(Some(&token), "secret"), Some(user_id));
    }

    #[test]
    fn test_caller_id_treats_missing_token_as_anonymous() {
        assert_eq!(caller_id(None, "secret"), None);
    }

    #[test]
    fn test_caller_id_treats_bad_token_as_anonymous() {
        assert_eq!(caller_id(Some("not-a-token"), "secret"), None);

        let token = create_token(Uuid::new_v4(), "jane@example.com", UserRole::User, "secret", 1)
            .expect("token creation failed");
        assert_eq!(caller_id(Some(&token), "other-secret"), None);
    }
}
