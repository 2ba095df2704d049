//! Test-drive booking core: slot conflict avoidance and the status
//! lifecycle.
//!
//! Two distinct mutation policies live here and must stay separate:
//! a constrained `cancel_test_drive` (owner or admin, refuses terminal
//! states) and an unconstrained `override_status` for administrative
//! correction. Callers are passed in explicitly so every rule is a
//! function of its inputs.

use chrono::{NaiveDate, NaiveTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set, SqlErr, TransactionTrait,
};
use thiserror::Error;
use uuid::Uuid;

use crate::entities::car::{self, CarStatus};
use crate::entities::test_drive::{self, BookingStatus};
use crate::entities::user::UserRole;
use crate::error::AppError;

/// Resolved identity of the caller, produced by the JWT middleware.
#[derive(Debug, Clone, Copy)]
pub struct Caller {
    pub id: Uuid,
    pub role: UserRole,
}

impl Caller {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("Car not available for test drive")]
    CarUnavailable,
    #[error("This time slot is already booked. Please select another time.")]
    SlotConflict,
    #[error("Booking not found")]
    NotFound,
    #[error("Unauthorized to cancel this booking")]
    Unauthorized,
    #[error("Booking is already cancelled")]
    AlreadyCancelled,
    #[error("Cannot cancel a completed booking")]
    AlreadyCompleted,
    #[error("Admin access required")]
    Forbidden,
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::CarUnavailable => AppError::BadRequest(err.to_string()),
            BookingError::SlotConflict => AppError::Conflict(err.to_string()),
            BookingError::NotFound => AppError::NotFound(err.to_string()),
            BookingError::Unauthorized => AppError::Unauthorized(err.to_string()),
            BookingError::AlreadyCancelled | BookingError::AlreadyCompleted => {
                AppError::Conflict(err.to_string())
            }
            BookingError::Forbidden => AppError::Forbidden(err.to_string()),
            BookingError::Validation(msg) => AppError::BadRequest(msg),
            BookingError::Database(e) => AppError::Database(e),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BookTestDrive {
    pub car_id: Uuid,
    pub booking_date: String,
    pub start_time: String,
    pub end_time: String,
    pub notes: Option<String>,
}

/// Parse and validate a requested slot. Dates are ISO (`YYYY-MM-DD`),
/// times are `HH:MM` strings and the window must be non-empty.
pub fn parse_slot(
    booking_date: &str,
    start_time: &str,
    end_time: &str,
) -> Result<NaiveDate, BookingError> {
    let date = NaiveDate::parse_from_str(booking_date, "%Y-%m-%d")
        .map_err(|_| BookingError::Validation("Invalid booking date".to_string()))?;

    let start = NaiveTime::parse_from_str(start_time, "%H:%M")
        .map_err(|_| BookingError::Validation("Invalid start time".to_string()))?;
    let end = NaiveTime::parse_from_str(end_time, "%H:%M")
        .map_err(|_| BookingError::Validation("Invalid end time".to_string()))?;

    if start >= end {
        return Err(BookingError::Validation(
            "Start time must be before end time".to_string(),
        ));
    }

    Ok(date)
}

/// Cancellation preconditions: terminal states stay put.
pub fn validate_cancel(status: BookingStatus) -> Result<(), BookingError> {
    match status {
        BookingStatus::Cancelled => Err(BookingError::AlreadyCancelled),
        BookingStatus::Completed => Err(BookingError::AlreadyCompleted),
        _ => Ok(()),
    }
}

/// A booking may be cancelled by its requester or by an admin.
pub fn may_cancel(booking_owner: Uuid, caller: &Caller) -> bool {
    booking_owner == caller.id || caller.is_admin()
}

/// Book a test drive.
///
/// The car lookup, conflict check and insert run inside one transaction,
/// and the partial unique index over active (car, date, start time) slots
/// backstops concurrent writers that race past the check. Conflict means
/// exact start-time collision, not interval overlap.
pub async fn book_test_drive(
    db: &DatabaseConnection,
    caller: &Caller,
    request: BookTestDrive,
) -> Result<test_drive::Model, BookingError> {
    let date = parse_slot(&request.booking_date, &request.start_time, &request.end_time)?;

    let txn = db.begin().await?;

    let car = car::Entity::find_by_id(request.car_id)
        .one(&txn)
        .await?
        .ok_or(BookingError::CarUnavailable)?;

    if car.status != CarStatus::Available {
        return Err(BookingError::CarUnavailable);
    }

    let conflict = test_drive::Entity::find()
        .filter(test_drive::Column::CarId.eq(request.car_id))
        .filter(test_drive::Column::BookingDate.eq(date))
        .filter(test_drive::Column::StartTime.eq(&request.start_time))
        .filter(
            test_drive::Column::Status
                .is_in([BookingStatus::Pending, BookingStatus::Confirmed]),
        )
        .one(&txn)
        .await?;

    if conflict.is_some() {
        return Err(BookingError::SlotConflict);
    }

    let now = Utc::now();
    let new_booking = test_drive::ActiveModel {
        id: Set(Uuid::new_v4()),
        car_id: Set(request.car_id),
        user_id: Set(caller.id),
        booking_date: Set(date),
        start_time: Set(request.start_time),
        end_time: Set(request.end_time),
        status: Set(BookingStatus::Pending),
        notes: Set(request.notes),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    };

    let booking = match new_booking.insert(&txn).await {
        Ok(booking) => booking,
        Err(err) => {
            if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                return Err(BookingError::SlotConflict);
            }
            return Err(err.into());
        }
    };

    txn.commit().await?;

    Ok(booking)
}

/// Cancel a booking on behalf of its owner or an admin.
pub async fn cancel_test_drive(
    db: &DatabaseConnection,
    caller: &Caller,
    booking_id: Uuid,
) -> Result<test_drive::Model, BookingError> {
    let booking = test_drive::Entity::find_by_id(booking_id)
        .one(db)
        .await?
        .ok_or(BookingError::NotFound)?;

    if !may_cancel(booking.user_id, caller) {
        return Err(BookingError::Unauthorized);
    }

    validate_cancel(booking.status)?;

    let mut active: test_drive::ActiveModel = booking.into();
    active.status = Set(BookingStatus::Cancelled);
    active.updated_at = Set(Utc::now().into());

    Ok(active.update(db).await?)
}

/// Set a booking to any status, skipping transition validation. Admin
/// escape hatch for back-office correction; not a modeled transition.
pub async fn override_status(
    db: &DatabaseConnection,
    caller: &Caller,
    booking_id: Uuid,
    new_status: BookingStatus,
) -> Result<test_drive::Model, BookingError> {
    if !caller.is_admin() {
        return Err(BookingError::Forbidden);
    }

    let booking = test_drive::Entity::find_by_id(booking_id)
        .one(db)
        .await?
        .ok_or(BookingError::NotFound)?;

    let mut active: test_drive::ActiveModel = booking.into();
    active.status = Set(new_status);
    active.updated_at = Set(Utc::now().into());

    Ok(active.update(db).await?)
}

/// Active bookings occupying slots for a car on a given day, earliest
/// first. Used to render which slots are taken.
pub async fn active_bookings_for_day(
    db: &DatabaseConnection,
    car_id: Uuid,
    date: NaiveDate,
) -> Result<Vec<test_drive::Model>, BookingError> {
    Ok(test_drive::Entity::find()
        .filter(test_drive::Column::CarId.eq(car_id))
        .filter(test_drive::Column::BookingDate.eq(date))
        .filter(
            test_drive::Column::Status
                .is_in([BookingStatus::Pending, BookingStatus::Confirmed]),
        )
        .order_by_asc(test_drive::Column::StartTime)
        .all(db)
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caller(role: UserRole) -> Caller {
        Caller {
            id: Uuid::new_v4(),
            role,
        }
    }

    #[test]
    fn test_parse_slot_accepts_valid_window() {
        assert!(parse_slot("2024-06-01", "10:00", "10:30").is_ok());
    }

    #[test]
    fn test_parse_slot_rejects_bad_date() {
        assert!(matches!(
            parse_slot("01-06-2024", "10:00", "10:30"),
            Err(BookingError::Validation(_))
        ));
    }

    #[test]
    fn test_parse_slot_rejects_bad_times() {
        assert!(parse_slot("2024-06-01", "10am", "11:00").is_err());
        assert!(parse_slot("2024-06-01", "10:00", "25:00").is_err());
    }

    #[test]
    fn test_parse_slot_rejects_empty_or_inverted_window() {
        assert!(parse_slot("2024-06-01", "10:00", "10:00").is_err());
        assert!(parse_slot("2024-06-01", "11:00", "10:00").is_err());
    }

    #[test]
    fn test_cancel_allowed_from_pending_and_confirmed() {
        assert!(validate_cancel(BookingStatus::Pending).is_ok());
        assert!(validate_cancel(BookingStatus::Confirmed).is_ok());
    }

    #[test]
    fn test_cancel_rejects_terminal_states() {
        assert!(matches!(
            validate_cancel(BookingStatus::Cancelled),
            Err(BookingError::AlreadyCancelled)
        ));
        assert!(matches!(
            validate_cancel(BookingStatus::Completed),
            Err(BookingError::AlreadyCompleted)
        ));
    }

    #[test]
    fn test_no_show_can_still_be_cancelled() {
        // Only CANCELLED and COMPLETED block cancellation.
        assert!(validate_cancel(BookingStatus::NoShow).is_ok());
    }

    #[test]
    fn test_owner_may_cancel_own_booking() {
        let owner = caller(UserRole::User);
        assert!(may_cancel(owner.id, &owner));
    }

    #[test]
    fn test_admin_may_cancel_any_booking() {
        let admin = caller(UserRole::Admin);
        assert!(may_cancel(Uuid::new_v4(), &admin));
    }

    #[test]
    fn test_stranger_may_not_cancel() {
        let stranger = caller(UserRole::User);
        assert!(!may_cancel(Uuid::new_v4(), &stranger));
    }

    #[test]
    fn test_active_statuses_occupy_slots() {
        assert!(BookingStatus::Pending.is_active());
        assert!(BookingStatus::Confirmed.is_active());
        assert!(!BookingStatus::Cancelled.is_active());
        assert!(!BookingStatus::Completed.is_active());
        assert!(!BookingStatus::NoShow.is_active());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(BookingStatus::Cancelled.is_terminal());
        assert!(BookingStatus::Completed.is_terminal());
        assert!(!BookingStatus::Pending.is_terminal());
        assert!(!BookingStatus::Confirmed.is_terminal());
        assert!(!BookingStatus::NoShow.is_terminal());
    }
}
