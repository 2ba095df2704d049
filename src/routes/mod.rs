use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use crate::handlers::{account, admin, auth, cars, settings};
use crate::middleware::auth::{auth_middleware, require_admin};
use crate::middleware::rate_limit::{create_public_governor, create_user_governor};
use crate::AppState;

pub fn create_router(state: AppState) -> Router {
    let public_governor = create_public_governor();
    let user_governor = create_user_governor();

    // Public routes (IP-based rate limiting)
    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .layer(public_governor.clone());

    // Public marketplace routes
    let public_routes = Router::new()
        .route("/cars", get(cars::list_cars))
        .route("/cars/filters", get(cars::get_car_filters))
        .route("/cars/featured", get(cars::featured_cars))
        .route("/cars/{id}", get(cars::get_car))
        .route("/cars/{id}/availability", get(cars::car_availability))
        .layer(public_governor);

    // Authenticated routes, any role (per-user rate limiting)
    let account_routes = Router::new()
        .route("/bookings", post(account::book_test_drive))
        .route("/bookings", get(account::my_reservations))
        .route("/bookings/{id}/cancel", post(account::cancel_reservation))
        .route("/saved-cars", get(account::saved_cars))
        .route("/saved-cars/{car_id}", post(account::toggle_saved_car))
        .layer(user_governor)
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    // Admin routes (requires auth + admin role)
    let admin_routes = Router::new()
        // Inventory
        .route("/cars", get(admin::list_all_cars))
        .route("/cars", post(admin::create_car))
        .route("/cars/scan", post(admin::scan_car_image))
        .route("/cars/{id}", delete(admin::delete_car))
        .route("/cars/{id}/status", put(admin::update_car_status))
        // Test drives
        .route("/test-drives", get(admin::list_test_drives))
        .route("/test-drives/{id}/status", put(admin::update_test_drive_status))
        // Users
        .route("/users", get(admin::list_users))
        .route("/users/{id}/role", put(admin::update_user_role))
        // Dashboard
        .route("/dashboard", get(admin::dashboard))
        // Settings
        .route("/settings/dealership", get(settings::get_dealership))
        .route("/settings/dealership", put(settings::update_dealership))
        .route("/settings/working-hours", put(settings::save_working_hours))
        .layer(middleware::from_fn(require_admin))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    // Combine all routes
    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api", public_routes)
        .nest("/api/me", account_routes)
        .nest("/api/admin", admin_routes)
        .with_state(state)
}
