//! Route definitions for the TBS trading platform

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/profile", get(handlers::get_profile).put(handlers::update_profile))
        .route("/kebun", get(handlers::list_kebun))
        .nest("/stok", stock_routes())
        .nest("/purchase-orders", order_routes())
        .route(
            "/jadwal",
            get(handlers::list_schedules).post(handlers::create_schedule),
        )
        .nest("/timbangan", weighbridge_routes())
        .route("/dokumen", get(handlers::list_documents))
        .route("/dokumen/:id", get(handlers::get_document))
        .nest("/pembayaran", payment_routes())
        .route("/reports/daily-sales", get(handlers::daily_sales))
        .route("/reports/dashboard", get(handlers::dashboard))
        .route("/logs", get(handlers::list_logs))
        .route("/logs/statistics", get(handlers::log_statistics))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Auth routes (public)
        .nest("/auth", auth_routes())
        .merge(protected)
}

/// Authentication routes (public)
fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login))
}

/// Stock lot routes (protected)
fn stock_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_stock).post(handlers::create_stock))
        .route("/:id", get(handlers::get_stock).put(handlers::update_stock))
}

/// Purchase order routes (protected)
fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_orders).post(handlers::create_order))
        .route("/:id", get(handlers::get_order).delete(handlers::cancel_order))
        .route("/:id/status", put(handlers::update_order_status))
}

/// Weighbridge routes (protected)
fn weighbridge_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_weighings))
        .route("/:id/weigh-in", post(handlers::weigh_in))
        .route("/:id/weigh-out", post(handlers::weigh_out))
}

/// Payment routes (protected)
fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_payments).post(handlers::create_payment))
        .route("/:id/verify", put(handlers::verify_payment))
}
