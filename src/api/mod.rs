//! API layer - HTTP handlers and routing
//!
//! All JSON endpoints live under `/api/v1`:
//! - auth, packages, categories, inquiries, chat and the payment webhook are
//!   public
//! - bookings and checkout need a session
//! - `/admin/*` needs the editor role, `/admin/users` the admin role
//!
//! Uploaded images are served from the upload directory under `/uploads`.

pub mod admin;
pub mod auth;
pub mod bookings;
pub mod categories;
pub mod chat;
pub mod checkout;
pub mod common;
pub mod leads;
pub mod middleware;
pub mod packages;
pub mod upload;
pub mod webhooks;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, services::ServeDir, trace::TraceLayer,
};

use crate::config::Config;

pub use middleware::{ApiError, AppState, AuthenticatedUser};

/// Multipart framing on top of the largest accepted file
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Build the main API router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    let upload_limit = state.storage.config().max_file_size as usize + MULTIPART_OVERHEAD;

    // Admin routes (editor or admin; user management is admin only)
    let admin_routes = Router::new()
        .nest(
            "/admin/users",
            admin::users_router().route_layer(axum_middleware::from_fn(middleware::require_admin)),
        )
        .nest("/admin", admin::router())
        .nest("/admin/packages", packages::admin_router())
        .nest("/admin/categories", categories::admin_router())
        .nest("/admin/inquiries", leads::admin_inquiries_router())
        .nest("/admin/quotes", leads::admin_quotes_router())
        .nest("/admin/bookings", bookings::admin_bookings_router())
        .nest("/admin/payments", bookings::admin_payments_router())
        .nest("/admin/chat", chat::admin_router())
        .nest(
            "/admin/upload",
            upload::router().layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route_layer(axum_middleware::from_fn(middleware::require_editor))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Protected routes (any signed-in user)
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .nest("/bookings", bookings::protected_router())
        .nest("/checkout", checkout::protected_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Chat links a session to the visitor when they are signed in
    let chat_routes = Router::new()
        .nest("/chat", chat::public_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::optional_auth,
        ));

    // Public routes
    Router::new()
        .nest("/auth", auth::public_router())
        .nest("/packages", packages::public_router())
        .nest("/categories", categories::public_router())
        .nest("/inquiries", leads::public_router())
        .nest("/webhooks", webhooks::router())
        .merge(chat_routes)
        .merge(admin_routes)
        .merge(protected_routes)
}

fn cors_layer(cors_origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE]);

    match cors_origin.parse::<HeaderValue>() {
        Ok(origin) if cors_origin != "*" => layer.allow_origin(origin).allow_credentials(true),
        Ok(_) => layer.allow_origin(tower_http::cors::Any),
        Err(e) => {
            tracing::warn!(origin = cors_origin, error = %e, "Invalid CORS origin, cross-origin requests disabled");
            layer
        }
    }
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, config: &Config) -> Router {
    let uploads = ServeDir::new(&config.upload.path);

    Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        .nest_service(&config.upload.public_prefix, uploads)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(cors_layer(&config.server.cors_origin)),
        )
        .with_state(state)
}
