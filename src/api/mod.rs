//! API layer - HTTP handlers and routing
//!
//! Every JSON endpoint lives under `/api`:
//! - Auth endpoints (register, login, logout, me)
//! - Article endpoints, including the editorial queue
//! - Publisher and membership endpoints
//! - Subscription endpoints
//! - Newsletter endpoints
//!
//! The server-rendered pages from [`crate::web`] are merged at the root.

pub mod articles;
pub mod auth;
pub mod common;
pub mod middleware;
pub mod newsletters;
pub mod publishers;
pub mod responses;
pub mod subscriptions;

#[cfg(test)]
mod tests;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use middleware::{ApiError, AppState, AuthenticatedUser, Principal};

/// Build the `/api` router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Routes that need a session
    let protected_routes = Router::new()
        .merge(auth::protected_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Everything else resolves the principal when a session is present;
    // the services decide what an anonymous caller may do.
    let open_routes = Router::new()
        .merge(auth::public_router())
        .merge(articles::router())
        .merge(publishers::router())
        .merge(subscriptions::router())
        .merge(newsletters::router())
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::optional_auth,
        ));

    Router::new().merge(protected_routes).merge(open_routes)
}

/// CORS for the configured origin, credentials allowed
fn cors_layer(cors_origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
        .allow_credentials(true);

    match cors_origin.parse::<HeaderValue>() {
        Ok(origin) => cors.allow_origin(origin),
        Err(_) => {
            tracing::warn!("Ignoring invalid CORS origin: {:?}", cors_origin);
            cors
        }
    }
}

/// Build the complete router with middleware
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.cors_origin);

    Router::new()
        .nest("/api", build_api_router(state.clone()))
        .merge(crate::web::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
