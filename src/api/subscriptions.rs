//! Subscription API endpoints (readers)
//!
//! POST is idempotent: 201 when the subscription is new, 200 when it
//! already existed.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState, Principal};
use crate::api::responses::{JournalistSubscriptionResponse, PublisherSubscriptionResponse};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/publisher-subscriptions/",
            get(list_publisher_subscriptions).post(create_publisher_subscription),
        )
        .route(
            "/publisher-subscriptions/{id}/",
            delete(delete_publisher_subscription),
        )
        .route(
            "/journalist-subscriptions/",
            get(list_journalist_subscriptions).post(create_journalist_subscription),
        )
        .route(
            "/journalist-subscriptions/{id}/",
            delete(delete_journalist_subscription),
        )
}

#[derive(Debug, Deserialize)]
pub struct PublisherSubscriptionRequest {
    pub publisher: i64,
}

#[derive(Debug, Deserialize)]
pub struct JournalistSubscriptionRequest {
    pub journalist: i64,
}

fn created_status(created: bool) -> StatusCode {
    if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    }
}

async fn list_publisher_subscriptions(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<Vec<PublisherSubscriptionResponse>>, ApiError> {
    let subs = state
        .services
        .subscriptions
        .list_publisher_subscriptions(principal.user())
        .await?;
    Ok(Json(subs.into_iter().map(Into::into).collect()))
}

async fn create_publisher_subscription(
    State(state): State<AppState>,
    principal: Principal,
    Json(body): Json<PublisherSubscriptionRequest>,
) -> Result<(StatusCode, Json<PublisherSubscriptionResponse>), ApiError> {
    let result = state
        .services
        .subscriptions
        .subscribe_publisher(principal.user(), body.publisher)
        .await?;
    Ok((created_status(result.created), Json(result.subscription.into())))
}

async fn delete_publisher_subscription(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state
        .services
        .subscriptions
        .delete_publisher_subscription(principal.user(), id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_journalist_subscriptions(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<Vec<JournalistSubscriptionResponse>>, ApiError> {
    let subs = state
        .services
        .subscriptions
        .list_journalist_subscriptions(principal.user())
        .await?;
    Ok(Json(subs.into_iter().map(Into::into).collect()))
}

async fn create_journalist_subscription(
    State(state): State<AppState>,
    principal: Principal,
    Json(body): Json<JournalistSubscriptionRequest>,
) -> Result<(StatusCode, Json<JournalistSubscriptionResponse>), ApiError> {
    let result = state
        .services
        .subscriptions
        .subscribe_journalist(principal.user(), body.journalist)
        .await?;
    Ok((created_status(result.created), Json(result.subscription.into())))
}

async fn delete_journalist_subscription(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state
        .services
        .subscriptions
        .delete_journalist_subscription(principal.user(), id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
