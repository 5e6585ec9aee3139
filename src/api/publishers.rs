//! Publisher and membership API endpoints (read-only)
//!
//! - GET /api/publishers/
//! - GET /api/publishers/{id}/
//! - GET /api/publisher-memberships/?publisher=&user=&member_role=
//! - GET /api/publisher-memberships/{id}/

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::non_blank;
use crate::api::middleware::{ApiError, AppState, Principal};
use crate::api::responses::{MembershipResponse, PublisherResponse};
use crate::models::{MemberRole, MembershipFilter};
use crate::services::{authorize, Capability, ServiceError};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/publishers/", get(list_publishers))
        .route("/publishers/{id}/", get(get_publisher))
        .route("/publisher-memberships/", get(list_memberships))
        .route("/publisher-memberships/{id}/", get(get_membership))
}

#[derive(Debug, Default, Deserialize)]
pub struct MembershipQuery {
    pub publisher: Option<i64>,
    pub user: Option<i64>,
    /// Matched case-insensitively
    pub member_role: Option<String>,
}

async fn list_publishers(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<Vec<PublisherResponse>>, ApiError> {
    let publishers = state.services.publishers.list(principal.user()).await?;
    Ok(Json(publishers.into_iter().map(Into::into).collect()))
}

async fn get_publisher(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> Result<Json<PublisherResponse>, ApiError> {
    let publisher = state.services.publishers.get(principal.user(), id).await?;
    Ok(Json(publisher.into()))
}

async fn list_memberships(
    State(state): State<AppState>,
    principal: Principal,
    Query(query): Query<MembershipQuery>,
) -> Result<Json<Vec<MembershipResponse>>, ApiError> {
    authorize(principal.user(), Capability::Browse).map_err(ServiceError::from)?;

    let member_role = match non_blank(&query.member_role) {
        Some(raw) => match raw.parse::<MemberRole>() {
            Ok(role) => Some(role),
            // an unknown role matches nothing
            Err(_) => return Ok(Json(Vec::new())),
        },
        None => None,
    };

    let filter = MembershipFilter {
        publisher_id: query.publisher,
        user_id: query.user,
        member_role,
    };
    let memberships = state
        .services
        .publishers
        .list_memberships(principal.user(), &filter)
        .await?;
    Ok(Json(memberships.into_iter().map(Into::into).collect()))
}

async fn get_membership(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> Result<Json<MembershipResponse>, ApiError> {
    let membership = state
        .services
        .publishers
        .get_membership(principal.user(), id)
        .await?;
    Ok(Json(membership.into()))
}
