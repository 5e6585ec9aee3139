//! Newsletter API endpoints
//!
//! `/api/newsletters/{id}/manage/` is an alias of the detail route.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::{Paginated, PaginationQuery};
use crate::api::middleware::{ApiError, AppState, Principal};
use crate::api::responses::{NewsletterResponse, NewsletterSummary};
use crate::models::{Newsletter, NewsletterChanges, User};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/newsletters/", get(list_newsletters).post(create_newsletter))
        .route(
            "/newsletters/{id}/",
            get(get_newsletter)
                .put(replace_newsletter)
                .patch(patch_newsletter)
                .delete(delete_newsletter),
        )
        .route(
            "/newsletters/{id}/manage/",
            get(get_newsletter)
                .put(replace_newsletter)
                .patch(patch_newsletter)
                .delete(delete_newsletter),
        )
}

#[derive(Debug, Deserialize)]
pub struct NewsletterRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub articles: Vec<i64>,
}

#[derive(Debug, Deserialize)]
pub struct PatchNewsletterRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub articles: Option<Vec<i64>>,
}

async fn detail(
    state: &AppState,
    principal: Option<&User>,
    newsletter: Newsletter,
) -> Result<NewsletterResponse, ApiError> {
    let articles = state
        .services
        .newsletters
        .articles_for(principal, &newsletter)
        .await?;
    Ok(NewsletterResponse::new(newsletter, articles))
}

async fn list_newsletters(
    State(state): State<AppState>,
    principal: Principal,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<Paginated<NewsletterSummary>>, ApiError> {
    let page = state
        .services
        .newsletters
        .list(principal.user(), &query.params())
        .await?;
    Ok(Json(Paginated::from_page(page, NewsletterSummary::from)))
}

async fn create_newsletter(
    State(state): State<AppState>,
    principal: Principal,
    Json(body): Json<NewsletterRequest>,
) -> Result<(StatusCode, Json<NewsletterResponse>), ApiError> {
    let newsletter = state
        .services
        .newsletters
        .create(principal.user(), &body.title, &body.description, body.articles)
        .await?;
    let response = detail(&state, principal.user(), newsletter).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn get_newsletter(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> Result<Json<NewsletterResponse>, ApiError> {
    let newsletter = state.services.newsletters.get(principal.user(), id).await?;
    Ok(Json(detail(&state, principal.user(), newsletter).await?))
}

async fn replace_newsletter(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    Json(body): Json<NewsletterRequest>,
) -> Result<Json<NewsletterResponse>, ApiError> {
    let changes = NewsletterChanges {
        title: Some(body.title),
        description: Some(body.description),
        article_ids: Some(body.articles),
    };
    let newsletter = state
        .services
        .newsletters
        .update(principal.user(), id, changes)
        .await?;
    Ok(Json(detail(&state, principal.user(), newsletter).await?))
}

async fn patch_newsletter(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    Json(body): Json<PatchNewsletterRequest>,
) -> Result<Json<NewsletterResponse>, ApiError> {
    let changes = NewsletterChanges {
        title: body.title,
        description: body.description,
        article_ids: body.articles,
    };
    let newsletter = state
        .services
        .newsletters
        .update(principal.user(), id, changes)
        .await?;
    Ok(Json(detail(&state, principal.user(), newsletter).await?))
}

async fn delete_newsletter(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.services.newsletters.delete(principal.user(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
