//! Article API endpoints
//!
//! - GET /api/articles/ - List articles visible to the caller
//! - POST /api/articles/ - Submit an article (journalists)
//! - GET /api/articles/pending/ - Editorial queue (editors)
//! - GET /api/articles/subscribed/ - Subscribed feed (readers)
//! - GET/PUT/PATCH/DELETE /api/articles/{id}/
//! - POST /api/articles/{id}/approve/ and /reject/ (editors)

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Deserializer};

use crate::api::common::{Paginated, PaginationQuery};
use crate::api::middleware::{ApiError, AppState, Principal};
use crate::api::responses::{ApprovalResponse, ArticleResponse, ArticleSummary, RejectionResponse};
use crate::models::{ArticleChanges, ArticleFilter};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/articles/", get(list_articles).post(create_article))
        .route("/articles/pending/", get(list_pending))
        .route("/articles/subscribed/", get(list_subscribed))
        .route(
            "/articles/{id}/",
            get(get_article)
                .put(replace_article)
                .patch(patch_article)
                .delete(delete_article),
        )
        .route("/articles/{id}/approve/", post(approve_article))
        .route("/articles/{id}/reject/", post(reject_article))
}

/// Query parameters for listing articles
#[derive(Debug, Default, Deserialize)]
pub struct ListArticlesQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    /// Narrow to one publisher
    pub publisher: Option<i64>,
    /// Narrow to one author
    pub author: Option<i64>,
}

/// Writable fields. Anything else in the body (approval state included) is
/// ignored.
#[derive(Debug, Deserialize)]
pub struct CreateArticleRequest {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub publisher: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct PatchArticleRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    /// Absent leaves the publisher alone, `null` clears it
    #[serde(default, deserialize_with = "present_or_null")]
    pub publisher: Option<Option<i64>>,
}

fn present_or_null<'de, D>(deserializer: D) -> Result<Option<Option<i64>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<i64>::deserialize(deserializer).map(Some)
}

/// GET /api/articles/
async fn list_articles(
    State(state): State<AppState>,
    principal: Principal,
    Query(query): Query<ListArticlesQuery>,
) -> Result<Json<Paginated<ArticleSummary>>, ApiError> {
    let mut filter = ArticleFilter::default();
    if let Some(publisher) = query.publisher {
        filter = filter.publisher(publisher);
    }
    if let Some(author) = query.author {
        filter = filter.author(author);
    }
    let params = PaginationQuery {
        page: query.page,
        page_size: query.page_size,
    }
    .params();

    let page = state
        .services
        .articles
        .list(principal.user(), &filter, &params)
        .await?;
    Ok(Json(Paginated::from_page(page, ArticleSummary::from)))
}

/// POST /api/articles/
async fn create_article(
    State(state): State<AppState>,
    principal: Principal,
    Json(body): Json<CreateArticleRequest>,
) -> Result<(StatusCode, Json<ArticleResponse>), ApiError> {
    let article = state
        .services
        .articles
        .submit(principal.user(), &body.title, &body.content, body.publisher)
        .await?;
    Ok((StatusCode::CREATED, Json(article.into())))
}

/// GET /api/articles/pending/
async fn list_pending(
    State(state): State<AppState>,
    principal: Principal,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<Paginated<ArticleSummary>>, ApiError> {
    let page = state
        .services
        .articles
        .list_pending(principal.user(), &query.params())
        .await?;
    Ok(Json(Paginated::from_page(page, ArticleSummary::from)))
}

/// GET /api/articles/subscribed/
async fn list_subscribed(
    State(state): State<AppState>,
    principal: Principal,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<Paginated<ArticleSummary>>, ApiError> {
    let page = state
        .services
        .articles
        .list_subscribed(principal.user(), &query.params())
        .await?;
    Ok(Json(Paginated::from_page(page, ArticleSummary::from)))
}

/// GET /api/articles/{id}/
async fn get_article(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> Result<Json<ArticleResponse>, ApiError> {
    let article = state.services.articles.get(principal.user(), id).await?;
    Ok(Json(article.into()))
}

/// PUT /api/articles/{id}/
async fn replace_article(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    Json(body): Json<CreateArticleRequest>,
) -> Result<Json<ArticleResponse>, ApiError> {
    let changes = ArticleChanges::default()
        .title(body.title)
        .content(body.content)
        .publisher(body.publisher);
    let article = state
        .services
        .articles
        .update(principal.user(), id, changes)
        .await?;
    Ok(Json(article.into()))
}

/// PATCH /api/articles/{id}/
async fn patch_article(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    Json(body): Json<PatchArticleRequest>,
) -> Result<Json<ArticleResponse>, ApiError> {
    let changes = ArticleChanges {
        title: body.title,
        content: body.content,
        publisher_id: body.publisher,
    };
    let article = state
        .services
        .articles
        .update(principal.user(), id, changes)
        .await?;
    Ok(Json(article.into()))
}

/// DELETE /api/articles/{id}/
async fn delete_article(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.services.articles.delete(principal.user(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/articles/{id}/approve/
async fn approve_article(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> Result<Json<ApprovalResponse>, ApiError> {
    let approval = state.services.articles.approve(principal.user(), id).await?;
    let article = approval.article;
    Ok(Json(ApprovalResponse {
        message: "Article approved.".to_string(),
        article_id: article.id,
        approved: article.approved,
        approved_at: article.approved_at.map(|dt| dt.to_rfc3339()),
        approved_by: article.approved_by_username,
        notified: approval.notified,
    }))
}

/// POST /api/articles/{id}/reject/
async fn reject_article(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> Result<Json<RejectionResponse>, ApiError> {
    let article_id = state.services.articles.reject(principal.user(), id).await?;
    Ok(Json(RejectionResponse {
        message: "Article rejected and deleted.".to_string(),
        article_id,
    }))
}
