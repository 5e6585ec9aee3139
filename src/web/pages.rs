//! Page handlers

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;

use super::{page_context, redirect_with_notice, render, PageError, Visitor};
use crate::api::common::non_blank;
use crate::api::middleware::{clear_session_cookie, extract_session_token, session_cookie, AppState};
use crate::api::responses::{ArticleResponse, ArticleSummary, PublisherResponse};
use crate::models::{ArticleFilter, CreateUserInput, ListParams, Role};
use crate::services::{permits, Capability, Registration, UserServiceError};

#[derive(Debug, Default, Deserialize)]
pub struct NoticeQuery {
    pub notice: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub username: String,
    #[serde(default)]
    pub email: String,
    pub password: String,
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct ArticleForm {
    pub title: String,
    pub content: String,
    /// Empty for an independent article
    #[serde(default)]
    pub publisher: Option<String>,
}

fn listing() -> ListParams {
    ListParams::new(1, 50)
}

/// Headers that start a browser session for `token`
pub(crate) fn signed_in(token: &str, session_days: i64) -> Result<HeaderMap, PageError> {
    let cookie = session_cookie(token, session_days).map_err(|err| {
        tracing::error!("Failed to build session cookie: {:?}", err);
        PageError::Status(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Could not start a session.".into(),
        )
    })?;
    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, cookie);
    Ok(headers)
}

/// GET /
pub async fn index(
    State(state): State<AppState>,
    visitor: Visitor,
    Query(query): Query<NoticeQuery>,
) -> Result<Response, PageError> {
    let page = state
        .services
        .articles
        .list_published(visitor.user(), &ArticleFilter::default(), &listing())
        .await?;

    let mut context = page_context(&visitor, query.notice.as_deref());
    let articles: Vec<ArticleSummary> = page.items.into_iter().map(Into::into).collect();
    context.insert("articles", &articles);

    if visitor.user().is_some_and(|user| user.is_reader()) {
        let own = state.services.subscriptions.list_own(visitor.user()).await?;
        let following: Vec<String> = own
            .publishers
            .into_iter()
            .map(|s| s.publisher_name)
            .chain(own.journalists.into_iter().map(|s| s.journalist_username))
            .collect();
        context.insert("following", &following);
    }

    Ok(render(&state, "articles.html", &context)?.into_response())
}

/// GET redirect for POST-only routes that belong to the index
pub async fn to_index() -> Redirect {
    Redirect::to("/")
}

/// GET redirect for the editorial actions
pub async fn to_queue() -> Redirect {
    Redirect::to("/queue/")
}

/// GET redirect for subscription toggles
pub async fn to_article(Path((id, _, _)): Path<(i64, String, String)>) -> Redirect {
    Redirect::to(&format!("/articles/{}/", id))
}

/// GET /login/
pub async fn login_form(
    State(state): State<AppState>,
    visitor: Visitor,
    Query(query): Query<NoticeQuery>,
) -> Result<Response, PageError> {
    let context = page_context(&visitor, query.notice.as_deref());
    Ok(render(&state, "login.html", &context)?.into_response())
}

/// POST /login/
pub async fn login(
    State(state): State<AppState>,
    visitor: Visitor,
    Form(form): Form<LoginForm>,
) -> Result<Response, PageError> {
    match state.services.users.login(&form.username, &form.password).await {
        Ok(session) => {
            let headers = signed_in(&session.id, state.config.auth.session_days)?;
            Ok((headers, Redirect::to("/")).into_response())
        }
        Err(UserServiceError::AuthenticationError(message)) => {
            let mut context = page_context(&visitor, None);
            context.insert("error", &message);
            context.insert("username", &form.username);
            Ok(render(&state, "login.html", &context)?.into_response())
        }
        Err(err) => Err(err.into()),
    }
}

/// GET /register/
pub async fn register_form(
    State(state): State<AppState>,
    visitor: Visitor,
) -> Result<Response, PageError> {
    let context = page_context(&visitor, None);
    Ok(render(&state, "register.html", &context)?.into_response())
}

/// POST /register/
pub async fn register(
    State(state): State<AppState>,
    visitor: Visitor,
    Form(form): Form<RegisterForm>,
) -> Result<Response, PageError> {
    let outcome = match form.role.parse::<Role>() {
        Ok(role) => {
            let input = CreateUserInput::new(
                form.username.clone(),
                form.email.clone(),
                form.password,
                role,
            );
            state.services.users.register(input).await
        }
        Err(err) => Err(UserServiceError::ValidationError(err)),
    };

    let error = match outcome {
        Ok(registration) => {
            let message = registration.message();
            return Ok(match registration {
                Registration::Active { session, .. } => {
                    let headers = signed_in(&session.id, state.config.auth.session_days)?;
                    (headers, redirect_with_notice("/", message)).into_response()
                }
                Registration::PendingApproval(_) => {
                    redirect_with_notice("/login/", message).into_response()
                }
            });
        }
        Err(UserServiceError::ValidationError(err)) => err.message,
        Err(UserServiceError::UserExists(message)) => message,
        Err(err) => return Err(err.into()),
    };

    let mut context = page_context(&visitor, None);
    context.insert("error", &error);
    context.insert("username", &form.username);
    context.insert("email", &form.email);
    Ok(render(&state, "register.html", &context)?.into_response())
}

/// POST /logout/
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(token) = extract_session_token(&headers) {
        if let Err(err) = state.services.users.logout(&token).await {
            tracing::warn!("Logout failed: {}", err);
        }
    }
    let mut response_headers = HeaderMap::new();
    response_headers.insert(header::SET_COOKIE, clear_session_cookie());
    (response_headers, Redirect::to("/login/")).into_response()
}

/// GET /articles/new/
pub async fn article_form(
    State(state): State<AppState>,
    visitor: Visitor,
) -> Result<Response, PageError> {
    if !permits(visitor.user(), Capability::CreateArticle) {
        return match visitor.user() {
            None => Err(PageError::Login),
            Some(_) => Ok(redirect_with_notice("/", "Only journalists can write articles.")
                .into_response()),
        };
    }

    let publishers: Vec<PublisherResponse> = state
        .services
        .publishers
        .list(visitor.user())
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    let mut context = page_context(&visitor, None);
    context.insert("publishers", &publishers);
    Ok(render(&state, "article_form.html", &context)?.into_response())
}

/// POST /articles/new/
pub async fn create_article(
    State(state): State<AppState>,
    visitor: Visitor,
    Form(form): Form<ArticleForm>,
) -> Result<Response, PageError> {
    let publisher = match non_blank(&form.publisher) {
        Some(raw) => match raw.parse::<i64>() {
            Ok(id) => Some(id),
            Err(_) => {
                return Ok(redirect_with_notice("/articles/new/", "Unknown publisher.").into_response())
            }
        },
        None => None,
    };

    let article = state
        .services
        .articles
        .submit(visitor.user(), &form.title, &form.content, publisher)
        .await?;

    tracing::debug!(article_id = article.id, "Article submitted from the web form");
    Ok(redirect_with_notice("/", "Article submitted for review.").into_response())
}

/// GET /articles/{id}/
pub async fn article_detail(
    State(state): State<AppState>,
    visitor: Visitor,
    Path(id): Path<i64>,
    Query(query): Query<NoticeQuery>,
) -> Result<Response, PageError> {
    let article = state.services.articles.get(visitor.user(), id).await?;

    let mut context = page_context(&visitor, query.notice.as_deref());
    let mut follows_publisher = false;
    let mut follows_journalist = false;
    let reader = visitor.user().filter(|user| user.is_reader());
    let subscriptions = &state.services.subscriptions;
    if let Some(user) = reader {
        if let Some(publisher_id) = article.publisher_id {
            follows_publisher = subscriptions.follows_publisher(user, publisher_id).await?;
        }
        follows_journalist = subscriptions.follows_journalist(user, article.author_id).await?;
    }
    context.insert("is_reader", &reader.is_some());
    context.insert("follows_publisher", &follows_publisher);
    context.insert("follows_journalist", &follows_journalist);
    context.insert("can_review", &permits(visitor.user(), Capability::ReviewQueue));
    context.insert("article", &ArticleResponse::from(article));

    Ok(render(&state, "article_detail.html", &context)?.into_response())
}

/// POST /articles/{id}/{subscribe|unsubscribe}/{publisher|journalist}/
pub async fn toggle_subscription(
    State(state): State<AppState>,
    visitor: Visitor,
    Path((id, action, target)): Path<(i64, String, String)>,
) -> Result<Response, PageError> {
    let article = state.services.articles.get(visitor.user(), id).await?;
    let back = format!("/articles/{}/", id);
    let subscriptions = &state.services.subscriptions;

    let notice = match (action.as_str(), target.as_str()) {
        ("subscribe", "journalist") => {
            subscriptions.subscribe_journalist(visitor.user(), article.author_id).await?;
            format!("Subscribed to {}.", article.author_username)
        }
        ("unsubscribe", "journalist") => {
            subscriptions.unsubscribe_journalist(visitor.user(), article.author_id).await?;
            format!("Unsubscribed from {}.", article.author_username)
        }
        (action @ ("subscribe" | "unsubscribe"), "publisher") => {
            let Some(publisher_id) = article.publisher_id else {
                return Ok(
                    redirect_with_notice(&back, "This article has no publisher.").into_response()
                );
            };
            let name = article.publisher_display();
            if action == "subscribe" {
                subscriptions.subscribe_publisher(visitor.user(), publisher_id).await?;
                format!("Subscribed to {}.", name)
            } else {
                subscriptions.unsubscribe_publisher(visitor.user(), publisher_id).await?;
                format!("Unsubscribed from {}.", name)
            }
        }
        _ => return Ok(Redirect::to(&back).into_response()),
    };

    Ok(redirect_with_notice(&back, &notice).into_response())
}

/// GET /queue/
pub async fn queue(
    State(state): State<AppState>,
    visitor: Visitor,
    Query(query): Query<NoticeQuery>,
) -> Result<Response, PageError> {
    let page = state
        .services
        .articles
        .list_pending(visitor.user(), &listing())
        .await?;

    let mut context = page_context(&visitor, query.notice.as_deref());
    let articles: Vec<ArticleSummary> = page.items.into_iter().map(Into::into).collect();
    context.insert("articles", &articles);
    Ok(render(&state, "queue.html", &context)?.into_response())
}

/// POST /queue/{id}/approve/
pub async fn approve(
    State(state): State<AppState>,
    visitor: Visitor,
    Path(id): Path<i64>,
) -> Result<Response, PageError> {
    let approval = state.services.articles.approve(visitor.user(), id).await?;
    let notice = format!(
        "Approved \"{}\". {} subscriber(s) notified.",
        approval.article.title, approval.notified
    );
    Ok(redirect_with_notice("/queue/", &notice).into_response())
}

/// POST /queue/{id}/reject/
pub async fn reject(
    State(state): State<AppState>,
    visitor: Visitor,
    Path(id): Path<i64>,
) -> Result<Response, PageError> {
    state.services.articles.reject(visitor.user(), id).await?;
    Ok(redirect_with_notice("/queue/", "Article rejected and deleted.").into_response())
}
