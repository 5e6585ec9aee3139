//! Server-rendered web UI
//!
//! Pages are rendered with Tera from templates compiled into the binary.
//! The visitor is resolved from the same session cookie the API accepts.
//! State-changing routes are POST only; a GET on them redirects to the page
//! the action belongs to. Outcome messages travel to the next page in the
//! `notice` query parameter.

mod pages;


use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use std::convert::Infallible;
use std::error::Error as _;
use tera::{Context, Tera};

use crate::api::middleware::{extract_session_token, AppState};
use crate::models::User;
use crate::services::{ServiceError, UserServiceError};

const TEMPLATES: &[(&str, &str)] = &[
    ("base.html", include_str!("templates/base.html")),
    ("login.html", include_str!("templates/login.html")),
    ("register.html", include_str!("templates/register.html")),
    ("articles.html", include_str!("templates/articles.html")),
    ("article_form.html", include_str!("templates/article_form.html")),
    ("article_detail.html", include_str!("templates/article_detail.html")),
    ("queue.html", include_str!("templates/queue.html")),
];

/// Compile the embedded page templates
pub fn templates() -> anyhow::Result<Tera> {
    let mut tera = Tera::default();
    tera.add_raw_templates(TEMPLATES.iter().copied())
        .map_err(|e| anyhow::anyhow!("Failed to load page templates: {}", e))?;
    Ok(tera)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(pages::index))
        .route("/login/", get(pages::login_form).post(pages::login))
        .route("/register/", get(pages::register_form).post(pages::register))
        .route("/logout/", get(pages::to_index).post(pages::logout))
        .route(
            "/articles/new/",
            get(pages::article_form).post(pages::create_article),
        )
        .route("/articles/{id}/", get(pages::article_detail))
        .route(
            "/queue/{id}/approve/",
            get(pages::to_queue).post(pages::approve),
        )
        .route(
            "/queue/{id}/reject/",
            get(pages::to_queue).post(pages::reject),
        )
        .route(
            "/articles/{id}/{action}/{target}/",
            get(pages::to_article).post(pages::toggle_subscription),
        )
        .route("/queue/", get(pages::queue))
}

/// Whoever is browsing, resolved from the session cookie
#[derive(Debug, Clone)]
pub struct Visitor(pub Option<User>);

impl Visitor {
    pub fn user(&self) -> Option<&User> {
        self.0.as_ref()
    }
}

impl FromRequestParts<AppState> for Visitor {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = extract_session_token(&parts.headers) else {
            return Ok(Visitor(None));
        };
        match state.services.users.validate_session(&token).await {
            Ok(user) => Ok(Visitor(user)),
            Err(err) => {
                tracing::warn!("Session validation failed: {}", err);
                Ok(Visitor(None))
            }
        }
    }
}

#[derive(Serialize)]
struct PageUser<'a> {
    id: i64,
    username: &'a str,
    role: &'static str,
    role_label: &'static str,
}

/// Context every page starts from
pub(crate) fn page_context(visitor: &Visitor, notice: Option<&str>) -> Context {
    let mut context = Context::new();
    if let Some(user) = visitor.user() {
        context.insert(
            "user",
            &PageUser {
                id: user.id,
                username: &user.username,
                role: user.role.as_str(),
                role_label: user.role.label(),
            },
        );
    }
    if let Some(notice) = notice.filter(|n| !n.trim().is_empty()) {
        context.insert("notice", notice);
    }
    context
}

pub(crate) fn render(
    state: &AppState,
    template: &str,
    context: &Context,
) -> Result<Html<String>, PageError> {
    state.templates.render(template, context).map(Html).map_err(|e| {
        let mut message = format!("Failed to render '{}': {}", template, e);
        let mut source = e.source();
        while let Some(s) = source {
            message.push_str(&format!("\n  Caused by: {}", s));
            source = s.source();
        }
        tracing::error!("{}", message);
        PageError::Status(StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong.".into())
    })
}

/// Redirect to `path`, carrying `notice` along
pub(crate) fn redirect_with_notice(path: &str, notice: &str) -> Redirect {
    Redirect::to(&format!("{}?notice={}", path, urlencoding::encode(notice)))
}

/// Failure while serving a page
#[derive(Debug)]
pub enum PageError {
    /// No usable session; send the visitor to the login page
    Login,
    Status(StatusCode, String),
}

impl From<ServiceError> for PageError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unauthenticated => PageError::Login,
            ServiceError::Forbidden(message) => PageError::Status(StatusCode::FORBIDDEN, message),
            ServiceError::NotFound(what) => {
                PageError::Status(StatusCode::NOT_FOUND, format!("{} not found.", what))
            }
            ServiceError::Validation(err) => PageError::Status(StatusCode::BAD_REQUEST, err.message),
            ServiceError::Conflict(message) => PageError::Status(StatusCode::CONFLICT, message),
            ServiceError::Notification { source, .. } => {
                tracing::error!("Notification failed: {:#}", source);
                PageError::Status(
                    StatusCode::BAD_GATEWAY,
                    "The article was approved but subscriber notifications failed.".into(),
                )
            }
            ServiceError::Internal(err) => {
                tracing::error!("Internal error: {:#}", err);
                PageError::Status(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Something went wrong.".into(),
                )
            }
        }
    }
}

impl From<UserServiceError> for PageError {
    fn from(err: UserServiceError) -> Self {
        tracing::error!("Account error: {}", err);
        PageError::Status(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Something went wrong.".into(),
        )
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        match self {
            PageError::Login => Redirect::to("/login/").into_response(),
            PageError::Status(status, message) => {
                (status, Html(simple_error_page(status, &message))).into_response()
            }
        }
    }
}

fn simple_error_page(status: StatusCode, message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>{status}</title>
</head>
<body>
    <h1>{status}</h1>
    <p>{message}</p>
    <p><a href="/">Back to articles</a></p>
</body>
</html>"#,
        status = status,
        message = tera::escape_html(message),
    )
}
