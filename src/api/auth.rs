//! Authentication API endpoints
//!
//! - POST /api/auth/register/ - Create an account
//! - POST /api/auth/login/ - Open a session
//! - POST /api/auth/logout/ - Close the current session
//! - GET /api/auth/me/ - Current user

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{
    clear_session_cookie, extract_session_token, session_cookie, ApiError, AppState,
    AuthenticatedUser,
};
use crate::api::responses::UserResponse;
use crate::models::{CreateUserInput, Role};
use crate::services::Registration;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    #[serde(default)]
    pub email: String,
    pub password: String,
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Username or email address
    #[serde(alias = "username_or_email")]
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub token: String,
    pub expires_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user: UserResponse,
    pub message: String,
    /// Present only when the account is active right away
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Routes that need an authenticated session
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/auth/logout/", post(logout))
        .route("/auth/me/", get(get_current_user))
}

/// Build public auth routes (no auth required)
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/auth/register/", post(register))
        .route("/auth/login/", post(login))
}

/// POST /api/auth/register/
async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let role: Role = body.role.parse().map_err(|err| ApiError::field(&err))?;
    let input = CreateUserInput::new(body.username, body.email, body.password, role);

    let registration = state.services.users.register(input).await?;
    let message = registration.message().to_string();

    let mut headers = HeaderMap::new();
    let (user, token) = match registration {
        Registration::Active { user, session } => {
            headers.insert(
                header::SET_COOKIE,
                session_cookie(&session.id, state.config.auth.session_days)?,
            );
            (user, Some(session.id))
        }
        Registration::PendingApproval(user) => (user, None),
    };

    Ok((
        StatusCode::CREATED,
        headers,
        Json(RegisterResponse {
            user: user.into(),
            message,
            token,
        }),
    ))
}

/// POST /api/auth/login/
async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.services.users.login(&body.username, &body.password).await?;
    let user = state
        .services
        .users
        .get_by_id(session.user_id)
        .await?
        .ok_or_else(|| ApiError::internal_error("Session user disappeared"))?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        session_cookie(&session.id, state.config.auth.session_days)?,
    );

    Ok((
        headers,
        Json(AuthResponse {
            user: user.into(),
            token: session.id,
            expires_at: session.expires_at.to_rfc3339(),
        }),
    ))
}

/// POST /api/auth/logout/
async fn logout(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let token = extract_session_token(&headers)
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;

    state.services.users.logout(&token).await?;

    let mut response_headers = HeaderMap::new();
    response_headers.insert(header::SET_COOKIE, clear_session_cookie());
    Ok((StatusCode::NO_CONTENT, response_headers))
}

/// GET /api/auth/me/
async fn get_current_user(user: AuthenticatedUser) -> Json<UserResponse> {
    Json(user.0.into())
}
