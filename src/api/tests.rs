use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use super::{build_router, AppState};
use crate::config::Config;
use crate::db::repositories::test_support::{migrated_pool, seed_publisher};
use crate::models::{CreateUserInput, Role, User};
use crate::services::mailer::MemoryMailer;

struct TestApp {
    router: Router,
    state: AppState,
    mailer: Arc<MemoryMailer>,
}

impl TestApp {
    async fn new() -> Self {
        let pool = migrated_pool().await;
        let mailer = Arc::new(MemoryMailer::new());
        let state = AppState::new(pool, Config::default(), mailer.clone()).unwrap();
        Self {
            router: build_router(state.clone()),
            state,
            mailer,
        }
    }

    /// Create an active account and return it with a bearer token
    async fn login_as(&self, username: &str, role: Role) -> (User, String) {
        let users = &self.state.services.users;
        let user = users
            .create_user(
                CreateUserInput::new(username, format!("{}@news.test", username), "pw-123456", role),
                true,
            )
            .await
            .unwrap();
        let session = users.login(username, "pw-123456").await.unwrap();
        (user, session.id)
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    async fn submit(&self, token: &str, title: &str, publisher: Option<i64>) -> i64 {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/articles/",
                Some(token),
                Some(json!({ "title": title, "content": "Body text", "publisher": publisher })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["id"].as_i64().unwrap()
    }
}

#[tokio::test]
async fn test_anonymous_requests_are_rejected() {
    let app = TestApp::new().await;

    let (status, body) = app.send(Method::GET, "/api/articles/", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let (status, _) = app.send(Method::GET, "/api/auth/me/", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .send(Method::GET, "/api/articles/", Some("not-a-session"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_login_and_me() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/auth/register/",
            None,
            Some(json!({
                "username": "rita",
                "email": "rita@news.test",
                "password": "pw-123456",
                "role": "reader",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert!(body["token"].is_string());

    let (status, body) = app
        .send(
            Method::POST,
            "/api/auth/login/",
            None,
            Some(json!({ "username": "rita", "password": "pw-123456" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap().to_string();

    let (status, body) = app.send(Method::GET, "/api/auth/me/", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "rita");

    let (status, _) = app.send(Method::POST, "/api/auth/logout/", Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.send(Method::GET, "/api/auth/me/", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_rejects_unknown_role() {
    let app = TestApp::new().await;
    let (status, body) = app
        .send(
            Method::POST,
            "/api/auth/register/",
            None,
            Some(json!({
                "username": "mallory",
                "email": "m@news.test",
                "password": "pw-123456",
                "role": "admin",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["details"]["role"].is_array());
}

#[tokio::test]
async fn test_reader_cannot_approve() {
    let app = TestApp::new().await;
    let (_, journalist) = app.login_as("jane", Role::Journalist).await;
    let (_, reader) = app.login_as("rob", Role::Reader).await;
    let (_, editor) = app.login_as("perry", Role::Editor).await;
    let id = app.submit(&journalist, "Draft", None).await;

    let (status, body) = app
        .send(Method::POST, &format!("/api/articles/{}/approve/", id), Some(&reader), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    let (status, body) = app
        .send(Method::GET, &format!("/api/articles/{}/", id), Some(&editor), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["approved"], false);
    assert!(app.mailer.sent().is_empty());
}

#[tokio::test]
async fn test_approval_notifies_each_subscriber_once() {
    let app = TestApp::new().await;
    let publisher = seed_publisher(&app.state.pool, "Daily Planet").await;
    let (journalist_user, journalist) = app.login_as("jimmy", Role::Journalist).await;
    let (_, editor) = app.login_as("perry", Role::Editor).await;
    let (_, r1) = app.login_as("r1", Role::Reader).await;
    let (_, r2) = app.login_as("r2", Role::Reader).await;
    let (_, r3) = app.login_as("r3", Role::Reader).await;
    let (r4_user, r4) = app.login_as("r4", Role::Reader).await;

    for token in [&r1, &r3, &r4] {
        let (status, _) = app
            .send(
                Method::POST,
                "/api/publisher-subscriptions/",
                Some(token),
                Some(json!({ "publisher": publisher.id })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }
    for token in [&r2, &r3] {
        let (status, _) = app
            .send(
                Method::POST,
                "/api/journalist-subscriptions/",
                Some(token),
                Some(json!({ "journalist": journalist_user.id })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }
    sqlx::query("UPDATE users SET email = '' WHERE id = ?")
        .bind(r4_user.id)
        .execute(&app.state.pool)
        .await
        .unwrap();

    let id = app.submit(&journalist, "Scoop", Some(publisher.id)).await;
    let (status, body) = app
        .send(Method::POST, &format!("/api/articles/{}/approve/", id), Some(&editor), None)
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["approved"], true);
    assert_eq!(body["approved_by"], "perry");
    assert_eq!(body["notified"], 3);

    let mut recipients: Vec<String> = app
        .mailer
        .sent()
        .into_iter()
        .flat_map(|mail| mail.to)
        .collect();
    recipients.sort();
    assert_eq!(
        recipients,
        vec!["r1@news.test", "r2@news.test", "r3@news.test"]
    );
}

#[tokio::test]
async fn test_second_approval_conflicts() {
    let app = TestApp::new().await;
    let (_, journalist) = app.login_as("jane", Role::Journalist).await;
    let (_, editor) = app.login_as("perry", Role::Editor).await;
    let id = app.submit(&journalist, "Once", None).await;
    let uri = format!("/api/articles/{}/approve/", id);

    let (status, _) = app.send(Method::POST, &uri, Some(&editor), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = app.send(Method::POST, &uri, Some(&editor), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");

    let (status, _) = app
        .send(Method::POST, "/api/articles/9999/approve/", Some(&editor), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_pending_article_visibility() {
    let app = TestApp::new().await;
    let (_, journalist) = app.login_as("jane", Role::Journalist).await;
    let (_, editor) = app.login_as("perry", Role::Editor).await;
    let (_, reader) = app.login_as("rob", Role::Reader).await;
    let id = app.submit(&journalist, "Embargoed", None).await;
    let uri = format!("/api/articles/{}/", id);

    let (status, _) = app.send(Method::GET, &uri, Some(&editor), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.send(Method::GET, &uri, Some(&reader), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .send(Method::GET, "/api/articles/pending/", Some(&editor), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    let (status, _) = app
        .send(Method::GET, "/api/articles/pending/", Some(&reader), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, body) = app.send(Method::GET, "/api/articles/", Some(&reader), None).await;
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn test_reject_deletes_article() {
    let app = TestApp::new().await;
    let (_, journalist) = app.login_as("jane", Role::Journalist).await;
    let (_, editor) = app.login_as("perry", Role::Editor).await;
    let id = app.submit(&journalist, "Spiked", None).await;

    let (status, body) = app
        .send(Method::POST, &format!("/api/articles/{}/reject/", id), Some(&editor), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["article_id"], id);

    let (status, _) = app
        .send(Method::GET, &format!("/api/articles/{}/", id), Some(&editor), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_subscribe_is_idempotent() {
    let app = TestApp::new().await;
    let publisher = seed_publisher(&app.state.pool, "Gazette").await;
    let (_, reader) = app.login_as("rob", Role::Reader).await;
    let body = json!({ "publisher": publisher.id });

    let (status, first) = app
        .send(Method::POST, "/api/publisher-subscriptions/", Some(&reader), Some(body.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, second) = app
        .send(Method::POST, "/api/publisher-subscriptions/", Some(&reader), Some(body))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["id"], second["id"]);

    let (_, list) = app
        .send(Method::GET, "/api/publisher-subscriptions/", Some(&reader), None)
        .await;
    assert_eq!(list.as_array().map(Vec::len), Some(1));

    let uri = format!("/api/publisher-subscriptions/{}/", first["id"]);
    let (status, _) = app.send(Method::DELETE, &uri, Some(&reader), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_newsletter_lifecycle() {
    let app = TestApp::new().await;
    let (_, journalist) = app.login_as("jane", Role::Journalist).await;
    let (_, editor) = app.login_as("perry", Role::Editor).await;
    let id = app.submit(&journalist, "Lead story", None).await;
    app.send(Method::POST, &format!("/api/articles/{}/approve/", id), Some(&editor), None)
        .await;

    let (status, created) = app
        .send(
            Method::POST,
            "/api/newsletters/",
            Some(&journalist),
            Some(json!({ "title": "Weekly", "description": "Digest", "articles": [id] })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", created);
    assert_eq!(created["articles"], json!([id]));

    let manage = format!("/api/newsletters/{}/manage/", created["id"]);
    let (status, patched) = app
        .send(Method::PATCH, &manage, Some(&journalist), Some(json!({ "title": "Weekly Brief" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patched["title"], "Weekly Brief");
    assert_eq!(patched["articles"], json!([id]));

    let (status, _) = app.send(Method::DELETE, &manage, Some(&journalist), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}
