//! Shared harness for the HTTP integration tests.
//!
//! Every test gets its own in-memory database, a manual clock and an email
//! outbox, and drives the real router with `oneshot`.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, Response, StatusCode},
    Router,
};
use larder::{
    api::build_router,
    auth::totp,
    clock::{Clock, ManualClock},
    config::AppConfig,
    notifications::MemoryEmailDispatcher,
    storage::{create_pool, Database, DatabaseConfig},
    AppState,
};
use serde_json::{json, Value};
use tower::ServiceExt;

pub const PASSWORD: &str = "p0!aB";

pub struct TestApp {
    pub router: Router,
    pub clock: Arc<ManualClock>,
    pub email: MemoryEmailDispatcher,
    pub config: AppConfig,
}

/// A registered user with a verified second factor.
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: String,
    pub username: String,
    pub email: String,
    pub two_factor_secret: String,
    pub household_id: String,
}

pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(|_| {}).await
}

pub async fn setup_test_app_with(configure: impl FnOnce(&mut AppConfig)) -> TestApp {
    let mut config = AppConfig::default();
    config.auth.cookie_secure = false;
    // Long enough to outlive the clock jumps the voting tests make.
    config.auth.token_lifetime_minutes = 24 * 60;
    configure(&mut config);

    let pool = create_pool(&DatabaseConfig { url: "sqlite::memory:".to_string(), ..Default::default() })
        .await
        .expect("create sqlite pool");
    let clock = Arc::new(ManualClock::starting_now());
    let email = MemoryEmailDispatcher::default();

    let state = AppState::new(config.clone(), Database::new(pool), clock.clone(), Arc::new(email.clone()))
        .expect("build app state");

    TestApp { router: build_router(state), clock, email, config }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.expect("request")
    }

    pub async fn request(&self, method: Method, path: &str, token: Option<&str>, body: Option<Value>) -> Response<Body> {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&json).expect("serialize body")))
                .expect("build request"),
            None => builder.body(Body::empty()).expect("build request"),
        };
        self.send(request).await
    }

    pub fn totp_code(&self, user: &TestUser) -> String {
        totp::code_at(&user.two_factor_secret, self.clock.now()).expect("totp code")
    }

    /// Register and verify the second factor.
    pub async fn register(&self, username: &str) -> TestUser {
        let email = format!("{}@example.com", username);
        let response = self
            .request(
                Method::POST,
                "/users",
                None,
                Some(json!({ "emailAddress": email, "username": username, "password": PASSWORD })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED, "register {}", username);
        let created = data(response).await;

        let user = TestUser {
            id: created["createdUserID"].as_str().expect("user id").to_string(),
            username: username.to_string(),
            email,
            two_factor_secret: created["twoFactorSecret"].as_str().expect("2fa secret").to_string(),
            household_id: created["householdID"].as_str().expect("household id").to_string(),
        };

        let response = self
            .request(
                Method::POST,
                "/users/totp_secret/verify",
                None,
                Some(json!({ "userID": user.id, "totpToken": self.totp_code(&user) })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK, "verify totp for {}", username);
        user
    }

    /// Bearer login; returns the PASETO.
    pub async fn login(&self, user: &TestUser) -> String {
        let response = self
            .request(
                Method::POST,
                "/users/login/token",
                None,
                Some(json!({ "username": user.username, "password": PASSWORD, "totpToken": self.totp_code(user) })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK, "token login for {}", user.username);
        data(response).await["token"].as_str().expect("token").to_string()
    }

    pub async fn create_household(&self, token: &str, name: &str) -> String {
        let response = self.request(Method::POST, "/households", Some(token), Some(json!({ "name": name }))).await;
        assert_eq!(response.status(), StatusCode::CREATED, "create household {}", name);
        data(response).await["id"].as_str().expect("household id").to_string()
    }

    pub async fn select_household(&self, token: &str, household_id: &str) {
        let response = self
            .request(
                Method::POST,
                "/users/household/select",
                Some(token),
                Some(json!({ "householdID": household_id })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK, "select household {}", household_id);
    }

    /// Invite `invitee` into `household_id` and accept on their behalf.
    pub async fn invite_and_accept(&self, inviter_token: &str, household_id: &str, invitee: &TestUser, invitee_token: &str) {
        let response = self
            .request(
                Method::POST,
                &format!("/households/{}/invite", household_id),
                Some(inviter_token),
                Some(json!({ "toEmail": invitee.email, "toName": invitee.username, "note": "join us" })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED, "invite {}", invitee.username);
        let invitation = data(response).await;
        let id = invitation["id"].as_str().expect("invitation id");
        let token = invitation["token"].as_str().expect("invitation token");

        let response = self
            .request(
                Method::PUT,
                &format!("/household_invitations/{}/accept", id),
                Some(invitee_token),
                Some(json!({ "token": token, "note": "thanks" })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK, "accept invitation for {}", invitee.username);
    }
}

pub async fn read_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("read body");
    serde_json::from_slice(&bytes).expect("parse json")
}

/// The `data` member of the success envelope.
pub async fn data(response: Response<Body>) -> Value {
    let mut body = read_json(response).await;
    body["data"].take()
}
