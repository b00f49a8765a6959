mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use axum_extra::extract::cookie::{Cookie, SameSite};
use larder::auth::api_client::{sign_request, SIGNATURE_HEADER};
use larder::clock::Clock;
use serde_json::{json, Value};

use common::{data, read_json, setup_test_app, setup_test_app_with, TestApp, TestUser, PASSWORD};

async fn status_with_cookie(app: &TestApp, cookie_header: &str) -> StatusCode {
    let request = Request::builder()
        .method(Method::GET)
        .uri("/auth/status")
        .header(header::COOKIE, cookie_header)
        .body(Body::empty())
        .expect("build request");
    app.send(request).await.status()
}

#[tokio::test]
async fn cookie_login_then_logout_ends_the_session() {
    let app = setup_test_app().await;
    let alice = app.register("alice").await;

    let response = app
        .request(
            Method::POST,
            "/users/login",
            None,
            Some(json!({ "username": "alice", "password": PASSWORD, "totpToken": app.totp_code(&alice) })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("session cookie")
        .to_str()
        .expect("ascii cookie")
        .to_string();
    let cookie = Cookie::parse(set_cookie).expect("parse cookie");
    assert_eq!(cookie.name(), app.config.auth.cookie_name);
    assert!(cookie.max_age().expect("max age").whole_seconds() > 0);
    assert_eq!(cookie.http_only(), Some(true));
    assert_eq!(cookie.same_site(), Some(SameSite::None));

    let status = data(response).await;
    assert_eq!(status["userIsAuthenticated"], true);
    assert_eq!(status["userID"], alice.id);
    assert_eq!(status["activeHousehold"], alice.household_id);

    let cookie_header = format!("{}={}", cookie.name(), cookie.value());
    assert_eq!(status_with_cookie(&app, &cookie_header).await, StatusCode::OK);

    let logout = Request::builder()
        .method(Method::POST)
        .uri("/users/logout")
        .header(header::COOKIE, &cookie_header)
        .body(Body::empty())
        .expect("build request");
    let response = app.send(logout).await;
    assert_eq!(response.status(), StatusCode::OK);
    let cleared = response.headers().get(header::SET_COOKIE).expect("cleared cookie").to_str().unwrap().to_string();
    let cleared = Cookie::parse(cleared).unwrap();
    assert_eq!(cleared.max_age().map(|age| age.whole_seconds()), Some(0));

    assert_eq!(status_with_cookie(&app, &cookie_header).await, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn wrong_password_is_unauthenticated_without_a_cookie() {
    let app = setup_test_app().await;
    let alice = app.register("alice").await;

    let reversed: String = PASSWORD.chars().rev().collect();
    let response = app
        .request(
            Method::POST,
            "/users/login",
            None,
            Some(json!({ "username": "alice", "password": reversed, "totpToken": app.totp_code(&alice) })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
    assert_eq!(read_json(response).await["error"]["code"], "unauthenticated");
}

#[tokio::test]
async fn wrong_totp_code_is_rejected() {
    let app = setup_test_app().await;
    let alice = app.register("alice").await;

    let code = app.totp_code(&alice);
    let wrong = if code == "000000" { "111111".to_string() } else { "000000".to_string() };
    let response = app
        .request(
            Method::POST,
            "/users/login/token",
            None,
            Some(json!({ "username": "alice", "password": PASSWORD, "totpToken": wrong })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_requires_a_verified_second_factor() {
    let app = setup_test_app().await;

    let response = app
        .request(
            Method::POST,
            "/users",
            None,
            Some(json!({ "emailAddress": "bob@example.com", "username": "bob", "password": PASSWORD })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = data(response).await;
    let secret = created["twoFactorSecret"].as_str().unwrap().to_string();

    let code = larder::auth::totp::code_at(&secret, app.clock.now()).unwrap();
    let response = app
        .request(
            Method::POST,
            "/users/login/token",
            None,
            Some(json!({ "username": "bob", "password": PASSWORD, "totpToken": code })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn duplicate_usernames_conflict() {
    let app = setup_test_app().await;
    app.register("alice").await;

    let response = app
        .request(
            Method::POST,
            "/users",
            None,
            Some(json!({ "emailAddress": "other@example.com", "username": "alice", "password": PASSWORD })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn bearer_tokens_expire_with_the_clock() {
    let app = setup_test_app().await;
    let alice = app.register("alice").await;
    let token = app.login(&alice).await;

    let response = app.request(Method::GET, "/users/self", Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(data(response).await["username"], "alice");

    app.clock.advance(chrono::Duration::minutes(app.config.auth.token_lifetime_minutes + 1));
    let response = app.request(Method::GET, "/users/self", Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn secured_routes_reject_anonymous_requests() {
    let app = setup_test_app().await;

    let response = app.request(Method::GET, "/auth/status", None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = read_json(response).await;
    assert_eq!(body["error"]["code"], "unauthenticated");
    assert!(body.get("data").is_none());
}

#[tokio::test]
async fn liveness_is_public() {
    let app = setup_test_app().await;
    let response = app.request(Method::GET, "/_meta_/live", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
}

/// Cookie login; returns the `name=value` pair to send back.
async fn cookie_login(app: &TestApp, user: &TestUser) -> String {
    let response = app
        .request(
            Method::POST,
            "/users/login",
            None,
            Some(json!({ "username": user.username, "password": PASSWORD, "totpToken": app.totp_code(user) })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let set_cookie = response.headers().get(header::SET_COOKIE).expect("session cookie").to_str().unwrap().to_string();
    let cookie = Cookie::parse(set_cookie).unwrap();
    format!("{}={}", cookie.name(), cookie.value())
}

async fn create_api_client(app: &TestApp, cookie_header: &str) -> Value {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api_clients")
        .header(header::COOKIE, cookie_header)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "name": "pantry-sync" }).to_string()))
        .expect("build request");
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    data(response).await
}

async fn exchange(app: &TestApp, client_id: &str, secret: &str) -> axum::http::Response<Body> {
    let request_time = app.clock.now().timestamp_nanos_opt().expect("representable time");
    let body = json!({ "clientID": client_id, "requestTime": request_time }).to_string();
    let signature = sign_request(secret, body.as_bytes()).expect("sign body");
    let request = Request::builder()
        .method(Method::POST)
        .uri("/paseto")
        .header(header::CONTENT_TYPE, "application/json")
        .header(SIGNATURE_HEADER, signature)
        .body(Body::from(body))
        .expect("build request");
    app.send(request).await
}

#[tokio::test]
async fn api_clients_exchange_signed_requests_for_tokens() {
    let app = setup_test_app().await;
    let alice = app.register("alice").await;
    let cookie_header = cookie_login(&app, &alice).await;

    let client = create_api_client(&app, &cookie_header).await;
    let client_id = client["clientID"].as_str().expect("client id");
    let secret = client["clientSecret"].as_str().expect("client secret");

    let response = exchange(&app, client_id, secret).await;
    assert_eq!(response.status(), StatusCode::OK);
    let token = data(response).await["token"].as_str().expect("token").to_string();

    let response = app.request(Method::GET, "/users/self", Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(data(response).await["username"], "alice");

    // Bearer sessions cannot mint further clients.
    let response = app.request(Method::POST, "/api_clients", Some(&token), Some(json!({ "name": "nested" }))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = exchange(&app, client_id, "not-the-secret").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Requests signed too far from the server's clock are refused.
    app.clock.advance(chrono::Duration::minutes(10));
    let request_time = (app.clock.now() - chrono::Duration::minutes(5)).timestamp_nanos_opt().unwrap();
    let body = json!({ "clientID": client_id, "requestTime": request_time }).to_string();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/paseto")
        .header(SIGNATURE_HEADER, sign_request(secret, body.as_bytes()).unwrap())
        .body(Body::from(body))
        .unwrap();
    assert_eq!(app.send(request).await.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn banned_users_lose_their_issued_tokens() {
    let app = setup_test_app_with(|config| config.auth.service_admin_usernames = vec!["root".to_string()]).await;
    let root = app.register("root").await;
    let alice = app.register("alice").await;
    let root_token = app.login(&root).await;
    let alice_token = app.login(&alice).await;

    let response = app.request(Method::GET, "/users/self", Some(&alice_token), None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .request(
            Method::POST,
            "/admin/users/status",
            Some(&alice_token),
            Some(json!({ "targetUserID": root.id, "newStatus": "banned", "reason": "coup" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .request(
            Method::POST,
            "/admin/users/status",
            Some(&root_token),
            Some(json!({ "targetUserID": alice.id, "newStatus": "banned", "reason": "spam" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.request(Method::GET, "/users/self", Some(&alice_token), None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .request(
            Method::POST,
            "/users/login/token",
            None,
            Some(json!({ "username": "alice", "password": PASSWORD, "totpToken": app.totp_code(&alice) })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn clients_cannot_create_notifications() {
    let app = setup_test_app().await;
    let alice = app.register("alice").await;
    let token = app.login(&alice).await;

    let response = app
        .request(Method::POST, "/user_notifications", Some(&token), Some(json!({ "note": "hello" })))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(read_json(response).await["error"]["code"], "forbidden");
}
