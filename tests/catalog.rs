mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::{data, setup_test_app_with, TestApp};

async fn app_with_admin() -> TestApp {
    setup_test_app_with(|config| config.auth.service_admin_usernames = vec!["root".to_string()]).await
}

#[tokio::test]
async fn only_service_admins_write_reference_data() {
    let app = app_with_admin().await;
    let root = app.register("root").await;
    let alice = app.register("alice").await;
    let root_token = app.login(&root).await;
    let alice_token = app.login(&alice).await;

    let body = json!({ "name": "Shallot", "pluralName": "Shallots", "isLiquid": false });
    let response = app.request(Method::POST, "/valid_ingredients", Some(&alice_token), Some(body.clone())).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.request(Method::POST, "/valid_ingredients", Some(&root_token), Some(body)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let id = data(response).await["id"].as_str().expect("ingredient id").to_string();

    let response = app.request(Method::GET, &format!("/valid_ingredients/{}", id), Some(&alice_token), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(data(response).await["name"], "Shallot");

    let response = app.request(Method::GET, "/valid_ingredients/search?q=shal", Some(&alice_token), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(data(response).await.as_array().map(Vec::len), Some(1));

    let response = app.request(Method::DELETE, &format!("/valid_ingredients/{}", id), Some(&root_token), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = app.request(Method::GET, &format!("/valid_ingredients/{}", id), Some(&alice_token), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn the_audit_log_is_reserved_for_service_admins() {
    let app = app_with_admin().await;
    let root = app.register("root").await;
    let alice = app.register("alice").await;
    let root_token = app.login(&root).await;
    let alice_token = app.login(&alice).await;

    let response = app.request(Method::GET, "/admin/audit_log_entries", Some(&alice_token), None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.request(Method::GET, "/admin/audit_log_entries", Some(&root_token), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let entries = data(response).await;
    assert!(!entries.as_array().expect("entries").is_empty());
}

#[tokio::test]
async fn bridges_list_identically_from_both_endpoints() {
    let app = app_with_admin().await;
    let root = app.register("root").await;
    let alice = app.register("alice").await;
    let root_token = app.login(&root).await;
    let alice_token = app.login(&alice).await;

    let response = app
        .request(Method::POST, "/valid_ingredients", Some(&root_token), Some(json!({ "name": "Flour" })))
        .await;
    let ingredient = data(response).await["id"].as_str().expect("ingredient id").to_string();
    let response = app
        .request(Method::POST, "/valid_measurement_units", Some(&root_token), Some(json!({ "name": "gram", "metric": true })))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let unit = data(response).await["id"].as_str().expect("unit id").to_string();

    let response = app
        .request(
            Method::POST,
            "/valid_ingredient_measurement_units",
            Some(&root_token),
            Some(json!({
                "validIngredientID": ingredient,
                "validMeasurementUnitID": unit,
                "notes": "by weight",
                "allowableMinimumQuantity": 1.0,
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let bridge = data(response).await;

    let by_ingredient = format!("/valid_ingredients/{}/valid_ingredient_measurement_units", ingredient);
    let by_unit = format!("/valid_measurement_units/{}/valid_ingredient_measurement_units", unit);

    let response = app.request(Method::GET, &by_ingredient, Some(&alice_token), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let from_left = data(response).await;
    let response = app.request(Method::GET, &by_unit, Some(&alice_token), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let from_right = data(response).await;

    assert_eq!(from_left, json!([bridge.clone()]));
    assert_eq!(from_left, from_right);

    let path = format!("/valid_ingredient_measurement_units/{}", bridge["id"].as_str().expect("bridge id"));
    let response = app.request(Method::DELETE, &path, Some(&root_token), None).await;
    assert_eq!(response.status(), StatusCode::OK);

    for listing in [&by_ingredient, &by_unit] {
        let response = app.request(Method::GET, listing, Some(&alice_token), None).await;
        assert_eq!(data(response).await, json!([]), "{}", listing);
    }
}

#[tokio::test]
async fn head_reports_whether_a_record_is_readable() {
    let app = app_with_admin().await;
    let root = app.register("root").await;
    let alice = app.register("alice").await;
    let root_token = app.login(&root).await;
    let alice_token = app.login(&alice).await;

    let response = app
        .request(Method::POST, "/valid_instruments", Some(&root_token), Some(json!({ "name": "Whisk" })))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let path = format!("/valid_instruments/{}", data(response).await["id"].as_str().expect("instrument id"));

    let response = app.request(Method::HEAD, &path, Some(&alice_token), None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.request(Method::HEAD, "/valid_instruments/missing", Some(&alice_token), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    app.request(Method::DELETE, &path, Some(&root_token), None).await;
    let response = app.request(Method::HEAD, &path, Some(&alice_token), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
