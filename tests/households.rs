mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::{data, read_json, setup_test_app, TestApp, TestUser, PASSWORD};

async fn create_webhook(app: &TestApp, token: &str) -> String {
    let response = app
        .request(
            Method::POST,
            "/webhooks",
            Some(token),
            Some(json!({ "name": "pantry sync", "url": "https://hooks.example.com/larder", "events": ["mealPlanFinalized"] })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    data(response).await["id"].as_str().expect("webhook id").to_string()
}

#[tokio::test]
async fn webhooks_follow_household_membership() {
    let app = setup_test_app().await;
    let alice = app.register("alice").await;
    let bob = app.register("bob").await;
    let alice_token = app.login(&alice).await;
    let bob_token = app.login(&bob).await;

    let household = app.create_household(&alice_token, "Alice's Kitchen").await;
    app.select_household(&alice_token, &household).await;
    let webhook = create_webhook(&app, &alice_token).await;
    let path = format!("/webhooks/{}", webhook);

    let response = app.request(Method::GET, &path, Some(&bob_token), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(read_json(response).await["error"]["code"], "notFound");

    app.invite_and_accept(&alice_token, &household, &bob, &bob_token).await;
    let sent = app.email.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to_address, bob.email);

    // Membership alone is not enough; the session must point at the household.
    let response = app.request(Method::GET, &path, Some(&bob_token), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    app.select_household(&bob_token, &household).await;
    let response = app.request(Method::GET, &path, Some(&bob_token), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(data(response).await["id"], webhook);

    let response = app
        .request(Method::DELETE, &format!("/households/{}/members/{}", household, bob.id), Some(&alice_token), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.request(Method::GET, &path, Some(&bob_token), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn ownership_transfer_hands_over_the_household() {
    let app = setup_test_app().await;
    let alice = app.register("alice").await;
    let carol = app.register("carol").await;
    let alice_token = app.login(&alice).await;
    let carol_token = app.login(&carol).await;

    let household = app.create_household(&alice_token, "Alice's Kitchen").await;
    app.select_household(&alice_token, &household).await;
    let webhook = create_webhook(&app, &alice_token).await;
    app.invite_and_accept(&alice_token, &household, &carol, &carol_token).await;

    let response = app
        .request(
            Method::POST,
            &format!("/households/{}/transfer", household),
            Some(&alice_token),
            Some(json!({ "currentOwner": alice.id, "newOwner": carol.id, "reason": "moving out" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let view = data(response).await;
    assert_eq!(view["belongsToUser"], carol.id);

    app.select_household(&carol_token, &household).await;
    let path = format!("/webhooks/{}", webhook);
    let response = app.request(Method::DELETE, &path, Some(&carol_token), None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.request(Method::DELETE, &path, Some(&alice_token), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // The new owner may now remove the previous one.
    let response = app
        .request(Method::DELETE, &format!("/households/{}/members/{}", household, alice.id), Some(&carol_token), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = app.request(Method::GET, &format!("/households/{}", household), Some(&alice_token), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn transfer_requires_a_member_as_new_owner() {
    let app = setup_test_app().await;
    let alice = app.register("alice").await;
    let dave = app.register("dave").await;
    let alice_token = app.login(&alice).await;

    let response = app
        .request(
            Method::POST,
            &format!("/households/{}/transfer", alice.household_id),
            Some(&alice_token),
            Some(json!({ "currentOwner": alice.id, "newOwner": dave.id, "reason": "" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn plain_members_cannot_remove_others() {
    let app = setup_test_app().await;
    let alice = app.register("alice").await;
    let bob = app.register("bob").await;
    let carol = app.register("carol").await;
    let alice_token = app.login(&alice).await;
    let bob_token = app.login(&bob).await;
    let carol_token = app.login(&carol).await;

    let household = alice.household_id.clone();
    app.invite_and_accept(&alice_token, &household, &bob, &bob_token).await;
    app.invite_and_accept(&alice_token, &household, &carol, &carol_token).await;

    let response = app
        .request(Method::DELETE, &format!("/households/{}/members/{}", household, carol.id), Some(&bob_token), None)
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .request(Method::DELETE, &format!("/households/{}/members/{}", household, bob.id), Some(&bob_token), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn self_invitations_are_rejected() {
    let app = setup_test_app().await;
    let alice = app.register("alice").await;
    let alice_token = app.login(&alice).await;

    let response = app
        .request(
            Method::POST,
            &format!("/households/{}/invite", alice.household_id),
            Some(&alice_token),
            Some(json!({ "toEmail": alice.email })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.email.sent().is_empty());
}

#[tokio::test]
async fn rejected_invitations_cannot_be_accepted() {
    let app = setup_test_app().await;
    let alice = app.register("alice").await;
    let bob = app.register("bob").await;
    let alice_token = app.login(&alice).await;
    let bob_token = app.login(&bob).await;

    let response = app
        .request(
            Method::POST,
            &format!("/households/{}/invite", alice.household_id),
            Some(&alice_token),
            Some(json!({ "toEmail": bob.email })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let invitation = data(response).await;
    let id = invitation["id"].as_str().unwrap();
    let token = invitation["token"].as_str().unwrap();

    let response = app.request(Method::GET, "/household_invitations/received", Some(&bob_token), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(data(response).await.as_array().map(Vec::len), Some(1));

    let response = app
        .request(
            Method::PUT,
            &format!("/household_invitations/{}/reject", id),
            Some(&bob_token),
            Some(json!({ "token": token })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(data(response).await["status"], "rejected");

    let response = app
        .request(
            Method::PUT,
            &format!("/household_invitations/{}/accept", id),
            Some(&bob_token),
            Some(json!({ "token": token })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn invitations_are_only_visible_to_their_parties() {
    let app = setup_test_app().await;
    let alice = app.register("alice").await;
    let bob = app.register("bob").await;
    let eve = app.register("eve").await;
    let alice_token = app.login(&alice).await;
    let eve_token = app.login(&eve).await;

    let response = app
        .request(
            Method::POST,
            &format!("/households/{}/invite", alice.household_id),
            Some(&alice_token),
            Some(json!({ "toEmail": bob.email })),
        )
        .await;
    let invitation = data(response).await;
    let id = invitation["id"].as_str().unwrap();
    let token = invitation["token"].as_str().unwrap();

    let response = app.request(Method::GET, &format!("/household_invitations/{}", id), Some(&eve_token), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .request(
            Method::PUT,
            &format!("/household_invitations/{}/accept", id),
            Some(&eve_token),
            Some(json!({ "token": token })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

async fn invite(app: &TestApp, token: &str, household: &str, to_email: &str) -> (String, String) {
    let response = app
        .request(
            Method::POST,
            &format!("/households/{}/invite", household),
            Some(token),
            Some(json!({ "toEmail": to_email })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let invitation = data(response).await;
    (
        invitation["id"].as_str().expect("invitation id").to_string(),
        invitation["token"].as_str().expect("invitation token").to_string(),
    )
}

async fn households_of(app: &TestApp, token: &str) -> Vec<serde_json::Value> {
    let response = app.request(Method::GET, "/households", Some(token), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    data(response).await.as_array().expect("households").clone()
}

#[tokio::test]
async fn archiving_the_last_household_creates_a_backup() {
    let app = setup_test_app().await;
    let alice = app.register("alice").await;
    let alice_token = app.login(&alice).await;

    let response = app
        .request(Method::DELETE, &format!("/households/{}", alice.household_id), Some(&alice_token), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let households = households_of(&app, &alice_token).await;
    assert_eq!(households.len(), 1);
    assert_ne!(households[0]["id"], alice.household_id);
    assert_eq!(households[0]["belongsToUser"], alice.id);

    let response = app
        .request(Method::GET, &format!("/households/{}", alice.household_id), Some(&alice_token), None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Sessions fall back to the backup household.
    let response = app.request(Method::GET, "/households/current", Some(&alice_token), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(data(response).await["id"], households[0]["id"]);
}

#[tokio::test]
async fn invited_sign_up_joins_both_households() {
    let app = setup_test_app().await;
    let alice = app.register("alice").await;
    let alice_token = app.login(&alice).await;
    let (invitation_id, invitation_token) = invite(&app, &alice_token, &alice.household_id, "dave@example.com").await;

    let response = app
        .request(
            Method::POST,
            "/users",
            None,
            Some(json!({
                "emailAddress": "dave@example.com",
                "username": "dave",
                "password": PASSWORD,
                "invitationID": invitation_id,
                "invitationToken": invitation_token,
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = data(response).await;
    let dave = TestUser {
        id: created["createdUserID"].as_str().expect("user id").to_string(),
        username: "dave".to_string(),
        email: "dave@example.com".to_string(),
        two_factor_secret: created["twoFactorSecret"].as_str().expect("2fa secret").to_string(),
        household_id: created["householdID"].as_str().expect("household id").to_string(),
    };
    let response = app
        .request(
            Method::POST,
            "/users/totp_secret/verify",
            None,
            Some(json!({ "userID": dave.id, "totpToken": app.totp_code(&dave) })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let dave_token = app.login(&dave).await;

    let mut ids: Vec<String> = households_of(&app, &dave_token)
        .await
        .iter()
        .map(|household| household["id"].as_str().expect("household id").to_string())
        .collect();
    ids.sort();
    let mut expected = vec![alice.household_id.clone(), dave.household_id.clone()];
    expected.sort();
    assert_eq!(ids, expected);

    let response = app
        .request(Method::GET, &format!("/household_invitations/{}", invitation_id), Some(&alice_token), None)
        .await;
    assert_eq!(data(response).await["status"], "accepted");
}

#[tokio::test]
async fn only_the_sender_cancels_an_invitation() {
    let app = setup_test_app().await;
    let alice = app.register("alice").await;
    let bob = app.register("bob").await;
    let alice_token = app.login(&alice).await;
    let bob_token = app.login(&bob).await;
    let (id, token) = invite(&app, &alice_token, &alice.household_id, &bob.email).await;
    let cancel = format!("/household_invitations/{}/cancel", id);

    let response = app.request(Method::PUT, &cancel, Some(&bob_token), Some(json!({}))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .request(Method::PUT, &cancel, Some(&alice_token), Some(json!({ "note": "wrong address" })))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(data(response).await["status"], "cancelled");

    let response = app
        .request(
            Method::PUT,
            &format!("/household_invitations/{}/accept", id),
            Some(&bob_token),
            Some(json!({ "token": token })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn archived_owners_hand_their_households_to_a_member() {
    let app = setup_test_app().await;
    let alice = app.register("alice").await;
    let bob = app.register("bob").await;
    let alice_token = app.login(&alice).await;
    let bob_token = app.login(&bob).await;

    let household = app.create_household(&alice_token, "Shared").await;
    app.invite_and_accept(&alice_token, &household, &bob, &bob_token).await;

    let response = app.request(Method::DELETE, &format!("/users/{}", alice.id), Some(&alice_token), None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.request(Method::GET, &format!("/households/{}", household), Some(&bob_token), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let view = data(response).await;
    assert_eq!(view["belongsToUser"], bob.id);
    let members = view["members"].as_array().expect("members");
    assert_eq!(members.len(), 1);
    assert_eq!(members[0]["belongsToUser"], bob.id);
    assert_eq!(members[0]["householdRole"], "householdAdmin");

    // The new owner can run the household.
    let response = app
        .request(Method::PUT, &format!("/households/{}", household), Some(&bob_token), Some(json!({ "name": "Bob's" })))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}
