mod common;

use axum::http::{Method, StatusCode};
use chrono::{DateTime, Duration, Utc};
use larder::clock::Clock;
use serde_json::{json, Value};

use common::{data, setup_test_app, TestApp};

/// A household of three with every member pointed at it.
struct Household {
    tokens: Vec<String>,
}

async fn household_of_three(app: &TestApp) -> Household {
    let alice = app.register("alice").await;
    let bob = app.register("bob").await;
    let carol = app.register("carol").await;
    let alice_token = app.login(&alice).await;
    let bob_token = app.login(&bob).await;
    let carol_token = app.login(&carol).await;

    for (member, token) in [(&bob, &bob_token), (&carol, &carol_token)] {
        app.invite_and_accept(&alice_token, &alice.household_id, member, token).await;
        app.select_household(token, &alice.household_id).await;
    }
    Household { tokens: vec![alice_token, bob_token, carol_token] }
}

async fn create_meal(app: &TestApp, token: &str, name: &str) -> String {
    let response = app
        .request(Method::POST, "/recipes", Some(token), Some(json!({ "name": format!("{} recipe", name) })))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let recipe_id = data(response).await["id"].as_str().expect("recipe id").to_string();

    let response = app
        .request(
            Method::POST,
            "/meals",
            Some(token),
            Some(json!({ "name": name, "components": [{ "recipeID": recipe_id, "componentType": "main" }] })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    data(response).await["id"].as_str().expect("meal id").to_string()
}

struct Plan {
    id: String,
    event_id: String,
    /// O1, O2, O3 in creation order.
    options: Vec<String>,
    voting_deadline: DateTime<Utc>,
}

async fn create_plan(app: &TestApp, token: &str) -> Plan {
    let mut meals = Vec::new();
    for name in ["Lasagna", "Curry", "Tacos"] {
        meals.push(create_meal(app, token, name).await);
    }

    let now = app.clock.now();
    let voting_deadline = now + Duration::hours(1);
    let starts_at = now + Duration::days(1);
    let body = json!({
        "notes": "next week",
        "startsAt": starts_at.to_rfc3339(),
        "endsAt": (starts_at + Duration::days(7)).to_rfc3339(),
        "votingDeadline": voting_deadline.to_rfc3339(),
        "events": [{
            "startsAt": (starts_at + Duration::hours(18)).to_rfc3339(),
            "endsAt": (starts_at + Duration::hours(19)).to_rfc3339(),
            "mealName": "dinner",
            "options": meals.iter().map(|meal| json!({ "mealID": meal })).collect::<Vec<_>>(),
        }],
    });

    let response = app.request(Method::POST, "/meal_plans", Some(token), Some(body)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let view = data(response).await;
    assert_eq!(view["status"], "awaitingVotes");

    let event = &view["events"][0];
    let options = event["options"]
        .as_array()
        .expect("options")
        .iter()
        .map(|option| {
            let meal = option["mealID"].as_str().expect("meal id");
            let position = meals.iter().position(|m| m == meal).expect("known meal");
            (position, option["id"].as_str().expect("option id").to_string())
        })
        .collect::<std::collections::BTreeMap<_, _>>()
        .into_values()
        .collect();

    Plan {
        id: view["id"].as_str().expect("plan id").to_string(),
        event_id: event["id"].as_str().expect("event id").to_string(),
        options,
        voting_deadline,
    }
}

async fn vote(app: &TestApp, token: &str, plan: &Plan, ranks: [u32; 3]) -> (StatusCode, Value) {
    let votes: Vec<Value> = plan
        .options
        .iter()
        .zip(ranks)
        .map(|(option, rank)| json!({ "mealPlanOptionID": option, "rank": rank }))
        .collect();
    let response = app
        .request(
            Method::POST,
            &format!("/meal_plans/{}/events/{}/vote", plan.id, plan.event_id),
            Some(token),
            Some(json!({ "votes": votes })),
        )
        .await;
    let status = response.status();
    (status, common::read_json(response).await)
}

async fn fetch_plan(app: &TestApp, token: &str, plan: &Plan) -> Value {
    let response = app.request(Method::GET, &format!("/meal_plans/{}", plan.id), Some(token), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    data(response).await
}

fn option<'a>(view: &'a Value, id: &str) -> &'a Value {
    view["events"][0]["options"]
        .as_array()
        .expect("options")
        .iter()
        .find(|option| option["id"] == id)
        .expect("option present")
}

#[tokio::test]
async fn unanimous_votes_finalize_the_plan() {
    let app = setup_test_app().await;
    let household = household_of_three(&app).await;
    let plan = create_plan(&app, &household.tokens[0]).await;

    for (i, token) in household.tokens.iter().enumerate() {
        let (status, body) = vote(&app, token, &plan, [0, 2, 1]).await;
        assert_eq!(status, StatusCode::CREATED);
        let expected = if i == household.tokens.len() - 1 { "finalized" } else { "awaitingVotes" };
        assert_eq!(body["data"]["mealPlanStatus"], expected);
    }

    let view = fetch_plan(&app, &household.tokens[1], &plan).await;
    assert_eq!(view["status"], "finalized");
    assert_eq!(option(&view, &plan.options[0])["chosen"], true);
    assert_eq!(option(&view, &plan.options[0])["tiebroken"], false);
    assert_eq!(option(&view, &plan.options[1])["chosen"], false);
    assert_eq!(option(&view, &plan.options[2])["chosen"], false);
}

#[tokio::test]
async fn the_deadline_finalizes_and_breaks_ties() {
    let app = setup_test_app().await;
    let household = household_of_three(&app).await;
    let plan = create_plan(&app, &household.tokens[0]).await;

    let (status, _) = vote(&app, &household.tokens[0], &plan, [0, 1, 2]).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = vote(&app, &household.tokens[1], &plan, [1, 0, 2]).await;
    assert_eq!(status, StatusCode::CREATED);

    app.clock.set(plan.voting_deadline + Duration::minutes(1));

    let (status, body) = vote(&app, &household.tokens[2], &plan, [2, 1, 0]).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "conflict");

    // O1 and O2 tie on points and on first and second preferences, so the
    // smaller option id wins.
    let view = fetch_plan(&app, &household.tokens[0], &plan).await;
    assert_eq!(view["status"], "finalized");
    let winner = plan.options[..2].iter().min().expect("two options").clone();
    for id in &plan.options {
        let option = option(&view, id);
        assert_eq!(option["chosen"], *id == winner, "option {}", id);
    }
    assert_eq!(option(&view, &winner)["tiebroken"], true);
}

#[tokio::test]
async fn incomplete_ballots_are_rejected() {
    let app = setup_test_app().await;
    let household = household_of_three(&app).await;
    let plan = create_plan(&app, &household.tokens[0]).await;

    let response = app
        .request(
            Method::POST,
            &format!("/meal_plans/{}/events/{}/vote", plan.id, plan.event_id),
            Some(&household.tokens[0]),
            Some(json!({ "votes": [{ "mealPlanOptionID": plan.options[0], "rank": 0 }] })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let (status, _) = vote(&app, &household.tokens[0], &plan, [0, 0, 1]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn outsiders_cannot_see_or_vote_on_plans() {
    let app = setup_test_app().await;
    let household = household_of_three(&app).await;
    let plan = create_plan(&app, &household.tokens[0]).await;

    let mallory = app.register("mallory").await;
    let mallory_token = app.login(&mallory).await;

    let response = app.request(Method::GET, &format!("/meal_plans/{}", plan.id), Some(&mallory_token), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let (status, _) = vote(&app, &mallory_token, &plan, [0, 1, 2]).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn voting_deadline_must_be_in_the_future() {
    let app = setup_test_app().await;
    let alice = app.register("alice").await;
    let token = app.login(&alice).await;

    let now = app.clock.now();
    let response = app
        .request(
            Method::POST,
            "/meal_plans",
            Some(&token),
            Some(json!({
                "startsAt": (now + Duration::days(1)).to_rfc3339(),
                "endsAt": (now + Duration::days(2)).to_rfc3339(),
                "votingDeadline": (now - Duration::minutes(1)).to_rfc3339(),
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn explicit_finalization_waits_for_the_deadline() {
    let app = setup_test_app().await;
    let household = household_of_three(&app).await;
    let plan = create_plan(&app, &household.tokens[0]).await;
    let path = format!("/meal_plans/{}/finalize", plan.id);

    vote(&app, &household.tokens[0], &plan, [2, 1, 0]).await;

    let response = app.request(Method::POST, &path, Some(&household.tokens[0]), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let result = data(response).await;
    assert_eq!(result["finalized"], false);
    assert_eq!(result["status"], "awaitingVotes");

    app.clock.advance(Duration::hours(2));
    let response = app.request(Method::POST, &path, Some(&household.tokens[0]), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let result = data(response).await;
    assert_eq!(result["finalized"], true);
    assert_eq!(result["status"], "finalized");

    let view = fetch_plan(&app, &household.tokens[2], &plan).await;
    assert_eq!(option(&view, &plan.options[2])["chosen"], true);
}

#[tokio::test]
async fn updates_cannot_move_the_deadline_into_the_past() {
    let app = setup_test_app().await;
    let household = household_of_three(&app).await;
    let plan = create_plan(&app, &household.tokens[0]).await;
    let path = format!("/meal_plans/{}", plan.id);

    let past = app.clock.now() - Duration::minutes(1);
    let response = app
        .request(Method::PUT, &path, Some(&household.tokens[0]), Some(json!({ "votingDeadline": past.to_rfc3339() })))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(common::read_json(response).await["error"]["code"], "badRequest");

    // The plan is still open for votes.
    let (status, body) = vote(&app, &household.tokens[1], &plan, [0, 1, 2]).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["mealPlanStatus"], "awaitingVotes");

    let later = plan.voting_deadline + Duration::minutes(30);
    let response = app
        .request(Method::PUT, &path, Some(&household.tokens[0]), Some(json!({ "votingDeadline": later.to_rfc3339() })))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated: DateTime<Utc> = data(response).await["votingDeadline"]
        .as_str()
        .expect("deadline")
        .parse()
        .expect("rfc3339 deadline");
    assert_eq!(updated, later);
}
