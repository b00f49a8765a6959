use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, patch, post, put},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::auth::middleware::authenticate;
use crate::observability::trace_http_requests;
use crate::AppState;

use super::handlers::{
    account, api_clients, audit_log, auth, catalog::catalog_routes, health, households, invitations, meal_plans,
    recipes, settings, users, webhooks,
};
use super::middleware::enforce_deadline;

/// The complete application router.
pub fn build_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/_meta_/live", get(health::live_handler))
        .route("/_meta_/ready", get(health::ready_handler))
        .route("/users", post(auth::register_handler))
        .route("/users/totp_secret/verify", post(auth::verify_totp_handler))
        .route("/users/login", post(auth::login_handler))
        .route("/users/login/token", post(auth::login_token_handler))
        .route("/paseto", post(auth::paseto_handler));

    let secured = Router::new()
        .merge(identity_routes())
        .merge(household_routes())
        .merge(catalog_routes())
        .merge(recipe_routes())
        .merge(meal_plan_routes())
        .merge(account_routes())
        .merge(admin_routes())
        .route_layer(middleware::from_fn_with_state(state.clone(), authenticate));

    let max_body_size = state.config.server.max_body_size;
    public
        .merge(secured)
        .layer(middleware::from_fn_with_state(state.clone(), enforce_deadline))
        .layer(DefaultBodyLimit::max(max_body_size))
        .layer(CorsLayer::very_permissive())
        .layer(middleware::from_fn(trace_http_requests))
        .with_state(state)
}

fn identity_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(users::list_users_handler))
        .route("/users/search", get(users::search_users_handler))
        .route("/users/self", get(users::get_self_handler))
        .route("/users/{id}", get(users::get_user_handler).delete(users::archive_user_handler))
        .route("/users/totp_secret/new", post(auth::new_totp_handler))
        .route("/users/password/new", put(auth::change_password_handler))
        .route("/users/logout", post(auth::logout_handler))
        .route("/users/household/select", post(auth::select_household_handler))
        .route("/auth/status", get(auth::status_handler))
        .route(
            "/api_clients",
            get(api_clients::list_api_clients_handler).post(api_clients::create_api_client_handler),
        )
        .route(
            "/api_clients/{id}",
            get(api_clients::get_api_client_handler).delete(api_clients::archive_api_client_handler),
        )
}

fn household_routes() -> Router<AppState> {
    Router::new()
        .route("/households", get(households::list_households_handler).post(households::create_household_handler))
        .route("/households/current", get(households::current_household_handler))
        .route(
            "/households/{id}",
            get(households::get_household_handler)
                .put(households::update_household_handler)
                .delete(households::archive_household_handler),
        )
        .route("/households/{id}/default", post(households::set_default_household_handler))
        .route("/households/{id}/transfer", post(households::transfer_ownership_handler))
        .route("/households/{id}/invite", post(invitations::create_invitation_handler))
        .route("/households/{id}/members/{user_id}", delete(households::remove_member_handler))
        .route("/households/{id}/members/{user_id}/permissions", patch(households::change_member_role_handler))
        .route("/household_invitations/sent", get(invitations::list_sent_invitations_handler))
        .route("/household_invitations/received", get(invitations::list_received_invitations_handler))
        .route("/household_invitations/{id}", get(invitations::get_invitation_handler))
        .route("/household_invitations/{id}/accept", put(invitations::accept_invitation_handler))
        .route("/household_invitations/{id}/reject", put(invitations::reject_invitation_handler))
        .route("/household_invitations/{id}/cancel", put(invitations::cancel_invitation_handler))
        .route("/webhooks", get(webhooks::list_webhooks_handler).post(webhooks::create_webhook_handler))
        .route(
            "/webhooks/{id}",
            get(webhooks::get_webhook_handler)
                .put(webhooks::update_webhook_handler)
                .delete(webhooks::archive_webhook_handler),
        )
}

fn recipe_routes() -> Router<AppState> {
    Router::new()
        .route("/recipes", get(recipes::list_recipes_handler).post(recipes::create_recipe_handler))
        .route("/recipes/search", get(recipes::search_recipes_handler))
        .route(
            "/recipes/{id}",
            get(recipes::get_recipe_handler).put(recipes::update_recipe_handler).delete(recipes::archive_recipe_handler),
        )
        .route("/recipes/{id}/steps", get(recipes::list_steps_handler).post(recipes::create_step_handler))
        .route(
            "/recipes/{id}/steps/{step_id}",
            get(recipes::get_step_handler).put(recipes::update_step_handler).delete(recipes::archive_step_handler),
        )
        .route(
            "/recipes/{id}/prep_tasks",
            get(recipes::list_prep_tasks_handler).post(recipes::create_prep_task_handler),
        )
        .route(
            "/recipes/{id}/prep_tasks/{task_id}",
            get(recipes::get_prep_task_handler)
                .put(recipes::update_prep_task_handler)
                .delete(recipes::archive_prep_task_handler),
        )
        .route("/recipes/{id}/ratings", get(recipes::list_ratings_handler).post(recipes::create_rating_handler))
        .route(
            "/recipes/{id}/ratings/{rating_id}",
            get(recipes::get_rating_handler)
                .put(recipes::update_rating_handler)
                .delete(recipes::archive_rating_handler),
        )
        .route("/meals", get(recipes::list_meals_handler).post(recipes::create_meal_handler))
        .route("/meals/search", get(recipes::search_meals_handler))
        .route(
            "/meals/{id}",
            get(recipes::get_meal_handler).put(recipes::update_meal_handler).delete(recipes::archive_meal_handler),
        )
}

fn meal_plan_routes() -> Router<AppState> {
    Router::new()
        .route("/meal_plans", get(meal_plans::list_meal_plans_handler).post(meal_plans::create_meal_plan_handler))
        .route(
            "/meal_plans/{id}",
            get(meal_plans::get_meal_plan_handler)
                .put(meal_plans::update_meal_plan_handler)
                .delete(meal_plans::archive_meal_plan_handler),
        )
        .route("/meal_plans/{id}/finalize", post(meal_plans::finalize_meal_plan_handler))
        .route("/meal_plans/{id}/events", get(meal_plans::list_events_handler).post(meal_plans::create_event_handler))
        .route(
            "/meal_plans/{id}/events/{event_id}",
            get(meal_plans::get_event_handler)
                .put(meal_plans::update_event_handler)
                .delete(meal_plans::archive_event_handler),
        )
        .route(
            "/meal_plans/{id}/events/{event_id}/options",
            get(meal_plans::list_options_handler).post(meal_plans::create_option_handler),
        )
        .route(
            "/meal_plans/{id}/events/{event_id}/options/{option_id}",
            get(meal_plans::get_option_handler)
                .put(meal_plans::update_option_handler)
                .delete(meal_plans::archive_option_handler),
        )
        .route("/meal_plans/{id}/events/{event_id}/vote", post(meal_plans::vote_handler))
        .route("/meal_plans/{id}/events/{event_id}/votes", get(meal_plans::list_votes_handler))
        .route("/meal_plans/{id}/tasks", get(meal_plans::list_tasks_handler))
        .route(
            "/meal_plans/{id}/tasks/{task_id}",
            get(meal_plans::get_task_handler).patch(meal_plans::update_task_handler),
        )
        .route("/meal_plans/{id}/grocery_list_items", get(meal_plans::list_grocery_items_handler))
        .route(
            "/meal_plans/{id}/grocery_list_items/{item_id}",
            get(meal_plans::get_grocery_item_handler).put(meal_plans::update_grocery_item_handler),
        )
}

fn account_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/user_notifications",
            get(account::list_notifications_handler).post(account::create_notification_handler),
        )
        .route(
            "/user_notifications/{id}",
            get(account::get_notification_handler).patch(account::update_notification_handler),
        )
        .route(
            "/user_ingredient_preferences",
            get(account::list_preferences_handler).post(account::create_preference_handler),
        )
        .route(
            "/user_ingredient_preferences/{id}",
            get(account::get_preference_handler)
                .put(account::update_preference_handler)
                .delete(account::archive_preference_handler),
        )
        .route("/settings", get(settings::list_settings_handler).post(settings::create_setting_handler))
        .route("/settings/search", get(settings::search_settings_handler))
        .route(
            "/settings/{id}",
            get(settings::get_setting_handler)
                .put(settings::update_setting_handler)
                .delete(settings::archive_setting_handler),
        )
        .route("/settings/configurations", post(settings::create_configuration_handler))
        .route("/settings/configurations/user", get(settings::list_user_configurations_handler))
        .route("/settings/configurations/household", get(settings::list_household_configurations_handler))
        .route("/settings/configurations/name/{name}", get(settings::configuration_by_name_handler))
        .route(
            "/settings/configurations/{id}",
            get(settings::get_configuration_handler)
                .put(settings::update_configuration_handler)
                .delete(settings::archive_configuration_handler),
        )
}

fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/users/status", post(users::update_reputation_handler))
        .route("/admin/audit_log_entries", get(audit_log::list_audit_logs_handler))
}
