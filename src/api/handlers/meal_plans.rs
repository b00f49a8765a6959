//! Meal plan handlers: plans, events, options, ballots, tasks and the
//! grocery list.

use axum::{
    extract::{Path, State},
    Extension,
};
use tracing::{info, instrument};

use crate::api::extract::{JsonBody, QueryParams};
use crate::api::response::{ApiResponse, ApiResult};
use crate::auth::models::SessionContext;
use crate::domain::PageQuery;
use crate::meal_plans::models::{
    BallotReceipt, FinalizationResult, MealPlan, MealPlanBallotInput, MealPlanCreationInput, MealPlanEvent,
    MealPlanEventCreationInput, MealPlanEventUpdateInput, MealPlanEventView, MealPlanGroceryListItem,
    MealPlanGroceryListItemUpdateInput, MealPlanOption, MealPlanOptionCreationInput, MealPlanOptionUpdateInput,
    MealPlanOptionVote, MealPlanTask, MealPlanTaskUpdateInput, MealPlanUpdateInput, MealPlanView,
};
use crate::AppState;

#[instrument(skip(state, session, input), fields(user_id = %session.user_id))]
pub async fn create_meal_plan_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    JsonBody(input): JsonBody<MealPlanCreationInput>,
) -> ApiResult<MealPlanView> {
    Ok(ApiResponse::created(state.meal_plans.create(&session, input).await?))
}

pub async fn list_meal_plans_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    QueryParams(query): QueryParams<PageQuery>,
) -> ApiResult<Vec<MealPlan>> {
    Ok(ApiResponse::page(state.meal_plans.list(&session, query).await?))
}

pub async fn get_meal_plan_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
) -> ApiResult<MealPlanView> {
    Ok(ApiResponse::ok(state.meal_plans.get(&session, &id).await?))
}

pub async fn update_meal_plan_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
    JsonBody(patch): JsonBody<MealPlanUpdateInput>,
) -> ApiResult<MealPlan> {
    Ok(ApiResponse::ok(state.meal_plans.update(&session, &id, patch).await?))
}

pub async fn archive_meal_plan_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
) -> ApiResult<MealPlan> {
    Ok(ApiResponse::ok(state.meal_plans.archive(&session, &id).await?))
}

/// Attempt finalization now; reports whether the plan was finalized.
#[instrument(skip(state, session), fields(meal_plan_id = %id))]
pub async fn finalize_meal_plan_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
) -> ApiResult<FinalizationResult> {
    let result = state.meal_plans.finalize(&session, &id).await?;
    info!(finalized = result.finalized, "meal plan finalization attempted");
    Ok(ApiResponse::ok(result))
}

// Events

pub async fn create_event_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
    JsonBody(input): JsonBody<MealPlanEventCreationInput>,
) -> ApiResult<MealPlanEventView> {
    Ok(ApiResponse::created(state.meal_plans.create_event(&session, &id, input).await?))
}

pub async fn list_events_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
    QueryParams(query): QueryParams<PageQuery>,
) -> ApiResult<Vec<MealPlanEvent>> {
    Ok(ApiResponse::page(state.meal_plans.list_events(&session, &id, query).await?))
}

pub async fn get_event_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path((id, event_id)): Path<(String, String)>,
) -> ApiResult<MealPlanEventView> {
    Ok(ApiResponse::ok(state.meal_plans.get_event(&session, &id, &event_id).await?))
}

pub async fn update_event_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path((id, event_id)): Path<(String, String)>,
    JsonBody(patch): JsonBody<MealPlanEventUpdateInput>,
) -> ApiResult<MealPlanEvent> {
    Ok(ApiResponse::ok(state.meal_plans.update_event(&session, &id, &event_id, patch).await?))
}

pub async fn archive_event_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path((id, event_id)): Path<(String, String)>,
) -> ApiResult<MealPlanEvent> {
    Ok(ApiResponse::ok(state.meal_plans.archive_event(&session, &id, &event_id).await?))
}

// Options

pub async fn create_option_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path((id, event_id)): Path<(String, String)>,
    JsonBody(input): JsonBody<MealPlanOptionCreationInput>,
) -> ApiResult<MealPlanOption> {
    Ok(ApiResponse::created(state.meal_plans.create_option(&session, &id, &event_id, input).await?))
}

pub async fn list_options_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path((id, event_id)): Path<(String, String)>,
    QueryParams(query): QueryParams<PageQuery>,
) -> ApiResult<Vec<MealPlanOption>> {
    Ok(ApiResponse::page(state.meal_plans.list_options(&session, &id, &event_id, query).await?))
}

pub async fn get_option_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path((id, event_id, option_id)): Path<(String, String, String)>,
) -> ApiResult<MealPlanOption> {
    Ok(ApiResponse::ok(state.meal_plans.get_option(&session, &id, &event_id, &option_id).await?))
}

pub async fn update_option_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path((id, event_id, option_id)): Path<(String, String, String)>,
    JsonBody(patch): JsonBody<MealPlanOptionUpdateInput>,
) -> ApiResult<MealPlanOption> {
    let option = state.meal_plans.update_option(&session, &id, &event_id, &option_id, patch).await?;
    Ok(ApiResponse::ok(option))
}

pub async fn archive_option_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path((id, event_id, option_id)): Path<(String, String, String)>,
) -> ApiResult<MealPlanOption> {
    Ok(ApiResponse::ok(state.meal_plans.archive_option(&session, &id, &event_id, &option_id).await?))
}

// Voting

#[instrument(skip(state, session, ballot), fields(meal_plan_id = %id, event_id = %event_id, user_id = %session.user_id))]
pub async fn vote_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path((id, event_id)): Path<(String, String)>,
    JsonBody(ballot): JsonBody<MealPlanBallotInput>,
) -> ApiResult<BallotReceipt> {
    Ok(ApiResponse::created(state.meal_plans.vote(&session, &id, &event_id, ballot).await?))
}

pub async fn list_votes_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path((id, event_id)): Path<(String, String)>,
    QueryParams(query): QueryParams<PageQuery>,
) -> ApiResult<Vec<MealPlanOptionVote>> {
    Ok(ApiResponse::page(state.meal_plans.list_votes(&session, &id, &event_id, query).await?))
}

// Tasks

pub async fn list_tasks_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
    QueryParams(query): QueryParams<PageQuery>,
) -> ApiResult<Vec<MealPlanTask>> {
    Ok(ApiResponse::page(state.meal_plans.list_tasks(&session, &id, query).await?))
}

pub async fn get_task_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path((id, task_id)): Path<(String, String)>,
) -> ApiResult<MealPlanTask> {
    Ok(ApiResponse::ok(state.meal_plans.get_task(&session, &id, &task_id).await?))
}

pub async fn update_task_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path((id, task_id)): Path<(String, String)>,
    JsonBody(patch): JsonBody<MealPlanTaskUpdateInput>,
) -> ApiResult<MealPlanTask> {
    Ok(ApiResponse::ok(state.meal_plans.update_task(&session, &id, &task_id, patch).await?))
}

// Grocery list

pub async fn list_grocery_items_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
    QueryParams(query): QueryParams<PageQuery>,
) -> ApiResult<Vec<MealPlanGroceryListItem>> {
    Ok(ApiResponse::page(state.meal_plans.list_grocery_items(&session, &id, query).await?))
}

pub async fn get_grocery_item_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path((id, item_id)): Path<(String, String)>,
) -> ApiResult<MealPlanGroceryListItem> {
    Ok(ApiResponse::ok(state.meal_plans.get_grocery_item(&session, &id, &item_id).await?))
}

pub async fn update_grocery_item_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path((id, item_id)): Path<(String, String)>,
    JsonBody(patch): JsonBody<MealPlanGroceryListItemUpdateInput>,
) -> ApiResult<MealPlanGroceryListItem> {
    Ok(ApiResponse::ok(state.meal_plans.update_grocery_item(&session, &id, &item_id, patch).await?))
}
