//! Recipe, step, prep task, rating and meal handlers.

use axum::{
    extract::{Path, State},
    Extension,
};
use tracing::instrument;

use super::SearchQuery;
use crate::api::extract::{JsonBody, QueryParams};
use crate::api::response::{ApiResponse, ApiResult};
use crate::auth::models::SessionContext;
use crate::domain::PageQuery;
use crate::recipes::meals::{Meal, MealCreationInput, MealUpdateInput};
use crate::recipes::models::{
    Recipe, RecipeCreationInput, RecipeStep, RecipeStepCreationInput, RecipeStepUpdateInput, RecipeUpdateInput,
    RecipeView,
};
use crate::recipes::prep_tasks::{RecipePrepTask, RecipePrepTaskCreationInput, RecipePrepTaskUpdateInput};
use crate::recipes::ratings::{RecipeRating, RecipeRatingCreationInput, RecipeRatingUpdateInput};
use crate::AppState;

#[instrument(skip(state, session, input), fields(user_id = %session.user_id))]
pub async fn create_recipe_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    JsonBody(input): JsonBody<RecipeCreationInput>,
) -> ApiResult<Recipe> {
    Ok(ApiResponse::created(state.recipes.create(&session, input).await?))
}

pub async fn list_recipes_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    QueryParams(query): QueryParams<PageQuery>,
) -> ApiResult<Vec<Recipe>> {
    Ok(ApiResponse::page(state.recipes.list(&session, query).await?))
}

pub async fn search_recipes_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    QueryParams(query): QueryParams<SearchQuery>,
) -> ApiResult<Vec<Recipe>> {
    Ok(ApiResponse::ok(state.recipes.search(&session, &query.q, query.limit()).await?))
}

/// A recipe with its live steps and prep tasks.
pub async fn get_recipe_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
) -> ApiResult<RecipeView> {
    Ok(ApiResponse::ok(state.recipes.get(&session, &id).await?))
}

pub async fn update_recipe_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
    JsonBody(patch): JsonBody<RecipeUpdateInput>,
) -> ApiResult<Recipe> {
    Ok(ApiResponse::ok(state.recipes.update(&session, &id, patch).await?))
}

pub async fn archive_recipe_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
) -> ApiResult<Recipe> {
    Ok(ApiResponse::ok(state.recipes.archive(&session, &id).await?))
}

// Steps

pub async fn create_step_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
    JsonBody(input): JsonBody<RecipeStepCreationInput>,
) -> ApiResult<RecipeStep> {
    Ok(ApiResponse::created(state.recipes.create_step(&session, &id, input).await?))
}

pub async fn list_steps_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
    QueryParams(query): QueryParams<PageQuery>,
) -> ApiResult<Vec<RecipeStep>> {
    Ok(ApiResponse::page(state.recipes.list_steps(&session, &id, query).await?))
}

pub async fn get_step_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path((id, step_id)): Path<(String, String)>,
) -> ApiResult<RecipeStep> {
    Ok(ApiResponse::ok(state.recipes.get_step(&session, &id, &step_id).await?))
}

pub async fn update_step_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path((id, step_id)): Path<(String, String)>,
    JsonBody(patch): JsonBody<RecipeStepUpdateInput>,
) -> ApiResult<RecipeStep> {
    Ok(ApiResponse::ok(state.recipes.update_step(&session, &id, &step_id, patch).await?))
}

pub async fn archive_step_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path((id, step_id)): Path<(String, String)>,
) -> ApiResult<RecipeStep> {
    Ok(ApiResponse::ok(state.recipes.archive_step(&session, &id, &step_id).await?))
}

// Prep tasks

pub async fn create_prep_task_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
    JsonBody(input): JsonBody<RecipePrepTaskCreationInput>,
) -> ApiResult<RecipePrepTask> {
    Ok(ApiResponse::created(state.recipes.create_prep_task(&session, &id, input).await?))
}

pub async fn list_prep_tasks_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
    QueryParams(query): QueryParams<PageQuery>,
) -> ApiResult<Vec<RecipePrepTask>> {
    Ok(ApiResponse::page(state.recipes.list_prep_tasks(&session, &id, query).await?))
}

pub async fn get_prep_task_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path((id, task_id)): Path<(String, String)>,
) -> ApiResult<RecipePrepTask> {
    Ok(ApiResponse::ok(state.recipes.get_prep_task(&session, &id, &task_id).await?))
}

pub async fn update_prep_task_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path((id, task_id)): Path<(String, String)>,
    JsonBody(patch): JsonBody<RecipePrepTaskUpdateInput>,
) -> ApiResult<RecipePrepTask> {
    Ok(ApiResponse::ok(state.recipes.update_prep_task(&session, &id, &task_id, patch).await?))
}

pub async fn archive_prep_task_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path((id, task_id)): Path<(String, String)>,
) -> ApiResult<RecipePrepTask> {
    Ok(ApiResponse::ok(state.recipes.archive_prep_task(&session, &id, &task_id).await?))
}

// Ratings

pub async fn create_rating_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
    JsonBody(input): JsonBody<RecipeRatingCreationInput>,
) -> ApiResult<RecipeRating> {
    Ok(ApiResponse::created(state.recipes.create_rating(&session, &id, input).await?))
}

pub async fn list_ratings_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
    QueryParams(query): QueryParams<PageQuery>,
) -> ApiResult<Vec<RecipeRating>> {
    Ok(ApiResponse::page(state.recipes.list_ratings(&session, &id, query).await?))
}

pub async fn get_rating_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path((id, rating_id)): Path<(String, String)>,
) -> ApiResult<RecipeRating> {
    Ok(ApiResponse::ok(state.recipes.get_rating(&session, &id, &rating_id).await?))
}

pub async fn update_rating_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path((id, rating_id)): Path<(String, String)>,
    JsonBody(patch): JsonBody<RecipeRatingUpdateInput>,
) -> ApiResult<RecipeRating> {
    Ok(ApiResponse::ok(state.recipes.update_rating(&session, &id, &rating_id, patch).await?))
}

pub async fn archive_rating_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path((id, rating_id)): Path<(String, String)>,
) -> ApiResult<RecipeRating> {
    Ok(ApiResponse::ok(state.recipes.archive_rating(&session, &id, &rating_id).await?))
}

// Meals

pub async fn create_meal_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    JsonBody(input): JsonBody<MealCreationInput>,
) -> ApiResult<Meal> {
    Ok(ApiResponse::created(state.meals.create(&session, input).await?))
}

pub async fn list_meals_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    QueryParams(query): QueryParams<PageQuery>,
) -> ApiResult<Vec<Meal>> {
    Ok(ApiResponse::page(state.meals.list(&session, query).await?))
}

pub async fn search_meals_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    QueryParams(query): QueryParams<SearchQuery>,
) -> ApiResult<Vec<Meal>> {
    Ok(ApiResponse::ok(state.meals.search(&session, &query.q, query.limit()).await?))
}

pub async fn get_meal_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
) -> ApiResult<Meal> {
    Ok(ApiResponse::ok(state.meals.get(&session, &id).await?))
}

pub async fn update_meal_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
    JsonBody(patch): JsonBody<MealUpdateInput>,
) -> ApiResult<Meal> {
    Ok(ApiResponse::ok(state.meals.update(&session, &id, patch).await?))
}

pub async fn archive_meal_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
) -> ApiResult<Meal> {
    Ok(ApiResponse::ok(state.meals.archive(&session, &id).await?))
}
