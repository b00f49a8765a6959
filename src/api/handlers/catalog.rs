//! Reference-data handlers, generic over the catalog kind.
//!
//! Every kind exposes the same surface, so handlers are written once and
//! instantiated per path segment by [`catalog_routes`].

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Extension, Router,
};

use super::SearchQuery;
use crate::api::error::ApiError;
use crate::api::extract::{JsonBody, QueryParams};
use crate::api::response::{ApiResponse, ApiResult};
use crate::auth::models::SessionContext;
use crate::catalog::{
    Bridge, ValidIngredient, ValidIngredientGroup, ValidIngredientMeasurementUnit, ValidIngredientPreparation,
    ValidIngredientState, ValidIngredientStateIngredient, ValidInstrument, ValidMeasurementUnit,
    ValidMeasurementUnitConversion, ValidPreparation, ValidPreparationInstrument, ValidPreparationVessel, ValidVessel,
};
use crate::domain::PageQuery;
use crate::kernel::{Creatable, Patchable, Resource};
use crate::AppState;

pub async fn create_record<R: Creatable>(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    JsonBody(input): JsonBody<R::Input>,
) -> ApiResult<R> {
    Ok(ApiResponse::created(state.catalog.create::<R>(&session, input).await?))
}

pub async fn list_records<R: Resource>(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    QueryParams(query): QueryParams<PageQuery>,
) -> ApiResult<Vec<R>> {
    Ok(ApiResponse::page(state.catalog.list::<R>(&session, query).await?))
}

pub async fn search_records<R: Resource>(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    QueryParams(query): QueryParams<SearchQuery>,
) -> ApiResult<Vec<R>> {
    Ok(ApiResponse::ok(state.catalog.search::<R>(&session, &query.q, query.limit()).await?))
}

pub async fn get_record<R: Resource>(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
) -> ApiResult<R> {
    Ok(ApiResponse::ok(state.catalog.get::<R>(&session, &id).await?))
}

/// `HEAD` existence check: 200 when a read would succeed, 404 otherwise.
pub async fn record_exists<R: Resource>(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let found = state.catalog.exists::<R>(&session, &id).await?;
    Ok(if found { StatusCode::OK } else { StatusCode::NOT_FOUND })
}

pub async fn update_record<R: Patchable>(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
    JsonBody(patch): JsonBody<R::Patch>,
) -> ApiResult<R> {
    Ok(ApiResponse::ok(state.catalog.update::<R>(&session, &id, patch).await?))
}

pub async fn archive_record<R: Resource>(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
) -> ApiResult<R> {
    Ok(ApiResponse::ok(state.catalog.archive::<R>(&session, &id).await?))
}

pub async fn bridges_by_left<B: Bridge>(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
    QueryParams(query): QueryParams<PageQuery>,
) -> ApiResult<Vec<B>> {
    Ok(ApiResponse::page(state.catalog.bridges_for_left::<B>(&session, &id, query).await?))
}

pub async fn bridges_by_right<B: Bridge>(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
    QueryParams(query): QueryParams<PageQuery>,
) -> ApiResult<Vec<B>> {
    Ok(ApiResponse::page(state.catalog.bridges_for_right::<B>(&session, &id, query).await?))
}

/// CRUD and search routes for one kind under `/$segment`.
macro_rules! catalog_kind {
    ($router:expr, $segment:literal, $ty:ty) => {
        $router
            .route(concat!("/", $segment), get(list_records::<$ty>).post(create_record::<$ty>))
            .route(concat!("/", $segment, "/search"), get(search_records::<$ty>))
            .route(
                concat!("/", $segment, "/{id}"),
                get(get_record::<$ty>)
                    .head(record_exists::<$ty>)
                    .put(update_record::<$ty>)
                    .delete(archive_record::<$ty>),
            )
    };
}

/// Listings of a bridge from both of its endpoints.
macro_rules! bridge_listings {
    ($router:expr, $left:literal, $right:literal, $bridge:literal, $ty:ty) => {
        $router
            .route(concat!("/", $left, "/{id}/", $bridge), get(bridges_by_left::<$ty>))
            .route(concat!("/", $right, "/{id}/", $bridge), get(bridges_by_right::<$ty>))
    };
}

/// Every catalog route. Mounted behind authentication.
pub fn catalog_routes() -> Router<AppState> {
    let router = Router::new();

    let router = catalog_kind!(router, "valid_ingredients", ValidIngredient);
    let router = catalog_kind!(router, "valid_preparations", ValidPreparation);
    let router = catalog_kind!(router, "valid_measurement_units", ValidMeasurementUnit);
    let router = catalog_kind!(router, "valid_instruments", ValidInstrument);
    let router = catalog_kind!(router, "valid_vessels", ValidVessel);
    let router = catalog_kind!(router, "valid_ingredient_states", ValidIngredientState);
    let router = catalog_kind!(router, "valid_ingredient_groups", ValidIngredientGroup);

    let router = catalog_kind!(router, "valid_ingredient_measurement_units", ValidIngredientMeasurementUnit);
    let router = catalog_kind!(router, "valid_ingredient_preparations", ValidIngredientPreparation);
    let router = catalog_kind!(router, "valid_ingredient_state_ingredients", ValidIngredientStateIngredient);
    let router = catalog_kind!(router, "valid_preparation_instruments", ValidPreparationInstrument);
    let router = catalog_kind!(router, "valid_preparation_vessels", ValidPreparationVessel);
    let router = catalog_kind!(router, "valid_measurement_unit_conversions", ValidMeasurementUnitConversion);

    let router = bridge_listings!(
        router,
        "valid_ingredients",
        "valid_measurement_units",
        "valid_ingredient_measurement_units",
        ValidIngredientMeasurementUnit
    );
    let router = bridge_listings!(
        router,
        "valid_ingredients",
        "valid_preparations",
        "valid_ingredient_preparations",
        ValidIngredientPreparation
    );
    let router = bridge_listings!(
        router,
        "valid_ingredient_states",
        "valid_ingredients",
        "valid_ingredient_state_ingredients",
        ValidIngredientStateIngredient
    );
    let router = bridge_listings!(
        router,
        "valid_preparations",
        "valid_instruments",
        "valid_preparation_instruments",
        ValidPreparationInstrument
    );
    let router = bridge_listings!(
        router,
        "valid_preparations",
        "valid_vessels",
        "valid_preparation_vessels",
        ValidPreparationVessel
    );

    // Both endpoints of a conversion are units, so the side is named instead.
    router
        .route(
            "/valid_measurement_unit_conversions/from_unit/{id}",
            get(bridges_by_left::<ValidMeasurementUnitConversion>),
        )
        .route(
            "/valid_measurement_unit_conversions/to_unit/{id}",
            get(bridges_by_right::<ValidMeasurementUnitConversion>),
        )
}
