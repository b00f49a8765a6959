//! Success envelope: `{ "data": ..., "pagination": ... }`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::domain::{Page, Pagination};

use super::error::ApiError;

#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

/// A handler result rendered inside the envelope.
#[derive(Debug)]
pub struct ApiResponse<T> {
    status: StatusCode,
    body: Envelope<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self { status: StatusCode::OK, body: Envelope { data, pagination: None } }
    }

    pub fn created(data: T) -> Self {
        Self { status: StatusCode::CREATED, body: Envelope { data, pagination: None } }
    }
}

impl<T> ApiResponse<Vec<T>> {
    pub fn page(page: Page<T>) -> Self {
        Self {
            status: StatusCode::OK,
            body: Envelope { data: page.items, pagination: Some(page.pagination) },
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

pub type ApiResult<T> = Result<ApiResponse<T>, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PageQuery;

    #[test]
    fn pagination_is_omitted_for_single_records() {
        let body = serde_json::to_value(ApiResponse::ok("x").body).unwrap();
        assert_eq!(body, serde_json::json!({ "data": "x" }));

        let page = Page::from_all(vec![1, 2, 3], &PageQuery { limit: Some(2), ..Default::default() });
        let body = serde_json::to_value(ApiResponse::page(page).body).unwrap();
        assert_eq!(body["data"], serde_json::json!([1, 2]));
        assert_eq!(body["pagination"]["filteredCount"], 3);
        assert_eq!(body["pagination"]["limit"], 2);
    }
}
