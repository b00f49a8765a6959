//! Shared pagination types for list endpoints.
//!
//! Provides [`PageQuery`] for the standard request parameters and [`Page`] for
//! the list result every lifecycle listing produces.

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Default page size.
pub const DEFAULT_LIMIT: u32 = 20;

/// Hard cap on page size.
pub const MAX_LIMIT: u32 = 250;

/// Ordering by creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Asc => write!(f, "asc"),
            SortDirection::Desc => write!(f, "desc"),
        }
    }
}

/// Query-string filter shared by every list endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    /// 1-based page number
    pub page: Option<u32>,
    /// Page size (default 20, capped at 250)
    pub limit: Option<u32>,
    /// `asc` or `desc` by creation time
    pub sort_by: Option<SortDirection>,
    /// Unix seconds, exclusive
    pub created_before: Option<i64>,
    /// Unix seconds, exclusive
    pub created_after: Option<i64>,
    /// Only honoured for service admins
    pub include_archived: Option<bool>,
}

impl PageQuery {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page() - 1) * u64::from(self.limit())
    }

    pub fn sort(&self) -> SortDirection {
        self.sort_by.unwrap_or_default()
    }

    pub fn created_before(&self) -> Option<DateTime<Utc>> {
        self.created_before.and_then(|secs| Utc.timestamp_opt(secs, 0).single())
    }

    pub fn created_after(&self) -> Option<DateTime<Utc>> {
        self.created_after.and_then(|secs| Utc.timestamp_opt(secs, 0).single())
    }

    pub fn wants_archived(&self) -> bool {
        self.include_archived.unwrap_or(false)
    }

    /// Drop the archived flag for principals that may not see archived records.
    pub fn restricted(mut self, may_include_archived: bool) -> Self {
        if !may_include_archived {
            self.include_archived = None;
        }
        self
    }
}

/// Pagination block of a list response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    /// Records matching the filter
    pub filtered_count: u64,
    /// Records visible in the scope before filtering
    pub total_count: u64,
}

/// One page of results.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, query: &PageQuery, filtered_count: u64, total_count: u64) -> Self {
        Self {
            items,
            pagination: Pagination {
                page: query.page(),
                limit: query.limit(),
                filtered_count,
                total_count,
            },
        }
    }

    /// Paginate an already loaded, oldest-first collection.
    pub fn from_all(mut all: Vec<T>, query: &PageQuery) -> Self {
        if query.sort() == SortDirection::Desc {
            all.reverse();
        }
        let total = all.len() as u64;
        let items = all
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.limit() as usize)
            .collect();
        Self::new(items, query, total, total)
    }

    /// Transform the items while keeping pagination intact.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page { items: self.items.into_iter().map(f).collect(), pagination: self.pagination }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let query = PageQuery::default();
        assert_eq!(query.page(), 1);
        assert_eq!(query.limit(), DEFAULT_LIMIT);
        assert_eq!(query.offset(), 0);
        assert_eq!(query.sort(), SortDirection::Asc);
    }

    #[test]
    fn test_limit_is_capped_and_page_floored() {
        let query = PageQuery { page: Some(0), limit: Some(10_000), ..Default::default() };
        assert_eq!(query.page(), 1);
        assert_eq!(query.limit(), MAX_LIMIT);

        let query = PageQuery { page: Some(3), limit: Some(25), ..Default::default() };
        assert_eq!(query.offset(), 50);
    }

    #[test]
    fn test_query_string_parsing() {
        let query: PageQuery = serde_json::from_value(serde_json::json!({
            "page": 2,
            "limit": 5,
            "sortBy": "desc",
            "createdAfter": 1_700_000_000,
            "includeArchived": true
        }))
        .unwrap();
        assert_eq!(query.sort(), SortDirection::Desc);
        assert_eq!(query.created_after().map(|t| t.timestamp()), Some(1_700_000_000));
        assert!(query.wants_archived());
        assert!(!query.restricted(false).wants_archived());
    }

    #[test]
    fn test_page_map_preserves_pagination() {
        let query = PageQuery::default();
        let page = Page::new(vec![1, 2, 3], &query, 3, 10).map(|n| n * 2);
        assert_eq!(page.items, vec![2, 4, 6]);
        assert_eq!(page.pagination.total_count, 10);
    }

    #[test]
    fn test_from_all_slices_in_requested_order() {
        let query = PageQuery { page: Some(2), limit: Some(2), sort_by: Some(SortDirection::Desc), ..Default::default() };
        let page = Page::from_all(vec![1, 2, 3, 4, 5], &query);
        assert_eq!(page.items, vec![3, 2]);
        assert_eq!(page.pagination.filtered_count, 5);
    }
}
