//! Common API utilities and shared types

use serde::{Deserialize, Serialize};

use crate::models::{ListParams, PagedResult};

/// Pagination query parameters (`?page=2&page_size=50`)
#[derive(Debug, Default, Deserialize)]
pub struct PaginationQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl PaginationQuery {
    pub fn params(&self) -> ListParams {
        ListParams::from_query(self.page, self.page_size)
    }
}

/// Paginated list envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub count: i64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
    pub results: Vec<T>,
}

impl<T> Paginated<T> {
    pub fn from_page<U>(page: PagedResult<U>, f: impl FnMut(U) -> T) -> Self {
        let total_pages = page.total_pages();
        let page = page.map(f);
        Self {
            count: page.total,
            page: page.page,
            page_size: page.page_size,
            total_pages,
            results: page.items,
        }
    }
}

/// Empty strings in query parameters count as absent
pub fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_defaults_and_clamping() {
        assert_eq!(PaginationQuery::default().params(), ListParams::new(1, 20));
        let query = PaginationQuery {
            page: Some(0),
            page_size: Some(1000),
        };
        assert_eq!(query.params(), ListParams::new(1, 100));
    }

    #[test]
    fn test_paginated_envelope() {
        let page = PagedResult::new(vec![1, 2], 5, &ListParams::new(1, 2));
        let envelope = Paginated::from_page(page, |n| n * 10);
        assert_eq!(envelope.results, vec![10, 20]);
        assert_eq!(envelope.count, 5);
        assert_eq!(envelope.total_pages, 3);
    }
}
