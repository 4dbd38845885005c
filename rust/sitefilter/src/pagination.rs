//! Page-window arithmetic and pagination metadata for property responses.

use serde::Serialize;

/// Inclusive row window for a 1-based page, matching a range-style fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub start: i64,
    pub end: i64,
}

impl PageWindow {
    /// `page` is assumed already clamped to >= 1 by the caller.
    pub fn for_page(page: i64, page_size: i64) -> Self {
        let start = (page - 1) * page_size;
        Self {
            start,
            end: start + page_size - 1,
        }
    }

    pub fn offset(&self) -> i64 {
        self.start
    }

    pub fn limit(&self) -> i64 {
        self.end - self.start + 1
    }
}

pub fn total_pages(total_count: i64, page_size: i64) -> i64 {
    if total_count > 0 {
        (total_count + page_size - 1) / page_size
    } else {
        0
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PaginationMeta {
    pub total_count: i64,
    pub total_pages: i64,
    pub current_page: i64,
    pub page_size: i64,
    pub has_next: bool,
    pub has_previous: bool,
}

impl PaginationMeta {
    pub fn build(total_count: i64, page: i64, page_size: i64) -> Self {
        let total_pages = total_pages(total_count, page_size);
        Self {
            total_count,
            total_pages,
            current_page: page,
            page_size,
            has_next: page < total_pages,
            has_previous: page > 1,
        }
    }

    /// Metadata for the schema-drift fallback: no rows, all counts zero.
    pub fn empty(page: i64, page_size: i64) -> Self {
        Self {
            total_count: 0,
            total_pages: 0,
            current_page: page,
            page_size,
            has_next: false,
            has_previous: false,
        }
    }
}
