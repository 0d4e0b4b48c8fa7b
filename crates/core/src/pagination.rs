//! Page-based pagination.
//!
//! List endpoints take a 1-based `page` and a `limit`. Both are normalized
//! here so the database layer only ever sees a sane `LIMIT`/`OFFSET`, and the
//! response metadata is computed in one place.
//!
//! For any page returned, `current * limit >= min(items, data.len())` holds:
//! `current` and `limit` are at least 1 and `data.len()` never exceeds `limit`.

use serde::{Deserialize, Serialize};

/// Default page size when the client does not send one.
pub const DEFAULT_LIMIT: u32 = 10;

/// Largest page size a client may request.
pub const MAX_LIMIT: u32 = 100;

/// A normalized page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

impl PageRequest {
    /// Normalize raw query values: missing or zero page becomes 1, missing
    /// limit becomes [`DEFAULT_LIMIT`], and the limit is clamped to
    /// `1..=MAX_LIMIT`.
    #[must_use]
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
        }
    }

    /// 1-based page number.
    #[must_use]
    pub const fn page(&self) -> u32 {
        self.page
    }

    /// Page size.
    #[must_use]
    pub const fn limit(&self) -> u32 {
        self.limit
    }

    /// `LIMIT` value for SQL.
    #[must_use]
    pub fn sql_limit(&self) -> i64 {
        i64::from(self.limit)
    }

    /// `OFFSET` value for SQL.
    #[must_use]
    pub fn sql_offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.limit)
    }

    /// Build response metadata once the total item count is known.
    #[must_use]
    pub fn paginate(&self, items: i64) -> Pagination {
        let items = items.max(0);
        let limit = i64::from(self.limit);
        Pagination {
            current: i64::from(self.page),
            limit,
            items,
            pages: (items + limit - 1) / limit,
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Pagination metadata included in every list response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Current 1-based page.
    pub current: i64,
    /// Page size used.
    pub limit: i64,
    /// Total matching items across all pages.
    pub items: i64,
    /// Total number of pages.
    pub pages: i64,
}

/// A page of results.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    /// Items on this page.
    pub data: Vec<T>,
    /// Pagination metadata.
    pub pagination: Pagination,
}

impl<T> Page<T> {
    /// Assemble a page from fetched rows and the total count.
    #[must_use]
    pub fn new(data: Vec<T>, request: PageRequest, items: i64) -> Self {
        Self {
            data,
            pagination: request.paginate(items),
        }
    }

    /// Convert every item, keeping the metadata.
    #[must_use]
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            pagination: self.pagination,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_clamping() {
        let req = PageRequest::new(None, None);
        assert_eq!((req.page(), req.limit()), (1, DEFAULT_LIMIT));

        let req = PageRequest::new(Some(0), Some(0));
        assert_eq!((req.page(), req.limit()), (1, 1));

        let req = PageRequest::new(Some(3), Some(10_000));
        assert_eq!((req.page(), req.limit()), (3, MAX_LIMIT));
    }

    #[test]
    fn test_offset() {
        assert_eq!(PageRequest::new(Some(1), Some(25)).sql_offset(), 0);
        assert_eq!(PageRequest::new(Some(4), Some(25)).sql_offset(), 75);
    }

    #[test]
    fn test_page_count() {
        let req = PageRequest::new(Some(1), Some(10));
        assert_eq!(req.paginate(0).pages, 0);
        assert_eq!(req.paginate(1).pages, 1);
        assert_eq!(req.paginate(10).pages, 1);
        assert_eq!(req.paginate(11).pages, 2);
        assert_eq!(req.paginate(-5).items, 0);
    }

    #[test]
    fn test_current_times_limit_covers_returned_rows() {
        for page in [None, Some(0), Some(1), Some(2), Some(9)] {
            for limit in [None, Some(0), Some(1), Some(7), Some(100), Some(500)] {
                let req = PageRequest::new(page, limit);
                for items in [0_i64, 1, 6, 7, 99, 1_000] {
                    let meta = req.paginate(items);
                    let remaining = (items - req.sql_offset()).max(0);
                    let returned = remaining.min(req.sql_limit());
                    assert!(meta.current * meta.limit >= items.min(returned));
                }
            }
        }
    }
}
