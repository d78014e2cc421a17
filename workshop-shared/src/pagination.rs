/// Pagination for list operations
///
/// Two request styles are accepted:
///
/// - **Page mode**: `page` (>= 1) and `page_size` (clamped to 1..=500)
/// - **Legacy mode**: `limit` (clamped to 0..=500, default 200) and `offset` (>= 0)
///
/// Page mode wins whenever `page_size` is supplied. A bare `page` without a
/// size uses [`DEFAULT_PAGE_SIZE`]. With no parameters at all the legacy
/// defaults apply.
///
/// # Example
///
/// ```
/// use workshop_shared::pagination::PageRequest;
///
/// let paging = PageRequest { page: Some(3), page_size: Some(10), ..Default::default() }.resolve();
/// assert_eq!(paging.offset, 20);
/// assert_eq!(paging.limit, 10);
/// ```

use serde::{Deserialize, Serialize};

/// Largest window a single request may ask for
pub const MAX_PAGE_SIZE: i64 = 500;

/// Page size used when only `page` is given
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// Limit used in legacy mode when `limit` is omitted
pub const DEFAULT_LIMIT: i64 = 200;

/// Raw pagination parameters as supplied by a caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Resolved window plus the values echoed back to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paging {
    /// 1-based page number reported in the response
    pub page: i64,

    /// Page size reported in the response
    pub page_size: i64,

    /// Rows to fetch
    pub limit: i64,

    /// Rows to skip
    pub offset: i64,
}

impl PageRequest {
    /// Resolves the request into a concrete window
    pub fn resolve(&self) -> Paging {
        if self.page_size.is_some() || (self.page.is_some() && self.limit.is_none() && self.offset.is_none()) {
            let page = self.page.unwrap_or(1).max(1);
            let page_size = self
                .page_size
                .unwrap_or(DEFAULT_PAGE_SIZE)
                .clamp(1, MAX_PAGE_SIZE);
            let offset = (page - 1).saturating_mul(page_size);

            return Paging {
                page,
                page_size,
                limit: page_size,
                offset,
            };
        }

        let limit = self.limit.unwrap_or(DEFAULT_LIMIT).clamp(0, MAX_PAGE_SIZE);
        let offset = self.offset.unwrap_or(0).max(0);
        let page = if limit > 0 { (offset / limit).saturating_add(1) } else { 1 };

        Paging {
            page,
            page_size: limit,
            limit,
            offset,
        }
    }
}

/// One page of results with the total count of matching rows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,

    /// Matching rows across all pages
    pub total: i64,

    pub page: i64,
    pub page_size: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, paging: Paging) -> Self {
        Self {
            items,
            total,
            page: paging.page,
            page_size: paging.page_size,
        }
    }
}

/// Normalizes a free-text filter: trimmed, lowercased, `None` when blank
pub fn normalize_filter(filter: Option<&str>) -> Option<String> {
    filter
        .map(|f| f.trim().to_lowercase())
        .filter(|f| !f.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_use_legacy_window() {
        let paging = PageRequest::default().resolve();
        assert_eq!(paging.limit, DEFAULT_LIMIT);
        assert_eq!(paging.offset, 0);
        assert_eq!(paging.page, 1);
        assert_eq!(paging.page_size, DEFAULT_LIMIT);
    }

    #[test]
    fn test_page_mode_clamps_size() {
        let paging = PageRequest {
            page: Some(2),
            page_size: Some(10_000),
            ..Default::default()
        }
        .resolve();
        assert_eq!(paging.page_size, MAX_PAGE_SIZE);
        assert_eq!(paging.offset, MAX_PAGE_SIZE);

        let paging = PageRequest {
            page: Some(0),
            page_size: Some(0),
            ..Default::default()
        }
        .resolve();
        assert_eq!(paging.page, 1);
        assert_eq!(paging.page_size, 1);
        assert_eq!(paging.offset, 0);
    }

    #[test]
    fn test_page_without_size_uses_default() {
        let paging = PageRequest {
            page: Some(3),
            ..Default::default()
        }
        .resolve();
        assert_eq!(paging.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(paging.offset, 2 * DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_legacy_mode_clamps() {
        let paging = PageRequest {
            limit: Some(900),
            offset: Some(-5),
            ..Default::default()
        }
        .resolve();
        assert_eq!(paging.limit, MAX_PAGE_SIZE);
        assert_eq!(paging.offset, 0);

        let paging = PageRequest {
            limit: Some(25),
            offset: Some(50),
            ..Default::default()
        }
        .resolve();
        assert_eq!(paging.page, 3);
        assert_eq!(paging.page_size, 25);
    }

    #[test]
    fn test_zero_limit_is_allowed() {
        let paging = PageRequest {
            limit: Some(0),
            ..Default::default()
        }
        .resolve();
        assert_eq!(paging.limit, 0);
        assert_eq!(paging.page, 1);
    }

    #[test]
    fn test_legacy_page_saturates_at_huge_offset() {
        let paging = PageRequest {
            limit: Some(1),
            offset: Some(i64::MAX),
            ..Default::default()
        }
        .resolve();
        assert_eq!(paging.offset, i64::MAX);
        assert_eq!(paging.page, i64::MAX);
    }

    #[test]
    fn test_normalize_filter() {
        assert_eq!(normalize_filter(Some("  BoB ")), Some("bob".to_string()));
        assert_eq!(normalize_filter(Some("   ")), None);
        assert_eq!(normalize_filter(None), None);
    }
}
