/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Login and session verification
/// - `users`: Account lifecycle endpoints
/// - `audit`: Audit trail listing and manual entries

pub mod audit;
pub mod auth;
pub mod health;
pub mod users;

use serde::Deserialize;
use workshop_shared::pagination::PageRequest;

/// Query string shared by the list endpoints
///
/// Either `page` + `page_size` or the legacy `limit` + `offset` pair.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Free-text filter
    pub q: Option<String>,

    /// Exact username filter (audit only)
    pub user: Option<String>,

    pub page: Option<i64>,

    #[serde(alias = "pageSize")]
    pub page_size: Option<i64>,

    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ListQuery {
    pub fn paging(&self) -> PageRequest {
        PageRequest {
            page: self.page,
            page_size: self.page_size,
            limit: self.limit,
            offset: self.offset,
        }
    }
}
