//! Common API utilities and shared types

use serde::Deserialize;

/// Default page number (1-indexed)
pub fn default_page() -> i64 {
    1
}

/// Default page size
pub fn default_per_page() -> i64 {
    20
}

/// Pagination query parameters
#[derive(Debug, Deserialize)]
pub struct PaginationQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_per_page")]
    pub per_page: i64,
}

impl PaginationQuery {
    /// Clamp to sane bounds: page >= 1, 1 <= per_page <= 100
    pub fn clamped(&self) -> (i64, i64) {
        (self.page.max(1), self.per_page.clamp(1, 100))
    }
}
