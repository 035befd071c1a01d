use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;

/// Pagination parameters for list queries
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(crate = "rocket::serde")]
pub struct PaginationParams {
    /// Page number (1-indexed), defaults to the first page.
    pub page: Option<i64>,
    /// Number of items per page.
    pub limit: Option<i64>,
}

impl PaginationParams {
    pub const DEFAULT_LIMIT: i64 = 10;
    pub const MAX_LIMIT: i64 = 50;

    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        Self { page, limit }
    }

    pub fn effective_page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    /// Requested limit capped to `MAX_LIMIT` and never below one.
    pub fn effective_limit(&self) -> i64 {
        self.limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, Self::MAX_LIMIT)
    }

    /// SQL OFFSET derived from the effective page and limit so page boundaries stay consistent.
    pub fn offset(&self) -> i64 {
        (self.effective_page() - 1) * self.effective_limit()
    }
}

/// Paginated response wrapper with metadata
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub page: i64,
    pub limit: i64,
    pub total_items: i64,
    pub total_pages: i64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, params: &PaginationParams, total_items: i64) -> Self {
        let limit = params.effective_limit();
        let total_pages = (total_items + limit - 1) / limit;

        Self {
            data,
            page: params.effective_page(),
            limit,
            total_items,
            total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_first_page() {
        let params = PaginationParams::default();
        assert_eq!(params.effective_page(), 1);
        assert_eq!(params.effective_limit(), PaginationParams::DEFAULT_LIMIT);
        assert_eq!(params.offset(), 0);
    }

    #[test]
    fn limit_is_capped_and_offset_uses_cap() {
        let params = PaginationParams::new(Some(3), Some(500));
        assert_eq!(params.effective_limit(), PaginationParams::MAX_LIMIT);
        assert_eq!(params.offset(), 2 * PaginationParams::MAX_LIMIT);
    }

    #[test]
    fn non_positive_values_are_clamped() {
        let params = PaginationParams::new(Some(0), Some(0));
        assert_eq!(params.effective_page(), 1);
        assert_eq!(params.effective_limit(), 1);
    }

    #[test]
    fn total_pages_rounds_up() {
        let response = PaginatedResponse::new(vec![1, 2, 3], &PaginationParams::new(Some(1), Some(3)), 7);
        assert_eq!(response.total_pages, 3);

        let empty: PaginatedResponse<i32> = PaginatedResponse::new(vec![], &PaginationParams::default(), 0);
        assert_eq!(empty.total_pages, 0);
    }
}
