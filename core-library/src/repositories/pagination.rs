//! Pagination helper types for repository queries

use serde::{Deserialize, Serialize};

/// Page size used when the caller asks for zero or fewer items
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Largest page a caller can request
pub const MAX_PAGE_SIZE: i64 = 100;

/// Limit/offset pagination parameters as received from callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Number of items requested
    pub limit: i64,
    /// Number of items to skip
    pub offset: i64,
}

impl PageRequest {
    /// Create a new page request
    ///
    /// # Examples
    ///
    /// ```
    /// use core_library::repositories::PageRequest;
    ///
    /// let request = PageRequest::new(0, -5).normalized();
    /// assert_eq!(request.limit, 20);
    /// assert_eq!(request.offset, 0);
    /// ```
    pub fn new(limit: i64, offset: i64) -> Self {
        Self { limit, offset }
    }

    /// Clamp into the accepted range
    ///
    /// - `limit <= 0` becomes [`DEFAULT_PAGE_SIZE`]
    /// - `limit > MAX_PAGE_SIZE` becomes [`MAX_PAGE_SIZE`]
    /// - `offset < 0` becomes 0
    pub fn normalized(self) -> Self {
        let limit = if self.limit <= 0 {
            DEFAULT_PAGE_SIZE
        } else {
            self.limit.min(MAX_PAGE_SIZE)
        };

        Self {
            limit,
            offset: self.offset.max(0),
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}
