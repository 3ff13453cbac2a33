//! Offset pagination shared by post and user listings.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 10;
pub const MAX_LIMIT: u32 = 100;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PaginationError {
    #[error("limit {limit} exceeds the maximum of {max}")]
    LimitTooLarge { limit: u32, max: u32 },
}

/// Absent or non-positive page numbers mean the first page.
pub fn normalize_page(raw: Option<i64>) -> u32 {
    match raw {
        Some(page) if page > 0 => u32::try_from(page).unwrap_or(u32::MAX),
        _ => DEFAULT_PAGE,
    }
}

/// Absent or non-positive limits mean the default page size.
pub fn normalize_limit(raw: Option<i64>) -> u32 {
    match raw {
        Some(limit) if limit > 0 => u32::try_from(limit).unwrap_or(u32::MAX),
        _ => DEFAULT_LIMIT,
    }
}

/// A validated page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl PageRequest {
    pub fn from_raw(page: Option<i64>, limit: Option<i64>) -> Result<Self, PaginationError> {
        let page = normalize_page(page);
        let limit = normalize_limit(limit);
        if limit > MAX_LIMIT {
            return Err(PaginationError::LimitTooLarge {
                limit,
                max: MAX_LIMIT,
            });
        }
        Ok(Self { page, limit })
    }

    /// Number of rows to skip: `(page - 1) * limit`.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }

    /// Slice an already-ordered collection to this window.
    pub fn slice<T: Clone>(&self, ordered: &[T]) -> Vec<T> {
        let start = usize::try_from(self.offset()).unwrap_or(usize::MAX);
        ordered
            .iter()
            .skip(start)
            .take(self.limit as usize)
            .cloned()
            .collect()
    }
}

/// One page of results along with the size of the unpaginated set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, request: PageRequest) -> Self {
        Self {
            items,
            total,
            page: request.page,
            limit: request.limit,
        }
    }
}
