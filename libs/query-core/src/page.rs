use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Page size sentinel: a single page holds every matching item.
pub const UNBOUNDED_PAGE_SIZE: u64 = u64::MAX;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PagingError {
    #[error("page size must be greater than zero")]
    InvalidPageSize,

    #[error("page number must be 1 or greater")]
    InvalidPageNumber,
}

/// 1-based offset paging request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PageRequest {
    pub number: u64,
    pub size: u64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            number: 1,
            size: UNBOUNDED_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    pub fn new(number: u64, size: u64) -> Self {
        Self { number, size }
    }

    /// First page of `size` items.
    pub fn first(size: u64) -> Self {
        Self::new(1, size)
    }

    pub fn is_unbounded(&self) -> bool {
        self.size == UNBOUNDED_PAGE_SIZE
    }

    pub fn validate(&self) -> Result<(), PagingError> {
        if self.size == 0 {
            return Err(PagingError::InvalidPageSize);
        }
        if self.number == 0 {
            return Err(PagingError::InvalidPageNumber);
        }
        Ok(())
    }

    /// Number of items to skip: `(number - 1) * size`, saturating.
    pub fn offset(&self) -> u64 {
        self.number.saturating_sub(1).saturating_mul(self.size)
    }

    /// Number of items to take, `None` when unbounded.
    pub fn limit(&self) -> Option<u64> {
        (!self.is_unbounded()).then_some(self.size)
    }
}

/// Paging metadata derived from a total count and a page request.
///
/// Page numbers past the end are not clamped: the page is empty,
/// `has_next_page` is false and `is_last_page` is true. Item indices are
/// 1-based and follow the same formulas on every page, so on an empty page
/// `last_item_on_page < first_item_on_page`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    pub total_items: u64,
    pub total_pages: u64,
    pub page_size: u64,
    pub page_number: u64,
    pub has_previous_page: bool,
    pub has_next_page: bool,
    pub is_first_page: bool,
    pub is_last_page: bool,
    pub first_item_on_page: u64,
    pub last_item_on_page: u64,
}

impl PageMeta {
    pub fn compute(total_items: u64, page: &PageRequest) -> Result<Self, PagingError> {
        page.validate()?;

        let total_pages = total_items.div_ceil(page.size);
        let first_item_on_page = page.offset().saturating_add(1);
        let last_item_on_page = page.number.saturating_mul(page.size).min(total_items);

        Ok(Self {
            total_items,
            total_pages,
            page_size: page.size,
            page_number: page.number,
            has_previous_page: page.number > 1,
            has_next_page: page.number < total_pages,
            is_first_page: page.number == 1,
            is_last_page: page.number >= total_pages,
            first_item_on_page,
            last_item_on_page,
        })
    }

    /// True when the requested page lies beyond the last item.
    pub fn is_past_end(&self) -> bool {
        self.first_item_on_page > self.total_items
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    pub meta: PageMeta,
}

impl<T> PagedResult<T> {
    pub fn new(items: Vec<T>, meta: PageMeta) -> Self {
        Self { items, meta }
    }

    /// A page with no items, e.g. when the request is past the end.
    pub fn empty(meta: PageMeta) -> Self {
        Self {
            items: Vec::new(),
            meta,
        }
    }

    /// Map items while preserving the metadata (entity -> DTO convenience).
    pub fn map_items<U>(self, f: impl FnMut(T) -> U) -> PagedResult<U> {
        PagedResult {
            items: self.items.into_iter().map(f).collect(),
            meta: self.meta,
        }
    }
}
