//! Storage-agnostic query vocabulary shared by the repository layer:
//! offset paging math, sort direction and the filter expression tree.
//!
//! Nothing in here talks to a database. `entity-repo` turns these types into
//! SeaORM queries.

pub mod ast;
pub mod page;
mod sort;

pub use page::{PageMeta, PageRequest, PagedResult, PagingError, UNBOUNDED_PAGE_SIZE};
pub use sort::SortDir;

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
