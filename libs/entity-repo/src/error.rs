use std::fmt;

use query_core::PagingError;
use sea_orm::DbErr;
use thiserror::Error;

use crate::filter::FilterBuildError;

/// Library-local result type.
pub type Result<T> = std::result::Result<T, RepoError>;

/// Which side of the persist step a save hook ran on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HookStage {
    Before,
    After,
}

impl fmt::Display for HookStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookStage::Before => f.write_str("before"),
            HookStage::After => f.write_str("after"),
        }
    }
}

/// Typed error for repositories and the unit of work.
///
/// Lookups that find nothing are `Ok(None)`, never an error.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("invalid page request: {0}")]
    InvalidPage(#[from] PagingError),

    #[error("invalid filter: {0}")]
    Filter(#[from] FilterBuildError),

    #[error("count {0} does not fit into u32; use long_count")]
    CountOverflow(u64),

    #[error(transparent)]
    Db(#[from] DbErr),

    #[error("{stage} save hook failed")]
    Hook {
        stage: HookStage,
        #[source]
        source: anyhow::Error,
    },

    #[error("invalid database config: {0}")]
    Config(String),
}

impl RepoError {
    /// True for errors caused by caller input rather than by the database.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            RepoError::InvalidArgument(_)
                | RepoError::InvalidPage(_)
                | RepoError::Filter(_)
                | RepoError::CountOverflow(_)
        )
    }
}
