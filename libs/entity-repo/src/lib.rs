//! Generic repository and unit of work over SeaORM.
//!
//! One [`Repository<E>`] per entity type exposes filtering, sorting, paging,
//! counting and staged mutations; a [`UnitOfWork`] caches one repository per
//! type and owns the single save boundary shared by all of them.
//!
//! # Features
//! - `sqlite` (default), `pg`, `mysql`: enable the matching SeaORM sqlx driver
//!
//! # Example
//! ```rust,no_run
//! # mod notes {
//! #     use sea_orm::entity::prelude::*;
//! #     #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
//! #     #[sea_orm(table_name = "notes")]
//! #     pub struct Model {
//! #         #[sea_orm(primary_key)]
//! #         pub id: i32,
//! #         pub title: String,
//! #     }
//! #     #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
//! #     pub enum Relation {}
//! #     impl ActiveModelBehavior for ActiveModel {}
//! # }
//! use entity_repo::{DbConnConfig, PageRequest, QuerySpec, SaveMode, Sort, UnitOfWork};
//! use sea_orm::{ColumnTrait, Set};
//!
//! # async fn run() -> entity_repo::Result<()> {
//! let uow = UnitOfWork::connect(&DbConnConfig::default()).await?;
//! let notes = uow.repository::<notes::Entity>();
//!
//! notes
//!     .add(notes::ActiveModel { title: Set("hello".into()), ..Default::default() }, SaveMode::Deferred)
//!     .await?;
//! uow.save_changes(Default::default()).await?;
//!
//! let page = notes
//!     .find_paged(
//!         QuerySpec::new()
//!             .filter(notes::Column::Title.contains("hel"))
//!             .order_by(Sort::asc(notes::Column::Id)),
//!         PageRequest::first(20),
//!     )
//!     .await?;
//! assert_eq!(page.meta.total_items, 1);
//! # Ok(())
//! # }
//! ```

pub mod config;
mod connect;
pub mod context;
mod entity;
mod error;
pub mod filter;
pub mod query;
pub mod repository;
mod tracker;
pub mod uow;

pub use config::{DbConnConfig, PoolCfg};
pub use connect::{connect, redact_credentials_in_dsn};
pub use context::{DbContext, SaveHooks};
pub use entity::RepoEntity;
pub use error::{HookStage, RepoError, Result};
pub use filter::{expr_to_condition, FieldKind, FieldMap, FilterBuildError};
pub use query::{compose, ComposedQuery, QuerySpec, Sort, Tracking};
pub use repository::{Repository, SaveMode};
pub use tracker::ChangeTracker;
pub use uow::UnitOfWork;

pub use query_core::{ast, PageMeta, PageRequest, PagedResult, PagingError, SortDir};
