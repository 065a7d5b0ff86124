//! Unit of work: one repository per entity type over a shared context.

use std::any::{Any, TypeId};
use std::sync::Arc;

use dashmap::DashMap;
use sea_orm::{DatabaseConnection, IntoActiveModel};

use crate::config::DbConnConfig;
use crate::context::{DbContext, SaveHooks};
use crate::entity::{entity_name, RepoEntity};
use crate::error::Result;
use crate::repository::Repository;

type CachedRepo = Arc<dyn Any + Send + Sync>;

/// Caches one [`Repository`] per entity type and owns the save boundary
/// shared by all of them.
pub struct UnitOfWork {
    ctx: Arc<DbContext>,
    repositories: DashMap<TypeId, CachedRepo>,
}

impl UnitOfWork {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self {
            ctx: Arc::new(DbContext::new(conn)),
            repositories: DashMap::new(),
        }
    }

    /// Connect with [`crate::connect`] and wrap the connection.
    pub async fn connect(cfg: &DbConnConfig) -> Result<Self> {
        Ok(Self::new(crate::connect(cfg).await?))
    }

    /// Repository for `E`, created on first use and cached afterwards.
    pub fn repository<E>(&self) -> Arc<Repository<E>>
    where
        E: RepoEntity,
        E::Model: IntoActiveModel<E::ActiveModel>,
    {
        let cached = self
            .repositories
            .entry(TypeId::of::<E>())
            .or_insert_with(|| {
                tracing::trace!(entity = entity_name::<E>(), "Creating repository");
                let repo: CachedRepo = Arc::new(Repository::<E>::new(self.ctx.clone()));
                repo
            })
            .value()
            .clone();

        match cached.downcast::<Repository<E>>() {
            Ok(repo) => repo,
            Err(_) => {
                tracing::error!(
                    entity = entity_name::<E>(),
                    "Cached repository has an unexpected type; replacing it"
                );
                let repo = Arc::new(Repository::<E>::new(self.ctx.clone()));
                let entry: CachedRepo = repo.clone();
                self.repositories.insert(TypeId::of::<E>(), entry);
                repo
            }
        }
    }

    /// Number of distinct entity types with a cached repository.
    pub fn cached_repositories(&self) -> usize {
        self.repositories.len()
    }

    /// Flush changes staged through any repository of this unit of work.
    pub async fn save_changes(&self, hooks: SaveHooks<'_>) -> Result<u64> {
        self.ctx.save_changes(hooks).await
    }

    pub fn pending_changes(&self) -> usize {
        self.ctx.pending_changes()
    }

    pub fn discard_changes(&self) -> usize {
        self.ctx.discard_changes()
    }

    pub fn connection(&self) -> &DatabaseConnection {
        self.ctx.connection()
    }

    pub fn context(&self) -> &Arc<DbContext> {
        &self.ctx
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        let pending = self.ctx.pending_changes();
        if pending > 0 {
            tracing::warn!(changes = pending, "Unit of work dropped with unsaved changes");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod notes {
        use sea_orm::entity::prelude::*;

        #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
        #[sea_orm(table_name = "notes")]
        pub struct Model {
            #[sea_orm(primary_key)]
            pub id: i32,
            pub title: String,
        }

        #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
        pub enum Relation {}

        impl ActiveModelBehavior for ActiveModel {}
    }

    #[tokio::test]
    async fn test_mistyped_cache_entry_is_replaced() {
        let uow = UnitOfWork::connect(&DbConnConfig::default()).await.unwrap();
        let bogus: CachedRepo = Arc::new(0u8);
        uow.repositories
            .insert(TypeId::of::<notes::Entity>(), bogus);

        let first = uow.repository::<notes::Entity>();
        let second = uow.repository::<notes::Entity>();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(uow.cached_repositories(), 1);

        let entry = uow
            .repositories
            .get(&TypeId::of::<notes::Entity>())
            .map(|e| e.value().clone())
            .unwrap();
        assert!(entry.downcast::<Repository<notes::Entity>>().is_ok());
    }
}
