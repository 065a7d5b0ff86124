//! Persistence context shared by all repositories of a unit of work.
//!
//! Mutations are staged as type-erased [`PendingChange`]s and flushed by
//! [`DbContext::save_changes`] inside one database transaction.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use sea_orm::{
    ActiveModelTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait,
    IntoActiveModel, TransactionTrait,
};

use crate::entity::{entity_name, key_of, RepoEntity};
use crate::error::{HookStage, RepoError, Result};
use crate::tracker::ChangeTracker;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ChangeKind {
    Insert,
    Update,
    Delete,
}

#[async_trait]
pub(crate) trait PendingChange: Send + Sync {
    fn entity(&self) -> &'static str;
    fn kind(&self) -> ChangeKind;
    fn rows(&self) -> usize;

    /// Write the change; returns affected rows.
    async fn apply(&self, txn: &DatabaseTransaction) -> std::result::Result<u64, DbErr>;

    /// Called once the surrounding transaction committed.
    fn committed(&self, tracker: &ChangeTracker);
}

pub(crate) struct InsertChange<E: RepoEntity> {
    rows: Vec<E::ActiveModel>,
    saved: Mutex<Vec<E::Model>>,
}

impl<E: RepoEntity> InsertChange<E> {
    pub(crate) fn new(rows: Vec<E::ActiveModel>) -> Self {
        Self {
            rows,
            saved: Mutex::new(Vec::new()),
        }
    }

    /// Rows as persisted by the last successful flush.
    pub(crate) fn take_saved(&self) -> Vec<E::Model> {
        std::mem::take(&mut *self.saved.lock())
    }
}

#[async_trait]
impl<E> PendingChange for InsertChange<E>
where
    E: RepoEntity,
    E::Model: IntoActiveModel<E::ActiveModel>,
{
    fn entity(&self) -> &'static str {
        entity_name::<E>()
    }

    fn kind(&self) -> ChangeKind {
        ChangeKind::Insert
    }

    fn rows(&self) -> usize {
        self.rows.len()
    }

    async fn apply(&self, txn: &DatabaseTransaction) -> std::result::Result<u64, DbErr> {
        let mut saved = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            saved.push(row.clone().insert(txn).await?);
        }
        let affected = saved.len() as u64;
        *self.saved.lock() = saved;
        Ok(affected)
    }

    fn committed(&self, _tracker: &ChangeTracker) {}
}

pub(crate) struct UpdateChange<E: RepoEntity> {
    rows: Vec<E::ActiveModel>,
    saved: Mutex<Vec<E::Model>>,
}

impl<E: RepoEntity> UpdateChange<E> {
    pub(crate) fn new(rows: Vec<E::ActiveModel>) -> Self {
        Self {
            rows,
            saved: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn take_saved(&self) -> Vec<E::Model> {
        std::mem::take(&mut *self.saved.lock())
    }
}

#[async_trait]
impl<E> PendingChange for UpdateChange<E>
where
    E: RepoEntity,
    E::Model: IntoActiveModel<E::ActiveModel>,
{
    fn entity(&self) -> &'static str {
        entity_name::<E>()
    }

    fn kind(&self) -> ChangeKind {
        ChangeKind::Update
    }

    fn rows(&self) -> usize {
        self.rows.len()
    }

    async fn apply(&self, txn: &DatabaseTransaction) -> std::result::Result<u64, DbErr> {
        let mut saved = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            saved.push(row.clone().update(txn).await?);
        }
        let affected = saved.len() as u64;
        *self.saved.lock() = saved;
        Ok(affected)
    }

    fn committed(&self, tracker: &ChangeTracker) {
        for model in self.saved.lock().iter() {
            tracker.refresh::<E>(model);
        }
    }
}

pub(crate) struct DeleteChange<E: RepoEntity> {
    rows: Vec<E::ActiveModel>,
}

impl<E: RepoEntity> DeleteChange<E> {
    pub(crate) fn new(rows: Vec<E::ActiveModel>) -> Self {
        Self { rows }
    }
}

#[async_trait]
impl<E> PendingChange for DeleteChange<E>
where
    E: RepoEntity,
    E::Model: IntoActiveModel<E::ActiveModel>,
{
    fn entity(&self) -> &'static str {
        entity_name::<E>()
    }

    fn kind(&self) -> ChangeKind {
        ChangeKind::Delete
    }

    fn rows(&self) -> usize {
        self.rows.len()
    }

    async fn apply(&self, txn: &DatabaseTransaction) -> std::result::Result<u64, DbErr> {
        let mut affected = 0;
        for row in &self.rows {
            affected += E::delete(row.clone()).exec(txn).await?.rows_affected;
        }
        Ok(affected)
    }

    fn committed(&self, tracker: &ChangeTracker) {
        for key in self.rows.iter().filter_map(key_of) {
            tracker.detach::<E>(&key);
        }
    }
}

type Hook<'a> = Box<dyn FnOnce() -> anyhow::Result<()> + Send + 'a>;

/// Optional actions around the persist step of [`DbContext::save_changes`].
#[derive(Default)]
pub struct SaveHooks<'a> {
    before: Option<Hook<'a>>,
    after: Option<Hook<'a>>,
}

impl<'a> SaveHooks<'a> {
    pub fn none() -> Self {
        Self::default()
    }

    /// Runs before anything is written; an error leaves all changes pending.
    pub fn before(mut self, f: impl FnOnce() -> anyhow::Result<()> + Send + 'a) -> Self {
        self.before = Some(Box::new(f));
        self
    }

    /// Runs after the commit.
    pub fn after(mut self, f: impl FnOnce() -> anyhow::Result<()> + Send + 'a) -> Self {
        self.after = Some(Box::new(f));
        self
    }
}

/// Connection, staged change set and tracked snapshots.
pub struct DbContext {
    conn: DatabaseConnection,
    changes: Mutex<Vec<Arc<dyn PendingChange>>>,
    tracker: ChangeTracker,
}

impl DbContext {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self {
            conn,
            changes: Mutex::new(Vec::new()),
            tracker: ChangeTracker::new(),
        }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }

    pub fn tracker(&self) -> &ChangeTracker {
        &self.tracker
    }

    pub(crate) fn stage(&self, change: Arc<dyn PendingChange>) {
        tracing::debug!(
            entity = change.entity(),
            kind = ?change.kind(),
            rows = change.rows(),
            "Staged change"
        );
        self.changes.lock().push(change);
    }

    /// Number of staged changes (a batch counts once).
    pub fn pending_changes(&self) -> usize {
        self.changes.lock().len()
    }

    /// Drop every staged change; returns how many were dropped.
    pub fn discard_changes(&self) -> usize {
        let dropped = std::mem::take(&mut *self.changes.lock()).len();
        if dropped > 0 {
            tracing::debug!(changes = dropped, "Discarded staged changes");
        }
        dropped
    }

    /// Before hook, persist, after hook. Returns the number of affected rows.
    pub async fn save_changes(&self, hooks: SaveHooks<'_>) -> Result<u64> {
        let SaveHooks { before, after } = hooks;

        if let Some(before) = before {
            before().map_err(|source| RepoError::Hook {
                stage: HookStage::Before,
                source,
            })?;
        }

        let affected = self.persist().await?;

        if let Some(after) = after {
            after().map_err(|source| RepoError::Hook {
                stage: HookStage::After,
                source,
            })?;
        }

        Ok(affected)
    }

    async fn persist(&self) -> Result<u64> {
        let batch = std::mem::take(&mut *self.changes.lock());
        if batch.is_empty() {
            return Ok(0);
        }

        let outcome = self.apply_all(&batch).await;
        match outcome {
            Ok(affected) => {
                for change in &batch {
                    change.committed(&self.tracker);
                }
                tracing::debug!(changes = batch.len(), affected, "Saved changes");
                Ok(affected)
            }
            Err(e) => {
                tracing::warn!(error = %e, changes = batch.len(), "Save failed; changes kept pending");
                let mut pending = self.changes.lock();
                let staged_since = std::mem::replace(&mut *pending, batch);
                pending.extend(staged_since);
                Err(e.into())
            }
        }
    }

    async fn apply_all(&self, batch: &[Arc<dyn PendingChange>]) -> std::result::Result<u64, DbErr> {
        // Dropping the transaction on error rolls it back.
        let txn = self.conn.begin().await?;
        let mut affected = 0;
        for change in batch {
            affected += change.apply(&txn).await?;
        }
        txn.commit().await?;
        Ok(affected)
    }
}
