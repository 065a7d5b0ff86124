//! Snapshots of rows loaded with [`Tracking::Tracked`](crate::Tracking).
//!
//! SeaORM has no identity map, so the context keeps the last known persisted
//! state of tracked rows. Updates of a tracked row write only the columns
//! that differ from its snapshot.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use parking_lot::Mutex;
use sea_orm::IntoActiveModel;

use crate::entity::{key_of, RepoEntity};

type Snapshot = Box<dyn Any + Send + Sync>;

#[derive(Default)]
pub struct ChangeTracker {
    entries: Mutex<HashMap<(TypeId, String), Snapshot>>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or refresh) tracking of a persisted row.
    pub(crate) fn attach<E>(&self, model: &E::Model)
    where
        E: RepoEntity,
        E::Model: IntoActiveModel<E::ActiveModel>,
    {
        let Some(key) = key_of(&model.clone().into_active_model()) else {
            return;
        };
        self.entries
            .lock()
            .insert((TypeId::of::<E>(), key), Box::new(model.clone()));
    }

    /// Replace the snapshot only when the row is already tracked.
    pub(crate) fn refresh<E>(&self, model: &E::Model)
    where
        E: RepoEntity,
        E::Model: IntoActiveModel<E::ActiveModel>,
    {
        let Some(key) = key_of(&model.clone().into_active_model()) else {
            return;
        };
        if let Some(slot) = self.entries.lock().get_mut(&(TypeId::of::<E>(), key)) {
            *slot = Box::new(model.clone());
        }
    }

    pub(crate) fn detach<E: RepoEntity>(&self, key: &str) {
        self.entries
            .lock()
            .remove(&(TypeId::of::<E>(), key.to_string()));
    }

    pub(crate) fn snapshot<E: RepoEntity>(&self, key: &str) -> Option<E::Model> {
        self.entries
            .lock()
            .get(&(TypeId::of::<E>(), key.to_string()))
            .and_then(|s| s.downcast_ref::<E::Model>())
            .cloned()
    }

    /// Number of tracked rows across all entity types.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every snapshot; later updates write all columns.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}
