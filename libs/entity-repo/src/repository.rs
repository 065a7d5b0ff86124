//! Generic repository over one SeaORM entity type.

use std::marker::PhantomData;
use std::sync::Arc;

use sea_orm::{
    sea_query::IntoCondition, ActiveModelTrait, ActiveValue, Condition, EntityTrait,
    IntoActiveModel, Iterable, ModelTrait, PaginatorTrait, QueryFilter, QuerySelect,
};

use crate::context::{DbContext, DeleteChange, InsertChange, SaveHooks, UpdateChange};
use crate::entity::{entity_name, is_key_column, key_condition, key_of, RepoEntity};
use crate::error::{RepoError, Result};
use crate::query::{compose, ComposedQuery, QuerySpec, Tracking};
use query_core::{PageMeta, PageRequest, PagedResult};

/// When a mutation reaches the database.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SaveMode {
    /// Stage the change and flush everything pending right away.
    #[default]
    Immediate,
    /// Only stage; the change is written by the next `save_changes`.
    Deferred,
}

/// CRUD, query and counting operations for `E`.
///
/// Holds no state of its own; staged changes and tracked snapshots live in
/// the shared [`DbContext`].
pub struct Repository<E: RepoEntity> {
    ctx: Arc<DbContext>,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Repository<E>
where
    E: RepoEntity,
    E::Model: IntoActiveModel<E::ActiveModel>,
{
    pub fn new(ctx: Arc<DbContext>) -> Self {
        Self {
            ctx,
            _entity: PhantomData,
        }
    }

    pub fn context(&self) -> &Arc<DbContext> {
        &self.ctx
    }

    /* ---------- queries ---------- */

    /// First row matching `predicate`.
    pub async fn find(
        &self,
        predicate: impl IntoCondition + Send,
        tracking: Tracking,
    ) -> Result<Option<E::Model>> {
        let row = E::find()
            .filter(predicate)
            .one(self.ctx.connection())
            .await?;
        if let Some(model) = &row {
            self.track(std::slice::from_ref(model), tracking);
        }
        Ok(row)
    }

    pub async fn find_all(&self, spec: QuerySpec<E>) -> Result<Vec<E::Model>> {
        let ComposedQuery { select, tracking } = compose(E::find(), &spec);
        let rows = select.all(self.ctx.connection()).await?;
        self.track(&rows, tracking);
        Ok(rows)
    }

    /// One page of the rows matching `spec`, with paging metadata.
    pub async fn find_paged(
        &self,
        spec: QuerySpec<E>,
        page: PageRequest,
    ) -> Result<PagedResult<E::Model>> {
        page.validate()?;

        let ComposedQuery { select, tracking } = compose(E::find(), &spec);
        let total = select.clone().count(self.ctx.connection()).await?;
        let meta = PageMeta::compute(total, &page)?;
        if meta.is_past_end() {
            return Ok(PagedResult::empty(meta));
        }

        let mut select = select;
        if page.offset() > 0 {
            select = select.offset(page.offset());
        }
        if let Some(limit) = page.limit() {
            select = select.limit(limit);
        }

        let rows = select.all(self.ctx.connection()).await?;
        self.track(&rows, tracking);
        Ok(PagedResult::new(rows, meta))
    }

    pub async fn exists(&self, predicate: impl IntoCondition + Send) -> Result<bool> {
        let n = E::find()
            .filter(predicate)
            .count(self.ctx.connection())
            .await?;
        Ok(n > 0)
    }

    /// Matching rows; fails when the count does not fit into `u32`.
    pub async fn count(&self, predicate: Option<Condition>) -> Result<u32> {
        let n = self.long_count(predicate).await?;
        u32::try_from(n).map_err(|_| RepoError::CountOverflow(n))
    }

    pub async fn long_count(&self, predicate: Option<Condition>) -> Result<u64> {
        let mut select = E::find();
        if let Some(cond) = predicate {
            select = select.filter(cond);
        }
        Ok(select.count(self.ctx.connection()).await?)
    }

    /// Number of distinct `group` values among the matching rows.
    pub async fn count_by(&self, group: E::Column, predicate: Option<Condition>) -> Result<u32> {
        let mut select = E::find().select_only().column(group).group_by(group);
        if let Some(cond) = predicate {
            select = select.filter(cond);
        }
        let n = select.count(self.ctx.connection()).await?;
        u32::try_from(n).map_err(|_| RepoError::CountOverflow(n))
    }

    /* ---------- mutations ---------- */

    /// Insert a row given as a `Model` or an `ActiveModel`.
    ///
    /// Every present field is written, so a `Model` keeps its key while an
    /// `ActiveModel` with a `NotSet` key gets one from the database. Returns
    /// the stored row in [`SaveMode::Immediate`], `None` when deferred.
    pub async fn add(
        &self,
        entity: impl IntoActiveModel<E::ActiveModel> + Send,
        mode: SaveMode,
    ) -> Result<Option<E::Model>> {
        let row = Self::prepare_insert(entity.into_active_model())?;
        let change = Arc::new(InsertChange::<E>::new(vec![row]));
        self.ctx.stage(change.clone());

        if self.flush(mode).await? {
            Ok(change.take_saved().into_iter().next())
        } else {
            Ok(None)
        }
    }

    pub async fn add_many<A>(&self, entities: Vec<A>, mode: SaveMode) -> Result<Vec<E::Model>>
    where
        A: IntoActiveModel<E::ActiveModel> + Send,
    {
        let rows = entities
            .into_iter()
            .map(|e| Self::prepare_insert(e.into_active_model()))
            .collect::<Result<Vec<_>>>()?;
        if rows.is_empty() {
            self.flush(mode).await?;
            return Ok(Vec::new());
        }

        let change = Arc::new(InsertChange::<E>::new(rows));
        self.ctx.stage(change.clone());

        if self.flush(mode).await? {
            Ok(change.take_saved())
        } else {
            Ok(Vec::new())
        }
    }

    /// Mark a row as modified.
    ///
    /// A tracked row writes only the columns that differ from its snapshot;
    /// an untracked row writes every present non-key column. When nothing
    /// changed no update is staged; in immediate mode pending writes are
    /// still saved and the tracked snapshot (or, untracked, the stored row)
    /// is returned.
    pub async fn update(
        &self,
        entity: impl IntoActiveModel<E::ActiveModel> + Send,
        mode: SaveMode,
    ) -> Result<Option<E::Model>> {
        let row = entity.into_active_model();
        let lookup = key_condition::<E>(&row);
        let (row, snapshot) = self.prepare_update(row)?;
        let Some(row) = row else {
            tracing::debug!(entity = entity_name::<E>(), "Update without changes skipped");
            // Immediate still commits whatever other writes are pending.
            if !self.flush(mode).await? {
                return Ok(None);
            }
            return match snapshot {
                Some(model) => Ok(Some(model)),
                None => Ok(E::find().filter(lookup).one(self.ctx.connection()).await?),
            };
        };

        let change = Arc::new(UpdateChange::<E>::new(vec![row]));
        self.ctx.stage(change.clone());

        if self.flush(mode).await? {
            Ok(change.take_saved().into_iter().next())
        } else {
            Ok(None)
        }
    }

    /// Batched [`update`](Self::update); returns the rows actually written.
    pub async fn update_many<A>(&self, entities: Vec<A>, mode: SaveMode) -> Result<Vec<E::Model>>
    where
        A: IntoActiveModel<E::ActiveModel> + Send,
    {
        let mut rows = Vec::with_capacity(entities.len());
        for entity in entities {
            if let (Some(row), _) = self.prepare_update(entity.into_active_model())? {
                rows.push(row);
            }
        }
        if rows.is_empty() {
            self.flush(mode).await?;
            return Ok(Vec::new());
        }

        let change = Arc::new(UpdateChange::<E>::new(rows));
        self.ctx.stage(change.clone());

        if self.flush(mode).await? {
            Ok(change.take_saved())
        } else {
            Ok(Vec::new())
        }
    }

    /// Delete a row; returns the model that was passed in.
    pub async fn remove(&self, model: E::Model, mode: SaveMode) -> Result<E::Model> {
        let row = model.clone().into_active_model();
        if key_of(&row).is_none() {
            return Err(RepoError::InvalidArgument("entity is absent: primary key is not set"));
        }
        self.ctx.stage(Arc::new(DeleteChange::<E>::new(vec![row])));
        self.flush(mode).await?;
        Ok(model)
    }

    /// Delete the first row matching `predicate`; `None` (and no change) when
    /// nothing matches.
    pub async fn remove_by(
        &self,
        predicate: impl IntoCondition + Send,
        mode: SaveMode,
    ) -> Result<Option<E::Model>> {
        match self.find(predicate, Tracking::Untracked).await? {
            Some(model) => self.remove(model, mode).await.map(Some),
            None => Ok(None),
        }
    }

    pub async fn remove_many(&self, models: Vec<E::Model>, mode: SaveMode) -> Result<()> {
        let rows: Vec<E::ActiveModel> = models
            .into_iter()
            .map(|m| m.into_active_model())
            .collect();
        if rows.iter().any(|r| key_of(r).is_none()) {
            return Err(RepoError::InvalidArgument("entity is absent: primary key is not set"));
        }
        if !rows.is_empty() {
            self.ctx.stage(Arc::new(DeleteChange::<E>::new(rows)));
        }
        self.flush(mode).await?;
        Ok(())
    }

    /// Flush everything staged in the shared context.
    pub async fn save_changes(&self, hooks: SaveHooks<'_>) -> Result<u64> {
        self.ctx.save_changes(hooks).await
    }

    /* ---------- helpers ---------- */

    async fn flush(&self, mode: SaveMode) -> Result<bool> {
        match mode {
            SaveMode::Immediate => {
                self.ctx.save_changes(SaveHooks::none()).await?;
                Ok(true)
            }
            SaveMode::Deferred => Ok(false),
        }
    }

    fn track(&self, rows: &[E::Model], tracking: Tracking) {
        if tracking == Tracking::Tracked {
            for row in rows {
                self.ctx.tracker().attach::<E>(row);
            }
        }
    }

    fn prepare_insert(mut row: E::ActiveModel) -> Result<E::ActiveModel> {
        let mut present = false;
        for col in E::Column::iter() {
            match row.get(col) {
                ActiveValue::Unchanged(v) => {
                    row.set(col, v);
                    present = true;
                }
                ActiveValue::Set(_) => present = true,
                ActiveValue::NotSet => {}
            }
        }
        if !present {
            return Err(RepoError::InvalidArgument("entity is absent: no field is set"));
        }
        Ok(row)
    }

    /// Returns the row to stage (`None` when nothing changed) and the
    /// tracked snapshot, if any.
    fn prepare_update(
        &self,
        mut row: E::ActiveModel,
    ) -> Result<(Option<E::ActiveModel>, Option<E::Model>)> {
        let key = key_of(&row)
            .ok_or(RepoError::InvalidArgument("entity is absent: primary key is not set"))?;
        let snapshot = self.ctx.tracker().snapshot::<E>(&key);

        let mut changed = false;
        for col in E::Column::iter() {
            if is_key_column::<E>(col) {
                continue;
            }
            let current = match row.get(col) {
                ActiveValue::Set(v) | ActiveValue::Unchanged(v) => v,
                ActiveValue::NotSet => continue,
            };
            let differs = snapshot
                .as_ref()
                .map_or(true, |snap| snap.get(col) != current);
            if differs {
                row.set(col, current);
                changed = true;
            } else {
                row.not_set(col);
            }
        }

        Ok((changed.then_some(row), snapshot))
    }
}
