use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, IdenStatic, Iterable, PrimaryKeyToColumn,
};

/// A SeaORM entity that can be served by a [`Repository`](crate::Repository).
///
/// Implemented for every entity whose models can cross task boundaries;
/// generated `DeriveEntityModel` entities qualify without extra code.
pub trait RepoEntity: EntityTrait<ActiveModel: Send + Sync, Model: Sync> {}

impl<E> RepoEntity for E where E: EntityTrait<ActiveModel: Send + Sync, Model: Sync> {}

/// Stable identity of a row within its entity type, `None` when the key is not set.
pub(crate) fn key_of<A: ActiveModelTrait>(am: &A) -> Option<String> {
    am.get_primary_key_value().map(|v| format!("{v:?}"))
}

/// Condition selecting the row whose key `am` carries.
pub(crate) fn key_condition<E: EntityTrait>(am: &E::ActiveModel) -> Condition {
    E::PrimaryKey::iter().fold(Condition::all(), |cond, pk| {
        let col = pk.into_column();
        match am.get(col).into_value() {
            Some(v) => cond.add(col.eq(v)),
            None => cond,
        }
    })
}

pub(crate) fn is_key_column<E: EntityTrait>(col: E::Column) -> bool {
    E::PrimaryKey::iter().any(|pk| pk.into_column().as_str() == col.as_str())
}

/// Short entity name for log fields.
pub(crate) fn entity_name<E: EntityTrait>() -> &'static str {
    let full = std::any::type_name::<E>();
    // "app::storage::notes::Entity" -> "notes::Entity"
    match full.rmatch_indices("::").nth(1) {
        Some((idx, _)) => &full[idx + 2..],
        None => full,
    }
}
