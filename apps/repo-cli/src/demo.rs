//! Scratch workload that drives the repository and unit of work end to end.

use std::fmt;

use anyhow::Result;
use entity_repo::ast::{CompareOperator, Expr};
use entity_repo::{
    FieldKind, FieldMap, PageMeta, PageRequest, QuerySpec, SaveHooks, SaveMode, Sort,
    Tracking, UnitOfWork,
};
use sea_orm::sea_query::IntoCondition;
use sea_orm::{ColumnTrait, ConnectionTrait, DatabaseConnection, Schema, Set};

pub mod tasks {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "demo_tasks")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        pub title: String,
        pub status: String,
        pub priority: i32,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

const STATUSES: [&str; 3] = ["todo", "doing", "done"];

pub async fn create_schema(conn: &DatabaseConnection) -> Result<()> {
    let backend = conn.get_database_backend();
    let schema = Schema::new(backend);
    let mut stmt = schema.create_table_from_entity(tasks::Entity);
    stmt.if_not_exists();
    conn.execute(backend.build(&stmt)).await?;
    Ok(())
}

fn field_map() -> FieldMap<tasks::Entity> {
    FieldMap::new()
        .insert("title", tasks::Column::Title, FieldKind::String)
        .insert("status", tasks::Column::Status, FieldKind::String)
        .insert("priority", tasks::Column::Priority, FieldKind::I64)
}

/// What the workload did, printed by the `demo` command.
#[derive(Debug)]
pub struct DemoReport {
    pub inserted: u64,
    pub statuses: u32,
    pub open: u32,
    pub promoted: Option<String>,
    pub removed: Option<String>,
    pub page: PageMeta,
    pub titles: Vec<String>,
}

impl fmt::Display for DemoReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "inserted:  {}", self.inserted)?;
        writeln!(f, "statuses:  {}", self.statuses)?;
        writeln!(f, "open:      {}", self.open)?;
        writeln!(f, "promoted:  {}", self.promoted.as_deref().unwrap_or("-"))?;
        writeln!(f, "removed:   {}", self.removed.as_deref().unwrap_or("-"))?;
        writeln!(
            f,
            "page {}/{} (items {}..{} of {})",
            self.page.page_number,
            self.page.total_pages,
            self.page.first_item_on_page,
            self.page.last_item_on_page,
            self.page.total_items
        )?;
        for title in &self.titles {
            writeln!(f, "  - {title}")?;
        }
        Ok(())
    }
}

/// Seed `rows` tasks in one deferred batch, then query and modify them.
pub async fn run(uow: &UnitOfWork, rows: usize, page_size: u64, page: u64) -> Result<DemoReport> {
    let repo = uow.repository::<tasks::Entity>();

    let batch: Vec<tasks::ActiveModel> = (1..=rows)
        .map(|i| tasks::ActiveModel {
            title: Set(format!("task-{i:03}")),
            status: Set(STATUSES[(i - 1) % STATUSES.len()].to_string()),
            priority: Set(i32::try_from(i % 5).unwrap_or_default()),
            ..Default::default()
        })
        .collect();
    repo.add_many(batch, SaveMode::Deferred).await?;

    let staged = uow.pending_changes();
    let inserted = uow
        .save_changes(
            SaveHooks::none()
                .before(|| {
                    tracing::info!(staged, "Saving demo batch");
                    Ok(())
                })
                .after(|| {
                    tracing::info!("Demo batch committed");
                    Ok(())
                }),
        )
        .await?;

    let statuses = repo.count_by(tasks::Column::Status, None).await?;
    let open = repo
        .count(Some(tasks::Column::Status.ne("done").into_condition()))
        .await?;

    // Tracked load: only the changed column is written back.
    let promoted = match repo
        .find(tasks::Column::Status.eq("todo"), Tracking::Tracked)
        .await?
    {
        Some(task) => {
            let mut am: tasks::ActiveModel = task.into();
            am.status = Set("doing".to_string());
            repo.update(am, SaveMode::Immediate)
                .await?
                .map(|t| t.title)
        }
        None => None,
    };

    let removed = repo
        .remove_by(tasks::Column::Priority.eq(0), SaveMode::Immediate)
        .await?
        .map(|t| t.title);

    let open_filter = Expr::compare("status", CompareOperator::Ne, "done")
        .and(Expr::compare("priority", CompareOperator::Ge, 1));
    let spec = QuerySpec::<tasks::Entity>::new()
        .filter_expr(&open_filter, &field_map())?
        .order_by(Sort::desc(tasks::Column::Priority))
        .then_by(Sort::asc(tasks::Column::Title));
    let listing = repo.find_paged(spec, PageRequest::new(page, page_size)).await?;

    Ok(DemoReport {
        inserted,
        statuses,
        open,
        promoted,
        removed,
        page: listing.meta,
        titles: listing.items.into_iter().map(|t| t.title).collect(),
    })
}
