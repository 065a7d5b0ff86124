#![allow(dead_code)]

use entity_repo::{DbConnConfig, UnitOfWork};
use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr, Schema, Set};

pub mod notes {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "notes")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        pub title: String,
        pub category: String,
        pub priority: i32,
        pub done: bool,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod tags {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "tags")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        #[sea_orm(unique)]
        pub name: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub async fn create_tables(conn: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = conn.get_database_backend();
    let schema = Schema::new(backend);
    conn.execute(backend.build(&schema.create_table_from_entity(notes::Entity)))
        .await?;
    conn.execute(backend.build(&schema.create_table_from_entity(tags::Entity)))
        .await?;
    Ok(())
}

/// Fresh in-memory database with the test tables.
pub async fn setup() -> UnitOfWork {
    let uow = UnitOfWork::connect(&DbConnConfig::default())
        .await
        .expect("connect to sqlite::memory:");
    create_tables(uow.connection())
        .await
        .expect("create test tables");
    uow
}

pub fn new_note(title: &str, category: &str, priority: i32) -> notes::ActiveModel {
    notes::ActiveModel {
        title: Set(title.to_string()),
        category: Set(category.to_string()),
        priority: Set(priority),
        done: Set(false),
        ..Default::default()
    }
}

pub fn new_tag(name: &str) -> tags::ActiveModel {
    tags::ActiveModel {
        name: Set(name.to_string()),
        ..Default::default()
    }
}

/// Insert `n` notes titled `note-01..` with categories cycling a/b/c and
/// priority `i % 5`.
pub async fn seed_notes(uow: &UnitOfWork, n: usize) -> Vec<notes::Model> {
    let categories = ["a", "b", "c"];
    let rows = (1..=n)
        .map(|i| {
            new_note(
                &format!("note-{i:02}"),
                categories[(i - 1) % categories.len()],
                (i % 5) as i32,
            )
        })
        .collect();
    uow.repository::<notes::Entity>()
        .add_many(rows, entity_repo::SaveMode::Immediate)
        .await
        .expect("seed notes")
}
