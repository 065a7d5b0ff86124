mod common;

use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use common::{create_tables, new_note, new_tag, notes, setup, tags};
use entity_repo::{
    DbConnConfig, HookStage, QuerySpec, RepoError, SaveHooks, SaveMode, UnitOfWork,
};

#[tokio::test]
async fn test_repository_is_cached_per_entity_type() -> Result<()> {
    let uow = setup().await;
    assert_eq!(uow.cached_repositories(), 0);

    let first = uow.repository::<notes::Entity>();
    let second = uow.repository::<notes::Entity>();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(uow.cached_repositories(), 1);

    let _tags = uow.repository::<tags::Entity>();
    assert_eq!(uow.cached_repositories(), 2);
    assert!(Arc::ptr_eq(first.context(), uow.context()));
    Ok(())
}

#[tokio::test]
async fn test_concurrent_first_access_yields_one_repository() -> Result<()> {
    let uow = Arc::new(setup().await);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let uow = uow.clone();
            tokio::spawn(async move { uow.repository::<notes::Entity>() })
        })
        .collect();

    let mut repos = Vec::new();
    for handle in handles {
        repos.push(handle.await?);
    }
    assert!(repos.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    assert_eq!(uow.cached_repositories(), 1);
    Ok(())
}

#[tokio::test]
async fn test_deferred_changes_across_repositories_commit_together() -> Result<()> {
    let uow = setup().await;
    let notes_repo = uow.repository::<notes::Entity>();
    let tags_repo = uow.repository::<tags::Entity>();

    notes_repo
        .add(new_note("draft", "a", 1), SaveMode::Deferred)
        .await?;
    tags_repo.add(new_tag("rust"), SaveMode::Deferred).await?;
    assert_eq!(uow.pending_changes(), 2);
    assert_eq!(notes_repo.count(None).await?, 0);
    assert_eq!(tags_repo.count(None).await?, 0);

    assert_eq!(uow.save_changes(SaveHooks::none()).await?, 2);
    assert_eq!(uow.pending_changes(), 0);
    assert_eq!(notes_repo.count(None).await?, 1);
    assert_eq!(tags_repo.count(None).await?, 1);
    Ok(())
}

#[tokio::test]
async fn test_immediate_mode_flushes_earlier_deferred_changes() -> Result<()> {
    let uow = setup().await;
    let notes_repo = uow.repository::<notes::Entity>();
    let tags_repo = uow.repository::<tags::Entity>();

    tags_repo.add(new_tag("queued"), SaveMode::Deferred).await?;
    notes_repo
        .add(new_note("now", "a", 1), SaveMode::Immediate)
        .await?;

    assert_eq!(uow.pending_changes(), 0);
    assert_eq!(tags_repo.count(None).await?, 1);
    Ok(())
}

#[tokio::test]
async fn test_unchanged_immediate_update_still_flushes_pending_changes() -> Result<()> {
    let uow = setup().await;
    let notes_repo = uow.repository::<notes::Entity>();
    let tags_repo = uow.repository::<tags::Entity>();

    notes_repo
        .add(new_note("kept", "a", 1), SaveMode::Immediate)
        .await?;
    let loaded = notes_repo
        .find_all(QuerySpec::new().tracked())
        .await?;
    assert_eq!(loaded.len(), 1);

    tags_repo.add(new_tag("queued"), SaveMode::Deferred).await?;
    assert_eq!(uow.pending_changes(), 1);

    let same = notes_repo
        .update(loaded[0].clone(), SaveMode::Immediate)
        .await?;
    assert_eq!(same.as_ref(), Some(&loaded[0]));
    assert_eq!(uow.pending_changes(), 0);
    assert_eq!(tags_repo.count(None).await?, 1);
    Ok(())
}

#[tokio::test]
async fn test_hooks_run_in_order_around_persist() -> Result<()> {
    let uow = setup().await;
    let repo = uow.repository::<notes::Entity>();
    repo.add(new_note("draft", "a", 1), SaveMode::Deferred)
        .await?;

    let log = Mutex::new(Vec::new());
    let hooks = SaveHooks::none()
        .before(|| {
            log.lock().unwrap().push("before");
            Ok(())
        })
        .after(|| {
            log.lock().unwrap().push("after");
            Ok(())
        });

    assert_eq!(uow.save_changes(hooks).await?, 1);
    assert_eq!(*log.lock().unwrap(), ["before", "after"]);
    Ok(())
}

#[tokio::test]
async fn test_failing_before_hook_keeps_changes_pending() -> Result<()> {
    let uow = setup().await;
    let notes_repo = uow.repository::<notes::Entity>();
    let tags_repo = uow.repository::<tags::Entity>();

    notes_repo
        .add(new_note("draft", "a", 1), SaveMode::Deferred)
        .await?;
    tags_repo.add(new_tag("rust"), SaveMode::Deferred).await?;

    let after_ran = Mutex::new(false);
    let err = uow
        .save_changes(
            SaveHooks::none()
                .before(|| Err(anyhow!("validation failed")))
                .after(|| {
                    *after_ran.lock().unwrap() = true;
                    Ok(())
                }),
        )
        .await
        .unwrap_err();

    assert!(
        matches!(err, RepoError::Hook { stage: HookStage::Before, .. }),
        "{err:?}"
    );
    assert!(!*after_ran.lock().unwrap());
    assert_eq!(uow.pending_changes(), 2);
    assert_eq!(notes_repo.count(None).await?, 0);

    assert_eq!(uow.save_changes(SaveHooks::none()).await?, 2);
    assert_eq!(notes_repo.count(None).await?, 1);
    Ok(())
}

#[tokio::test]
async fn test_failing_after_hook_reports_after_commit() -> Result<()> {
    let uow = setup().await;
    let repo = uow.repository::<tags::Entity>();
    repo.add(new_tag("rust"), SaveMode::Deferred).await?;

    let err = uow
        .save_changes(SaveHooks::none().after(|| Err(anyhow!("notify failed"))))
        .await
        .unwrap_err();
    assert!(
        matches!(err, RepoError::Hook { stage: HookStage::After, .. }),
        "{err:?}"
    );
    assert_eq!(uow.pending_changes(), 0);
    assert_eq!(repo.count(None).await?, 1);
    Ok(())
}

#[tokio::test]
async fn test_database_error_rolls_back_the_whole_save() -> Result<()> {
    let uow = setup().await;
    let notes_repo = uow.repository::<notes::Entity>();
    let tags_repo = uow.repository::<tags::Entity>();

    notes_repo
        .add(new_note("draft", "a", 1), SaveMode::Deferred)
        .await?;
    // tags.name is unique
    tags_repo
        .add_many(vec![new_tag("dup"), new_tag("dup")], SaveMode::Deferred)
        .await?;

    let err = uow.save_changes(SaveHooks::none()).await.unwrap_err();
    assert!(matches!(err, RepoError::Db(_)), "{err:?}");
    assert!(!err.is_invalid_argument());

    assert_eq!(uow.pending_changes(), 2);
    assert_eq!(notes_repo.count(None).await?, 0);
    assert_eq!(tags_repo.count(None).await?, 0);

    assert_eq!(uow.discard_changes(), 2);
    assert_eq!(uow.pending_changes(), 0);
    assert_eq!(uow.save_changes(SaveHooks::none()).await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_save_without_changes_still_runs_hooks() -> Result<()> {
    let uow = setup().await;
    let calls = Mutex::new(0);

    let affected = uow
        .save_changes(
            SaveHooks::none()
                .before(|| {
                    *calls.lock().unwrap() += 1;
                    Ok(())
                })
                .after(|| {
                    *calls.lock().unwrap() += 1;
                    Ok(())
                }),
        )
        .await?;
    assert_eq!(affected, 0);
    assert_eq!(*calls.lock().unwrap(), 2);
    Ok(())
}

#[tokio::test]
async fn test_new_wraps_an_existing_connection() -> Result<()> {
    let conn = entity_repo::connect(&DbConnConfig::default()).await?;
    create_tables(&conn).await?;

    let uow = UnitOfWork::new(conn);
    let repo = uow.repository::<tags::Entity>();
    let saved = repo.add(new_tag("direct"), SaveMode::Immediate).await?;
    assert_eq!(saved.map(|t| t.name).as_deref(), Some("direct"));
    Ok(())
}
