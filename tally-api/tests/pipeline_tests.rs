//! End-to-end tests through the façade with a running consumer.

use std::sync::Arc;
use std::time::Duration;

use tally_api::{ApiResult, ErrorCode, FacadeConfig, TransactionFacade, TransactionService};
use tally_core::{TallyError, TransactionId};
use tally_storage::{CacheConfig, CacheKey};
use tally_test_utils::{fixtures, CommandPublisher, EntityStore, PipelineHarness};

fn facade_for(pipeline: &PipelineHarness) -> TransactionFacade {
    TransactionFacade::new(
        pipeline.entity_store(),
        pipeline.cache.clone(),
        pipeline.command_publisher(),
        FacadeConfig::default(),
    )
}

#[tokio::test]
async fn create_list_get_delete_scenario() -> ApiResult<()> {
    let pipeline = PipelineHarness::start();
    let facade = facade_for(&pipeline);

    let accepted = facade.create(fixtures::debit()).await?;
    assert!(accepted.success);
    assert!(pipeline.settle().await);

    let all = facade.get_all().await?;
    assert_eq!(all.len(), 1);
    let created = &all[0];
    assert_eq!(created.amount, 100.0);
    assert_eq!(created.date, "2024-01-01");
    assert_eq!(created.kind, "debit");
    assert!(!created.id.is_empty());

    let id = TransactionId::from(created.id.as_str());
    let found = facade.get_by_id(&id).await?;
    assert_eq!(
        (found.amount, found.date.as_str(), found.kind.as_str()),
        (100.0, "2024-01-01", "debit")
    );

    facade.delete(&id).await?;
    assert!(pipeline.settle().await);

    let err = facade.get_by_id(&id).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::TransactionNotFound);

    pipeline.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn creates_get_distinct_ids() -> ApiResult<()> {
    let pipeline = PipelineHarness::start();
    let facade = facade_for(&pipeline);

    for _ in 0..5 {
        facade.create(fixtures::debit()).await?;
    }
    assert!(pipeline.settle().await);

    let mut ids: Vec<String> = facade.get_all().await?.into_iter().map(|v| v.id).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 5);
    Ok(())
}

#[tokio::test]
async fn update_is_applied_after_settle() -> ApiResult<()> {
    let pipeline = PipelineHarness::start();
    let facade = facade_for(&pipeline);
    let tx = pipeline.store.insert(fixtures::debit()).await?;

    facade.update(&tx.id, fixtures::credit()).await?;
    assert!(pipeline.settle().await);

    let view = facade.get_by_id(&tx.id).await?;
    assert_eq!(view.amount, 42.5);
    assert_eq!(view.kind, "credit");
    assert_eq!(view.id, tx.id.as_str());
    Ok(())
}

#[tokio::test]
async fn update_of_missing_id_changes_nothing() -> ApiResult<()> {
    let pipeline = PipelineHarness::start();
    let facade = facade_for(&pipeline);
    let ghost = TransactionId::from("ghost");

    let accepted = facade.update(&ghost, fixtures::debit()).await?;
    assert!(accepted.success);
    assert!(pipeline.settle().await);

    assert_eq!(pipeline.store.find_by_id(&ghost).await?, None);
    assert!(pipeline.store.find_all().await?.is_empty());
    assert_eq!(pipeline.metrics.snapshot().skipped, 1);
    Ok(())
}

#[tokio::test]
async fn delete_of_missing_id_is_noop() -> ApiResult<()> {
    let pipeline = PipelineHarness::start();
    let facade = facade_for(&pipeline);
    let keep = pipeline.store.insert(fixtures::debit()).await?;

    facade.delete(&TransactionId::from("ghost")).await?;
    assert!(pipeline.settle().await);

    assert_eq!(pipeline.store.find_all().await?, vec![keep]);
    assert_eq!(pipeline.metrics.snapshot().dropped, 0);
    Ok(())
}

#[tokio::test]
async fn unknown_operation_leaves_store_unchanged() -> ApiResult<()> {
    let pipeline = PipelineHarness::start();
    let tx = pipeline.store.insert(fixtures::debit()).await?;
    let before = pipeline.store.find_all().await?;

    let payload = fixtures::message("ARCHIVE", Some(tx.id.as_str()))
        .encode()
        .map_err(TallyError::from)?;
    pipeline.publisher.publish(payload).await?;
    assert!(pipeline.settle().await);

    assert_eq!(pipeline.store.find_all().await?, before);
    assert_eq!(pipeline.metrics.snapshot().dropped, 1);
    Ok(())
}

#[tokio::test]
async fn stale_read_between_eviction_and_apply_is_recached() -> ApiResult<()> {
    let pipeline = PipelineHarness::start();
    // No consumer involvement: the façade publishes into a recorder so the
    // update is accepted but never applied.
    let recorder = Arc::new(tally_test_utils::RecordingPublisher::new());
    let facade = TransactionFacade::new(
        pipeline.entity_store(),
        pipeline.cache.clone(),
        recorder.clone(),
        FacadeConfig::default(),
    );
    let tx = pipeline.store.insert(fixtures::debit()).await?;

    facade.update(&tx.id, fixtures::credit()).await?;
    let view = facade.get_by_id(&tx.id).await?;

    assert_eq!(view.amount, 100.0);
    assert!(pipeline.cache_backend.contains(&CacheKey::transaction(&tx.id)));
    assert_eq!(recorder.len(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn cached_entry_outlives_out_of_band_change_until_ttl() -> ApiResult<()> {
    let pipeline =
        PipelineHarness::with_cache_config(CacheConfig::new().with_ttl(Duration::from_secs(600)));
    let facade = facade_for(&pipeline);
    let mut tx = pipeline.store.insert(fixtures::debit()).await?;
    facade.get_by_id(&tx.id).await?;

    tx.apply(fixtures::credit());
    pipeline.store.save(&tx).await?;

    tokio::time::advance(Duration::from_secs(599)).await;
    assert_eq!(facade.get_by_id(&tx.id).await?.amount, 100.0);

    tokio::time::advance(Duration::from_secs(1)).await;
    assert_eq!(facade.get_by_id(&tx.id).await?.amount, 42.5);
    Ok(())
}

#[tokio::test]
async fn shutdown_stops_consumer() -> ApiResult<()> {
    let pipeline = PipelineHarness::start();
    let facade = facade_for(&pipeline);
    facade.create(fixtures::debit()).await?;
    assert!(pipeline.settle().await);

    let snapshot = pipeline.shutdown().await;
    assert_eq!(snapshot.applied, 1);
    assert_eq!(snapshot.received, 1);
    Ok(())
}

#[tokio::test]
async fn shutdown_applies_every_accepted_command() -> ApiResult<()> {
    let pipeline = PipelineHarness::start();
    let facade = facade_for(&pipeline);
    let store = pipeline.store.clone();

    for _ in 0..50 {
        facade.create(fixtures::debit()).await?;
    }
    let snapshot = pipeline.shutdown().await;

    assert_eq!(snapshot.applied, 50);
    assert_eq!(store.find_all().await?.len(), 50);
    Ok(())
}
