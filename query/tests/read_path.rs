//! End-to-end read-path scenarios across the pipeline, cache and store.

#![allow(clippy::unwrap_used)] // Test code uses unwrap for clear failure messages

use orderhub_cache::OrderCache;
use orderhub_core::order::Order;
use orderhub_core::OrderStore as _;
use orderhub_ingest::{IngestOutcome, IngestionPipeline, SchemaValidator};
use orderhub_query::QueryService;
use orderhub_testing::{sample_order, sample_order_json, InMemoryOrderStore};
use std::sync::Arc;

fn stack() -> (Arc<InMemoryOrderStore>, OrderCache, IngestionPipeline, QueryService) {
    let store = Arc::new(InMemoryOrderStore::new());
    let cache = OrderCache::new();
    let pipeline = IngestionPipeline::new(
        SchemaValidator::embedded().unwrap(),
        Arc::clone(&store) as Arc<_>,
        cache.clone(),
    );
    let query = QueryService::new(cache.clone(), Arc::clone(&store) as Arc<_>);
    (store, cache, pipeline, query)
}

#[tokio::test]
async fn ingested_document_reads_back_field_for_field() {
    let (_store, _cache, pipeline, query) = stack();
    let payload = sample_order_json("A1");

    let outcome = pipeline.ingest(&payload).await;
    assert!(matches!(outcome, IngestOutcome::Committed { .. }));

    let document = query.lookup("A1").await.unwrap().unwrap();
    let read_back = Order::from_payload(document.as_bytes()).unwrap();
    let sent = Order::from_payload(&payload).unwrap();
    assert_eq!(read_back, sent);
}

#[tokio::test]
async fn reingesting_keeps_one_row_and_one_equivalent_document() {
    let (store, _cache, pipeline, query) = stack();
    let payload = sample_order_json("A1");

    pipeline.ingest(&payload).await;
    let first = query.lookup("A1").await.unwrap().unwrap();

    let second_outcome = pipeline.ingest(&payload).await;
    assert!(matches!(second_outcome, IngestOutcome::Committed { .. }));

    assert_eq!(store.row_count(), 1);
    assert_eq!(query.lookup("A1").await.unwrap().unwrap(), first);
}

#[tokio::test]
async fn rejected_payload_is_invisible_to_readers() {
    let (store, _cache, pipeline, query) = stack();

    // Schema-valid except for a missing payment block.
    let mut doc: serde_json::Value =
        serde_json::from_slice(&sample_order_json("ghost-uid")).unwrap();
    doc.as_object_mut().unwrap().remove("payment");

    let outcome = pipeline
        .ingest(&serde_json::to_vec(&doc).unwrap())
        .await;
    assert!(matches!(outcome, IngestOutcome::Rejected { .. }));

    assert_eq!(store.row_count(), 0);
    assert!(query.lookup("ghost-uid").await.unwrap().is_none());
}

#[tokio::test]
async fn warm_rebuild_makes_every_persisted_uid_a_hit() {
    let store = Arc::new(InMemoryOrderStore::new());
    for i in 0..25 {
        store
            .insert(&sample_order(&format!("uid-{i}")))
            .await
            .unwrap();
    }

    // A fresh process: empty cache, warm rebuild, then lookups.
    let cache = OrderCache::new();
    cache.warm(store.as_ref()).await.unwrap();

    let query = QueryService::new(cache, Arc::clone(&store) as Arc<_>);
    for i in 0..25 {
        let uid = format!("uid-{i}");
        let via_query = query.lookup(&uid).await.unwrap().unwrap();
        let direct = store
            .find(&uid)
            .await
            .unwrap()
            .unwrap()
            .canonical_json()
            .unwrap();
        assert_eq!(via_query, direct);
    }
}

#[tokio::test]
async fn lookup_before_warm_completion_falls_back_to_store() {
    let store = Arc::new(InMemoryOrderStore::new());
    store.insert(&sample_order("early-uid")).await.unwrap();

    // Cache intentionally cold: reads must still succeed via read-through.
    let query = QueryService::new(OrderCache::new(), Arc::clone(&store) as Arc<_>);
    assert!(query.lookup("early-uid").await.unwrap().is_some());
}
