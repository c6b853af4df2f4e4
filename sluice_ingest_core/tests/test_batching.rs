use std::time::Duration;

use sluice_ingest_core::{IngestOptions, WriteOperation};

use crate::common::{create_cluster, doc_id, doc_source, start_client, test_options};

mod common;

#[tokio::test]
async fn test_batches_are_sealed_by_action_count() {
    let cluster = create_cluster(&[("logs", 2)]).await;
    let client = start_client(cluster.clone(), test_options().with_max_actions_per_batch(1000));
    let mut outcomes = client.subscribe_outcomes();

    for i in 0..2500 {
        client
            .index("logs", "event", Some(doc_id(i).as_str()), doc_source(i))
            .await
            .expect("index");
    }

    client.flush().await.expect("flush");
    assert!(client.wait_for_responses(Duration::from_secs(10)).await);

    let mut totals = Vec::new();
    while let Ok(outcome) = outcomes.try_recv() {
        totals.push(outcome.total);
    }
    totals.sort();
    assert_eq!(totals, vec![500, 1000, 1000]);

    let metrics = client.metrics();
    assert_eq!(metrics.completed_batches, 3);
    assert_eq!(metrics.submitted, 2500);
    assert_eq!(metrics.succeeded, 2500);
    assert_eq!(metrics.in_flight_operations, 0);
    assert_eq!(metrics.in_flight_bytes, 0);
    assert_eq!(cluster.count("logs").await.expect("count"), 2500);
}

#[tokio::test]
async fn test_ingest_many_operations_then_shutdown() {
    let cluster = create_cluster(&[("test", 3)]).await;
    let client = start_client(cluster.clone(), test_options().with_max_actions_per_batch(1000));

    for i in 0..12345 {
        client
            .index("test", "test", Some(doc_id(i).as_str()), doc_source(i))
            .await
            .expect("index");
    }

    client.shutdown().await.expect("shutdown");

    let metrics = client.metrics();
    assert_eq!(metrics.submitted, 12345);
    assert_eq!(metrics.succeeded + metrics.failed, 12345);
    assert_eq!(metrics.succeeded, 12345);
    assert_eq!(metrics.completed_batches, 13);
    assert!(!client.has_failure());
    assert!(client.is_closed());
    assert_eq!(cluster.count("test").await.expect("count"), 12345);
}

#[tokio::test]
async fn test_batches_are_sealed_by_volume() {
    let cluster = create_cluster(&[("logs", 1)]).await;
    let options = test_options().with_max_volume_per_batch(bytesize::ByteSize::b(900));
    let client = start_client(cluster.clone(), options);

    // 100 byte payloads, 150 bytes each with overhead: a batch fills at 6.
    let payload = format!(r#"{{"pad":"{}"}}"#, "x".repeat(90));
    assert_eq!(payload.len(), 100);

    for i in 0..30 {
        client
            .index("logs", "event", Some(doc_id(i).as_str()), payload.clone())
            .await
            .expect("index");
    }

    assert!(client.wait_for_responses(Duration::from_secs(10)).await);
    assert_eq!(client.metrics().completed_batches, 5);
    assert_eq!(client.metrics().total_bytes, 30 * 150);
}

#[tokio::test(start_paused = true)]
async fn test_flush_timer_sends_partial_batch() {
    let cluster = create_cluster(&[("logs", 1)]).await;
    let options = IngestOptions::new()
        .with_max_actions_per_batch(1000)
        .with_flush_interval(Duration::from_secs(1));
    let client = start_client(cluster.clone(), options);

    for i in 0..3 {
        client
            .index("logs", "event", Some(doc_id(i).as_str()), doc_source(i))
            .await
            .expect("index");
    }

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(client.metrics().completed_batches, 0);

    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert!(client.wait_for_responses(Duration::from_secs(5)).await);
    assert_eq!(client.metrics().completed_batches, 1);
    assert_eq!(cluster.count("logs").await.expect("count"), 3);
}

#[tokio::test]
async fn test_mixed_operations_preserve_submission_order() {
    let cluster = create_cluster(&[("logs", 2)]).await;
    let client = start_client(cluster.clone(), test_options());

    client
        .index("logs", "event", Some("a"), r#"{"v":1}"#)
        .await
        .expect("index");
    client
        .update("logs", "event", "a", r#"{"w":2}"#)
        .await
        .expect("update");
    client
        .index("logs", "event", Some("b"), r#"{"v":1}"#)
        .await
        .expect("index");
    client.delete("logs", "event", "b").await.expect("delete");
    client
        .submit(WriteOperation::index("logs", "event", None, r#"{"v":3}"#))
        .await
        .expect("submit");

    client.shutdown().await.expect("shutdown");

    let metrics = client.metrics();
    assert_eq!(metrics.succeeded, 5);
    assert_eq!(metrics.completed_batches, 1);

    let doc = cluster.get_document("logs", "a").await.expect("doc a");
    assert_eq!(doc.source, serde_json::json!({"v": 1, "w": 2}));
    assert_eq!(doc.version, 2);
    assert!(cluster.get_document("logs", "b").await.is_none());
    assert_eq!(cluster.count("logs").await.expect("count"), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_submitters_with_flushes() {
    let cluster = create_cluster(&[("logs", 3)]).await;
    let options = IngestOptions::new()
        .with_max_actions_per_batch(64)
        .with_max_volume_per_batch(bytesize::ByteSize::kib(4))
        .with_max_concurrent_batches(2)
        .with_flush_interval(Duration::from_millis(5));
    let client = start_client(cluster.clone(), options);

    let submitters = (0..8)
        .map(|task| {
            let client = client.clone();
            tokio::spawn(async move {
                for i in 0..500 {
                    let id = format!("{task}-{i}");
                    client
                        .index("logs", "event", Some(id.as_str()), doc_source(i))
                        .await
                        .expect("index");
                }
            })
        })
        .collect::<Vec<_>>();

    let flusher = tokio::spawn({
        let client = client.clone();
        async move {
            for _ in 0..50 {
                client.flush().await.expect("flush");
                tokio::task::yield_now().await;
            }
        }
    });

    for submitter in submitters {
        submitter.await.expect("submitter");
    }
    flusher.await.expect("flusher");
    client.shutdown().await.expect("shutdown");

    let metrics = client.metrics();
    assert_eq!(metrics.submitted, 4000);
    assert_eq!(metrics.succeeded + metrics.failed, metrics.submitted);
    assert_eq!(metrics.succeeded, 4000);
    assert_eq!(metrics.in_flight_operations, 0);

    // Ids are unique, so a lost or duplicated operation changes the count.
    assert_eq!(cluster.count("logs").await.expect("count"), 4000);
    assert!(metrics.completed_batches >= 4000 / 64);
}
