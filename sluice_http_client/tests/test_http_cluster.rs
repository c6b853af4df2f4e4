use std::time::Duration;

use bytes::Bytes;
use sluice_ingest_core::{
    Admin, BulkClient, ClusterHealthStatus, EncodedShardRequest, IndexSettings, IngestOptions,
    RefreshInterval, ShardId, ShardRouter, ShardReplicationRequest, Transport, TransportError, WriteOperation,
};

use crate::common::TestServer;

mod common;

fn options() -> IngestOptions {
    IngestOptions::new()
        .with_max_actions_per_batch(100)
        .with_max_concurrent_batches(2)
        .with_flush_interval(Duration::from_secs(3600))
}

#[tokio::test]
async fn test_bulk_ingest_over_http() {
    let server = TestServer::start().await;
    let http = server.client().await;

    http.create_index("logs", IndexSettings::default().with_shards(3))
        .await
        .expect("create index");

    let client = BulkClient::builder(http.clone(), http.clone())
        .with_options(options())
        .start()
        .expect("start client");

    for i in 0..250 {
        let id = format!("doc-{i}");
        let source = format!(r#"{{"n":{i}}}"#);
        client
            .index("logs", "event", Some(id.as_str()), source)
            .await
            .expect("index");
    }
    client.shutdown().await.expect("shutdown");

    let metrics = client.metrics();
    assert_eq!(metrics.succeeded, 250);
    assert_eq!(metrics.failed, 0);
    assert_eq!(metrics.completed_batches, 3);
    assert_eq!(http.count("logs").await.expect("count"), 250);
    assert_eq!(server.cluster.count("logs").await.expect("count"), 250);
}

#[tokio::test]
async fn test_bulk_mode_over_http() {
    let server = TestServer::start().await;
    let http = server.client().await;

    http.create_index(
        "logs",
        IndexSettings::default().with_refresh_interval(RefreshInterval::Millis(2000)),
    )
    .await
    .expect("create index");

    let client = BulkClient::builder(http.clone(), http.clone())
        .with_options(options())
        .start()
        .expect("start client");

    client
        .start_bulk("logs", RefreshInterval::Disabled)
        .await
        .expect("start_bulk");
    assert_eq!(
        server
            .cluster
            .refresh_interval("logs")
            .await
            .expect("interval"),
        RefreshInterval::Disabled
    );

    client.shutdown().await.expect("shutdown");
    assert_eq!(
        http.refresh_interval("logs").await.expect("interval"),
        RefreshInterval::Millis(2000)
    );
}

#[tokio::test]
async fn test_admin_errors_keep_status() {
    let server = TestServer::start().await;
    let http = server.client().await;

    http.create_index("logs", IndexSettings::default())
        .await
        .expect("create index");

    let err = http
        .create_index("logs", IndexSettings::default())
        .await
        .unwrap_err();
    assert!(err.is_already_exists());

    let err = http.refresh_index("missing").await.unwrap_err();
    assert!(err.is_not_found());

    let err = http
        .create_index("Invalid", IndexSettings::default())
        .await
        .unwrap_err();
    assert!(matches!(err, sluice_ingest_core::AdminError::Remote { status: 400, .. }));

    let missing = http.count("missing").await.unwrap_err();
    assert_eq!(missing.status().map(|s| s.as_u16()), Some(404));
}

#[tokio::test]
async fn test_replica_level_and_health_over_http() {
    let server = TestServer::start().await;
    let http = server.client().await;

    http.create_index("logs", IndexSettings::default().with_shards(2))
        .await
        .expect("create index");

    let health = http.cluster_health().await.expect("health");
    assert_eq!(health.status, ClusterHealthStatus::Green);
    assert_eq!(health.active_shards, 2);

    let client = BulkClient::builder(http.clone(), http.clone())
        .with_options(options())
        .start()
        .expect("start client");

    let health = client
        .update_replica_level("logs", 1, Duration::from_secs(5))
        .await
        .expect("update_replica_level");
    assert_eq!(health.status, ClusterHealthStatus::Yellow);

    let settings = http.index_settings("logs").await.expect("settings");
    assert_eq!(settings.number_of_replicas, 1);
}

#[tokio::test]
async fn test_routing_follows_index_lifecycle() {
    let server = TestServer::start().await;
    let http = server.client().await;

    // Created behind the client's back: unknown until reloaded.
    server
        .cluster
        .create_index("late", IndexSettings::default())
        .await
        .expect("create index");
    assert!(http.route("late", Some("a")).is_err());

    http.reload_routing().await.expect("reload routing");
    assert!(http.route("late", Some("a")).is_ok());

    http.delete_index("late").await.expect("delete index");
    assert!(http.route("late", Some("a")).is_err());
}

#[tokio::test]
async fn test_shard_requests_over_http() {
    let server = TestServer::start().await;
    let http = server.client().await;

    http.create_index("logs", IndexSettings::default())
        .await
        .expect("create index");
    let shard_id = http.route("logs", Some("a")).expect("route");

    let request = ShardReplicationRequest {
        shard_id,
        items: vec![
            Some(WriteOperation::index("logs", "event", Some("a".to_string()), "{}")),
            None,
            Some(WriteOperation::delete("logs", "event", "a")),
        ],
    };
    let response = http
        .send(request.encode().expect("encode"))
        .await
        .expect("send");
    assert_eq!(response.shard_id, shard_id);
    assert_eq!(
        response.items.iter().map(|item| item.position).collect::<Vec<_>>(),
        vec![0, 2]
    );
    assert!(response.items.iter().all(|item| item.is_ok()));

    let err = http
        .send(EncodedShardRequest {
            shard_id,
            num_items: 1,
            payload: Bytes::from_static(&[0xff]),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Remote { status: 400, .. }));

    let unknown = ShardReplicationRequest {
        shard_id: ShardId(42),
        items: vec![Some(WriteOperation::delete("logs", "event", "a"))],
    };
    let err = http
        .send(unknown.encode().expect("encode"))
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Remote { status: 404, .. }));
}

#[tokio::test]
async fn test_unreachable_cluster_fails_to_connect() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let address = listener.local_addr().expect("local address");
    drop(listener);

    let err = sluice_http_client::HttpClusterClient::connect(format!("http://{address}"))
        .await
        .unwrap_err();
    assert!(err.status().is_none());

    let err: sluice_ingest_core::AdminError = err.into();
    assert!(err.kind().is_retryable());
}
