//! End-to-end broadcaster test against the in-memory bus: publish to
//! `ingest`, let the broadcaster run a few iterations, assert the stamped
//! record lands on `firehose`.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use chatstorm_bus::testing::MemoryBus;
use chatstorm_bus::Bus;
use chatstorm_domain::{ChatMessage, Config, Origin};
use chatstorm_gateway::broadcaster;
use chatstorm_gateway::clients::ClientRegistry;
use chatstorm_gateway::state::{AppState, Stats};
use chatstorm_safety::SafetyConfig;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn ingest_flows_to_firehose_and_stamps_trace() {
    let bus = Arc::new(MemoryBus::new());
    let config = Arc::new(Config::default());
    bus.ensure_group(&config.streams.ingest, &config.bus.consumer_group)
        .await
        .unwrap();

    let msg = ChatMessage::new("room:demo", Origin::Human, "u1", "Viewer", "E2E_TEST_ABC hello");
    let msg_id = msg.id.clone();
    let payload = serde_json::to_value(&msg).unwrap();
    bus.publish(&config.streams.ingest, &payload).await.unwrap();

    let stats = Arc::new(Stats::default());
    let state = AppState {
        config: config.clone(),
        bus: bus.clone() as Arc<dyn Bus>,
        safety: Arc::new(SafetyConfig::default()),
        clients: Arc::new(ClientRegistry::new()),
        stats: stats.clone(),
        group_joined: Arc::new(AtomicBool::new(false)),
    };

    let shutdown = CancellationToken::new();
    let shutdown_for_task = shutdown.clone();
    let handle = tokio::spawn(async move {
        broadcaster::run(state, shutdown_for_task).await;
    });

    tokio::time::sleep(Duration::from_millis(200)).await;
    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("broadcaster task did not shut down in time")
        .unwrap();

    let tail = bus.tail_range(&config.streams.firehose, 5).await.unwrap();
    assert_eq!(tail.len(), 1);
    assert_eq!(tail[0].payload["id"], msg_id);
    let processed_by = tail[0].payload["trace"]["processed_by"].as_array().unwrap();
    assert!(processed_by.iter().any(|p| p == "chat_gateway"));

    assert_eq!(
        stats.messages_published.load(std::sync::atomic::Ordering::Relaxed),
        1
    );
}

#[tokio::test]
async fn safety_drop_never_reaches_firehose() {
    let bus = Arc::new(MemoryBus::new());
    let mut config = Config::default();
    config.moderation.blocklist = vec!["badword".to_string()];
    let config = Arc::new(config);
    bus.ensure_group(&config.streams.ingest, &config.bus.consumer_group)
        .await
        .unwrap();

    let msg = ChatMessage::new("room:demo", Origin::Human, "u1", "Viewer", "this has a badword in it");
    let payload = serde_json::to_value(&msg).unwrap();
    bus.publish(&config.streams.ingest, &payload).await.unwrap();

    let safety = Arc::new(SafetyConfig {
        max_chars: config.moderation.max_chars,
        blocklist: config.moderation.blocklist.clone(),
    });
    let stats = Arc::new(Stats::default());
    let state = AppState {
        config: config.clone(),
        bus: bus.clone() as Arc<dyn Bus>,
        safety,
        clients: Arc::new(ClientRegistry::new()),
        stats: stats.clone(),
        group_joined: Arc::new(AtomicBool::new(false)),
    };

    let shutdown = CancellationToken::new();
    let shutdown_for_task = shutdown.clone();
    let handle = tokio::spawn(async move {
        broadcaster::run(state, shutdown_for_task).await;
    });

    tokio::time::sleep(Duration::from_millis(200)).await;
    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("broadcaster task did not shut down in time")
        .unwrap();

    let tail = bus.tail_range(&config.streams.firehose, 5).await.unwrap();
    assert!(tail.is_empty());
    assert_eq!(
        stats.messages_dropped_safety.load(std::sync::atomic::Ordering::Relaxed),
        1
    );
}
