//! End-to-end sync scenarios over in-memory collaborators.
//!
//! Each test wires a full engine (or agent) against the testkit's
//! in-memory node, network, resolver, and grant table, and drives whole
//! passes through the public API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use pdn_agent::core::{
    Cursor, DataNode, Did, EventLogPage, Message, MessageCid, NodeReply, Status, SyncDirection,
};
use pdn_agent::perms::{Grant, GrantId, GrantScope, StaticGrantResolver};
use pdn_agent::store::SqliteStore;
use pdn_agent::sync::transport::{self, RemoteNodeClient, TransportError};
use pdn_agent::sync::{IdentityOptions, SyncError, SyncScheduler};
use pdn_agent::{AgentConfig, MessageKind, SyncAgent};
use pdn_agent_testkit::fixtures::{
    delete_message, random_did, write_message, MemoryDataNode, SyncFixture,
};

const URL: &str = "https://node.example";

#[tokio::test]
async fn test_pull_transfers_remote_messages() {
    let fixture = SyncFixture::new();
    let alice = random_did();
    let remote = fixture.remote_node(URL);

    let cids: Vec<MessageCid> = (0..3)
        .map(|i| remote.ingest(&alice, write_message(&alice, None, &format!("r{i}")), None))
        .collect();
    fixture
        .register(&alice, &[URL], IdentityOptions::default())
        .await
        .unwrap();

    let report = fixture.engine.sync(Some(SyncDirection::Pull)).await.unwrap();
    assert_eq!(report.enqueued, 3);
    assert_eq!(report.pulled, 3);
    for cid in &cids {
        assert!(fixture.local.contains(&alice, cid));
    }

    // The cursor was persisted; a second pass transfers nothing.
    let report = fixture.engine.sync(Some(SyncDirection::Pull)).await.unwrap();
    assert_eq!(report.enqueued, 0);
    assert_eq!(report.pulled, 0);
}

#[tokio::test]
async fn test_push_transfers_local_messages() {
    let fixture = SyncFixture::new();
    let alice = random_did();
    let remote = fixture.remote_node(URL);

    let m1 = fixture.local.ingest(&alice, write_message(&alice, None, "r1"), None);
    let m2 = fixture.local.ingest(&alice, write_message(&alice, None, "r2"), None);
    fixture
        .register(&alice, &[URL], IdentityOptions::default())
        .await
        .unwrap();

    let report = fixture.engine.sync(Some(SyncDirection::Push)).await.unwrap();
    assert_eq!(report.pushed, 2);
    assert!(remote.contains(&alice, &m1));
    assert!(remote.contains(&alice, &m2));
}

#[tokio::test]
async fn test_pull_preserves_event_log_order() {
    let fixture = SyncFixture::new();
    let alice = random_did();
    let remote = fixture.remote_node(URL);

    for i in 0..10 {
        remote.ingest(&alice, write_message(&alice, None, &format!("r{i}")), None);
    }
    fixture
        .register(&alice, &[URL], IdentityOptions::default())
        .await
        .unwrap();
    fixture.engine.sync(Some(SyncDirection::Pull)).await.unwrap();

    let remote_log = remote.query_event_log(&alice, None, None).await.unwrap();
    let local_log = fixture.local.query_event_log(&alice, None, None).await.unwrap();
    assert_eq!(local_log.entries, remote_log.entries);
}

#[tokio::test]
async fn test_pushed_messages_are_not_pulled_back() {
    let fixture = SyncFixture::new();
    let alice = random_did();
    let remote = fixture.remote_node(URL);

    let cid = fixture.local.ingest(&alice, write_message(&alice, None, "r1"), None);
    fixture
        .register(&alice, &[URL], IdentityOptions::default())
        .await
        .unwrap();

    // A full pass pushes the message; the pull phase then sees it in the
    // remote log, but the echo completes from history without a read.
    let report = fixture.engine.sync(None).await.unwrap();
    assert_eq!(report.pushed, 1);
    assert!(remote.contains(&alice, &cid));
    assert_eq!(fixture.network.read_count(), 0);
    assert_eq!(fixture.local.log_len(&alice), 1);
}

#[tokio::test]
async fn test_protocol_scoping_limits_pull() {
    let fixture = SyncFixture::new();
    let alice = random_did();
    let remote = fixture.remote_node(URL);

    let chat = remote.ingest(&alice, write_message(&alice, Some("chat"), "r1"), None);
    let other = remote.ingest(&alice, write_message(&alice, Some("photos"), "r2"), None);
    fixture
        .register(
            &alice,
            &[URL],
            IdentityOptions {
                protocols: vec!["chat".into()],
                delegate_did: None,
            },
        )
        .await
        .unwrap();

    fixture.engine.sync(Some(SyncDirection::Pull)).await.unwrap();
    assert!(fixture.local.contains(&alice, &chat));
    assert!(!fixture.local.contains(&alice, &other));
}

#[tokio::test]
async fn test_unreachable_endpoint_trips_circuit_breaker() {
    let fixture = SyncFixture::new();
    let alice = random_did();
    let flaky = fixture.remote_node("https://flaky.example");
    let healthy = fixture.remote_node("https://healthy.example");

    flaky.ingest(&alice, write_message(&alice, None, "f1"), None);
    flaky.ingest(&alice, write_message(&alice, None, "f2"), None);
    let h1 = healthy.ingest(&alice, write_message(&alice, None, "h1"), None);
    fixture
        .register(
            &alice,
            &["https://flaky.example", "https://healthy.example"],
            IdentityOptions::default(),
        )
        .await
        .unwrap();

    // First pass enqueues everything but the local node rejects, so all
    // three jobs stay queued.
    fixture.local.set_process_status(Status::with_detail(500, "not ready"));
    let report = fixture.engine.sync(Some(SyncDirection::Pull)).await.unwrap();
    assert_eq!(report.enqueued, 3);
    assert_eq!(report.deferred, 3);

    // Endpoint goes down; its first job defers and trips the breaker, the
    // second is skipped without an attempt, and the healthy endpoint's job
    // still completes.
    fixture.local.set_process_status(Status::new(202));
    fixture.network.set_unreachable("https://flaky.example", true);
    let report = fixture.engine.sync(Some(SyncDirection::Pull)).await.unwrap();
    assert_eq!(report.deferred, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.pulled, 1);
    assert!(fixture.local.contains(&alice, &h1));

    // Endpoint recovers; the deferred jobs drain.
    fixture.network.set_unreachable("https://flaky.example", false);
    let report = fixture.engine.sync(Some(SyncDirection::Pull)).await.unwrap();
    assert_eq!(report.pulled, 2);
    assert_eq!(fixture.local.log_len(&alice), 3);
}

#[tokio::test]
async fn test_rejected_push_stays_queued_until_accepted() {
    let fixture = SyncFixture::new();
    let alice = random_did();
    let remote = fixture.remote_node(URL);

    let cid = fixture.local.ingest(&alice, write_message(&alice, None, "r1"), None);
    fixture
        .register(&alice, &[URL], IdentityOptions::default())
        .await
        .unwrap();

    remote.set_process_status(Status::with_detail(500, "storage failure"));
    let report = fixture.engine.sync(Some(SyncDirection::Push)).await.unwrap();
    assert_eq!(report.deferred, 1);
    assert!(!remote.contains(&alice, &cid));

    remote.set_process_status(Status::new(202));
    let report = fixture.engine.sync(Some(SyncDirection::Push)).await.unwrap();
    assert_eq!(report.pushed, 1);
    assert!(remote.contains(&alice, &cid));
}

#[tokio::test]
async fn test_not_found_completes_only_delete_pushes() {
    let fixture = SyncFixture::new();
    let alice = random_did();
    let remote = fixture.remote_node(URL);

    fixture.local.ingest(&alice, delete_message(&alice, None, "gone"), None);
    fixture
        .register(&alice, &[URL], IdentityOptions::default())
        .await
        .unwrap();

    // 404 for a tombstone means the target is already absent remotely;
    // there is nothing left to transfer.
    remote.set_process_status(Status::new(404));
    let report = fixture.engine.sync(Some(SyncDirection::Push)).await.unwrap();
    assert_eq!(report.pushed, 1);
    assert_eq!(report.deferred, 0);

    // The same status defers a write.
    fixture.local.ingest(&alice, write_message(&alice, None, "r1"), None);
    let report = fixture.engine.sync(Some(SyncDirection::Push)).await.unwrap();
    assert_eq!(report.pushed, 0);
    assert_eq!(report.deferred, 1);
}

#[tokio::test]
async fn test_conflict_counts_as_synced() {
    let fixture = SyncFixture::new();
    let alice = random_did();
    let remote = fixture.remote_node(URL);

    // The remote already holds the message; its node answers 409.
    let message = write_message(&alice, None, "r1");
    remote.ingest(&alice, message.clone(), None);
    fixture.local.ingest(&alice, message, None);
    fixture
        .register(&alice, &[URL], IdentityOptions::default())
        .await
        .unwrap();

    let report = fixture.engine.sync(Some(SyncDirection::Push)).await.unwrap();
    assert_eq!(report.pushed, 1);
    assert_eq!(report.deferred, 0);
}

#[tokio::test]
async fn test_pull_of_vanished_message_completes() {
    let fixture = SyncFixture::new();
    let alice = random_did();
    let remote = fixture.remote_node(URL);

    // The message is enumerable but its body was pruned after listing, so
    // the read comes back 404. Nothing is left to transfer; the job
    // completes and the dedup marker keeps echoes quiet.
    let cid = remote.ingest(&alice, delete_message(&alice, None, "gone"), None);
    remote.prune(&alice, &cid);
    fixture
        .register(&alice, &[URL], IdentityOptions::default())
        .await
        .unwrap();

    let report = fixture.engine.sync(Some(SyncDirection::Pull)).await.unwrap();
    assert_eq!(report.enqueued, 1);
    assert_eq!(report.pulled, 1);
    assert!(!fixture.local.contains(&alice, &cid));

    let report = fixture.engine.sync(Some(SyncDirection::Pull)).await.unwrap();
    assert_eq!(report.enqueued, 0);
    assert_eq!(report.pulled, 0);
}

#[tokio::test]
async fn test_missing_grant_isolates_delegated_identity() {
    let fixture = SyncFixture::new();
    let alice = random_did();
    let bob = random_did();
    let agent_did = random_did();
    let remote = fixture.remote_node(URL);

    remote.ingest(&alice, write_message(&alice, None, "a1"), None);
    let b1 = remote.ingest(&bob, write_message(&bob, None, "b1"), None);

    fixture
        .register(
            &alice,
            &[URL],
            IdentityOptions {
                protocols: Vec::new(),
                delegate_did: Some(agent_did),
            },
        )
        .await
        .unwrap();
    fixture
        .register(&bob, &[URL], IdentityOptions::default())
        .await
        .unwrap();

    // Alice's delegation has no grant behind it; her peer is skipped and
    // Bob's pull still completes in the same pass.
    let report = fixture.engine.sync(Some(SyncDirection::Pull)).await.unwrap();
    assert_eq!(report.enqueued, 1);
    assert_eq!(report.pulled, 1);
    assert!(fixture.local.contains(&bob, &b1));
    assert_eq!(fixture.local.log_len(&alice), 0);
}

#[tokio::test]
async fn test_delegated_sync_requires_grants() {
    let fixture = SyncFixture::new();
    let alice = random_did();
    let agent_did = random_did();
    let remote = fixture.remote_node(URL);

    remote.ingest(&alice, write_message(&alice, None, "r1"), None);
    fixture
        .register(
            &alice,
            &[URL],
            IdentityOptions {
                protocols: Vec::new(),
                delegate_did: Some(agent_did.clone()),
            },
        )
        .await
        .unwrap();

    // No grants at all: enumeration is refused, nothing enqueues.
    let report = fixture.engine.sync(Some(SyncDirection::Pull)).await.unwrap();
    assert_eq!(report.enqueued, 0);

    // Query grant alone lets enumeration run, but reads stay deferred.
    fixture.grants.insert(Grant {
        id: GrantId::new("grant-query"),
        scope: GrantScope {
            connected_did: alice.clone(),
            delegate_did: agent_did.clone(),
            message_kind: MessageKind::MessagesQuery,
            protocol: None,
        },
        expires_at: None,
    });
    let report = fixture.engine.sync(Some(SyncDirection::Pull)).await.unwrap();
    assert_eq!(report.enqueued, 1);
    assert_eq!(report.deferred, 1);

    // With the read grant the queued job drains.
    fixture.grants.insert(Grant {
        id: GrantId::new("grant-read"),
        scope: GrantScope {
            connected_did: alice.clone(),
            delegate_did: agent_did.clone(),
            message_kind: MessageKind::MessagesRead,
            protocol: None,
        },
        expires_at: None,
    });
    let report = fixture.engine.sync(Some(SyncDirection::Pull)).await.unwrap();
    assert_eq!(report.pulled, 1);
    assert_eq!(fixture.local.log_len(&alice), 1);
}

/// A remote client whose event-log query blocks until released, to hold a
/// pass in flight.
struct BlockingRemote {
    release: Arc<Notify>,
}

#[async_trait]
impl RemoteNodeClient for BlockingRemote {
    async fn query_event_log(
        &self,
        _url: &str,
        _target: &Did,
        _protocol: Option<&str>,
        _cursor: Option<&Cursor>,
        _grant_id: Option<&GrantId>,
    ) -> transport::Result<EventLogPage> {
        self.release.notified().await;
        Ok(EventLogPage::default())
    }

    async fn read_message(
        &self,
        url: &str,
        _target: &Did,
        _cid: &MessageCid,
        _grant_id: Option<&GrantId>,
    ) -> transport::Result<NodeReply> {
        Err(TransportError::Unreachable(url.to_string()))
    }

    async fn send_message(
        &self,
        url: &str,
        _target: &Did,
        _message: Message,
        _data: Option<bytes::Bytes>,
    ) -> transport::Result<NodeReply> {
        Err(TransportError::Unreachable(url.to_string()))
    }
}

#[tokio::test]
async fn test_concurrent_sync_fails_fast() {
    let release = Arc::new(Notify::new());
    let fixture = {
        let mut fixture = SyncFixture::new();
        // Replace the network with one that parks the pull phase.
        let engine = Arc::new(pdn_agent::sync::SyncEngine::new(
            Arc::new(pdn_agent::store::MemoryStore::new()),
            Arc::clone(&fixture.local) as Arc<dyn DataNode>,
            Arc::new(BlockingRemote {
                release: Arc::clone(&release),
            }),
            Arc::clone(&fixture.endpoints) as _,
            Arc::clone(&fixture.grants) as _,
            Default::default(),
        ));
        fixture.engine = engine;
        fixture
    };
    let alice = random_did();
    fixture
        .register(&alice, &[URL], IdentityOptions::default())
        .await
        .unwrap();

    let engine = Arc::clone(&fixture.engine);
    let in_flight = tokio::spawn(async move { engine.sync(Some(SyncDirection::Pull)).await });

    // Wait until the pass is parked inside the blocked query.
    while !fixture.engine.is_running() {
        tokio::task::yield_now().await;
    }

    let err = fixture.engine.sync(None).await.unwrap_err();
    assert!(matches!(err, SyncError::AlreadyRunning));

    release.notify_one();
    in_flight.await.unwrap().unwrap();
    assert!(!fixture.engine.is_running());
}

#[tokio::test]
async fn test_stop_sync_timeout_leaves_schedule_armed() {
    let release = Arc::new(Notify::new());
    let local = MemoryDataNode::new();
    let endpoints = Arc::new(transport::memory::StaticEndpointResolver::new());
    let engine = Arc::new(pdn_agent::sync::SyncEngine::new(
        Arc::new(pdn_agent::store::MemoryStore::new()),
        Arc::clone(&local) as Arc<dyn DataNode>,
        Arc::new(BlockingRemote {
            release: Arc::clone(&release),
        }),
        Arc::clone(&endpoints) as _,
        Arc::new(StaticGrantResolver::new()) as _,
        pdn_agent::sync::SyncOptions {
            stop_poll_interval: Duration::from_millis(10),
        },
    ));
    let alice = random_did();
    endpoints.publish(alice.clone(), vec![URL.to_string()]);
    engine
        .identities()
        .register(&alice, &IdentityOptions::default())
        .await
        .unwrap();

    let scheduler = SyncScheduler::new(Arc::clone(&engine));
    // Long interval so no tick interferes with the manually started pass.
    scheduler.start_sync(Duration::from_secs(3600));

    let in_flight = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.sync(Some(SyncDirection::Pull)).await })
    };
    while !engine.is_running() {
        tokio::task::yield_now().await;
    }

    // The parked pass outlives the shutdown budget; the schedule must stay
    // armed so a later stop can still succeed.
    let err = scheduler
        .stop_sync(Duration::from_millis(50))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::ShutdownTimeout { .. }));
    assert!(scheduler.is_scheduled());

    release.notify_one();
    in_flight.await.unwrap().unwrap();

    scheduler.stop_sync(Duration::from_secs(5)).await.unwrap();
    assert!(!scheduler.is_scheduled());
}

#[tokio::test(start_paused = true)]
async fn test_scheduler_runs_and_stops() {
    let fixture = SyncFixture::new();
    let alice = random_did();
    let remote = fixture.remote_node(URL);

    let cid = remote.ingest(&alice, write_message(&alice, None, "r1"), None);
    fixture
        .register(&alice, &[URL], IdentityOptions::default())
        .await
        .unwrap();

    let scheduler = SyncScheduler::new(Arc::clone(&fixture.engine));
    scheduler.start_sync(Duration::from_secs(1));
    assert!(scheduler.is_scheduled());

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(fixture.local.contains(&alice, &cid));

    scheduler.stop_sync(Duration::from_secs(5)).await.unwrap();
    assert!(!scheduler.is_scheduled());

    // No further ticks fire once disarmed.
    let log_len = fixture.local.log_len(&alice);
    remote.ingest(&alice, write_message(&alice, None, "r2"), None);
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(fixture.local.log_len(&alice), log_len);
}

#[tokio::test]
async fn test_agent_identity_lifecycle() {
    let fixture = SyncFixture::new();
    let agent = SyncAgent::new(
        Arc::new(pdn_agent::store::MemoryStore::new()),
        Arc::clone(&fixture.local) as Arc<dyn DataNode>,
        Arc::clone(&fixture.network) as _,
        Arc::clone(&fixture.endpoints) as _,
        Arc::clone(&fixture.grants) as _,
        AgentConfig::default(),
    );
    let alice = random_did();

    // Updating before registering fails.
    let err = agent
        .update_identity_options(&alice, &IdentityOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        pdn_agent::AgentError::Sync(SyncError::UnknownIdentity(_))
    ));

    agent
        .register_identity(&alice, &IdentityOptions::default())
        .await
        .unwrap();
    let updated = IdentityOptions {
        protocols: vec!["chat".into()],
        delegate_did: None,
    };
    agent.update_identity_options(&alice, &updated).await.unwrap();
    assert_eq!(agent.identity_options(&alice).await.unwrap(), Some(updated));

    agent.unregister_identity(&alice).await.unwrap();
    assert_eq!(agent.identity_options(&alice).await.unwrap(), None);
}

#[tokio::test]
async fn test_clear_wipes_sync_state() {
    let fixture = SyncFixture::new();
    let alice = random_did();
    let remote = fixture.remote_node(URL);

    remote.ingest(&alice, write_message(&alice, None, "r1"), None);
    fixture
        .register(&alice, &[URL], IdentityOptions::default())
        .await
        .unwrap();
    fixture.engine.sync(Some(SyncDirection::Pull)).await.unwrap();

    fixture.engine.clear().await.unwrap();

    // Identities are gone, so a pass finds no peers and moves nothing.
    assert!(fixture.engine.identities().list().await.unwrap().is_empty());
    let report = fixture.engine.sync(None).await.unwrap();
    assert_eq!(report.enqueued, 0);
}

#[tokio::test]
async fn test_deferred_jobs_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("agent.db");
    let alice = random_did();

    let network = transport::memory::MemoryRemoteNetwork::new();
    let remote = MemoryDataNode::new();
    network.register(URL, Arc::clone(&remote) as Arc<dyn DataNode>);
    let cid = remote.ingest(&alice, write_message(&alice, None, "r1"), None);

    let grants = Arc::new(StaticGrantResolver::new());
    let endpoints = Arc::new(transport::memory::StaticEndpointResolver::new());
    endpoints.publish(alice.clone(), vec![URL.to_string()]);

    // First run: the local node rejects, so the pull job stays queued in
    // SQLite.
    {
        let local = MemoryDataNode::new();
        local.set_process_status(Status::with_detail(503, "starting up"));
        let agent = SyncAgent::new(
            Arc::new(SqliteStore::open(&path).unwrap()),
            Arc::clone(&local) as Arc<dyn DataNode>,
            Arc::clone(&network) as _,
            Arc::clone(&endpoints) as _,
            Arc::clone(&grants) as _,
            AgentConfig::default(),
        );
        agent
            .register_identity(&alice, &IdentityOptions::default())
            .await
            .unwrap();
        let report = agent.sync(Some(SyncDirection::Pull)).await.unwrap();
        assert_eq!(report.deferred, 1);
        agent.close().await.unwrap();
    }

    // Second run over the same database: the queued job drains without
    // re-enumeration.
    let local = MemoryDataNode::new();
    let agent = SyncAgent::new(
        Arc::new(SqliteStore::open(&path).unwrap()),
        Arc::clone(&local) as Arc<dyn DataNode>,
        Arc::clone(&network) as _,
        endpoints as _,
        grants as _,
        AgentConfig::default(),
    );
    let report = agent.sync(Some(SyncDirection::Pull)).await.unwrap();
    assert_eq!(report.enqueued, 0);
    assert_eq!(report.pulled, 1);
    assert!(local.contains(&alice, &cid));
}
