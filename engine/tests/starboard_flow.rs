//! Starboard ingestion and reconciliation against in-memory providers.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use herald_core::job::JobName;
use herald_core::model::{LinkRecord, SettingKey};
use herald_core::providers::{ConfigurationStore, EphemeralStore, LinkStore};
use herald_core::HeraldError;
use herald_engine::{
    register_handlers, EngineConfig, EngineEnvironment, Ingested, ReactionEvent, ReactionKind,
};
use herald_runtime::{HandlerRegistry, Scheduler, Worker, WorkerConfig};
use herald_testing::mocks::{
    InMemoryEphemeralStore, InMemoryFollowRegistry, InMemoryJobQueue, InMemoryLinkStore,
    MockConfigurationStore, MockMessagingClient, MockStatusApi,
};
use herald_testing::{epoch, fixtures, init_test_tracing, manual_clock, ManualClock};
use proptest::prelude::*;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;

type Env = EngineEnvironment<
    MockMessagingClient,
    MockStatusApi,
    MockConfigurationStore,
    InMemoryLinkStore,
    InMemoryFollowRegistry,
    InMemoryEphemeralStore,
    InMemoryJobQueue,
    ManualClock,
>;

struct Harness {
    env: Env,
    worker: Worker<InMemoryJobQueue, ManualClock>,
    messaging: MockMessagingClient,
    settings: MockConfigurationStore,
    links: InMemoryLinkStore,
    store: InMemoryEphemeralStore,
    queue: InMemoryJobQueue,
}

async fn harness_with(threshold: &str, config: EngineConfig) -> Harness {
    init_test_tracing();
    let messaging = MockMessagingClient::new();
    let settings = MockConfigurationStore::new();
    let links = InMemoryLinkStore::new();
    let store = InMemoryEphemeralStore::new();
    let queue = InMemoryJobQueue::new();
    let clock = manual_clock();

    messaging.add_channel("10", "general").unwrap();
    messaging.add_channel("500", "starboard").unwrap();
    messaging
        .add_message(fixtures::message("10", "42", "7", "look at this"))
        .unwrap();
    settings.set("g1", SettingKey::StarboardChannel, "500").await.unwrap();
    settings.set("g1", SettingKey::StarboardCount, threshold).await.unwrap();

    let env = EngineEnvironment::new(
        messaging.clone(),
        MockStatusApi::new(),
        settings.clone(),
        links.clone(),
        InMemoryFollowRegistry::new(),
        store.clone(),
        Scheduler::new(queue.clone(), clock.clone()),
        config,
    );

    let mut registry = HandlerRegistry::new();
    register_handlers(&mut registry, &env);
    let worker = Worker::new(queue.clone(), clock, Arc::new(registry), WorkerConfig::default());

    Harness {
        env,
        worker,
        messaging,
        settings,
        links,
        store,
        queue,
    }
}

async fn harness() -> Harness {
    harness_with("3", EngineConfig::default()).await
}

fn event(kind: ReactionKind, user: &str, count: usize) -> ReactionEvent {
    ReactionEvent {
        kind,
        guild_id: Some("g1".into()),
        channel_id: "10".into(),
        parent_id: None,
        message_id: "42".into(),
        author_id: "7".into(),
        user_id: user.into(),
        emoji: "⭐".into(),
        count,
    }
}

impl Harness {
    /// React as `user`, with `reactors` being everyone holding a star afterwards.
    async fn react(&self, user: &str, reactors: &[&str]) -> Ingested {
        self.messaging.set_reactors("10", "42", reactors).unwrap();
        self.env
            .ingest_reaction(&event(ReactionKind::Add, user, reactors.len()))
            .await
            .unwrap()
    }

    async fn unreact(&self, user: &str, reactors: &[&str]) -> Ingested {
        self.messaging.set_reactors("10", "42", reactors).unwrap();
        self.env
            .ingest_reaction(&event(ReactionKind::Remove, user, reactors.len()))
            .await
            .unwrap()
    }

    async fn run_jobs(&self) -> usize {
        let mut total = 0;
        loop {
            let processed = self.worker.run_once().await.unwrap();
            if processed == 0 {
                return total;
            }
            total += processed;
        }
    }

    fn pin_text(&self, link: &LinkRecord) -> Option<String> {
        self.messaging
            .rendered(&link.representation_location_id, &link.representation_id)
            .unwrap()
            .and_then(|content| content.text)
    }
}

#[tokio::test]
async fn pins_at_threshold_and_counts_down_on_removal() {
    let h = harness().await;

    assert!(matches!(h.react("A", &["A"]).await, Ingested::BelowThreshold { count: 1, threshold: 3 }));
    assert!(matches!(h.react("B", &["A", "B"]).await, Ingested::BelowThreshold { .. }));
    assert!(matches!(h.react("C", &["A", "B", "C"]).await, Ingested::Scheduled { .. }));
    assert_eq!(h.run_jobs().await, 1);

    let sent = h.messaging.sent().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].location_id, "500");
    assert_eq!(sent[0].content.text.as_deref(), Some("⭐ 3"));
    let links = h.links.links().unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].representation_id, sent[0].message_id);

    let removed = h.unreact("B", &["A", "C"]).await;
    assert_eq!(removed, Ingested::Removed { count: 2, updated: true });
    assert_eq!(h.pin_text(&links[0]).as_deref(), Some("⭐ 2"));
    assert_eq!(h.messaging.sent().unwrap().len(), 1);
    assert!(h.queue.pending_named(JobName::Starboard).unwrap().is_empty());
}

#[tokio::test]
async fn concurrent_first_signals_create_one_pin() {
    let h = harness().await;
    h.links.record_source(&fixtures::source("10", "42", "7")).await.unwrap();
    h.messaging.set_reactors("10", "42", &["A", "B", "C"]).unwrap();

    let (first, second) = tokio::join!(h.env.reconcile("42"), h.env.reconcile("42"));
    for result in [&first, &second] {
        if let Err(e) = result {
            assert!(e.is_retryable(), "unexpected error {e}");
        }
    }
    // The loser of the claim converges through the update branch on retry.
    h.env.reconcile("42").await.unwrap();

    assert_eq!(h.messaging.sent().unwrap().len(), 1);
    let links = h.links.links().unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(h.pin_text(&links[0]).as_deref(), Some("⭐ 3"));
    assert_eq!(h.messaging.live_count("500").unwrap(), 1);
}

#[tokio::test]
async fn losing_the_insert_race_deletes_our_pin() {
    let h = harness().await;
    h.links.record_source(&fixtures::source("10", "42", "7")).await.unwrap();
    h.messaging.set_reactors("10", "42", &["A", "B", "C", "D"]).unwrap();
    h.messaging
        .add_message(fixtures::message("500", "pin-0", "bot", "⭐ 3"))
        .unwrap();
    let existing = LinkRecord {
        source_id: "42".into(),
        guild_id: "g1".into(),
        location_id: "10".into(),
        thread_id: None,
        owner_id: "7".into(),
        representation_location_id: "500".into(),
        representation_id: "pin-0".into(),
    };
    h.links.race_link(existing.clone()).unwrap();

    h.env.reconcile("42").await.unwrap();

    let sent = h.messaging.sent().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(
        h.messaging.deleted().unwrap(),
        vec![("500".to_string(), sent[0].message_id.clone())]
    );
    assert_eq!(h.links.links().unwrap(), vec![existing.clone()]);
    assert_eq!(h.pin_text(&existing).as_deref(), Some("⭐ 4"));
}

#[tokio::test]
async fn failure_before_sending_releases_the_claim() {
    let h = harness().await;
    h.links.record_source(&fixtures::source("10", "42", "7")).await.unwrap();
    h.messaging.set_reactors("10", "42", &["A", "B", "C"]).unwrap();
    h.messaging.fail_next("channel").unwrap();

    let err = h.env.reconcile("42").await.unwrap_err();
    assert!(err.is_retryable());
    assert!(h.messaging.sent().unwrap().is_empty());

    // The claim was released, so the retry can create the pin.
    h.env.reconcile("42").await.unwrap();
    assert_eq!(h.links.links().unwrap().len(), 1);
    assert!(!h.store.exists("starboard:claim/42").await.unwrap());
}

#[tokio::test]
async fn deleted_pins_are_not_recreated() {
    let h = harness().await;
    h.react("C", &["A", "B", "C"]).await;
    h.run_jobs().await;
    let link = h.links.links().unwrap().remove(0);

    h.messaging
        .remove_message(&link.representation_location_id, &link.representation_id)
        .unwrap();
    h.react("D", &["A", "B", "C", "D"]).await;
    h.run_jobs().await;

    assert_eq!(h.messaging.sent().unwrap().len(), 1);
    assert_eq!(h.links.links().unwrap(), vec![link]);
    assert_eq!(h.messaging.live_count("500").unwrap(), 0);
}

#[tokio::test]
async fn deleted_source_drops_its_actor_set() {
    let h = harness().await;
    h.react("C", &["A", "B", "C"]).await;
    h.messaging.remove_message("10", "42").unwrap();

    let err = h.env.reconcile("42").await.unwrap_err();

    assert!(err.is_not_found());
    assert!(h.store.members("starboard:42").unwrap().is_empty());
    assert!(h.messaging.sent().unwrap().is_empty());
}

#[tokio::test]
async fn reconcile_replaces_stale_actors_with_the_reactor_list() {
    let h = harness().await;
    h.links.record_source(&fixtures::source("10", "42", "7")).await.unwrap();
    h.store
        .sadd("starboard:42", &["gone-1".into(), "gone-2".into(), "A".into()])
        .await
        .unwrap();
    h.messaging.set_reactors("10", "42", &["A", "B", "C"]).unwrap();

    h.env.reconcile("42").await.unwrap();

    let expected: HashSet<String> = ["A", "B", "C"].into_iter().map(String::from).collect();
    assert_eq!(h.store.members("starboard:42").unwrap(), expected);
    let links = h.links.links().unwrap();
    assert_eq!(h.pin_text(&links[0]).as_deref(), Some("⭐ 3"));
}

#[tokio::test]
async fn unknown_sources_are_not_found() {
    let h = harness().await;
    let err = h.env.reconcile("999").await.unwrap_err();
    assert_eq!(err, HeraldError::not_found("source message", "999"));
}

#[tokio::test]
async fn untracked_reactions_are_ignored() {
    let h = harness().await;

    let mut other_emoji = event(ReactionKind::Add, "A", 5);
    other_emoji.emoji = "🔥".into();
    assert_eq!(
        h.env.ingest_reaction(&other_emoji).await.unwrap(),
        Ingested::Ignored { reason: "emoji" }
    );

    let mut direct = event(ReactionKind::Add, "A", 5);
    direct.guild_id = None;
    assert_eq!(
        h.env.ingest_reaction(&direct).await.unwrap(),
        Ingested::Ignored { reason: "no_guild" }
    );

    let mut unconfigured = event(ReactionKind::Add, "A", 5);
    unconfigured.guild_id = Some("g2".into());
    assert_eq!(
        h.env.ingest_reaction(&unconfigured).await.unwrap(),
        Ingested::Ignored { reason: "no_starboard" }
    );

    let mut on_a_pin = event(ReactionKind::Add, "A", 5);
    on_a_pin.channel_id = "500".into();
    assert_eq!(
        h.env.ingest_reaction(&on_a_pin).await.unwrap(),
        Ingested::Ignored { reason: "starboard_channel" }
    );

    assert_eq!(h.queue.enqueued().unwrap(), 0);
}

#[tokio::test]
async fn removal_before_pinning_only_updates_the_set() {
    let h = harness().await;
    h.store.sadd("starboard:42", &["A".to_string(), "B".to_string()]).await.unwrap();

    let removed = h.unreact("A", &["B"]).await;

    assert_eq!(removed, Ingested::Removed { count: 1, updated: false });
    assert!(h.messaging.sent().unwrap().is_empty());
    assert!(h.messaging.edits().unwrap().is_empty());
}

#[tokio::test]
async fn settings_are_read_through_the_cache() {
    let h = harness().await;

    h.react("C", &["A", "B", "C"]).await;
    h.react("D", &["A", "B", "C", "D"]).await;
    h.run_jobs().await;

    // Channel and threshold, once each.
    assert_eq!(h.settings.reads(), 2);
    assert_eq!(
        h.store.get("guild-settings:g1/starboard-channel").await.unwrap().as_deref(),
        Some("500")
    );
}

#[tokio::test]
async fn cache_outage_falls_back_to_settings() {
    let h = harness().await;
    h.store.set_unavailable(true);

    let err = h
        .env
        .ingest_reaction(&event(ReactionKind::Add, "C", 3))
        .await
        .unwrap_err();

    // Settings were still read; the actor set itself needs the store.
    assert!(h.settings.reads() >= 2);
    assert!(matches!(err, HeraldError::Cache(_)));
}

#[tokio::test]
async fn debounce_delays_the_reconcile_job() {
    let h = harness_with("3", EngineConfig::default().with_debounce(Duration::from_secs(30))).await;

    h.react("C", &["A", "B", "C"]).await;

    let pending = h.queue.pending_named(JobName::Starboard).unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].not_before, epoch() + chrono::Duration::seconds(30));
    assert_eq!(h.run_jobs().await, 0);
}

#[tokio::test]
async fn unparsable_threshold_uses_the_default() {
    let h = harness_with("many", EngineConfig::default().with_default_threshold(2)).await;

    assert!(matches!(h.react("B", &["A", "B"]).await, Ingested::Scheduled { .. }));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn displayed_count_matches_the_net_actor_set(
        ops in prop::collection::vec((any::<bool>(), 0..5usize, any::<bool>()), 1..30)
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async move {
            let h = harness_with("1", EngineConfig::default()).await;
            let mut model = BTreeSet::new();

            for (add, user, drain) in ops {
                let user = format!("u{user}");
                if add {
                    model.insert(user.clone());
                } else {
                    model.remove(&user);
                }
                let reactors: Vec<&str> = model.iter().map(String::as_str).collect();
                if add {
                    h.react(&user, &reactors).await;
                } else {
                    h.unreact(&user, &reactors).await;
                }
                if drain {
                    h.run_jobs().await;
                }
            }
            h.run_jobs().await;

            let links = h.links.links().unwrap();
            assert!(links.len() <= 1);
            assert_eq!(h.messaging.sent().unwrap().len(), links.len());
            if let Some(link) = links.first() {
                assert_eq!(h.pin_text(link), Some(format!("⭐ {}", model.len())));
            }
            let expected: HashSet<String> = model.into_iter().collect();
            assert_eq!(h.store.members("starboard:42").unwrap(), expected);
        });
    }
}
