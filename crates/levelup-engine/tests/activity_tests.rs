//! Tests for levelup-engine: voice presence, message cooldown gate, sweepers

use chrono::{Duration, TimeZone, Utc};
use levelup_core::*;
use levelup_engine::*;
use std::sync::Arc;

struct Harness {
    engine: LevelingEngine,
    backend: InMemoryBackend,
    clock: Arc<ManualClock>,
}

fn harness() -> Harness {
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()));
    let backend = InMemoryBackend::new();
    let engine = LevelingEngine::new(&LevelingConfig::default(), backend.collaborators(clock.clone()));
    Harness { engine, backend, clock }
}

fn alice() -> (UserId, GuildId) {
    (UserId::new("alice"), GuildId::new("g1"))
}

fn xp_of(backend: &InMemoryBackend, user: &UserId, guild: &GuildId) -> u64 {
    backend.store.progress_of(user, guild).map(|p| p.xp).unwrap_or(0)
}

// ===========================================================================
// Voice sessions
// ===========================================================================

#[tokio::test]
async fn xp_tick_waits_full_interval() {
    let h = harness();
    let (user, guild) = alice();
    h.engine.voice.on_join(&user, &guild);

    h.clock.advance(Duration::seconds(179));
    assert_eq!(h.engine.voice.xp_tick().await.granted, 0);
    assert_eq!(xp_of(&h.backend, &user, &guild), 0);

    h.clock.advance(Duration::seconds(1));
    assert_eq!(h.engine.voice.xp_tick().await.granted, 1);
    assert_eq!(xp_of(&h.backend, &user, &guild), 10);
}

#[tokio::test]
async fn xp_tick_resets_timer_after_firing() {
    let h = harness();
    let (user, guild) = alice();
    h.engine.voice.on_join(&user, &guild);

    h.clock.advance(Duration::seconds(200));
    assert_eq!(h.engine.voice.xp_tick().await.granted, 1);
    assert_eq!(h.engine.voice.xp_tick().await.granted, 0);

    h.clock.advance(Duration::seconds(179));
    assert_eq!(h.engine.voice.xp_tick().await.granted, 0);

    h.clock.advance(Duration::seconds(1));
    assert_eq!(h.engine.voice.xp_tick().await.granted, 1);
    assert_eq!(xp_of(&h.backend, &user, &guild), 20);
}

#[tokio::test]
async fn voice_xp_uses_guild_boost() {
    let h = harness();
    let (user, guild) = alice();
    h.engine.boosts.set_boost(&guild, 2, 1).await.unwrap();
    h.engine.voice.on_join(&user, &guild);

    h.clock.advance(Duration::seconds(180));
    h.engine.voice.xp_tick().await;
    assert_eq!(xp_of(&h.backend, &user, &guild), 20);
}

#[tokio::test]
async fn leave_credits_elapsed_time() {
    let h = harness();
    let (user, guild) = alice();
    h.engine.voice.on_join(&user, &guild);
    h.clock.advance(Duration::seconds(125));

    assert_eq!(h.engine.voice.on_leave(&user).await, Some(125));
    assert_eq!(h.backend.activity.voice_seconds(&user, &guild), 125);
    assert!(h.engine.voice.is_empty());
}

#[tokio::test]
async fn leave_without_session_is_ignored() {
    let h = harness();
    assert_eq!(h.engine.voice.on_leave(&UserId::new("ghost")).await, None);
}

#[tokio::test]
async fn flush_credits_and_restarts_segment() {
    let h = harness();
    let (user, guild) = alice();
    h.engine.voice.on_join(&user, &guild);

    h.clock.advance(Duration::seconds(300));
    let report = h.engine.voice.flush_durations().await;
    assert_eq!(report, FlushReport { sessions: 1, seconds: 300 });
    assert_eq!(h.engine.voice.session(&user).unwrap().joined_at, h.clock.now());

    h.clock.advance(Duration::seconds(20));
    assert_eq!(h.engine.voice.on_leave(&user).await, Some(20));
    assert_eq!(h.backend.activity.voice_seconds(&user, &guild), 320);
}

#[tokio::test]
async fn flush_does_not_touch_xp_timer() {
    let h = harness();
    let (user, guild) = alice();
    h.engine.voice.on_join(&user, &guild);

    h.clock.advance(Duration::seconds(150));
    h.engine.voice.flush_durations().await;
    h.clock.advance(Duration::seconds(30));
    assert_eq!(h.engine.voice.xp_tick().await.granted, 1);
}

#[tokio::test]
async fn rejoin_replaces_stale_session_without_credit() {
    let h = harness();
    let (user, g1) = alice();
    let g2 = GuildId::new("g2");
    h.engine.voice.on_join(&user, &g1);
    h.clock.advance(Duration::seconds(50));

    let stale = h.engine.voice.on_join(&user, &g2).unwrap();
    assert_eq!(stale.guild, g1);
    assert_eq!(h.engine.voice.len(), 1);
    assert_eq!(h.engine.voice.session(&user).unwrap().guild, g2);
    assert_eq!(h.backend.activity.voice_seconds(&user, &g1), 0);
}

#[tokio::test]
async fn orphaned_sessions_are_evicted_despite_flushes() {
    let h = harness();
    let (user, guild) = alice();
    h.engine.voice.on_join(&user, &guild);

    h.clock.advance(Duration::hours(10));
    h.engine.voice.flush_durations().await;
    h.clock.advance(Duration::hours(15));

    let report = h.engine.voice.xp_tick().await;
    assert_eq!(report.evicted, 1);
    assert_eq!(report.granted, 0);
    assert!(h.engine.voice.session(&user).is_none());
}

#[tokio::test]
async fn shutdown_flush_closes_every_session() {
    let h = harness();
    let g = GuildId::new("g1");
    h.engine.voice.on_join(&UserId::new("a"), &g);
    h.engine.voice.on_join(&UserId::new("b"), &g);
    h.clock.advance(Duration::seconds(40));

    let report = h.engine.voice.shutdown_flush().await;
    assert_eq!(report, FlushReport { sessions: 2, seconds: 80 });
    assert!(h.engine.voice.is_empty());
}

// ===========================================================================
// Message gate
// ===========================================================================

#[tokio::test]
async fn first_message_grants_one_xp_per_character() {
    let h = harness();
    let (user, guild) = alice();
    let outcome = h.engine.messages.on_message(&user, &guild, "hello").await.unwrap().unwrap();
    assert_eq!(outcome.xp_added, 5);
}

#[tokio::test]
async fn message_inside_cooldown_grants_nothing_but_counts_chars() {
    let h = harness();
    let (user, guild) = alice();
    h.engine.messages.on_message(&user, &guild, "hello").await.unwrap();

    h.clock.advance(Duration::seconds(10));
    let second = h.engine.messages.on_message(&user, &guild, "hi").await.unwrap();
    assert!(second.is_none());
    assert_eq!(xp_of(&h.backend, &user, &guild), 5);
    assert_eq!(h.backend.activity.message_chars(&user, &guild), 7);

    h.clock.advance(Duration::seconds(50));
    let third = h.engine.messages.on_message(&user, &guild, "again").await.unwrap();
    assert_eq!(third.map(|o| o.xp_added), Some(5));
}

#[tokio::test]
async fn message_xp_is_uncapped_and_counts_characters_not_bytes() {
    let h = harness();
    let (user, guild) = alice();
    let outcome = h.engine.messages.on_message(&user, &guild, "héllo wörld").await.unwrap().unwrap();
    assert_eq!(outcome.xp_added, 11);

    h.clock.advance(Duration::seconds(60));
    let long = "x".repeat(5_000);
    let outcome = h.engine.messages.on_message(&user, &guild, &long).await.unwrap().unwrap();
    assert_eq!(outcome.xp_added, 5_000);
    assert_eq!(outcome.new_level, 5);
}

#[tokio::test]
async fn cooldown_is_per_member_and_guild() {
    let h = harness();
    let (user, g1) = alice();
    h.engine.messages.on_message(&user, &g1, "one").await.unwrap();
    assert!(h.engine.messages.on_message(&user, &GuildId::new("g2"), "two").await.unwrap().is_some());
    assert!(h.engine.messages.on_message(&UserId::new("bob"), &g1, "three").await.unwrap().is_some());
    assert!(!h.engine.messages.is_ready(&user, &g1));
}

#[tokio::test]
async fn empty_message_does_not_start_cooldown() {
    let h = harness();
    let (user, guild) = alice();
    assert!(h.engine.messages.on_message(&user, &guild, "").await.unwrap().is_none());
    assert!(h.engine.messages.is_ready(&user, &guild));
}

#[tokio::test]
async fn blank_ids_leave_no_trace_in_gate_or_ledger() {
    let h = harness();
    let blank = UserId::new("  ");
    let guild = GuildId::new("g1");

    let err = h.engine.messages.on_message(&blank, &guild, "hello").await.unwrap_err();
    assert_eq!(err.class(), ErrorClass::Validation);
    assert_eq!(h.backend.activity.message_chars(&blank, &guild), 0);
    assert_eq!(h.engine.messages.tracked(), 0);
}

#[tokio::test]
async fn prune_drops_only_expired_windows() {
    let h = harness();
    let g = GuildId::new("g1");
    h.engine.messages.on_message(&UserId::new("old"), &g, "hey").await.unwrap();
    h.clock.advance(Duration::seconds(30));
    h.engine.messages.on_message(&UserId::new("new"), &g, "hey").await.unwrap();
    h.clock.advance(Duration::seconds(31));

    assert_eq!(h.engine.messages.prune(), 1);
    assert_eq!(h.engine.messages.tracked(), 1);
}

// ===========================================================================
// Sweepers
// ===========================================================================

fn fast_intervals() -> SweepIntervals {
    let tick = std::time::Duration::from_millis(10);
    SweepIntervals { voice_xp: tick, voice_flush: tick, boost_expiry: tick, cooldown_prune: tick }
}

#[tokio::test]
async fn scheduler_runs_sweeps_until_shutdown() {
    let h = harness();
    let engine = h.engine.with_intervals(fast_intervals());
    let (user, guild) = alice();
    engine.voice.on_join(&user, &guild);
    engine.boosts.set_boost(&GuildId::new("g9"), 2, 1).await.unwrap();
    h.clock.advance(Duration::hours(2));

    let handle = engine.start();
    assert_eq!(handle.task_names(), vec!["voice-xp", "voice-flush", "boost-expiry", "cooldown-prune"]);
    let cancel = handle.cancel_token();
    tokio::time::sleep(std::time::Duration::from_millis(150)).await;
    assert!(handle.is_running());

    handle.shutdown().await;
    assert!(cancel.is_cancelled());

    // The clock stood still while the sweepers ran, so the XP tick fired once.
    assert_eq!(xp_of(&h.backend, &user, &guild), 10);
    assert_eq!(h.backend.activity.voice_seconds(&user, &guild), 7_200);
    assert_eq!(h.backend.store.boost_rows(), 0);
}

#[tokio::test]
async fn sweeps_do_not_run_after_shutdown() {
    let h = harness();
    let engine = h.engine.with_intervals(fast_intervals());
    let (user, guild) = alice();

    let handle = engine.start();
    handle.shutdown().await;

    engine.voice.on_join(&user, &guild);
    h.clock.advance(Duration::seconds(600));
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(xp_of(&h.backend, &user, &guild), 0);
}
