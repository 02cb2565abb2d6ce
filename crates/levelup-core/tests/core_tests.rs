//! Tests for levelup-core: threshold curve, ids, progress types, config loading

use levelup_core::config::LevelRoleEntry;
use levelup_core::*;
use std::io::Write;

// ===========================================================================
// Threshold curve
// ===========================================================================

#[test]
fn required_matches_documented_examples() {
    assert_eq!(required(1), 1_000);
    assert_eq!(required(10), 10_000);
    assert_eq!(required(11), 13_000);
    assert_eq!(required(20), 40_000);
    assert_eq!(required(21), 49_000);
}

#[test]
fn required_is_zero_at_or_below_level_zero() {
    assert_eq!(required(0), 0);
}

#[test]
fn required_strictly_increases_through_level_sixty() {
    for level in 1..=60 {
        assert!(
            required(level + 1) > required(level),
            "required({}) = {} not above required({}) = {}",
            level + 1,
            required(level + 1),
            level,
            required(level)
        );
    }
}

#[test]
fn step_triples_every_ten_levels() {
    assert_eq!(xp_step(1), 1_000);
    assert_eq!(xp_step(10), 1_000);
    assert_eq!(xp_step(11), 3_000);
    assert_eq!(xp_step(31), 27_000);
    assert_eq!(xp_step(41), 81_000);
    assert_eq!(xp_step(60), 243_000);
}

#[test]
fn curve_keeps_last_step_past_sixty() {
    assert_eq!(required(60), 3_640_000);
    assert_eq!(required(61) - required(60), 243_000);
    assert_eq!(required(75) - required(74), 243_000);
}

#[test]
fn required_saturates_instead_of_overflowing() {
    assert!(required(u32::MAX) > required(1_000_000));
}

#[test]
fn level_for_xp_inverts_required() {
    assert_eq!(level_for_xp(0), 1);
    assert_eq!(level_for_xp(1_999), 1);
    assert_eq!(level_for_xp(2_000), 2);
    assert_eq!(level_for_xp(9_999), 9);
    assert_eq!(level_for_xp(10_100), 10);
    assert_eq!(level_for_xp(13_000), 11);
    for level in 2..=70 {
        assert_eq!(level_for_xp(required(level)), level);
        assert_eq!(level_for_xp(required(level) - 1), level - 1);
    }
}

// ===========================================================================
// Ids and records
// ===========================================================================

#[test]
fn ids_display_and_compare() {
    let user = UserId::new("u-1");
    assert_eq!(user.as_str(), "u-1");
    assert_eq!(format!("{}", user), "u-1");
    assert_eq!(user, UserId::from("u-1"));
    assert!(GuildId::new("  ").is_blank());
}

#[test]
fn ids_serialize_as_plain_strings() {
    let progress = LevelProgress::new(UserId::new("alice"), GuildId::new("g1"));
    let json = serde_json::to_value(&progress).unwrap();
    assert_eq!(json["user"], "alice");
    assert_eq!(json["guild"], "g1");
    assert_eq!(json["level"], 1);
    assert_eq!(json["xp"], 0);
}

#[test]
fn new_progress_starts_at_level_one() {
    let progress = LevelProgress::new(UserId::new("u"), GuildId::new("g"));
    assert_eq!(progress.level, 1);
    assert_eq!(progress.xp, 0);
    assert_eq!(progress.revision, 0);
}

#[test]
fn levels_crossed_lists_each_new_level() {
    let outcome = GrantOutcome {
        user: UserId::new("u"),
        guild: GuildId::new("g"),
        xp_added: 5_000,
        total_xp: 5_000,
        old_level: 2,
        new_level: 5,
        level_up: true,
    };
    assert_eq!(outcome.levels_crossed().collect::<Vec<_>>(), vec![3, 4, 5]);

    let flat = GrantOutcome { level_up: false, new_level: 2, ..outcome };
    assert_eq!(flat.levels_crossed().count(), 0);
}

#[test]
fn level_role_map_earned_is_threshold_inclusive() {
    let map = LevelRoleMap::new().with(5, "bronze").with(10, "silver").with(20, "gold");
    let earned: Vec<_> = map.earned(10).map(|r| r.as_str().to_string()).collect();
    assert_eq!(earned, vec!["bronze", "silver"]);
    assert_eq!(map.earned(4).count(), 0);
    assert_eq!(map.len(), 3);
}

#[test]
fn error_classes_follow_taxonomy() {
    assert_eq!(Error::validation("x").class(), ErrorClass::Validation);
    assert_eq!(
        Error::Timeout { op: "load", after_ms: 5 }.class(),
        ErrorClass::Persistence
    );
    assert_eq!(Error::role("r", "denied").class(), ErrorClass::SideEffect);
    assert_eq!(Error::ledger("down").class(), ErrorClass::SideEffect);
}

// ===========================================================================
// Config
// ===========================================================================

#[test]
fn default_config_matches_engine_constants() {
    let config = LevelingConfig::default();
    assert_eq!(config.message.cooldown_secs, 60);
    assert_eq!(config.voice.sweep_secs, 30);
    assert_eq!(config.voice.xp_interval_secs, 180);
    assert_eq!(config.voice.xp_per_tick, 10);
    assert_eq!(config.voice.flush_secs, 300);
    assert_eq!(config.voice.max_session_hours, 24);
    assert_eq!(config.rewards.coins_per_level, 100);
    assert_eq!(config.boost.max_multiplier, 10);
    assert!(config.validate().is_ok());
}

#[test]
fn partial_toml_keeps_defaults() {
    let config = LevelingConfig::from_toml_str(
        r#"
[message]
cooldown_secs = 30

[[level_roles]]
guild = "g1"
level = 5
role = "regular"
"#,
    )
    .unwrap();
    assert_eq!(config.message.cooldown_secs, 30);
    assert_eq!(config.voice.xp_interval_secs, 180);
    assert_eq!(
        config.level_roles,
        vec![LevelRoleEntry { guild: "g1".into(), level: 5, role: "regular".into() }]
    );
    let maps = config.level_role_maps();
    assert_eq!(maps[&GuildId::new("g1")].len(), 1);
}

#[test]
fn invalid_values_are_rejected() {
    let err = LevelingConfig::from_toml_str("[boost]\nmax_multiplier = 11\n").unwrap_err();
    assert!(matches!(err, Error::Config(_)));

    let err = LevelingConfig::from_toml_str("[message]\ncooldown_secs = \"soon\"\n").unwrap_err();
    assert!(matches!(err, Error::Toml(_)));

    for doc in [
        "[voice]\nmax_session_hours = 0\n",
        "[voice]\nmax_session_hours = 1000000000000000\n",
        "[voice]\nxp_interval_secs = 9223372036854775807\n",
        "[message]\ncooldown_secs = 9223372036854775807\n",
        "[boost]\nsweep_secs = 0\n",
        "[storage]\ntimeout_ms = 9223372036854775807\n",
    ] {
        let err = LevelingConfig::from_toml_str(doc).unwrap_err();
        assert!(matches!(err, Error::Config(_)), "{:?} accepted: {}", doc, err);
    }
}

#[test]
fn largest_accepted_windows_convert_without_overflow() {
    let doc = format!(
        "[message]\ncooldown_secs = {secs}\n[voice]\nxp_interval_secs = {secs}\nmax_session_hours = {hours}\n",
        secs = config::MAX_PERIOD_SECS,
        hours = config::MAX_SESSION_HOURS,
    );
    let config = LevelingConfig::from_toml_str(&doc).unwrap();
    assert_eq!(config.message_cooldown().num_seconds(), config::MAX_PERIOD_SECS as i64);
    assert_eq!(config.voice.xp_interval().num_seconds(), config::MAX_PERIOD_SECS as i64);
    assert_eq!(config.voice.max_session().num_hours(), config::MAX_SESSION_HOURS as i64);
}

#[test]
fn load_falls_back_on_missing_or_broken_file() {
    let dir = tempfile::tempdir().unwrap();
    let missing = LevelingConfig::load(&dir.path().join("nope.toml"));
    assert_eq!(missing.message.cooldown_secs, 60);

    let path = dir.path().join("broken.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "this is = = not toml").unwrap();
    let broken = LevelingConfig::load(&path);
    assert_eq!(broken.voice.flush_secs, 300);
}

#[test]
fn to_toml_roundtrips_through_loader() {
    let mut config = LevelingConfig::default();
    config.rewards.coins_per_level = 250;
    config.notify.announce_channel = Some("levels".into());
    let text = config.to_toml();
    let parsed = LevelingConfig::from_toml_str(&text).unwrap();
    assert_eq!(parsed.rewards.coins_per_level, 250);
    assert_eq!(parsed.notify.announce_channel.as_deref(), Some("levels"));
}
