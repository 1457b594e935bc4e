use super::*;
use crate::testing::ManualClock;
use chrono::TimeZone;
use serde_json::json;

fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
}

fn interceptor() -> (MockRegistry, ClockInterceptor, ManualClock) {
    let registry = MockRegistry::new();
    let live = ManualClock::new(at(2030, 6, 1, 12, 0, 0));
    let clock = ClockInterceptor::new(registry.clone(), Box::new(live.clone()));
    (registry, clock, live)
}

#[test]
fn test_unfrozen_clock_reads_live_time_unrecorded() {
    let (registry, clock, live) = interceptor();
    assert_eq!(clock.now(), live.now());
    assert!(!clock.is_frozen());
    assert!(registry.is_empty());
}

#[test]
fn test_freeze_and_advance_one_hour() {
    let (_registry, clock, _live) = interceptor();
    clock.freeze_at_str("2024-01-15 10:30:00").unwrap();
    let frozen = clock.timestamp();

    clock.advance(TimeDelta::hours(1)).unwrap();
    assert_eq!(clock.timestamp() - frozen, 3600);
    assert_eq!(clock.now(), at(2024, 1, 15, 11, 30, 0));
}

#[test]
fn test_frozen_time_ignores_live_time() {
    let (_registry, clock, live) = interceptor();
    clock.freeze_at(at(2024, 1, 15, 10, 30, 0));
    live.advance(TimeDelta::minutes(5));
    assert_eq!(clock.now(), at(2024, 1, 15, 10, 30, 0));
}

#[test]
fn test_tick_mode_adds_elapsed_live_time() {
    let (_registry, clock, live) = interceptor();
    clock.freeze_at(at(2024, 1, 15, 10, 30, 0));
    clock.tick(true);
    assert!(clock.is_ticking());

    live.advance(TimeDelta::seconds(90));
    assert_eq!(clock.now(), at(2024, 1, 15, 10, 31, 30));

    clock.tick(false);
    live.advance(TimeDelta::hours(1));
    assert_eq!(clock.now(), at(2024, 1, 15, 10, 31, 30));
}

#[test]
fn test_rewind_and_set() {
    let (_registry, clock, _live) = interceptor();
    clock.freeze_at(at(2024, 1, 15, 10, 30, 0));
    assert_eq!(
        clock.rewind(TimeDelta::days(1)).unwrap(),
        at(2024, 1, 14, 10, 30, 0)
    );

    clock.set(at(2025, 12, 31, 23, 59, 59));
    assert_eq!(clock.now(), at(2025, 12, 31, 23, 59, 59));
}

#[test]
fn test_moving_an_unfrozen_clock_fails() {
    let (_registry, clock, _live) = interceptor();
    assert_eq!(clock.advance(TimeDelta::hours(1)), Err(ClockError::NotFrozen));
    assert_eq!(clock.rewind(TimeDelta::hours(1)), Err(ClockError::NotFrozen));
}

#[test]
fn test_comparisons_use_logical_time() {
    let (_registry, clock, _live) = interceptor();
    clock.freeze_at(at(2024, 1, 15, 10, 30, 0));

    assert!(clock.is_before(at(2024, 1, 15, 10, 30, 1)));
    assert!(clock.is_after(at(2024, 1, 15, 10, 29, 59)));
    assert!(!clock.is_after(at(2024, 1, 15, 10, 30, 0)));
}

#[test]
fn test_configured_return_value_overrides_frozen_instant() {
    let (_registry, clock, _live) = interceptor();
    let handle = clock.freeze_at(at(2024, 1, 15, 10, 30, 0));

    handle.and_return("2000-01-01T00:00:00Z");
    assert_eq!(clock.now(), at(2000, 1, 1, 0, 0, 0));

    handle.and_return_consecutive([json!("2001-02-03 04:05:06"), json!(0)]);
    assert_eq!(clock.now(), at(2001, 2, 3, 4, 5, 6));
    assert_eq!(clock.now(), DateTime::<Utc>::UNIX_EPOCH);

    // Values that are not instants fall back to the logical time
    handle.and_return(json!({"not": "a time"}));
    assert_eq!(clock.now(), at(2024, 1, 15, 10, 30, 0));

    handle.and_passthrough();
    assert_eq!(clock.now(), at(2024, 1, 15, 10, 30, 0));
    assert_eq!(handle.call_count(), 5);
}

#[test]
fn test_moving_beyond_representable_range_fails() {
    let (_registry, clock, _live) = interceptor();
    clock.freeze_at(at(2024, 1, 15, 10, 30, 0));

    let err = clock.advance(TimeDelta::MAX).unwrap_err();
    assert!(matches!(err, ClockError::OutOfRange { .. }));
    let err = clock.rewind(TimeDelta::MAX).unwrap_err();
    assert!(matches!(err, ClockError::OutOfRange { .. }));

    // A failed move leaves the clock where it was
    assert_eq!(clock.now(), at(2024, 1, 15, 10, 30, 0));
}

#[test]
fn test_tick_mode_saturates_instead_of_overflowing() {
    let (_registry, clock, live) = interceptor();
    clock.freeze_at(DateTime::<Utc>::MAX_UTC - TimeDelta::seconds(1));
    clock.tick(true);
    live.advance(TimeDelta::days(1));
    assert_eq!(clock.now(), DateTime::<Utc>::MAX_UTC);
}

#[test]
fn test_reads_are_recorded_for_expectations() {
    let (registry, clock, _live) = interceptor();
    let handle = clock.freeze_at(at(2024, 1, 15, 10, 30, 0));
    handle.twice();

    clock.now();
    assert!(registry.verify_all().is_err());
    clock.timestamp();
    assert!(registry.verify_all().is_ok());

    assert_eq!(handle.symbol(), CLOCK_SYMBOL);
    assert_eq!(
        handle.last_call().unwrap().result,
        Ok(Value::String(at(2024, 1, 15, 10, 30, 0).to_rfc3339()))
    );
}

#[test]
fn test_unfreeze_returns_to_live_time_and_keeps_counts() {
    let (_registry, clock, live) = interceptor();
    let handle = clock.freeze_at(at(2024, 1, 15, 10, 30, 0));
    clock.now();
    clock.unfreeze();

    assert!(!clock.is_frozen());
    assert_eq!(clock.now(), live.now());
    assert_eq!(handle.call_count(), 1);

    clock.freeze_now();
    assert!(handle.is_enabled());
    assert_eq!(clock.now(), live.now());
}

#[test]
fn test_clear_all_unfreezes() {
    let (registry, clock, live) = interceptor();
    clock.freeze_at(at(2024, 1, 15, 10, 30, 0));
    registry.clear_all();
    assert!(!clock.is_frozen());
    assert_eq!(clock.now(), live.now());
}

#[test]
fn test_parse_timestamp_formats() {
    assert_eq!(
        parse_timestamp("2024-01-15 10:30:00").unwrap(),
        at(2024, 1, 15, 10, 30, 0)
    );
    assert_eq!(parse_timestamp("2024-01-15").unwrap(), at(2024, 1, 15, 0, 0, 0));
    assert_eq!(
        parse_timestamp("2024-01-15T12:30:00+02:00").unwrap(),
        at(2024, 1, 15, 10, 30, 0)
    );
    assert_eq!(
        parse_timestamp("next tuesday"),
        Err(ClockError::InvalidTimestamp {
            input: "next tuesday".to_string()
        })
    );
}
