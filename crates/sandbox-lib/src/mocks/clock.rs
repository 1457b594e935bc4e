use super::ClockError;
use super::behavior::MockHandle;
use super::registry::MockRegistry;
use crate::host::Clock;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use serde_json::Value;
use tracing::{debug, warn};

/// Symbol under which clock reads are recorded
pub const CLOCK_SYMBOL: &str = "$clock";

#[derive(Debug, Clone)]
pub(crate) struct ClockState {
    pub(crate) handle: MockHandle,
    frozen_at: Option<DateTime<Utc>>,
    ticking: bool,
    /// Live instant at which `frozen_at` was last set
    anchor: DateTime<Utc>,
}

impl ClockState {
    pub(crate) fn new(handle: MockHandle) -> Self {
        Self {
            handle,
            frozen_at: None,
            ticking: false,
            anchor: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    /// Frozen instant plus elapsed live time in tick mode, saturating at the
    /// representable range
    fn logical_now(&self, live_now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let frozen_at = self.frozen_at?;
        if !self.ticking {
            return Some(frozen_at);
        }
        let elapsed = live_now.signed_duration_since(self.anchor);
        Some(frozen_at.checked_add_signed(elapsed).unwrap_or(
            if elapsed < TimeDelta::zero() {
                DateTime::<Utc>::MIN_UTC
            } else {
                DateTime::<Utc>::MAX_UTC
            },
        ))
    }

    fn rebase(&mut self, instant: DateTime<Utc>, live_now: DateTime<Utc>) {
        self.frozen_at = Some(instant);
        self.anchor = live_now;
    }
}

/// Clock that resolves "now" through a frozen logical instant
///
/// While unfrozen every read is the live time. Once frozen, reads return the
/// frozen instant, plus the real time elapsed since freezing in tick mode.
/// Reads are recorded on the `$clock` mock so expectations apply to them. A
/// value configured on that mock (a timestamp string or Unix seconds) replaces
/// the logical instant for that read.
pub struct ClockInterceptor {
    registry: MockRegistry,
    live: Box<dyn Clock>,
}

impl ClockInterceptor {
    pub fn new(registry: MockRegistry, live: Box<dyn Clock>) -> Self {
        Self { registry, live }
    }

    pub fn live(&self) -> &dyn Clock {
        self.live.as_ref()
    }

    /// The `$clock` mock, registered on first use
    pub fn handle(&self) -> MockHandle {
        self.registry.clock_handle()
    }

    /// Freeze at `instant` with tick mode off
    pub fn freeze_at(&self, instant: DateTime<Utc>) -> MockHandle {
        let live_now = self.live.now();
        self.registry.with_clock(|clock| {
            clock.ticking = false;
            clock.rebase(instant, live_now);
        });
        debug!(%instant, "Clock frozen");
        let handle = self.handle();
        handle.enable();
        handle
    }

    /// Freeze at `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DD` or an RFC 3339 timestamp (UTC)
    pub fn freeze_at_str(&self, input: &str) -> Result<MockHandle, ClockError> {
        Ok(self.freeze_at(parse_timestamp(input)?))
    }

    pub fn freeze_now(&self) -> MockHandle {
        self.freeze_at(self.live.now())
    }

    /// Move the frozen instant forward
    pub fn advance(&self, by: TimeDelta) -> Result<DateTime<Utc>, ClockError> {
        self.shift(by)
    }

    /// Move the frozen instant backward
    pub fn rewind(&self, by: TimeDelta) -> Result<DateTime<Utc>, ClockError> {
        self.shift(-by)
    }

    fn shift(&self, by: TimeDelta) -> Result<DateTime<Utc>, ClockError> {
        let live_now = self.live.now();
        let shifted = self.registry.with_clock(|clock| {
            let now = clock.logical_now(live_now).ok_or(ClockError::NotFrozen)?;
            let shifted = now
                .checked_add_signed(by)
                .ok_or(ClockError::OutOfRange { from: now, by })?;
            clock.rebase(shifted, live_now);
            Ok(shifted)
        })?;
        debug!(%shifted, delta_seconds = by.num_seconds(), "Clock moved");
        Ok(shifted)
    }

    /// Jump to `instant`, keeping the tick mode; freezes an unfrozen clock
    pub fn set(&self, instant: DateTime<Utc>) {
        let live_now = self.live.now();
        self.registry.with_clock(|clock| clock.rebase(instant, live_now));
        self.handle().enable();
    }

    /// Let real elapsed time accumulate on top of the frozen instant
    pub fn tick(&self, enabled: bool) {
        let live_now = self.live.now();
        self.registry.with_clock(|clock| {
            if let Some(now) = clock.logical_now(live_now) {
                clock.rebase(now, live_now);
            }
            clock.ticking = enabled;
        });
    }

    /// Return to live time. The `$clock` mock stops recording but keeps its history.
    pub fn unfreeze(&self) {
        if let Some(state) = self.registry.clock_state() {
            self.registry.with_clock(|clock| {
                clock.frozen_at = None;
                clock.ticking = false;
            });
            state.handle.disable();
            debug!("Clock unfrozen");
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.registry
            .clock_state()
            .is_some_and(|state| state.frozen_at.is_some())
    }

    pub fn is_ticking(&self) -> bool {
        self.registry.clock_state().is_some_and(|state| state.ticking)
    }

    pub fn is_before(&self, instant: DateTime<Utc>) -> bool {
        self.now() < instant
    }

    pub fn is_after(&self, instant: DateTime<Utc>) -> bool {
        self.now() > instant
    }
}

impl Clock for ClockInterceptor {
    fn now(&self) -> DateTime<Utc> {
        let live_now = self.live.now();
        let Some(state) = self.registry.clock_state() else {
            return live_now;
        };

        let now = state.logical_now(live_now).unwrap_or(live_now);
        let logical = Value::String(now.to_rfc3339());
        match state.handle.dispatch(&[], |_| Ok(logical.clone())) {
            Ok(value) if value == logical => now,
            Ok(value) => instant_from_value(&value).unwrap_or_else(|| {
                warn!(
                    %value,
                    "Clock mock returned a value that is not an instant; using the logical time"
                );
                now
            }),
            Err(e) => {
                warn!(error = %e, "Clock mock returned an error; using the logical time");
                now
            }
        }
    }
}

/// A configured clock value: a timestamp string or Unix seconds
fn instant_from_value(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(text) => parse_timestamp(text).ok(),
        Value::Number(seconds) => DateTime::from_timestamp(seconds.as_i64()?, 0),
        _ => None,
    }
}

pub(crate) fn parse_timestamp(input: &str) -> Result<DateTime<Utc>, ClockError> {
    let trimmed = input.trim();
    if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S") {
        return Ok(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        && let Some(midnight) = date.and_hms_opt(0, 0, 0)
    {
        return Ok(midnight.and_utc());
    }
    DateTime::parse_from_rfc3339(trimmed)
        .map(|instant| instant.with_timezone(&Utc))
        .map_err(|_| ClockError::InvalidTimestamp {
            input: input.to_string(),
        })
}

#[cfg(test)]
mod tests {
    include!("clock.test.rs");
}
