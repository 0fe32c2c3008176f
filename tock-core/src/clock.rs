//! Virtual clock: every temporal comparison in tock reads time from here.
//!
//! A [`Clock`] wraps a real [`TimeSource`] and applies two adjustments:
//! - an anchor pair (real instant, virtual instant) set by [`Clock::suppose_it_is`]
//! - a speed factor applied to real time elapsed since the anchor
//!
//! `now = virtual_anchor + (real_now - real_anchor) * speed`
//!
//! Production code only ever calls [`Clock::now`]. The mutators exist so that
//! tests (and demos) can jump to a moment or make days pass in seconds.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::sync::Arc;

/// Where real time comes from.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemSource;

impl TimeSource for SystemSource {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Hand-driven time source for tests.
#[derive(Debug, Clone)]
pub struct ManualSource {
    current: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualSource {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current: Arc::new(Mutex::new(start)),
        }
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        *self.current.lock() = instant;
    }

    pub fn advance(&self, by: Duration) {
        *self.current.lock() += by;
    }
}

impl TimeSource for ManualSource {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock()
    }
}

#[derive(Debug, Clone, Copy)]
struct Anchor {
    real: DateTime<Utc>,
    virtual_: DateTime<Utc>,
    speed: f64,
}

/// Shared, cheaply clonable clock handle.
#[derive(Clone)]
pub struct Clock {
    source: Arc<dyn TimeSource>,
    anchor: Arc<Mutex<Anchor>>,
}

impl std::fmt::Debug for Clock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let anchor = *self.anchor.lock();
        f.debug_struct("Clock")
            .field("real_anchor", &anchor.real)
            .field("virtual_anchor", &anchor.virtual_)
            .field("speed", &anchor.speed)
            .finish()
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::system()
    }
}

impl Clock {
    pub fn new(source: Arc<dyn TimeSource>) -> Self {
        let real = source.now();
        Self {
            source,
            anchor: Arc::new(Mutex::new(Anchor {
                real,
                virtual_: real,
                speed: 1.0,
            })),
        }
    }

    pub fn system() -> Self {
        Self::new(Arc::new(SystemSource))
    }

    /// Clock driven by a [`ManualSource`] starting at `start`.
    pub fn manual(start: DateTime<Utc>) -> (Self, ManualSource) {
        let source = ManualSource::new(start);
        (Self::new(Arc::new(source.clone())), source)
    }

    pub fn now(&self) -> DateTime<Utc> {
        let anchor = *self.anchor.lock();
        Self::project(&anchor, self.source.now())
    }

    /// From now on, `now()` continues from `instant`.
    pub fn suppose_it_is(&self, instant: DateTime<Utc>) {
        let real = self.source.now();
        let mut anchor = self.anchor.lock();
        anchor.real = real;
        anchor.virtual_ = instant;
    }

    /// Make virtual time pass `factor` times faster than real time.
    ///
    /// Re-anchors at the current virtual instant so there is no jump.
    pub fn set_speed(&self, factor: f64) {
        let real = self.source.now();
        let mut anchor = self.anchor.lock();
        anchor.virtual_ = Self::project(&anchor, real);
        anchor.real = real;
        anchor.speed = factor;
    }

    pub fn speed(&self) -> f64 {
        self.anchor.lock().speed
    }

    /// Shift virtual time forward by a fixed offset.
    pub fn advance(&self, by: Duration) {
        let now = self.now();
        self.suppose_it_is(now + by);
    }

    fn project(anchor: &Anchor, real: DateTime<Utc>) -> DateTime<Utc> {
        let elapsed = real - anchor.real;
        if anchor.speed == 1.0 {
            return anchor.virtual_ + elapsed;
        }
        let micros = elapsed.num_microseconds().unwrap_or(i64::MAX) as f64 * anchor.speed;
        anchor.virtual_ + Duration::microseconds(micros as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap()
    }

    #[test]
    fn follows_source_at_normal_speed() {
        let (clock, source) = Clock::manual(start());
        source.advance(Duration::seconds(5));
        assert_eq!(clock.now(), start() + Duration::seconds(5));
    }

    #[test]
    fn suppose_it_is_shifts_all_future_reads() {
        let (clock, source) = Clock::manual(start());
        let target = Utc.with_ymd_and_hms(2026, 12, 25, 7, 59, 59).unwrap();
        clock.suppose_it_is(target);
        assert_eq!(clock.now(), target);
        source.advance(Duration::seconds(1));
        assert_eq!(clock.now(), target + Duration::seconds(1));
    }

    #[test]
    fn speed_multiplies_elapsed_real_time() {
        let (clock, source) = Clock::manual(start());
        clock.set_speed(600.0);
        source.advance(Duration::seconds(6));
        assert_eq!(clock.now(), start() + Duration::hours(1));
    }

    #[test]
    fn suppose_and_speed_compose() {
        let (clock, source) = Clock::manual(start());
        clock.set_speed(10.0);
        source.advance(Duration::seconds(1));
        assert_eq!(clock.now(), start() + Duration::seconds(10));

        let target = Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap();
        clock.suppose_it_is(target);
        source.advance(Duration::seconds(2));
        assert_eq!(clock.now(), target + Duration::seconds(20));

        clock.set_speed(1.0);
        source.advance(Duration::seconds(3));
        assert_eq!(clock.now(), target + Duration::seconds(23));
    }

    #[test]
    fn advance_is_a_fixed_offset() {
        let (clock, _source) = Clock::manual(start());
        clock.advance(Duration::days(3));
        assert_eq!(clock.now(), start() + Duration::days(3));
    }
}
