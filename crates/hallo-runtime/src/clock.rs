//! Time-tick events.
//!
//! A [`Clock`] turns wall-clock readings into tick events: a `second` event
//! on every reading, and `minute`, `hour` and `day` events when the reading
//! crosses into a new minute, hour or day (UTC). [`run_clock`] drives one
//! from a tokio interval and hands each tick to passive dispatch on the
//! blocking pool, so a slow periodic function never stalls the async
//! workers.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, Timelike, Utc};
use hallo_core::Event;
use hallo_framework::Dispatcher;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, trace};

/// Tracks the last reading to detect boundaries.
#[derive(Debug, Clone, Default)]
pub struct Clock {
    last: Option<DateTime<Utc>>,
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from `now`, so the first tick only emits `second`.
    pub fn starting_at(now: DateTime<Utc>) -> Self {
        Self { last: Some(now) }
    }

    /// Events due at `now`, coarsest last.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<Event> {
        let mut events = vec![Event::second()];
        if let Some(last) = self.last.replace(now) {
            let new_day = now.date_naive() != last.date_naive();
            let new_hour = new_day || now.hour() != last.hour();
            let new_minute = new_hour || now.minute() != last.minute();
            if new_minute {
                events.push(Event::minute());
            }
            if new_hour {
                events.push(Event::hour());
            }
            if new_day {
                trace!(day = now.ordinal(), "Day boundary");
                events.push(Event::day());
            }
        }
        events
    }
}

/// Ticks every `period` until `shutdown` turns true.
pub async fn run_clock(
    dispatcher: Arc<Dispatcher>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut clock = Clock::starting_at(Utc::now());
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    debug!(period_ms = period.as_millis() as u64, "Clock started");

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
        }

        let events = clock.tick(Utc::now());
        let dispatcher = Arc::clone(&dispatcher);
        let result = tokio::task::spawn_blocking(move || {
            for event in &events {
                dispatcher.dispatch_passive(event);
            }
        })
        .await;
        if let Err(e) = result {
            error!(error = %e, "Tick dispatch task failed");
        }
    }
    debug!("Clock stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use hallo_core::EventType;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, h, m, s).unwrap()
    }

    fn types(events: &[Event]) -> Vec<EventType> {
        events.iter().map(Event::event_type).collect()
    }

    #[test]
    fn test_first_tick_is_second_only() {
        let mut clock = Clock::new();
        assert_eq!(types(&clock.tick(at(10, 0, 0))), vec![EventType::Second]);
    }

    #[test]
    fn test_boundaries() {
        let mut clock = Clock::starting_at(at(10, 15, 58));
        assert_eq!(types(&clock.tick(at(10, 15, 59))), vec![EventType::Second]);
        assert_eq!(
            types(&clock.tick(at(10, 16, 0))),
            vec![EventType::Second, EventType::Minute]
        );
        let mut clock = Clock::starting_at(at(10, 59, 59));
        assert_eq!(
            types(&clock.tick(at(11, 0, 0))),
            vec![EventType::Second, EventType::Minute, EventType::Hour]
        );
    }

    #[test]
    fn test_day_boundary() {
        let mut clock = Clock::starting_at(at(23, 59, 59));
        let next = Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap();
        assert_eq!(
            types(&clock.tick(next)),
            vec![
                EventType::Second,
                EventType::Minute,
                EventType::Hour,
                EventType::Day
            ]
        );
    }

    #[test]
    fn test_skipped_readings_still_cross_boundaries() {
        // Same minute number, different hour.
        let mut clock = Clock::starting_at(at(10, 5, 0));
        let events = clock.tick(at(11, 5, 0));
        assert!(types(&events).contains(&EventType::Hour));
        assert!(types(&events).contains(&EventType::Minute));
    }
}
