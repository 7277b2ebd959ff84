use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::clock::Clock;

type Event = Box<dyn FnOnce() + Send>;

struct ClockState {
    now: DateTime<Utc>,
    slept: Duration,
    sleeps: usize,
    events: Vec<(DateTime<Utc>, Event)>,
}

/// Simulated time. `sleep` returns at once after moving the clock forward;
/// events scheduled with [`ManualClock::at`] fire as soon as the clock
/// passes their time, which is how tests make files appear mid-night.
#[derive(Clone)]
pub struct ManualClock {
    state: Arc<Mutex<ClockState>>,
}

impl ManualClock {
    pub fn starting_at(now: DateTime<Utc>) -> Self {
        Self {
            state: Arc::new(Mutex::new(ClockState {
                now,
                slept: Duration::ZERO,
                sleeps: 0,
                events: Vec::new(),
            })),
        }
    }

    pub fn at_epoch() -> Self {
        Self::starting_at(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// Run `event` once the clock reaches `when`.
    pub fn at(&self, when: DateTime<Utc>, event: impl FnOnce() + Send + 'static) {
        self.state
            .lock()
            .unwrap()
            .events
            .push((when, Box::new(event)));
    }

    pub fn advance(&self, by: Duration) {
        let due = {
            let mut state = self.state.lock().unwrap();
            state.now += chrono::Duration::from_std(by).unwrap_or(chrono::Duration::zero());
            let now = state.now;
            let (due, pending): (Vec<_>, Vec<_>) =
                state.events.drain(..).partition(|(when, _)| *when <= now);
            state.events = pending;
            due
        };
        for (_, event) in due {
            event();
        }
    }

    /// Total simulated time spent sleeping.
    pub fn slept(&self) -> Duration {
        self.state.lock().unwrap().slept
    }

    pub fn sleep_count(&self) -> usize {
        self.state.lock().unwrap().sleeps
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.state.lock().unwrap().now
    }

    async fn sleep(&self, duration: Duration) {
        {
            let mut state = self.state.lock().unwrap();
            state.slept += duration;
            state.sleeps += 1;
        }
        self.advance(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn test_sleep_advances_and_fires_events() {
        let clock = ManualClock::at_epoch();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        clock.at(
            DateTime::<Utc>::UNIX_EPOCH + chrono::Duration::seconds(60),
            move || flag.store(true, Ordering::SeqCst),
        );

        clock.sleep(Duration::from_secs(30)).await;
        assert!(!fired.load(Ordering::SeqCst));
        clock.sleep(Duration::from_secs(30)).await;
        assert!(fired.load(Ordering::SeqCst));

        assert_eq!(clock.slept(), Duration::from_secs(60));
        assert_eq!(clock.sleep_count(), 2);
        assert_eq!(
            clock.now(),
            DateTime::<Utc>::UNIX_EPOCH + chrono::Duration::seconds(60)
        );
    }
}
