use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

pub type Pause = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock stuck at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// The "thinking" pause between a user message and the bot's answer.
pub trait ResponseDelay: Send + Sync {
    fn pause(&self) -> Pause;
}

/// Resolves immediately.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDelay;

impl ResponseDelay for NoDelay {
    fn pause(&self) -> Pause {
        Box::pin(std::future::ready(()))
    }
}

/// Sleeps for a duration drawn uniformly from `[min, max)`.
pub struct TypingDelay {
    min: Duration,
    max: Duration,
    rng: Mutex<StdRng>,
}

impl TypingDelay {
    pub fn new(min: Duration, max: Duration, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            min,
            max: max.max(min),
            rng: Mutex::new(rng),
        }
    }

    pub fn next_duration(&self) -> Duration {
        if self.max == self.min {
            return self.min;
        }
        self.rng.lock().gen_range(self.min..self.max)
    }
}

impl ResponseDelay for TypingDelay {
    fn pause(&self) -> Pause {
        let duration = self.next_duration();
        log::trace!("Simulated typing for {:?}", duration);
        Box::pin(tokio::time::sleep(duration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draws_stay_in_range() {
        let delay = TypingDelay::new(Duration::from_millis(1000), Duration::from_millis(2000), Some(3));
        for _ in 0..200 {
            let d = delay.next_duration();
            assert!(d >= Duration::from_millis(1000) && d < Duration::from_millis(2000));
        }
    }

    #[test]
    fn same_seed_same_delays() {
        let a = TypingDelay::new(Duration::from_millis(10), Duration::from_millis(20), Some(9));
        let b = TypingDelay::new(Duration::from_millis(10), Duration::from_millis(20), Some(9));
        let draws = |d: &TypingDelay| (0..5).map(|_| d.next_duration()).collect::<Vec<_>>();
        assert_eq!(draws(&a), draws(&b));
    }

    #[test]
    fn degenerate_range_is_fixed() {
        let delay = TypingDelay::new(Duration::from_millis(5), Duration::from_millis(1), None);
        assert_eq!(delay.next_duration(), Duration::from_millis(5));
    }

    #[tokio::test]
    async fn no_delay_resolves_at_once() {
        NoDelay.pause().await;
    }
}
