//! Backoff strategies for the retrying invoker.
//!
//! Every strategy is stateless. The exponential family uses a fixed exponent
//! of 2, so its delay does not grow with the attempt number; callers that
//! want growth should combine a higher retry count with their own checker.

use std::time::Duration;

use rand::Rng;
use serde::Deserialize;

pub const BASE_DELAY: Duration = Duration::from_millis(5);
pub const MAX_DELAY: Duration = Duration::from_millis(60_000);

const EXPONENT: u32 = 2;

pub trait BackoffStrategy: Send + Sync {
    fn compute_delay_before_next_retry(&self) -> Duration;
}

/// No wait between attempts.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBackoff;

impl BackoffStrategy for NoBackoff {
    fn compute_delay_before_next_retry(&self) -> Duration {
        Duration::ZERO
    }
}

/// `min(MAX_DELAY, BASE_DELAY * 3^2)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Exponential;

impl BackoffStrategy for Exponential {
    fn compute_delay_before_next_retry(&self) -> Duration {
        exponential_delay()
    }
}

/// Uniform in `[0, exponential]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomJitter;

impl BackoffStrategy for RandomJitter {
    fn compute_delay_before_next_retry(&self) -> Duration {
        let ceiling = nanos(exponential_delay());
        Duration::from_nanos(rand::thread_rng().gen_range(0..=ceiling))
    }
}

/// Half the exponential delay plus a uniform share of the other half.
#[derive(Debug, Clone, Copy, Default)]
pub struct EqualJitter;

impl BackoffStrategy for EqualJitter {
    fn compute_delay_before_next_retry(&self) -> Duration {
        let half = exponential_delay() / 2;
        half + Duration::from_nanos(rand::thread_rng().gen_range(0..=nanos(half)))
    }
}

/// `min(MAX_DELAY, uniform[BASE_DELAY, 3 * BASE_DELAY])`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecorrelatedJitter;

impl BackoffStrategy for DecorrelatedJitter {
    fn compute_delay_before_next_retry(&self) -> Duration {
        let base = nanos(BASE_DELAY);
        let delay = rand::thread_rng().gen_range(base..=base * 3);
        Duration::from_nanos(delay).min(MAX_DELAY)
    }
}

/// Named strategies, e.g. for configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    #[default]
    None,
    Exponential,
    RandomJitter,
    EqualJitter,
    DecorrelatedJitter,
}

impl Strategy {
    pub fn backoff(self) -> Box<dyn BackoffStrategy> {
        match self {
            Strategy::None => Box::new(NoBackoff),
            Strategy::Exponential => Box::new(Exponential),
            Strategy::RandomJitter => Box::new(RandomJitter),
            Strategy::EqualJitter => Box::new(EqualJitter),
            Strategy::DecorrelatedJitter => Box::new(DecorrelatedJitter),
        }
    }
}

fn exponential_delay() -> Duration {
    (BASE_DELAY * 3u32.pow(EXPONENT)).min(MAX_DELAY)
}

fn nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: usize = 2_000;

    #[test]
    fn none_is_always_zero() {
        for _ in 0..10 {
            assert_eq!(NoBackoff.compute_delay_before_next_retry(), Duration::ZERO);
        }
    }

    #[test]
    fn exponential_is_fixed_at_nine_base_delays() {
        assert_eq!(Exponential.compute_delay_before_next_retry(), Duration::from_millis(45));
    }

    #[test]
    fn random_jitter_stays_within_exponential() {
        let ceiling = (BASE_DELAY * 9).min(MAX_DELAY);
        for _ in 0..SAMPLES {
            assert!(RandomJitter.compute_delay_before_next_retry() <= ceiling);
        }
    }

    #[test]
    fn equal_jitter_keeps_half() {
        let mut near_floor = 0;
        for _ in 0..SAMPLES {
            let delay = EqualJitter.compute_delay_before_next_retry();
            assert!(delay >= Duration::from_micros(22_500));
            assert!(delay <= Duration::from_millis(45));
            if delay < Duration::from_millis(23) {
                near_floor += 1;
            }
        }
        // Sub-millisecond precision: some samples land in [22.5ms, 23ms).
        assert!(near_floor > 0);
    }

    #[test]
    fn decorrelated_jitter_range() {
        for _ in 0..SAMPLES {
            let delay = DecorrelatedJitter.compute_delay_before_next_retry();
            assert!(delay >= BASE_DELAY);
            assert!(delay <= BASE_DELAY * 3);
        }
    }

    #[test]
    fn strategy_names_deserialize() {
        let strategy: Strategy = serde_json::from_str(r#""equal_jitter""#).unwrap();
        assert_eq!(strategy, Strategy::EqualJitter);
        assert_eq!(
            Strategy::None.backoff().compute_delay_before_next_retry(),
            Duration::ZERO
        );
    }
}
