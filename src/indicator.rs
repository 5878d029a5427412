//! Blink patterns for a single status light.

use std::time::Duration;

use crate::types::AggregateOutcome;

/// A number of equal on/off pulses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlinkPattern {
    /// Number of pulses.
    pub pulses: u32,
    /// On time and off time of each pulse.
    pub interval: Duration,
}

impl BlinkPattern {
    /// Played once the controller is ready.
    pub const STARTUP: Self = Self::new(3, Duration::from_millis(200));

    /// A cycle succeeded: few slow pulses.
    pub const SUCCESS: Self = Self::new(2, Duration::from_millis(500));

    /// A cycle failed: many fast pulses.
    pub const FAILURE: Self = Self::new(5, Duration::from_millis(100));

    /// Creates a pattern.
    #[must_use]
    pub const fn new(pulses: u32, interval: Duration) -> Self {
        Self { pulses, interval }
    }

    /// Picks the pattern reporting a cycle outcome.
    #[must_use]
    pub fn for_outcome(outcome: &AggregateOutcome) -> Self {
        if outcome.succeeded() {
            Self::SUCCESS
        } else {
            Self::FAILURE
        }
    }

    /// Total playing time.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.interval * self.pulses * 2
    }
}

/// A light that can be switched on and off.
pub trait Indicator: Send {
    /// Switches the light.
    fn set(&mut self, on: bool);
}

/// Plays a pattern. The light is off when this returns.
pub async fn play<I: Indicator + ?Sized>(indicator: &mut I, pattern: BlinkPattern) {
    for _ in 0..pattern.pulses {
        indicator.set(true);
        tokio::time::sleep(pattern.interval).await;
        indicator.set(false);
        tokio::time::sleep(pattern.interval).await;
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::Instant;

    use super::*;
    use crate::protocol::Intent;
    use crate::types::{DeviceAddress, DeviceKind, DispatchOutcome, Target};

    #[derive(Default)]
    struct Recorder {
        states: Vec<bool>,
    }

    impl Indicator for Recorder {
        fn set(&mut self, on: bool) {
            self.states.push(on);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_failure_pattern() {
        let mut led = Recorder::default();

        let started = Instant::now();
        play(&mut led, BlinkPattern::FAILURE).await;

        assert_eq!(started.elapsed(), Duration::from_millis(1000));
        assert_eq!(led.states.len(), 10);
        assert_eq!(led.states.last(), Some(&false));
        assert_eq!(BlinkPattern::FAILURE.duration(), started.elapsed());
    }

    #[test]
    fn test_pattern_for_outcome() {
        let empty = AggregateOutcome::new(Intent::Wake, Target::All, Vec::new());
        assert_eq!(BlinkPattern::for_outcome(&empty), BlinkPattern::FAILURE);

        let ok = AggregateOutcome::new(
            Intent::Wake,
            Target::All,
            vec![DispatchOutcome::written(
                DeviceAddress::new([1, 2, 3, 4, 5, 6]),
                DeviceKind::Gen2,
            )],
        );
        assert_eq!(BlinkPattern::for_outcome(&ok), BlinkPattern::SUCCESS);
        assert_eq!(BlinkPattern::STARTUP.pulses, 3);
    }
}
