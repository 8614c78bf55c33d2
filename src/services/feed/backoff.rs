use std::time::Duration;

/// Reconnect delay: starts at `initial`, grows by `multiplier` after every
/// attempt, never exceeds `max`, and drops back to `initial` on success.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    initial: Duration,
    current: Duration,
    multiplier: f64,
    max: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), 1.5, Duration::from_secs(15))
    }
}

impl Backoff {
    pub fn new(initial: Duration, multiplier: f64, max: Duration) -> Self {
        Self {
            initial,
            current: initial.min(max),
            multiplier,
            max,
        }
    }

    pub fn current(&self) -> Duration {
        self.current
    }

    /// Delay to wait now; the following call returns a longer one.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.mul_f64(self.multiplier).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial.min(self.max);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_by_half_and_caps() {
        let mut backoff = Backoff::default();
        let delays: Vec<u128> = (0..9).map(|_| backoff.next_delay().as_millis()).collect();

        assert_eq!(delays[..4], [1000, 1500, 2250, 3375]);
        assert!(delays.windows(2).all(|pair| pair[0] <= pair[1]));
        assert_eq!(backoff.current(), Duration::from_secs(15));
        assert_eq!(backoff.next_delay(), Duration::from_secs(15));
    }

    #[test]
    fn reset_returns_to_initial() {
        let mut backoff = Backoff::default();
        backoff.next_delay();
        backoff.next_delay();

        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }
}
