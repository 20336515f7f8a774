//! Poll cadence and failure backoff.

use std::time::Duration;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_BACKOFF_CAP: Duration = Duration::from_secs(16);

/// How the delay evolves after a failed poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryMode {
    /// Double the previous delay, up to the cap.
    #[default]
    Exponential,
    /// Always retry after the base interval.
    Fixed,
}

impl std::str::FromStr for RetryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exponential" => Ok(RetryMode::Exponential),
            "fixed" => Ok(RetryMode::Fixed),
            other => Err(format!("unknown retry mode: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub backoff_cap: Duration,
    pub retry_mode: RetryMode,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            backoff_cap: DEFAULT_BACKOFF_CAP,
            retry_mode: RetryMode::default(),
        }
    }
}

/// Computes the delay before the next poll.
///
/// The scheduler only tracks the last delay it handed out; arming the timer
/// is the session's job.
#[derive(Debug, Clone)]
pub struct PollScheduler {
    policy: PollPolicy,
    current: Duration,
}

impl PollScheduler {
    pub fn new(policy: PollPolicy) -> Self {
        Self {
            current: policy.interval,
            policy,
        }
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Delay of the first poll after discovery.
    pub fn first_delay(&mut self) -> Duration {
        self.current = self.policy.interval;
        self.current
    }

    pub fn after_success(&mut self) -> Duration {
        self.current = self.policy.interval;
        self.current
    }

    pub fn after_failure(&mut self) -> Duration {
        self.current = match self.policy.retry_mode {
            RetryMode::Exponential => self.current.saturating_mul(2).min(self.policy.backoff_cap),
            RetryMode::Fixed => self.policy.interval,
        };
        self.current
    }

    pub fn current_delay(&self) -> Duration {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_backoff_doubles_up_to_cap() {
        let mut scheduler = PollScheduler::new(PollPolicy::default());
        assert_eq!(scheduler.first_delay(), Duration::from_secs(1));

        let delays: Vec<u64> = (0..6).map(|_| scheduler.after_failure().as_secs()).collect();
        assert_eq!(delays, vec![2, 4, 8, 16, 16, 16]);
    }

    #[test]
    fn success_resets_backoff() {
        let mut scheduler = PollScheduler::new(PollPolicy::default());
        scheduler.after_failure();
        scheduler.after_failure();
        assert_eq!(scheduler.after_success(), Duration::from_secs(1));
        assert_eq!(scheduler.after_failure(), Duration::from_secs(2));
    }

    #[test]
    fn fixed_mode_keeps_base_interval() {
        let mut scheduler = PollScheduler::new(PollPolicy {
            retry_mode: RetryMode::Fixed,
            ..PollPolicy::default()
        });
        for _ in 0..5 {
            assert_eq!(scheduler.after_failure(), Duration::from_secs(1));
        }
    }

    #[test]
    fn huge_interval_saturates_instead_of_overflowing() {
        let huge = Duration::from_secs(u64::MAX / 2 + 1);
        let mut scheduler = PollScheduler::new(PollPolicy {
            interval: huge,
            ..PollPolicy::default()
        });
        assert_eq!(scheduler.after_failure(), Duration::from_secs(16));

        let mut uncapped = PollScheduler::new(PollPolicy {
            interval: huge,
            backoff_cap: Duration::MAX,
            ..PollPolicy::default()
        });
        assert_eq!(uncapped.after_failure(), Duration::MAX);
        assert_eq!(uncapped.after_failure(), Duration::MAX);
    }

    #[test]
    fn retry_mode_from_str() {
        assert_eq!("Fixed".parse::<RetryMode>(), Ok(RetryMode::Fixed));
        assert_eq!("exponential".parse::<RetryMode>(), Ok(RetryMode::Exponential));
        assert!("linear".parse::<RetryMode>().is_err());
    }
}
