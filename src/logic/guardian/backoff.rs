//! Failure backoff for automatic retraining.
//!
//! After `max_failures` consecutive failed cycles, automatic triggering is
//! suspended until `now + cooldown`. A success resets the counter.

use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone)]
pub struct FailureBackoff {
    max_failures: u32,
    cooldown: Duration,
    consecutive: u32,
    suspended_until: Option<DateTime<Utc>>,
}

impl FailureBackoff {
    pub fn new(max_failures: u32, cooldown_secs: u64) -> Self {
        Self {
            max_failures: max_failures.max(1),
            cooldown: Duration::seconds(cooldown_secs.min(i64::MAX as u64) as i64),
            consecutive: 0,
            suspended_until: None,
        }
    }

    /// Count a failure. Returns the suspension end if this one tripped it.
    pub fn record_failure(&mut self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.consecutive += 1;
        if self.consecutive >= self.max_failures {
            let until = now + self.cooldown;
            self.suspended_until = Some(until);
            self.consecutive = 0;
            return Some(until);
        }
        None
    }

    pub fn record_success(&mut self) {
        self.consecutive = 0;
        self.suspended_until = None;
    }

    /// `Err(until)` while suspended
    pub fn check(&mut self, now: DateTime<Utc>) -> Result<(), DateTime<Utc>> {
        match self.suspended_until {
            Some(until) if now < until => Err(until),
            Some(_) => {
                self.suspended_until = None;
                Ok(())
            }
            None => Ok(()),
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive
    }

    pub fn suspended_until(&self) -> Option<DateTime<Utc>> {
        self.suspended_until
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suspends_after_max_failures() {
        let now = Utc::now();
        let mut backoff = FailureBackoff::new(3, 600);

        assert!(backoff.record_failure(now).is_none());
        assert!(backoff.record_failure(now).is_none());
        let until = backoff.record_failure(now).unwrap();
        assert_eq!(until, now + Duration::seconds(600));

        assert!(backoff.check(now + Duration::seconds(599)).is_err());
        assert!(backoff.check(now + Duration::seconds(600)).is_ok());
        assert!(backoff.suspended_until().is_none());
    }

    #[test]
    fn test_success_resets() {
        let now = Utc::now();
        let mut backoff = FailureBackoff::new(2, 60);
        backoff.record_failure(now);
        backoff.record_success();
        assert_eq!(backoff.consecutive_failures(), 0);
        assert!(backoff.record_failure(now).is_none());
    }
}
