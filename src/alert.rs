use crate::history::AlertHistory;
use chrono::{DateTime, Duration, Utc};

/// Source of "now" for cooldown decisions and history timestamps.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Minimum gap between two alerts for the same listing.
pub fn cooldown() -> Duration {
    Duration::hours(2)
}

#[derive(Debug, Clone)]
pub struct CooldownPolicy {
    window: Duration,
}

impl Default for CooldownPolicy {
    fn default() -> Self {
        Self::new(cooldown())
    }
}

impl CooldownPolicy {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    /// True when `id` was never alerted or its last alert is at least one
    /// window old. The boundary itself is allowed.
    pub fn can_alert(&self, id: &str, history: &AlertHistory, now: DateTime<Utc>) -> bool {
        match history.last_alert(id) {
            None => true,
            Some(last) => now.signed_duration_since(last) >= self.window,
        }
    }

    pub fn record(&self, history: &mut AlertHistory, id: &str, now: DateTime<Utc>) {
        history.insert(id, now);
    }
}

#[cfg(test)]
mod tests {
    use super::CooldownPolicy;
    use crate::history::AlertHistory;
    use chrono::{Duration, TimeZone, Utc};

    #[test]
    fn allows_unknown_listing() {
        let policy = CooldownPolicy::default();
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 18, 0, 0).unwrap();
        assert!(policy.can_alert("42", &AlertHistory::default(), now));
    }

    #[test]
    fn boundary_is_inclusive() {
        let policy = CooldownPolicy::default();
        let t = Utc.with_ymd_and_hms(2024, 6, 1, 18, 0, 0).unwrap();
        let mut history = AlertHistory::default();
        policy.record(&mut history, "42", t);

        assert!(policy.can_alert("42", &history, t + Duration::hours(2)));
        assert!(!policy.can_alert(
            "42",
            &history,
            t + Duration::hours(2) - Duration::seconds(1)
        ));
    }

    #[test]
    fn cooldown_is_per_listing() {
        let policy = CooldownPolicy::default();
        let t = Utc.with_ymd_and_hms(2024, 6, 1, 18, 0, 0).unwrap();
        let mut history = AlertHistory::default();
        policy.record(&mut history, "42", t);

        assert!(!policy.can_alert("42", &history, t + Duration::minutes(5)));
        assert!(policy.can_alert("43", &history, t + Duration::minutes(5)));
    }

    #[test]
    fn record_overwrites_previous_alert() {
        let policy = CooldownPolicy::default();
        let t = Utc.with_ymd_and_hms(2024, 6, 1, 18, 0, 0).unwrap();
        let later = t + Duration::hours(3);
        let mut history = AlertHistory::default();
        policy.record(&mut history, "42", t);
        policy.record(&mut history, "42", later);

        assert_eq!(history.len(), 1);
        assert_eq!(history.last_alert("42"), Some(later));
        assert!(!policy.can_alert("42", &history, later + Duration::hours(1)));
    }

    #[test]
    fn clock_skew_backwards_suppresses() {
        let policy = CooldownPolicy::default();
        let t = Utc.with_ymd_and_hms(2024, 6, 1, 18, 0, 0).unwrap();
        let mut history = AlertHistory::default();
        policy.record(&mut history, "42", t);

        assert!(!policy.can_alert("42", &history, t - Duration::hours(5)));
    }
}
