// Interval planning for recurring jobs and the auto check-in expiry policy

use chrono::{DateTime, Days, TimeZone, Utc};
use chrono_tz::Tz;
use std::time::Duration;

/// Timing plan for one recurring job: a fixed interval, an optional
/// first-fire delay, and an optional hard end instant.
///
/// Without an explicit start delay the first fire lands one full
/// interval after scheduling, never immediately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalPlan {
    pub every: Duration,
    pub start_delay: Option<Duration>,
    pub until: Option<DateTime<Utc>>,
}

impl IntervalPlan {
    pub fn every(every: Duration) -> Self {
        Self {
            every,
            start_delay: None,
            until: None,
        }
    }

    pub fn starting_after(mut self, delay: Duration) -> Self {
        self.start_delay = Some(delay);
        self
    }

    pub fn until(mut self, end: DateTime<Utc>) -> Self {
        self.until = Some(end);
        self
    }

    /// Delay before the first fire: the explicit start delay if set,
    /// otherwise one full interval.
    pub fn first_fire_delay(&self) -> Duration {
        self.start_delay.unwrap_or(self.every)
    }

    /// True once the plan's end instant has passed. A tick landing
    /// exactly on the bound still fires; the next one retires the job.
    pub fn is_exhausted(&self, now: DateTime<Utc>) -> bool {
        match self.until {
            Some(end) => now > end,
            None => false,
        }
    }

    /// Whether at least one fire remains between `now` and the bound.
    /// Unbounded plans always have a next fire.
    pub fn has_fire_before_end(&self, now: DateTime<Utc>) -> bool {
        let Some(end) = self.until else {
            return true;
        };
        match chrono::Duration::from_std(self.first_fire_delay()) {
            Ok(delay) => now + delay <= end,
            Err(_) => false,
        }
    }
}

/// Start of the next calendar day in `tz`, as a UTC instant.
///
/// This is the auto check-in expiry policy: enabling at any point of a
/// local day schedules the job until that day ends. Falls back to a
/// flat 24 hours when the zone skips local midnight (DST transitions).
pub fn next_local_midnight(now: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    let next_day = now.with_timezone(&tz).date_naive() + Days::new(1);
    next_day
        .and_hms_opt(0, 0, 0)
        .and_then(|naive| tz.from_local_datetime(&naive).earliest())
        .map(|local| local.with_timezone(&Utc))
        .unwrap_or_else(|| now + chrono::Duration::hours(24))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_first_fire_delay_defaults_to_interval() {
        let plan = IntervalPlan::every(Duration::from_secs(1080));
        assert_eq!(plan.first_fire_delay(), Duration::from_secs(1080));
    }

    #[test]
    fn test_first_fire_delay_honors_explicit_start_delay() {
        let plan =
            IntervalPlan::every(Duration::from_secs(1080)).starting_after(Duration::from_secs(60));
        assert_eq!(plan.first_fire_delay(), Duration::from_secs(60));
    }

    #[test]
    fn test_tick_on_the_bound_still_fires() {
        let end = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let plan = IntervalPlan::every(Duration::from_secs(1080)).until(end);

        assert!(!plan.is_exhausted(end));
        assert!(plan.is_exhausted(end + chrono::Duration::seconds(1)));
    }

    #[test]
    fn test_unbounded_plan_never_exhausts() {
        let plan = IntervalPlan::every(Duration::from_secs(300));
        let far_future = Utc.with_ymd_and_hms(2099, 1, 1, 0, 0, 0).unwrap();
        assert!(!plan.is_exhausted(far_future));
    }

    #[test]
    fn test_restart_near_the_bound_leaves_no_fire() {
        // 5 minutes left before expiry but the first fire is 18 minutes out
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 23, 55, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 6, 2, 0, 0, 0).unwrap();
        let plan = IntervalPlan::every(Duration::from_secs(18 * 60)).until(end);

        assert!(!plan.has_fire_before_end(now));
        assert!(plan.has_fire_before_end(now - chrono::Duration::minutes(20)));
    }

    #[test]
    fn test_next_local_midnight_in_shanghai() {
        let tz: Tz = "Asia/Shanghai".parse().unwrap();
        // 18:30 local on June 1st
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 10, 30, 0).unwrap();
        let expiry = next_local_midnight(now, tz);
        // Midnight June 2nd local is 16:00 June 1st UTC
        assert_eq!(expiry, Utc.with_ymd_and_hms(2024, 6, 1, 16, 0, 0).unwrap());
    }

    #[test]
    fn test_next_local_midnight_when_local_day_is_ahead_of_utc() {
        let tz: Tz = "Asia/Shanghai".parse().unwrap();
        // 20:00 UTC is already 04:00 June 2nd local
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 20, 0, 0).unwrap();
        let expiry = next_local_midnight(now, tz);
        // So expiry is midnight June 3rd local
        assert_eq!(expiry, Utc.with_ymd_and_hms(2024, 6, 2, 16, 0, 0).unwrap());
    }

    #[test]
    fn test_next_local_midnight_is_strictly_in_the_future() {
        let tz: Tz = "Asia/Shanghai".parse().unwrap();
        // Exactly local midnight: expiry must be the next one, not now
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 16, 0, 0).unwrap();
        let expiry = next_local_midnight(now, tz);
        assert!(expiry > now);
        assert_eq!(expiry - now, chrono::Duration::hours(24));
    }
}
