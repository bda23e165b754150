//! Department activity patterns: the static rate table.
//!
//! Table is a set of `const` values behind a `match`, so it is fixed at
//! compile time and cannot be mutated at runtime.

use serde::{Deserialize, Serialize};

use crate::types::{ActivityKind, Department};

/// Rate and work-hour profile for one department.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActivityPattern {
    pub emails_per_hour: f64,
    pub messages_per_hour: f64,
    pub docs_per_day: f64,
    pub meetings_per_day: f64,
    /// First working hour, UTC, inclusive.
    pub work_start_hour: u32,
    /// End of the working day, UTC, exclusive.
    pub work_end_hour: u32,
    /// Jitter applied to every rate, in percent of the rate.
    pub variance_percent: f64,
}

impl ActivityPattern {
    const fn standard(emails: f64, messages: f64, docs: f64, meetings: f64) -> Self {
        Self {
            emails_per_hour: emails,
            messages_per_hour: messages,
            docs_per_day: docs,
            meetings_per_day: meetings,
            work_start_hour: 8,
            work_end_hour: 17,
            variance_percent: 30.0,
        }
    }

    /// Length of the working day in hours.
    pub fn work_hours_per_day(&self) -> u32 {
        self.work_end_hour.saturating_sub(self.work_start_hour)
    }

    /// Whether `hour` (UTC) falls in `[work_start_hour, work_end_hour)`.
    pub fn in_work_hours(&self, hour: u32) -> bool {
        self.work_start_hour <= hour && hour < self.work_end_hour
    }

    /// Configured rate for a kind. Hourly for email/message, daily otherwise.
    pub fn rate_for(&self, kind: ActivityKind) -> f64 {
        match kind {
            ActivityKind::Email => self.emails_per_hour,
            ActivityKind::Message => self.messages_per_hour,
            ActivityKind::Document => self.docs_per_day,
            ActivityKind::Meeting => self.meetings_per_day,
        }
    }
}

const OPERATIONS: ActivityPattern = ActivityPattern::standard(6.0, 8.0, 4.0, 4.0);
const ENGINEERING: ActivityPattern = ActivityPattern::standard(4.0, 15.0, 6.0, 3.0);
const SALES: ActivityPattern = ActivityPattern::standard(12.0, 10.0, 3.0, 8.0);
const HR: ActivityPattern = ActivityPattern::standard(10.0, 8.0, 5.0, 5.0);
const FINANCE: ActivityPattern = ActivityPattern::standard(6.0, 5.0, 8.0, 4.0);
const EXECUTIVE: ActivityPattern = ActivityPattern::standard(8.0, 5.0, 2.0, 10.0);

/// Look up the pattern for a department.
pub fn pattern_for(department: Department) -> ActivityPattern {
    match department {
        Department::Operations => OPERATIONS,
        Department::Engineering => ENGINEERING,
        Department::Sales => SALES,
        Department::Hr => HR,
        Department::Finance => FINANCE,
        Department::Executive => EXECUTIVE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_patterns_are_well_formed() {
        for dept in Department::ALL {
            let p = pattern_for(dept);
            assert!(p.work_start_hour < p.work_end_hour, "{dept}: bad window");
            assert!(p.work_end_hour <= 23);
            assert!(p.emails_per_hour >= 0.0);
            assert!(p.messages_per_hour >= 0.0);
            assert!(p.docs_per_day >= 0.0);
            assert!(p.meetings_per_day >= 0.0);
            assert!((0.0..=100.0).contains(&p.variance_percent));
        }
    }

    #[test]
    fn test_departments_differ() {
        assert_eq!(pattern_for(Department::Sales).emails_per_hour, 12.0);
        assert_eq!(pattern_for(Department::Engineering).messages_per_hour, 15.0);
        assert_eq!(pattern_for(Department::Executive).meetings_per_day, 10.0);
    }

    #[test]
    fn test_work_hour_window() {
        let p = pattern_for(Department::Finance);
        assert_eq!(p.work_hours_per_day(), 9);
        assert!(!p.in_work_hours(7));
        assert!(p.in_work_hours(8));
        assert!(p.in_work_hours(16));
        assert!(!p.in_work_hours(17));
    }
}
