use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

/// One observation of a course section's seating, taken during a poll.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CourseSnapshot {
    pub crn: String,
    pub title: String,
    pub course: String,   // e.g. "CS 1332"
    pub section: String,
    pub capacity: u32,
    pub enrolled: u32,
    pub remaining_seats: u32,
    pub waitlist_capacity: u32,
    pub waitlist_enrolled: u32,
    pub waitlist_count: u32, // open waitlist slots
    pub fetched_at: DateTime<Utc>,
}

impl CourseSnapshot {
    pub fn seats_open(&self) -> bool {
        self.remaining_seats > 0
    }

    pub fn waitlist_open(&self) -> bool {
        self.waitlist_count > 0
    }

    /// "CS 1332 (A)"
    pub fn describe(&self) -> String {
        format!("{} ({})", self.course, self.section)
    }

    pub fn details(&self) -> String {
        format!(
            "Course: {} - {}\nCRN: {}\nRemaining Seats: {}\nWaitlist: {}",
            self.describe(),
            self.title,
            self.crn,
            self.remaining_seats,
            self.waitlist_count,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(remaining: u32, waitlist: u32) -> CourseSnapshot {
        CourseSnapshot {
            crn: "12345".to_string(),
            title: "Data Structures and Algorithms".to_string(),
            course: "CS 1332".to_string(),
            section: "A".to_string(),
            capacity: 100,
            enrolled: 95,
            remaining_seats: remaining,
            waitlist_capacity: 10,
            waitlist_enrolled: 10 - waitlist,
            waitlist_count: waitlist,
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn test_open_flags() {
        assert!(!snapshot(0, 0).seats_open());
        assert!(snapshot(3, 0).seats_open());
        assert!(snapshot(0, 1).waitlist_open());
        assert!(!snapshot(5, 0).waitlist_open());
    }

    #[test]
    fn test_details_text() {
        let s = snapshot(3, 2);
        assert_eq!(s.describe(), "CS 1332 (A)");
        let details = s.details();
        assert!(details.contains("CRN: 12345"));
        assert!(details.contains("Remaining Seats: 3"));
        assert!(details.contains("Waitlist: 2"));
    }
}
