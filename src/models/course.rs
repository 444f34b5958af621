//! Course model

use serde::{Deserialize, Serialize};
use chrono::NaiveTime;
use crate::utils::helpers::{day_name, parse_time_of_day};

/// Course identifier, unique within its group and always lowercase
pub type CourseId = String;

/// Weekly slot at which registration for a course reopens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    /// Weekday, 0 = Monday
    pub day: u8,
    /// 24-hour `HH:MM`
    pub time: String,
}

impl Schedule {
    pub fn new(day: u8, time: impl Into<String>) -> Self {
        Self { day, time: time.into() }
    }

    pub fn time_of_day(&self) -> Option<NaiveTime> {
        parse_time_of_day(&self.time)
    }

    pub fn is_valid(&self) -> bool {
        self.day <= 6 && self.time_of_day().is_some()
    }

    /// e.g. "Wednesday at 20:00"
    pub fn describe(&self) -> String {
        format!("{} at {}", day_name(self.day), self.time)
    }
}

impl Default for Schedule {
    fn default() -> Self {
        Self::new(2, "20:00")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub name: String,
    pub schedule: Schedule,
}

/// Confirmation data returned by a successful course insertion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseAdded {
    pub course_id: CourseId,
    pub course_name: String,
    pub group_name: String,
    pub schedule: Schedule,
}

impl CourseAdded {
    pub fn message(&self) -> String {
        format!(
            "Successfully added course '{}' (ID: {}) to {} with schedule: {}",
            self.course_name,
            self.course_id,
            self.group_name,
            self.schedule.describe()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_validation() {
        assert!(Schedule::new(4, "18:30").is_valid());
        assert!(!Schedule::new(7, "18:30").is_valid());
        assert!(!Schedule::new(1, "1830").is_valid());
        assert_eq!(Schedule::default().describe(), "Wednesday at 20:00");
    }
}
