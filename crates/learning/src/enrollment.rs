//! Enrollment records and the pure rules checked before one is written.
//!
//! Uniqueness of `(student_id, course_id)` is not checked here; the store's
//! constraint owns it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use learnhub_core::{CourseId, EnrollmentId, StudentId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub student_id: StudentId,
    pub course_id: CourseId,
    pub enrollment_date: NaiveDate,
}

/// Values for a new enrollment, or the full replacement of an existing one.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEnrollment {
    pub student_id: StudentId,
    pub course_id: CourseId,
    pub enrollment_date: NaiveDate,
}

impl NewEnrollment {
    pub fn new(student_id: StudentId, course_id: CourseId, enrollment_date: NaiveDate) -> Self {
        Self {
            student_id,
            course_id,
            enrollment_date,
        }
    }

    /// The date may be today or in the past, never after `today`.
    pub fn date_is_valid(&self, today: NaiveDate) -> bool {
        self.enrollment_date <= today
    }
}

/// Whether a course's `max_students` limits enrollments.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapacityPolicy {
    #[default]
    Unbounded,
    CourseMaximum,
}

impl CapacityPolicy {
    pub fn from_flag(enforce: bool) -> Self {
        if enforce {
            CapacityPolicy::CourseMaximum
        } else {
            CapacityPolicy::Unbounded
        }
    }

    /// Whether one more student fits given `enrolled` existing rows.
    pub fn admits(&self, enrolled: u64, max_students: i32) -> bool {
        match self {
            CapacityPolicy::Unbounded => true,
            CapacityPolicy::CourseMaximum => enrolled < u64::try_from(max_students.max(0)).unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn today_and_past_dates_are_valid() {
        let today = date(2024, 6, 1);
        let e = NewEnrollment::new(StudentId::new(7), CourseId::new(3), date(2024, 1, 1));
        assert!(e.date_is_valid(today));
        assert!(NewEnrollment { enrollment_date: today, ..e }.date_is_valid(today));
        assert!(!NewEnrollment { enrollment_date: date(2024, 6, 2), ..e }.date_is_valid(today));
    }

    #[test]
    fn unbounded_capacity_always_admits() {
        assert!(CapacityPolicy::Unbounded.admits(1_000, 1));
        assert_eq!(CapacityPolicy::default(), CapacityPolicy::Unbounded);
    }

    #[test]
    fn course_maximum_stops_at_the_limit() {
        let p = CapacityPolicy::from_flag(true);
        assert!(p.admits(29, 30));
        assert!(!p.admits(30, 30));
        assert!(!p.admits(0, 0));
    }

    proptest! {
        /// Property: under the course maximum, admitted count never exceeds the limit.
        #[test]
        fn course_maximum_never_overfills(max in 1i32..500, enrolled in 0u64..1_000) {
            let admitted = CapacityPolicy::CourseMaximum.admits(enrolled, max);
            prop_assert_eq!(admitted, enrolled < max as u64);
        }
    }
}
