use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use learnhub_core::{CourseId, DomainResult, FieldErrors, InstructorId};

/// A course offered by an instructor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub name: String,
    pub description: String,
    pub instructor_id: InstructorId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub max_students: i32,
    /// Price in smallest currency unit (e.g., cents).
    pub price_cents: i64,
    pub category: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCourse {
    pub name: String,
    pub description: String,
    pub instructor_id: InstructorId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub max_students: i32,
    pub price_cents: i64,
    pub category: String,
}

impl NewCourse {
    /// Trim free-text fields in place.
    pub fn normalized(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self.description = self.description.trim().to_string();
        self.category = self.category.trim().to_string();
        self
    }

    pub fn validate(&self) -> DomainResult<()> {
        let mut errors = FieldErrors::new();
        errors.check(
            (3..=100).contains(&self.name.trim().chars().count()),
            "name",
            "course name must be between 3 and 100 characters",
        );
        errors.check(
            (10..=1000).contains(&self.description.trim().chars().count()),
            "description",
            "course description must be between 10 and 1000 characters",
        );
        errors.check(
            self.end_date >= self.start_date,
            "end_date",
            "end date must not be before start date",
        );
        errors.check(self.max_students > 0, "max_students", "max students must be positive");
        errors.check(self.price_cents >= 0, "price_cents", "price must not be negative");
        errors.check(!self.category.trim().is_empty(), "category", "category is mandatory");
        errors.into_result()
    }
}
