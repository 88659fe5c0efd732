//! Learning domain: student and instructor profiles, courses, enrollments.
//!
//! Pure records and validation rules (no IO, no HTTP, no storage).

pub mod course;
pub mod enrollment;
pub mod instructor;
pub mod student;

pub use course::{Course, NewCourse};
pub use enrollment::{CapacityPolicy, Enrollment, NewEnrollment};
pub use instructor::{Instructor, NewInstructor};
pub use student::{NewStudent, Student};
