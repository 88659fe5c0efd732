//! `learnhub-core`: shared domain building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult, FieldErrors};
pub use id::{AccountId, CourseId, EnrollmentId, InstructorId, RoleId, StudentId};
