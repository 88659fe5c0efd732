use std::sync::Arc;

use tracing::{info, instrument, warn};

use learnhub_auth::Principal;
use learnhub_core::{CourseId, InstructorId};
use learnhub_learning::{Course, NewCourse};

use crate::profiles::ProfileError;
use crate::store::{CourseStore, InstructorStore, StoreError, Stores};

/// Course catalog. Shares [`ProfileError`] with the profile service.
pub struct CourseCatalog {
    courses: Arc<dyn CourseStore>,
    instructors: Arc<dyn InstructorStore>,
}

impl CourseCatalog {
    pub fn new(stores: &Stores) -> Self {
        Self {
            courses: stores.courses.clone(),
            instructors: stores.instructors.clone(),
        }
    }

    #[instrument(skip(self, course), fields(instructor_id = %course.instructor_id), err)]
    pub async fn create(&self, course: NewCourse) -> Result<Course, ProfileError> {
        let course = course.normalized();
        course.validate().map_err(ProfileError::Validation)?;

        if self.instructors.find_by_id(course.instructor_id).await?.is_none() {
            return Err(ProfileError::not_found("instructor", course.instructor_id));
        }

        let instructor_id = course.instructor_id;
        let created = self.courses.insert(course).await.map_err(|e| match e {
            StoreError::ForeignKey(_) => ProfileError::not_found("instructor", instructor_id),
            other => ProfileError::Store(other),
        })?;
        info!(course_id = %created.id, "course created");
        Ok(created)
    }

    /// [`Self::create`] on behalf of a caller: admins, or the instructor the
    /// course is filed under.
    pub async fn create_as(&self, caller: &Principal, course: NewCourse) -> Result<Course, ProfileError> {
        if !caller.is_admin() {
            let own = self.instructors.find_by_account(caller.account_id).await?;
            if own.map(|i| i.id) != Some(course.instructor_id) {
                warn!(
                    account_id = %caller.account_id,
                    instructor_id = %course.instructor_id,
                    "course creation rejected: caller is not the instructor"
                );
                return Err(ProfileError::Forbidden("courses can only be created under your own instructor profile"));
            }
        }
        self.create(course).await
    }

    pub async fn get(&self, id: CourseId) -> Result<Course, ProfileError> {
        self.courses
            .find_by_id(id)
            .await?
            .ok_or_else(|| ProfileError::not_found("course", id))
    }

    pub async fn list(&self) -> Result<Vec<Course>, ProfileError> {
        Ok(self.courses.list().await?)
    }

    pub async fn list_by_instructor(&self, instructor_id: InstructorId) -> Result<Vec<Course>, ProfileError> {
        Ok(self.courses.list_by_instructor(instructor_id).await?)
    }
}
