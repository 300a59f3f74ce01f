use serde::{Deserialize, Serialize};
use serde_json::json;
use time::OffsetDateTime;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::catalog;
use crate::error::Error;
use crate::store::{DocumentStore, collections};
use crate::utils::now_utc;

/// Ledger entry for one `(user, course)` pair. Stored under the composite
/// key `userId_courseId`, so the pair can never have two entries.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub user_id: String,
    pub course_id: String,
    /// Lesson ids the learner has finished, in completion order, no
    /// duplicates. Only ever appended to.
    #[serde(default)]
    pub completed_lessons: Vec<String>,
    #[serde(default = "now_utc", with = "time::serde::rfc3339")]
    pub enrolled_at: OffsetDateTime,
}

impl Enrollment {
    pub fn new(user_id: &str, course_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            course_id: course_id.to_string(),
            completed_lessons: Vec::new(),
            enrolled_at: now_utc(),
        }
    }
}

/// Document key of the ledger entry for `(user_id, course_id)`.
pub fn ledger_key(user_id: &str, course_id: &str) -> String {
    format!("{user_id}_{course_id}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum EnrollOutcome {
    Enrolled,
    AlreadyEnrolled,
}

/// Enroll a user into a course. A conditional create on the composite key:
/// if the ledger entry already exists nothing is written and the caller gets
/// `AlreadyEnrolled`, including when two requests race.
pub async fn enroll(
    store: &impl DocumentStore,
    user_id: &str,
    course_id: &str,
) -> Result<EnrollOutcome, Error> {
    // reject enrollment into a course that does not exist
    catalog::get_course(store, course_id).await?;

    let enrollment = Enrollment::new(user_id, course_id);
    let created = store
        .create_if_absent(
            collections::USER_COURSES,
            &ledger_key(user_id, course_id),
            serde_json::to_value(&enrollment)?,
        )
        .await?;
    if created {
        info!("user {user_id} enrolled in course {course_id}");
        Ok(EnrollOutcome::Enrolled)
    } else {
        Ok(EnrollOutcome::AlreadyEnrolled)
    }
}

/// All enrollments of one user.
pub async fn list_enrollments(
    store: &impl DocumentStore,
    user_id: &str,
) -> Result<Vec<Enrollment>, Error> {
    let docs = store
        .query(collections::USER_COURSES, &[("userId", json!(user_id))])
        .await?;
    let mut enrollments = Vec::with_capacity(docs.len());
    for doc in docs {
        enrollments.push(serde_json::from_value(doc.data)?);
    }
    Ok(enrollments)
}

/// Progress through one course as a whole percentage. Counts only completed
/// lessons that still exist in the course; a course with no lessons is 0%.
pub async fn course_progress(
    store: &impl DocumentStore,
    user_id: &str,
    course_id: &str,
) -> Result<u8, Error> {
    let lessons = catalog::course_lessons(store, course_id).await?;
    if lessons.is_empty() {
        return Ok(0);
    }
    let completed = crate::progress::completed_lessons(store, user_id, course_id).await?;
    let done = lessons
        .iter()
        .filter(|lesson| completed.contains(&lesson.id))
        .count();
    Ok((done as f64 * 100.0 / lessons.len() as f64).round() as u8)
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CourseProgress {
    pub course_id: String,
    pub title: String,
    pub price: f64,
    pub percent: u8,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub enrollment_count: usize,
    pub courses: Vec<CourseProgress>,
}

/// The signed-in user's dashboard: enrollment count plus derived per-course
/// progress. Enrollments whose course has been deleted are skipped.
pub async fn dashboard(
    store: &impl DocumentStore,
    user_id: &str,
) -> Result<DashboardSummary, Error> {
    let enrollments = list_enrollments(store, user_id).await?;
    let enrollment_count = enrollments.len();
    let mut courses = Vec::with_capacity(enrollment_count);
    for enrollment in enrollments {
        let course = match catalog::get_course(store, &enrollment.course_id).await {
            Ok(course) => course,
            Err(Error::NotFound(_)) => {
                warn!(
                    "enrollment of user {user_id} references deleted course {}",
                    enrollment.course_id
                );
                continue;
            }
            Err(e) => return Err(e),
        };
        let percent = course_progress(store, user_id, &enrollment.course_id).await?;
        courses.push(CourseProgress {
            course_id: course.id,
            title: course.title,
            price: course.price,
            percent,
        });
    }
    Ok(DashboardSummary {
        enrollment_count,
        courses,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Course, Lesson};
    use crate::progress::mark_completed;
    use crate::store::memory::MemoryStore;

    async fn seed_course(store: &MemoryStore, lesson_ids: &[&str]) -> String {
        let course = Course {
            id: String::new(),
            title: "Rust".to_string(),
            description: String::new(),
            price: 100.0,
            image_url: String::new(),
            teacher_id: "t1".to_string(),
        };
        let course_id = catalog::create_course(store, &course).await.unwrap();
        for (order, title) in lesson_ids.iter().enumerate() {
            catalog::add_lesson(
                store,
                &Lesson {
                    id: String::new(),
                    course_id: course_id.clone(),
                    title: title.to_string(),
                    video_url: String::new(),
                    order: order as u32,
                },
            )
            .await
            .unwrap();
        }
        course_id
    }

    #[tokio::test]
    async fn second_enroll_reports_already_enrolled() {
        let store = MemoryStore::new();
        let course_id = seed_course(&store, &["a"]).await;

        assert_eq!(
            enroll(&store, "u1", &course_id).await.unwrap(),
            EnrollOutcome::Enrolled
        );
        assert_eq!(
            enroll(&store, "u1", &course_id).await.unwrap(),
            EnrollOutcome::AlreadyEnrolled
        );
        assert_eq!(list_enrollments(&store, "u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn enroll_into_unknown_course_fails() {
        let store = MemoryStore::new();
        assert!(matches!(
            enroll(&store, "u1", "ghost").await,
            Err(Error::NotFound("course"))
        ));
    }

    #[tokio::test]
    async fn progress_is_zero_for_course_without_lessons() {
        let store = MemoryStore::new();
        let course_id = seed_course(&store, &[]).await;
        enroll(&store, "u1", &course_id).await.unwrap();
        // completed entries may even exist; still 0, never a division error
        assert_eq!(course_progress(&store, "u1", &course_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn progress_counts_only_lessons_still_in_course() {
        let store = MemoryStore::new();
        let course_id = seed_course(&store, &["one", "two", "three"]).await;
        enroll(&store, "u1", &course_id).await.unwrap();

        let lessons = catalog::course_lessons(&store, &course_id).await.unwrap();
        mark_completed(&store, "u1", &course_id, &lessons[0].id)
            .await
            .unwrap();
        mark_completed(&store, "u1", &course_id, &lessons[1].id)
            .await
            .unwrap();
        assert_eq!(course_progress(&store, "u1", &course_id).await.unwrap(), 67);

        // deleting a completed lesson shrinks both sides of the ratio
        catalog::delete_lesson(&store, &lessons[1].id).await.unwrap();
        assert_eq!(course_progress(&store, "u1", &course_id).await.unwrap(), 50);
    }

    #[tokio::test]
    async fn dashboard_skips_deleted_courses() {
        let store = MemoryStore::new();
        let kept = seed_course(&store, &["a"]).await;
        let dropped = seed_course(&store, &["b"]).await;
        enroll(&store, "u1", &kept).await.unwrap();
        enroll(&store, "u1", &dropped).await.unwrap();
        catalog::delete_course(&store, &dropped).await.unwrap();

        let summary = dashboard(&store, "u1").await.unwrap();
        assert_eq!(summary.enrollment_count, 2);
        assert_eq!(summary.courses.len(), 1);
        assert_eq!(summary.courses[0].course_id, kept);
    }
}
