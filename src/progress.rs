use serde::Serialize;
use serde_json::json;
use tracing::debug;
use utoipa::ToSchema;

use crate::catalog::Lesson;
use crate::enrollment::{Enrollment, ledger_key};
use crate::error::Error;
use crate::store::{DocumentStore, collections};

/// Result of the sequential-unlock gate for one requested lesson index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct LessonAccess {
    pub viewable: bool,
    /// Highest lesson index the learner may currently open. Equals the list
    /// length when every lesson is completed.
    pub last_unlocked: usize,
}

/// Sequential unlock over an order-sorted lesson list.
///
/// The unlock frontier is derived from the highest sorted position among the
/// completed lessons still present in the list, so completing lessons out of
/// order can never move it backwards, and a stored cursor is never needed.
/// Completed ids that no longer resolve to a lesson are skipped; lessons get
/// deleted during normal catalog maintenance.
pub fn compute_access(
    lessons: &[Lesson],
    completed: &[String],
    requested_index: usize,
) -> LessonAccess {
    if lessons.is_empty() {
        return LessonAccess {
            viewable: false,
            last_unlocked: 0,
        };
    }
    let max_completed = lessons
        .iter()
        .enumerate()
        .filter(|(_, lesson)| completed.contains(&lesson.id))
        .map(|(position, _)| position)
        .max();
    let orphaned = completed
        .iter()
        .filter(|id| !lessons.iter().any(|l| &l.id == *id))
        .count();
    if orphaned > 0 {
        debug!("{orphaned} completed lesson id(s) no longer in the course, skipped");
    }
    let last_unlocked = match max_completed {
        Some(position) => position + 1,
        None => 0,
    };
    LessonAccess {
        viewable: requested_index <= last_unlocked && requested_index < lessons.len(),
        last_unlocked,
    }
}

/// The completed set of one enrollment, in completion order. Empty when the
/// ledger has no entry yet.
pub async fn completed_lessons(
    store: &impl DocumentStore,
    user_id: &str,
    course_id: &str,
) -> Result<Vec<String>, Error> {
    let key = ledger_key(user_id, course_id);
    match store.get(collections::USER_COURSES, &key).await? {
        Some(data) => {
            let enrollment: Enrollment = serde_json::from_value(data)?;
            Ok(enrollment.completed_lessons)
        }
        None => Ok(Vec::new()),
    }
}

/// Record a lesson as completed, idempotently, and return the new completed
/// set.
///
/// A conditional create seeds the ledger entry with this single lesson when
/// the pair has none yet; losing that race (or an entry already existing)
/// falls through to an atomic add-to-set on the existing document, so two
/// concurrent first completions both survive. The prerequisite gate is the
/// caller's job: this operation does not re-check sequencing.
pub async fn mark_completed(
    store: &impl DocumentStore,
    user_id: &str,
    course_id: &str,
    lesson_id: &str,
) -> Result<Vec<String>, Error> {
    let key = ledger_key(user_id, course_id);
    let mut enrollment = Enrollment::new(user_id, course_id);
    enrollment.completed_lessons.push(lesson_id.to_string());
    let created = store
        .create_if_absent(
            collections::USER_COURSES,
            &key,
            serde_json::to_value(&enrollment)?,
        )
        .await?;
    if created {
        return Ok(enrollment.completed_lessons);
    }
    store
        .array_union(
            collections::USER_COURSES,
            &key,
            "completedLessons",
            json!(lesson_id),
        )
        .await?;
    completed_lessons(store, user_id, course_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    fn lessons(ids: &[(&str, u32)]) -> Vec<Lesson> {
        ids.iter()
            .map(|(id, order)| Lesson {
                id: id.to_string(),
                course_id: "c1".to_string(),
                title: format!("lesson {id}"),
                video_url: String::new(),
                order: *order,
            })
            .collect()
    }

    fn completed(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn nothing_completed_unlocks_only_first_lesson() {
        let lessons = lessons(&[("a", 0), ("b", 1), ("c", 2)]);
        let access = compute_access(&lessons, &[], 1);
        assert_eq!(
            access,
            LessonAccess {
                viewable: false,
                last_unlocked: 0
            }
        );
        assert!(compute_access(&lessons, &[], 0).viewable);
    }

    #[test]
    fn completing_first_lesson_unlocks_second_only() {
        let lessons = lessons(&[("a", 0), ("b", 1), ("c", 2)]);
        let access = compute_access(&lessons, &completed(&["a"]), 1);
        assert_eq!(
            access,
            LessonAccess {
                viewable: true,
                last_unlocked: 1
            }
        );
        assert!(!compute_access(&lessons, &completed(&["a"]), 2).viewable);
    }

    #[test]
    fn empty_course_has_no_viewable_lesson() {
        let access = compute_access(&[], &completed(&["a"]), 0);
        assert!(!access.viewable);
        assert_eq!(access.last_unlocked, 0);
    }

    #[test]
    fn out_of_range_index_is_not_viewable() {
        let lessons = lessons(&[("a", 0), ("b", 1)]);
        let all = completed(&["a", "b"]);
        let access = compute_access(&lessons, &all, 2);
        assert!(!access.viewable);
        assert_eq!(access.last_unlocked, 2);
    }

    #[test]
    fn deleted_lessons_in_completed_set_are_skipped() {
        let lessons = lessons(&[("a", 0), ("c", 2)]);
        // "b" was completed, then removed from the course
        let access = compute_access(&lessons, &completed(&["a", "b"]), 1);
        assert!(access.viewable);
        assert_eq!(access.last_unlocked, 1);
    }

    #[test]
    fn frontier_uses_max_position_not_completion_order() {
        let lessons = lessons(&[("a", 0), ("b", 1), ("c", 2), ("d", 3)]);
        // "a" re-completed after "c": frontier must stay at c's successor
        let access = compute_access(&lessons, &completed(&["b", "c", "a"]), 3);
        assert!(access.viewable);
        assert_eq!(access.last_unlocked, 3);
    }

    #[test]
    fn frontier_never_decreases_as_completions_accumulate() {
        let lessons = lessons(&[("a", 0), ("b", 1), ("c", 2)]);
        let mut done = Vec::new();
        let mut frontier = 0;
        for id in ["a", "b", "c"] {
            done.push(id.to_string());
            let access = compute_access(&lessons, &done, 0);
            assert!(access.last_unlocked >= frontier);
            frontier = access.last_unlocked;
        }
        assert_eq!(frontier, 3);
    }

    #[tokio::test]
    async fn mark_completed_creates_ledger_entry_when_absent() {
        let store = MemoryStore::new();
        let set = mark_completed(&store, "u1", "c1", "a").await.unwrap();
        assert_eq!(set, completed(&["a"]));

        let stored = completed_lessons(&store, "u1", "c1").await.unwrap();
        assert_eq!(stored, completed(&["a"]));
    }

    #[tokio::test]
    async fn mark_completed_is_idempotent() {
        let store = MemoryStore::new();
        mark_completed(&store, "u1", "c1", "a").await.unwrap();
        mark_completed(&store, "u1", "c1", "b").await.unwrap();
        let once = completed_lessons(&store, "u1", "c1").await.unwrap();
        let twice = mark_completed(&store, "u1", "c1", "b").await.unwrap();
        assert_eq!(once.len(), twice.len());
        assert_eq!(twice, completed(&["a", "b"]));
    }

    #[tokio::test]
    async fn concurrent_first_completions_both_survive() {
        let store = MemoryStore::new();
        // no ledger entry exists yet; whichever call loses the conditional
        // create must union into the winner's document instead of
        // overwriting it
        let (a, b) = tokio::join!(
            mark_completed(&store, "u1", "c1", "a"),
            mark_completed(&store, "u1", "c1", "b"),
        );
        a.unwrap();
        b.unwrap();
        let done = completed_lessons(&store, "u1", "c1").await.unwrap();
        assert_eq!(done.len(), 2);
        assert!(done.contains(&"a".to_string()));
        assert!(done.contains(&"b".to_string()));
    }

    #[tokio::test]
    async fn mark_completed_returns_superset_of_prior_set() {
        let store = MemoryStore::new();
        let mut prior = Vec::new();
        for id in ["a", "b", "a", "c"] {
            let next = mark_completed(&store, "u1", "c1", id).await.unwrap();
            assert!(prior.iter().all(|p| next.contains(p)));
            prior = next;
        }
        assert_eq!(prior, completed(&["a", "b", "c"]));
    }
}
