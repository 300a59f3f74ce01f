use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use utoipa::ToSchema;

use crate::error::Error;
use crate::store::{DocumentStore, collections};

/// A catalog course. `id` is the key of the backing document; `doc_body`
/// strips it before a write so the body never stores it, while API
/// responses keep it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    #[serde(default)]
    pub image_url: String,
    /// Account id of the teacher who owns the course.
    #[serde(default)]
    pub teacher_id: String,
}

/// A lesson belongs to one course. `order` is a zero-based sort key, unique
/// per course by convention but not enforced; listing is stable on ties.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    #[serde(default)]
    pub id: String,
    pub course_id: String,
    pub title: String,
    #[serde(default)]
    pub video_url: String,
    pub order: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CourseUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LessonUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
}

/// Serialize for storage: the document key is the id, so the body must not
/// carry it.
fn doc_body<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, Error> {
    let mut data = serde_json::to_value(value)?;
    if let Some(obj) = data.as_object_mut() {
        obj.remove("id");
    }
    Ok(data)
}

pub async fn create_course(store: &impl DocumentStore, course: &Course) -> Result<String, Error> {
    let id = store
        .create(collections::COURSES, doc_body(course)?)
        .await?;
    info!("created course {id} ({})", course.title);
    Ok(id)
}

pub async fn get_course(store: &impl DocumentStore, id: &str) -> Result<Course, Error> {
    let Some(data) = store.get(collections::COURSES, id).await? else {
        return Err(Error::NotFound("course"));
    };
    let mut course: Course = serde_json::from_value(data)?;
    course.id = id.to_string();
    Ok(course)
}

pub async fn list_courses(store: &impl DocumentStore) -> Result<Vec<Course>, Error> {
    let docs = store.query(collections::COURSES, &[]).await?;
    let mut courses = Vec::with_capacity(docs.len());
    for doc in docs {
        let mut course: Course = serde_json::from_value(doc.data)?;
        course.id = doc.key;
        courses.push(course);
    }
    Ok(courses)
}

pub async fn update_course(
    store: &impl DocumentStore,
    id: &str,
    update: &CourseUpdate,
) -> Result<(), Error> {
    store
        .merge(collections::COURSES, id, serde_json::to_value(update)?)
        .await
}

pub async fn delete_course(store: &impl DocumentStore, id: &str) -> Result<(), Error> {
    store.delete(collections::COURSES, id).await?;
    info!("deleted course {id}");
    Ok(())
}

pub async fn add_lesson(store: &impl DocumentStore, lesson: &Lesson) -> Result<String, Error> {
    let id = store.create(collections::LESSONS, doc_body(lesson)?).await?;
    info!(
        "added lesson {id} ({}) to course {}",
        lesson.title, lesson.course_id
    );
    Ok(id)
}

/// Lessons of one course, sorted by `order` ascending. This is the sequence
/// the progress gate runs over.
pub async fn course_lessons(
    store: &impl DocumentStore,
    course_id: &str,
) -> Result<Vec<Lesson>, Error> {
    let docs = store
        .query(collections::LESSONS, &[("courseId", json!(course_id))])
        .await?;
    let mut lessons = Vec::with_capacity(docs.len());
    for doc in docs {
        let mut lesson: Lesson = serde_json::from_value(doc.data)?;
        lesson.id = doc.key;
        lessons.push(lesson);
    }
    lessons.sort_by(|a, b| a.order.cmp(&b.order));
    Ok(lessons)
}

pub async fn get_lesson(store: &impl DocumentStore, id: &str) -> Result<Lesson, Error> {
    let Some(data) = store.get(collections::LESSONS, id).await? else {
        return Err(Error::NotFound("lesson"));
    };
    let mut lesson: Lesson = serde_json::from_value(data)?;
    lesson.id = id.to_string();
    Ok(lesson)
}

/// Every lesson in the catalog, for the admin lesson table.
pub async fn list_lessons(store: &impl DocumentStore) -> Result<Vec<Lesson>, Error> {
    let docs = store.query(collections::LESSONS, &[]).await?;
    let mut lessons = Vec::with_capacity(docs.len());
    for doc in docs {
        let mut lesson: Lesson = serde_json::from_value(doc.data)?;
        lesson.id = doc.key;
        lessons.push(lesson);
    }
    Ok(lessons)
}

pub async fn update_lesson(
    store: &impl DocumentStore,
    id: &str,
    update: &LessonUpdate,
) -> Result<(), Error> {
    store
        .merge(collections::LESSONS, id, serde_json::to_value(update)?)
        .await
}

pub async fn delete_lesson(store: &impl DocumentStore, id: &str) -> Result<(), Error> {
    store.delete(collections::LESSONS, id).await?;
    info!("deleted lesson {id}");
    Ok(())
}

pub async fn lesson_count(store: &impl DocumentStore, course_id: &str) -> Result<usize, Error> {
    store
        .count(collections::LESSONS, &[("courseId", json!(course_id))])
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    fn lesson(course_id: &str, title: &str, order: u32) -> Lesson {
        Lesson {
            id: String::new(),
            course_id: course_id.to_string(),
            title: title.to_string(),
            video_url: String::new(),
            order,
        }
    }

    #[tokio::test]
    async fn course_lessons_sorted_by_order() {
        let store = MemoryStore::new();
        add_lesson(&store, &lesson("c1", "third", 7)).await.unwrap();
        add_lesson(&store, &lesson("c1", "first", 0)).await.unwrap();
        add_lesson(&store, &lesson("c1", "second", 3))
            .await
            .unwrap();
        add_lesson(&store, &lesson("c2", "other", 1)).await.unwrap();

        let lessons = course_lessons(&store, "c1").await.unwrap();
        let titles: Vec<_> = lessons.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(titles, ["first", "second", "third"]);
        assert_eq!(lesson_count(&store, "c1").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn update_merges_without_clearing_other_fields() {
        let store = MemoryStore::new();
        let course = Course {
            id: String::new(),
            title: "Rust".to_string(),
            description: "intro".to_string(),
            price: 100.0,
            image_url: String::new(),
            teacher_id: "t1".to_string(),
        };
        let id = create_course(&store, &course).await.unwrap();

        let update = CourseUpdate {
            price: Some(150.0),
            ..Default::default()
        };
        update_course(&store, &id, &update).await.unwrap();

        let course = get_course(&store, &id).await.unwrap();
        assert_eq!(course.price, 150.0);
        assert_eq!(course.description, "intro");
        assert_eq!(course.teacher_id, "t1");
    }

    #[tokio::test]
    async fn listings_serialize_document_ids() {
        let store = MemoryStore::new();
        let course = Course {
            id: String::new(),
            title: "Rust".to_string(),
            description: String::new(),
            price: 100.0,
            image_url: String::new(),
            teacher_id: "t1".to_string(),
        };
        let course_id = create_course(&store, &course).await.unwrap();
        let lesson_id = add_lesson(&store, &lesson(&course_id, "intro", 0))
            .await
            .unwrap();

        // clients pick course and lesson ids out of these responses to
        // enroll and to complete lessons, so the ids must be on the wire
        let courses = list_courses(&store).await.unwrap();
        let body = serde_json::to_value(&courses[0]).unwrap();
        assert_eq!(body["id"], serde_json::json!(course_id));

        let lessons = course_lessons(&store, &course_id).await.unwrap();
        let body = serde_json::to_value(&lessons[0]).unwrap();
        assert_eq!(body["id"], serde_json::json!(lesson_id));
    }

    #[tokio::test]
    async fn stored_bodies_do_not_duplicate_the_key() {
        let store = MemoryStore::new();
        let course = Course {
            id: "client-supplied".to_string(),
            title: "Rust".to_string(),
            description: String::new(),
            price: 100.0,
            image_url: String::new(),
            teacher_id: "t1".to_string(),
        };
        let course_id = create_course(&store, &course).await.unwrap();
        let raw = store
            .get(crate::store::collections::COURSES, &course_id)
            .await
            .unwrap()
            .unwrap();
        assert!(raw.get("id").is_none());
    }

    #[tokio::test]
    async fn missing_course_is_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(
            get_course(&store, "nope").await,
            Err(Error::NotFound("course"))
        ));
    }
}
