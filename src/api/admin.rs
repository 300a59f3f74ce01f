use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post, put},
};
use serde::Deserialize;
use tower_sessions::Session;
use utoipa::ToSchema;

use crate::account::{self, AccountInfo, Role};
use crate::catalog::{self, Course, CourseUpdate, Lesson, LessonUpdate};
use crate::error::Error;
use crate::server::AppState;

use super::require_staff;

/// Admins may touch any course; teachers only their own.
async fn authorize_course(
    store: &AppState,
    staff: &AccountInfo,
    course_id: &str,
) -> Result<(), Error> {
    if staff.role == Role::Admin {
        return Ok(());
    }
    let course = catalog::get_course(&**store, course_id).await?;
    if course.teacher_id != staff.id {
        return Err(Error::Forbidden);
    }
    Ok(())
}

#[utoipa::path(
    context_path = "/api/admin",
    path = "/courses",
    method(post),
    request_body = Course,
    responses(
        (status = 200, description = "Course created, returns its id"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Not a staff account")
    )
)]
pub async fn create_course(
    State(store): State<AppState>,
    session: Session,
    Json(mut course): Json<Course>,
) -> Result<impl IntoResponse, Error> {
    let staff = require_staff(&*store, &session).await?;
    // a teacher always owns the courses it creates
    if staff.role == Role::Teacher {
        course.teacher_id = staff.id.clone();
    }
    let id = catalog::create_course(&*store, &course).await?;
    Ok(id)
}

#[utoipa::path(
    context_path = "/api/admin",
    path = "/courses/{id}",
    method(put),
    request_body = CourseUpdate,
    params(("id" = String, Path, description = "Course id")),
    responses(
        (status = 200, description = "Course updated"),
        (status = 403, description = "Not the course owner"),
        (status = 404, description = "Course not found")
    )
)]
pub async fn update_course(
    State(store): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    Json(update): Json<CourseUpdate>,
) -> Result<impl IntoResponse, Error> {
    let staff = require_staff(&*store, &session).await?;
    authorize_course(&store, &staff, &id).await?;
    catalog::update_course(&*store, &id, &update).await?;
    Ok("Course updated")
}

#[utoipa::path(
    context_path = "/api/admin",
    path = "/courses/{id}",
    method(delete),
    params(("id" = String, Path, description = "Course id")),
    responses(
        (status = 200, description = "Course deleted"),
        (status = 403, description = "Not the course owner")
    )
)]
pub async fn delete_course(
    State(store): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, Error> {
    let staff = require_staff(&*store, &session).await?;
    authorize_course(&store, &staff, &id).await?;
    catalog::delete_course(&*store, &id).await?;
    Ok("Course deleted")
}

#[utoipa::path(
    context_path = "/api/admin",
    path = "/lessons",
    method(post),
    request_body = Lesson,
    responses(
        (status = 200, description = "Lesson added, returns its id"),
        (status = 403, description = "Not the course owner"),
        (status = 404, description = "Course not found")
    )
)]
pub async fn add_lesson(
    State(store): State<AppState>,
    session: Session,
    Json(lesson): Json<Lesson>,
) -> Result<impl IntoResponse, Error> {
    let staff = require_staff(&*store, &session).await?;
    authorize_course(&store, &staff, &lesson.course_id).await?;
    let id = catalog::add_lesson(&*store, &lesson).await?;
    Ok(id)
}

#[utoipa::path(
    context_path = "/api/admin",
    path = "/lessons",
    method(get),
    responses(
        (status = 200, description = "Every lesson in the catalog", body = Vec<Lesson>),
        (status = 403, description = "Not a staff account")
    )
)]
pub async fn list_lessons(
    State(store): State<AppState>,
    session: Session,
) -> Result<impl IntoResponse, Error> {
    require_staff(&*store, &session).await?;
    Ok(Json(catalog::list_lessons(&*store).await?))
}

#[utoipa::path(
    context_path = "/api/admin",
    path = "/lessons/{id}",
    method(put),
    request_body = LessonUpdate,
    params(("id" = String, Path, description = "Lesson id")),
    responses(
        (status = 200, description = "Lesson updated"),
        (status = 403, description = "Not the course owner"),
        (status = 404, description = "Lesson not found")
    )
)]
pub async fn update_lesson(
    State(store): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    Json(update): Json<LessonUpdate>,
) -> Result<impl IntoResponse, Error> {
    let staff = require_staff(&*store, &session).await?;
    let lesson = catalog::get_lesson(&*store, &id).await?;
    authorize_course(&store, &staff, &lesson.course_id).await?;
    catalog::update_lesson(&*store, &id, &update).await?;
    Ok("Lesson updated")
}

#[utoipa::path(
    context_path = "/api/admin",
    path = "/lessons/{id}",
    method(delete),
    params(("id" = String, Path, description = "Lesson id")),
    responses(
        (status = 200, description = "Lesson deleted"),
        (status = 403, description = "Not the course owner")
    )
)]
pub async fn delete_lesson(
    State(store): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, Error> {
    let staff = require_staff(&*store, &session).await?;
    let lesson = catalog::get_lesson(&*store, &id).await?;
    authorize_course(&store, &staff, &lesson.course_id).await?;
    catalog::delete_lesson(&*store, &id).await?;
    Ok("Lesson deleted")
}

#[utoipa::path(
    context_path = "/api/admin",
    path = "/users",
    method(get),
    responses(
        (status = 200, description = "All accounts", body = Vec<AccountInfo>),
        (status = 403, description = "Admin only")
    )
)]
pub async fn list_users(
    State(store): State<AppState>,
    session: Session,
) -> Result<impl IntoResponse, Error> {
    let staff = require_staff(&*store, &session).await?;
    if staff.role != Role::Admin {
        return Err(Error::Forbidden);
    }
    Ok(Json(account::list_accounts(&*store).await?))
}

#[derive(Deserialize, ToSchema)]
pub struct CreateAccountRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

#[utoipa::path(
    context_path = "/api/admin",
    path = "/users",
    method(post),
    request_body = CreateAccountRequest,
    responses(
        (status = 200, description = "Account created, returns its id"),
        (status = 400, description = "Email already registered"),
        (status = 403, description = "Admin only")
    )
)]
pub async fn create_account(
    State(store): State<AppState>,
    session: Session,
    Json(req): Json<CreateAccountRequest>,
) -> Result<impl IntoResponse, Error> {
    let staff = require_staff(&*store, &session).await?;
    if staff.role != Role::Admin {
        return Err(Error::Forbidden);
    }
    let id = account::register(&*store, req.name, req.email, req.password, req.role).await?;
    Ok(id)
}

pub fn get_admin_scope() -> Router<AppState> {
    Router::new().nest(
        "/admin",
        Router::new()
            .route("/courses", post(create_course))
            .route("/courses/{id}", put(update_course).delete(delete_course))
            .route("/lessons", get(list_lessons).post(add_lesson))
            .route("/lessons/{id}", put(update_lesson).delete(delete_lesson))
            .route("/users", get(list_users).post(create_account)),
    )
}
