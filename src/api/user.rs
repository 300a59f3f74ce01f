use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use utoipa::ToSchema;

use crate::account::{self, Role};
use crate::catalog::{self, Lesson};
use crate::enrollment::{self, EnrollOutcome};
use crate::error::Error;
use crate::progress::{self, LessonAccess};
use crate::server::AppState;

use super::{SESSION_USER_KEY, current_user};

#[derive(Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[utoipa::path(
    context_path = "/api/user",
    path = "/register",
    method(post),
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Account created and signed in"),
        (status = 400, description = "Email already registered")
    )
)]
pub async fn register(
    State(store): State<AppState>,
    session: Session,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, Error> {
    let id = account::register(&*store, req.name, req.email, req.password, Role::User).await?;
    session
        .insert(SESSION_USER_KEY, &id)
        .await
        .map_err(|e| Error::Persistence(e.into()))?;
    Ok("Account created")
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[utoipa::path(
    context_path = "/api/user",
    path = "/login",
    method(post),
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful"),
        (status = 400, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(store): State<AppState>,
    session: Session,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, Error> {
    let info = account::login(&*store, &req.email, &req.password).await?;
    session
        .insert(SESSION_USER_KEY, &info.id)
        .await
        .map_err(|e| Error::Persistence(e.into()))?;
    Ok(Json(info))
}

#[utoipa::path(
    context_path = "/api/user",
    path = "/logout",
    method(post),
    responses((status = 200, description = "Logout successful"))
)]
pub async fn logout(session: Session) -> impl IntoResponse {
    let _ = session.delete().await;
    "Logout successful"
}

#[utoipa::path(
    context_path = "/api/user",
    path = "/me",
    method(get),
    responses(
        (status = 200, description = "Signed-in account", body = account::AccountInfo),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn me(
    State(store): State<AppState>,
    session: Session,
) -> Result<impl IntoResponse, Error> {
    let user_id = current_user(&session).await?;
    Ok(Json(account::get_account(&*store, &user_id).await?))
}

#[utoipa::path(
    context_path = "/api/user",
    path = "/profile",
    method(post),
    request_body = account::ProfileUpdate,
    responses(
        (status = 200, description = "Profile updated"),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn update_profile(
    State(store): State<AppState>,
    session: Session,
    Json(update): Json<account::ProfileUpdate>,
) -> Result<impl IntoResponse, Error> {
    let user_id = current_user(&session).await?;
    account::update_profile(&*store, &user_id, &update).await?;
    Ok("Profile updated")
}

#[utoipa::path(
    context_path = "/api/user",
    path = "/dashboard",
    method(get),
    responses(
        (status = 200, description = "Dashboard summary", body = enrollment::DashboardSummary),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn dashboard(
    State(store): State<AppState>,
    session: Session,
) -> Result<impl IntoResponse, Error> {
    let user_id = current_user(&session).await?;
    Ok(Json(enrollment::dashboard(&*store, &user_id).await?))
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnrollRequest {
    pub course_id: String,
}

#[utoipa::path(
    context_path = "/api/user",
    path = "/enroll",
    method(post),
    request_body = EnrollRequest,
    responses(
        (status = 200, description = "Enrolled, or already enrolled", body = EnrollOutcome),
        (status = 401, description = "Not signed in"),
        (status = 404, description = "Course not found")
    )
)]
pub async fn enroll(
    State(store): State<AppState>,
    session: Session,
    Json(req): Json<EnrollRequest>,
) -> Result<impl IntoResponse, Error> {
    let user_id = current_user(&session).await?;
    let outcome = enrollment::enroll(&*store, &user_id, &req.course_id).await?;
    Ok(Json(outcome))
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MyCourse {
    pub course_id: String,
    pub title: String,
    pub price: f64,
    pub percent: u8,
    /// Lesson index to resume at, always derived from the completed set.
    pub resume_index: usize,
}

#[utoipa::path(
    context_path = "/api/user",
    path = "/my_courses",
    method(get),
    responses(
        (status = 200, description = "Enrolled courses with progress", body = Vec<MyCourse>),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn my_courses(
    State(store): State<AppState>,
    session: Session,
) -> Result<impl IntoResponse, Error> {
    let user_id = current_user(&session).await?;
    let summary = enrollment::dashboard(&*store, &user_id).await?;
    let mut courses = Vec::with_capacity(summary.courses.len());
    for c in summary.courses {
        let lessons = catalog::course_lessons(&*store, &c.course_id).await?;
        let done = progress::completed_lessons(&*store, &user_id, &c.course_id).await?;
        let access = progress::compute_access(&lessons, &done, 0);
        let resume_index = if lessons.is_empty() {
            0
        } else {
            access.last_unlocked.min(lessons.len() - 1)
        };
        courses.push(MyCourse {
            course_id: c.course_id,
            title: c.title,
            price: c.price,
            percent: c.percent,
            resume_index,
        });
    }
    Ok(Json(courses))
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LessonView {
    pub lesson: Lesson,
    pub access: LessonAccess,
    pub lesson_count: usize,
}

#[utoipa::path(
    context_path = "/api/user",
    path = "/courses/{course_id}/lessons/{index}",
    method(get),
    params(
        ("course_id" = String, Path, description = "Course id"),
        ("index" = usize, Path, description = "Zero-based lesson index")
    ),
    responses(
        (status = 200, description = "Lesson content", body = LessonView),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Lesson still locked"),
        (status = 404, description = "No lesson at this index")
    )
)]
pub async fn view_lesson(
    State(store): State<AppState>,
    session: Session,
    Path((course_id, index)): Path<(String, usize)>,
) -> Result<impl IntoResponse, Error> {
    let user_id = current_user(&session).await?;
    let lessons = catalog::course_lessons(&*store, &course_id).await?;
    let completed = progress::completed_lessons(&*store, &user_id, &course_id).await?;
    let access = progress::compute_access(&lessons, &completed, index);
    if index >= lessons.len() {
        return Err(Error::NotFound("lesson"));
    }
    if !access.viewable {
        return Err(Error::Forbidden);
    }
    Ok(Json(LessonView {
        lesson: lessons[index].clone(),
        access,
        lesson_count: lessons.len(),
    }))
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompleteLessonRequest {
    pub course_id: String,
    pub lesson_id: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompleteLessonResponse {
    pub completed_lessons: Vec<String>,
    pub last_unlocked: usize,
}

#[utoipa::path(
    context_path = "/api/user",
    path = "/complete_lesson",
    method(post),
    request_body = CompleteLessonRequest,
    responses(
        (status = 200, description = "Lesson recorded as completed", body = CompleteLessonResponse),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Prerequisite lesson not completed"),
        (status = 404, description = "Lesson not in this course")
    )
)]
pub async fn complete_lesson(
    State(store): State<AppState>,
    session: Session,
    Json(req): Json<CompleteLessonRequest>,
) -> Result<impl IntoResponse, Error> {
    let user_id = current_user(&session).await?;
    let lessons = catalog::course_lessons(&*store, &req.course_id).await?;
    let Some(index) = lessons.iter().position(|l| l.id == req.lesson_id) else {
        return Err(Error::NotFound("lesson"));
    };
    let completed = progress::completed_lessons(&*store, &user_id, &req.course_id).await?;
    // the mutator itself never re-checks sequencing; the gate lives here
    if !progress::compute_access(&lessons, &completed, index).viewable {
        return Err(Error::Forbidden);
    }
    let completed_lessons =
        progress::mark_completed(&*store, &user_id, &req.course_id, &req.lesson_id).await?;
    let access = progress::compute_access(&lessons, &completed_lessons, 0);
    Ok(Json(CompleteLessonResponse {
        completed_lessons,
        last_unlocked: access.last_unlocked,
    }))
}

pub fn get_user_scope() -> Router<AppState> {
    Router::new().nest(
        "/user",
        Router::new()
            .route("/register", post(register))
            .route("/login", post(login))
            .route("/logout", post(logout))
            .route("/me", get(me))
            .route("/profile", post(update_profile))
            .route("/dashboard", get(dashboard))
            .route("/enroll", post(enroll))
            .route("/my_courses", get(my_courses))
            .route("/courses/{course_id}/lessons/{index}", get(view_lesson))
            .route("/complete_lesson", post(complete_lesson)),
    )
}
