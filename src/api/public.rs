use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
};

use crate::account::{self, AccountInfo};
use crate::catalog::{self, Course};
use crate::error::Error;
use crate::server::AppState;

#[utoipa::path(
    context_path = "/api/public",
    path = "/courses",
    method(get),
    responses((status = 200, description = "The course catalog", body = Vec<Course>))
)]
pub async fn list_courses(State(store): State<AppState>) -> Result<impl IntoResponse, Error> {
    Ok(Json(catalog::list_courses(&*store).await?))
}

#[utoipa::path(
    context_path = "/api/public",
    path = "/courses/{id}",
    method(get),
    params(("id" = String, Path, description = "Course id")),
    responses(
        (status = 200, description = "One course", body = Course),
        (status = 404, description = "Course not found")
    )
)]
pub async fn get_course(
    State(store): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, Error> {
    Ok(Json(catalog::get_course(&*store, &id).await?))
}

#[utoipa::path(
    context_path = "/api/public",
    path = "/teachers",
    method(get),
    responses((status = 200, description = "Teacher directory", body = Vec<AccountInfo>))
)]
pub async fn list_teachers(State(store): State<AppState>) -> Result<impl IntoResponse, Error> {
    Ok(Json(account::list_teachers(&*store).await?))
}

pub fn get_public_scope() -> Router<AppState> {
    Router::new().nest(
        "/public",
        Router::new()
            .route("/courses", get(list_courses))
            .route("/courses/{id}", get(get_course))
            .route("/teachers", get(list_teachers)),
    )
}
