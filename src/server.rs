use std::sync::Arc;

use axum::Router;
use time::Duration;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tower_sessions::{Expiry, MemoryStore as SessionStore, SessionManagerLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{admin::get_admin_scope, public::get_public_scope, user::get_user_scope};
use crate::store::sqlite::SqliteStore;

pub type AppState = Arc<SqliteStore>;

#[derive(OpenApi)]
#[openapi(paths(
    crate::api::user::register,
    crate::api::user::login,
    crate::api::user::logout,
    crate::api::user::me,
    crate::api::user::update_profile,
    crate::api::user::dashboard,
    crate::api::user::enroll,
    crate::api::user::my_courses,
    crate::api::user::view_lesson,
    crate::api::user::complete_lesson,
))]
struct UserApiDoc;

#[derive(OpenApi)]
#[openapi(paths(
    crate::api::admin::create_course,
    crate::api::admin::update_course,
    crate::api::admin::delete_course,
    crate::api::admin::add_lesson,
    crate::api::admin::list_lessons,
    crate::api::admin::update_lesson,
    crate::api::admin::delete_lesson,
    crate::api::admin::list_users,
    crate::api::admin::create_account,
    crate::api::public::list_courses,
    crate::api::public::get_course,
    crate::api::public::list_teachers,
))]
struct AdminApiDoc;

/// The full application: `/api` scopes behind the session layer, swagger
/// outside it.
pub fn app(store: AppState) -> Router {
    let session_store = SessionStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_expiry(Expiry::OnInactivity(Duration::days(5)));

    let api = Router::new()
        .merge(get_user_scope())
        .merge(get_admin_scope())
        .merge(get_public_scope())
        .layer(session_layer)
        .with_state(store);

    Router::new()
        .merge(
            SwaggerUi::new("/swagger-ui")
                .url("/api-docs/user/openapi.json", UserApiDoc::openapi())
                .url("/api-docs/admin/openapi.json", AdminApiDoc::openapi()),
        )
        .nest("/api", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}
