pub mod admin;
pub mod public;
pub mod user;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tower_sessions::Session;

use crate::account::{self, AccountInfo, Role};
use crate::error::Error;
use crate::store::DocumentStore;

pub(crate) const SESSION_USER_KEY: &str = "user_id";

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::NotAuthenticated => StatusCode::UNAUTHORIZED,
            Error::Forbidden => StatusCode::FORBIDDEN,
            Error::InvalidCredentials | Error::EmailInUse => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

/// Resolve the signed-in user's id from the session. Core operations take
/// this id explicitly; nothing below the API layer reads the session.
pub async fn current_user(session: &Session) -> Result<String, Error> {
    session
        .get::<String>(SESSION_USER_KEY)
        .await
        .map_err(|e| Error::Persistence(e.into()))?
        .ok_or(Error::NotAuthenticated)
}

/// Resolve the signed-in account and require a staff role (admin or
/// teacher). Used by the management scope.
pub async fn require_staff(
    store: &impl DocumentStore,
    session: &Session,
) -> Result<AccountInfo, Error> {
    let user_id = current_user(session).await?;
    let info = account::get_account(store, &user_id).await?;
    if info.role == Role::User {
        return Err(Error::Forbidden);
    }
    Ok(info)
}
