#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("not signed in")]
    NotAuthenticated,
    #[error("operation not permitted for this account")]
    Forbidden,
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("email already registered")]
    EmailInUse,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("persistence failure: {0}")]
    Persistence(#[from] anyhow::Error),
}

impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        Error::Persistence(e.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Persistence(e.into())
    }
}
