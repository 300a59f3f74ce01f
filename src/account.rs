use argon2::{
    Argon2, PasswordVerifier,
    password_hash::{PasswordHash, PasswordHasher, SaltString, rand_core::OsRng},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use time::OffsetDateTime;
use tracing::info;
use utoipa::ToSchema;

use crate::error::Error;
use crate::store::{DocumentStore, collections};
use crate::utils::now_utc;

/// Which API scope a session may use. `Teacher` may manage its own courses,
/// `Admin` everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
    User,
}

/// Stored account document. `password` holds the argon2 hash, never the
/// plaintext; it stays out of every API response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Account {
    name: String,
    email: String,
    password: String,
    role: Role,
    #[serde(default = "now_utc", with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl AccountInfo {
    fn from_doc(id: String, account: Account) -> Self {
        Self {
            id,
            name: account.name,
            email: account.email,
            role: account.role,
            created_at: account.created_at,
        }
    }
}

pub async fn register(
    store: &impl DocumentStore,
    name: String,
    email: String,
    password: String,
    role: Role,
) -> Result<String, Error> {
    if store
        .count(collections::USERS, &[("email", json!(email))])
        .await?
        > 0
    {
        return Err(Error::EmailInUse);
    }
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
        .to_string();
    let account = Account {
        name,
        email,
        password: password_hash,
        role,
        created_at: now_utc(),
    };
    let id = store
        .create(collections::USERS, serde_json::to_value(&account)?)
        .await?;
    info!("registered account {id} ({:?})", role);
    Ok(id)
}

pub async fn login(
    store: &impl DocumentStore,
    email: &str,
    password: &str,
) -> Result<AccountInfo, Error> {
    let mut docs = store
        .query(collections::USERS, &[("email", json!(email))])
        .await?;
    let Some(doc) = docs.pop() else {
        return Err(Error::InvalidCredentials);
    };
    let account: Account = serde_json::from_value(doc.data)?;
    let parsed_hash = PasswordHash::new(&account.password)
        .map_err(|e| anyhow::anyhow!("Failed to parse password hash: {}", e))?;
    if Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_err()
    {
        return Err(Error::InvalidCredentials);
    }
    Ok(AccountInfo::from_doc(doc.key, account))
}

pub async fn get_account(store: &impl DocumentStore, id: &str) -> Result<AccountInfo, Error> {
    let Some(data) = store.get(collections::USERS, id).await? else {
        return Err(Error::NotFound("account"));
    };
    let account: Account = serde_json::from_value(data)?;
    Ok(AccountInfo::from_doc(id.to_string(), account))
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

pub async fn update_profile(
    store: &impl DocumentStore,
    id: &str,
    update: &ProfileUpdate,
) -> Result<(), Error> {
    store
        .merge(collections::USERS, id, serde_json::to_value(update)?)
        .await
}

pub async fn list_accounts(store: &impl DocumentStore) -> Result<Vec<AccountInfo>, Error> {
    let docs = store.query(collections::USERS, &[]).await?;
    let mut accounts = Vec::with_capacity(docs.len());
    for doc in docs {
        let account: Account = serde_json::from_value(doc.data)?;
        accounts.push(AccountInfo::from_doc(doc.key, account));
    }
    Ok(accounts)
}

/// The public teacher directory.
pub async fn list_teachers(store: &impl DocumentStore) -> Result<Vec<AccountInfo>, Error> {
    let docs = store
        .query(collections::USERS, &[("role", json!("teacher"))])
        .await?;
    let mut teachers = Vec::with_capacity(docs.len());
    for doc in docs {
        let account: Account = serde_json::from_value(doc.data)?;
        teachers.push(AccountInfo::from_doc(doc.key, account));
    }
    Ok(teachers)
}
