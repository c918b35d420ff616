//! Account creation and password authentication.

use std::sync::Arc;

use argon2::Argon2;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use tracing::info;

use super::error::AppError;
use super::repos::{CreateUserParams, UsersRepo};
use crate::domain::entities::UserRecord;
use crate::domain::types::RecordId;

#[derive(Clone)]
pub struct UserService {
    repo: Arc<dyn UsersRepo>,
}

impl UserService {
    pub fn new(repo: Arc<dyn UsersRepo>) -> Self {
        Self { repo }
    }

    /// Register an account. The email is normalized before storage so lookups
    /// are case-insensitive; the password is stored only as an Argon2id hash.
    pub async fn create(&self, email: &str, password: &str) -> Result<UserRecord, AppError> {
        let email = normalize_email(email)?;
        if password.is_empty() {
            return Err(AppError::Validation("password must not be empty".into()));
        }
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|err| AppError::Unexpected(format!("password hashing failed: {err}")))?
            .to_string();

        let user = self
            .repo
            .create_user(CreateUserParams {
                id: RecordId::generate(),
                email,
                password_hash,
            })
            .await?;
        info!(user_id = %user.id, "user created");
        Ok(user)
    }

    /// Verify an email/password pair.
    ///
    /// Unknown email and wrong password both come back as
    /// [`AppError::Unauthorized`] so callers cannot probe which emails exist.
    pub async fn authenticate_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<UserRecord, AppError> {
        let email = normalize_email(email).map_err(|_| AppError::Unauthorized)?;
        let Some(user) = self.repo.find_by_email(&email).await? else {
            return Err(AppError::Unauthorized);
        };
        let parsed = PasswordHash::new(&user.password_hash)
            .map_err(|err| AppError::Unexpected(format!("stored hash unreadable: {err}")))?;
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .map_err(|_| AppError::Unauthorized)?;
        Ok(user)
    }

    pub async fn get_by_id(&self, id: &RecordId) -> Result<UserRecord, AppError> {
        self.repo.find_by_id(id).await?.ok_or(AppError::NotFound)
    }
}

fn normalize_email(email: &str) -> Result<String, AppError> {
    let email = email.trim().to_ascii_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(AppError::Validation("invalid email address".into())),
    }
}
