//! Admin account workflows
//!
//! Credential verification, first-user bootstrap and password-reset token
//! issuance/consumption. Cookie/session issuance and email delivery of the
//! reset link belong to external collaborators; this service hands back the
//! token and nothing else.

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier};
use argon2::{password_hash::SaltString, Argon2};
use chrono::{Duration, Utc};
use rand::{distributions::Alphanumeric, Rng};
use std::sync::Arc;
use tracing::{info, warn};

use crate::database::user_repository::{AdminUser, UserRepository};
use crate::error::{AppError, AppResult};

const RESET_TOKEN_LEN: usize = 48;

pub struct AccountService {
    users: Arc<UserRepository>,
    reset_token_expiry_minutes: i64,
}

impl AccountService {
    pub fn new(users: Arc<UserRepository>, reset_token_expiry_minutes: i64) -> Self {
        Self {
            users,
            reset_token_expiry_minutes,
        }
    }

    /// Verify credentials; returns the user on success.
    pub async fn verify_login(&self, email: &str, password: &str) -> AppResult<AdminUser> {
        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        if !verify_password(password, &user.password_hash) {
            warn!(email = %email, "login rejected");
            return Err(AppError::InvalidCredentials);
        }

        Ok(user)
    }

    /// Seed a default admin if the user table is empty. Idempotent.
    pub async fn bootstrap_first_user(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> AppResult<Option<AdminUser>> {
        let hash = hash_password(password)?;
        let created = self
            .users
            .create_first_user_if_none(email, &hash, display_name)
            .await?;
        Ok(created)
    }

    /// Issue a reset token for the account, if it exists.
    ///
    /// Returns `None` for unknown emails so the endpoint can answer the
    /// same way either way and not confirm account existence.
    pub async fn request_password_reset(&self, email: &str) -> AppResult<Option<String>> {
        let Some(user) = self.users.find_by_email(email).await? else {
            info!("password reset requested for unknown email");
            return Ok(None);
        };

        let token = generate_reset_token();
        let expires_at = Utc::now() + Duration::minutes(self.reset_token_expiry_minutes);
        self.users
            .create_reset_token(user.id, &token, expires_at)
            .await?;

        info!(user_id = %user.id, "password reset token issued");
        Ok(Some(token))
    }

    /// Spend a reset token and set the new password in one transaction.
    pub async fn complete_password_reset(&self, token: &str, new_password: &str) -> AppResult<()> {
        let hash = hash_password(new_password)?;
        let user_id = self
            .users
            .consume_reset_token(token.trim(), &hash)
            .await?
            .ok_or(AppError::TokenInvalid)?;

        info!(user_id = %user_id, "password reset completed");
        Ok(())
    }
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("password hashing failed: {}", e)))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

fn generate_reset_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(RESET_TOKEN_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_roundtrip() {
        let hash = hash_password("correct horse battery staple").unwrap();
        assert!(verify_password("correct horse battery staple", &hash));
        assert!(!verify_password("wrong password", &hash));
    }

    #[test]
    fn bad_hash_never_verifies() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn reset_tokens_are_url_safe_and_distinct() {
        let a = generate_reset_token();
        let b = generate_reset_token();
        assert_eq!(a.len(), RESET_TOKEN_LEN);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }
}
