//! Admin user and password-reset token persistence
//!
//! Password hashing happens in the account service; this layer stores and
//! retrieves opaque hashes. Multi-step mutations run inside a single
//! transaction so a mid-sequence failure leaves no partial state.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::database::error::DatabaseError;

#[derive(Debug, Clone, FromRow)]
pub struct AdminUser {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct PasswordResetToken {
    pub token: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

pub struct UserRepository {
    pool: PgPool,
}

const USER_COLUMNS: &str = "id, email, password_hash, display_name, created_at, updated_at";

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<AdminUser>, DatabaseError> {
        sqlx::query_as::<_, AdminUser>(&format!(
            "SELECT {USER_COLUMNS} FROM admin_users WHERE LOWER(email) = LOWER($1)"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Seed a first admin account, but only when no users exist at all.
    /// Returns the created user, or `None` when the table was not empty.
    pub async fn create_first_user_if_none(
        &self,
        email: &str,
        password_hash: &str,
        display_name: Option<&str>,
    ) -> Result<Option<AdminUser>, DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM admin_users")
            .fetch_one(&mut *tx)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        if count > 0 {
            tx.rollback().await.map_err(DatabaseError::from_sqlx)?;
            return Ok(None);
        }

        let user = sqlx::query_as::<_, AdminUser>(&format!(
            "INSERT INTO admin_users (id, email, password_hash, display_name)
             VALUES ($1, $2, $3, $4)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(password_hash)
        .bind(display_name)
        .fetch_one(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        tx.commit().await.map_err(DatabaseError::from_sqlx)?;
        info!(email = %email, "first admin user created");
        Ok(Some(user))
    }

    pub async fn create_reset_token(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<PasswordResetToken, DatabaseError> {
        sqlx::query_as::<_, PasswordResetToken>(
            "INSERT INTO password_reset_tokens (token, user_id, expires_at)
             VALUES ($1, $2, $3)
             RETURNING token, user_id, expires_at, used_at, created_at",
        )
        .bind(token)
        .bind(user_id)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Consume a reset token and set the new password hash atomically.
    ///
    /// The token row is locked for the duration of the transaction, so a
    /// token can be spent exactly once even under concurrent submissions.
    pub async fn consume_reset_token(
        &self,
        token: &str,
        new_password_hash: &str,
    ) -> Result<Option<Uuid>, DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;

        let row = sqlx::query_as::<_, PasswordResetToken>(
            "SELECT token, user_id, expires_at, used_at, created_at
             FROM password_reset_tokens
             WHERE token = $1 AND used_at IS NULL AND expires_at > NOW()
             FOR UPDATE",
        )
        .bind(token)
        .fetch_optional(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        let Some(row) = row else {
            tx.rollback().await.map_err(DatabaseError::from_sqlx)?;
            return Ok(None);
        };

        sqlx::query("UPDATE password_reset_tokens SET used_at = NOW() WHERE token = $1")
            .bind(token)
            .execute(&mut *tx)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        sqlx::query(
            "UPDATE admin_users SET password_hash = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(row.user_id)
        .bind(new_password_hash)
        .execute(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        tx.commit().await.map_err(DatabaseError::from_sqlx)?;
        Ok(Some(row.user_id))
    }
}
