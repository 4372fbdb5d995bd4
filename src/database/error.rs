//! Database error classification

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("{entity} '{id}' not found")]
    NotFound { entity: String, id: String },

    #[error("unique constraint violated: {message}")]
    UniqueViolation { message: String },

    #[error("database connection failed: {message}")]
    Connection { message: String },

    #[error("database error: {message}")]
    Query { message: String },
}

impl DatabaseError {
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => DatabaseError::NotFound {
                entity: "row".to_string(),
                id: String::new(),
            },
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                DatabaseError::UniqueViolation {
                    message: db_err.to_string(),
                }
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => DatabaseError::Connection {
                message: err.to_string(),
            },
            _ => DatabaseError::Query {
                message: err.to_string(),
            },
        }
    }
}

// Callers that can say something more precise (missing session, spent reset
// token) map NotFound themselves before this blanket conversion applies.
impl From<DatabaseError> for crate::error::AppError {
    fn from(err: DatabaseError) -> Self {
        crate::error::AppError::PersistenceFailure(err.to_string())
    }
}
