use thiserror::Error;

pub type DbResult<T> = Result<T, DbError>;

/// Postgres SQLSTATE for unique_violation
const PG_UNIQUE_VIOLATION: &str = "23505";
/// Postgres SQLSTATE for foreign_key_violation
const PG_FOREIGN_KEY_VIOLATION: &str = "23503";

/// Errors from the routing data model and its storage backends
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    #[error("Invalid value: {0}")]
    Invalid(String),

    #[error("Session already committed or rolled back")]
    SessionClosed,

    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error(transparent)]
    Sqlx(sqlx::Error),
}

impl DbError {
    pub fn conflict(message: impl Into<String>) -> Self {
        DbError::Conflict(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        DbError::NotFound(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        DbError::Configuration(message.into())
    }

    pub fn not_authorized(message: impl Into<String>) -> Self {
        DbError::NotAuthorized(message.into())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        DbError::Invalid(message.into())
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, DbError::Conflict(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DbError::NotFound(_))
    }

    /// Stable code for callers that translate errors to their own surface
    pub fn error_code(&self) -> &'static str {
        match self {
            DbError::Conflict(_) => "CONFLICT",
            DbError::NotFound(_) => "NOT_FOUND",
            DbError::Configuration(_) => "CONFIGURATION_ERROR",
            DbError::NotAuthorized(_) => "NOT_AUTHORIZED",
            DbError::Invalid(_) => "INVALID_VALUE",
            DbError::SessionClosed => "SESSION_CLOSED",
            DbError::ConfigMissing(_) => "CONFIG_MISSING",
            DbError::InvalidDatabaseUrl => "INVALID_DATABASE_URL",
            DbError::Sqlx(_) => "DATABASE_ERROR",
        }
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            match db_err.code().as_deref() {
                Some(PG_UNIQUE_VIOLATION) => {
                    return DbError::Conflict(db_err.message().to_string());
                }
                Some(PG_FOREIGN_KEY_VIOLATION) => {
                    return DbError::NotFound(db_err.message().to_string());
                }
                _ => {}
            }
        }
        DbError::Sqlx(err)
    }
}

/// Reject values longer than the backing column allows
pub fn check_len(field: &str, value: &str, max: usize) -> DbResult<()> {
    if value.is_empty() {
        return Err(DbError::invalid(format!("{} must not be empty", field)));
    }
    if value.chars().count() > max {
        return Err(DbError::invalid(format!(
            "{} exceeds {} characters",
            field, max
        )));
    }
    Ok(())
}
