use crate::query::QueryError;

/// Which integrity rule a rejected write broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    Unique,
    ForeignKey,
    NotNull,
    Check,
    Other,
}

impl std::fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConstraintKind::Unique => write!(f, "unique"),
            ConstraintKind::ForeignKey => write!(f, "foreign key"),
            ConstraintKind::NotNull => write!(f, "not null"),
            ConstraintKind::Check => write!(f, "check"),
            ConstraintKind::Other => write!(f, "integrity"),
        }
    }
}

/// A database-level rejection of a write.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} constraint violated{}: {message}", constraint_suffix(.constraint))]
pub struct ConstraintViolation {
    pub kind: ConstraintKind,
    /// Constraint name, when the driver reports one.
    pub constraint: Option<String>,
    pub message: String,
}

fn constraint_suffix(constraint: &Option<String>) -> String {
    constraint
        .as_deref()
        .map(|c| format!(" ({c})"))
        .unwrap_or_default()
}

impl ConstraintViolation {
    pub fn new(kind: ConstraintKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            constraint: None,
            message: message.into(),
        }
    }

    pub fn with_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraint = Some(constraint.into());
        self
    }
}

/// Errors that can occur in the data layer.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Constraint(#[from] ConstraintViolation),
    /// Failure to reach or execute against the database. Never retried here.
    #[error("Database error: {0}")]
    Database(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error("Data error: {0}")]
    Other(String),
}

impl DataError {
    /// Construct a `Database` variant from any error type.
    ///
    /// Used by backend crates (e.g. `stockroom-data-sqlx`) to wrap
    /// driver-specific errors.
    pub fn database(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        DataError::Database(Box::new(err))
    }

    pub fn constraint_kind(&self) -> Option<ConstraintKind> {
        match self {
            DataError::Constraint(v) => Some(v.kind),
            _ => None,
        }
    }

    pub fn is_unique_violation(&self) -> bool {
        self.constraint_kind() == Some(ConstraintKind::Unique)
    }

    pub fn is_foreign_key_violation(&self) -> bool {
        self.constraint_kind() == Some(ConstraintKind::ForeignKey)
    }

    pub fn is_connectivity(&self) -> bool {
        matches!(self, DataError::Database(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_display_includes_name() {
        let err = DataError::from(
            ConstraintViolation::new(ConstraintKind::Unique, "duplicate key")
                .with_constraint("drugs_code_key"),
        );
        assert_eq!(
            err.to_string(),
            "unique constraint violated (drugs_code_key): duplicate key"
        );
        assert!(err.is_unique_violation());
        assert!(!err.is_connectivity());
    }

    #[test]
    fn test_database_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = DataError::database(io);
        assert!(err.is_connectivity());
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(err.constraint_kind(), None);
    }
}
