use sqlx::error::{DatabaseError, ErrorKind};
use stockroom_data::{ConstraintKind, ConstraintViolation, DataError};

/// Extension trait for converting `sqlx::Error` into `DataError`.
///
/// Due to Rust's orphan rules, we can't implement `From<sqlx::Error> for DataError`
/// in this crate. Use `.map_err(SqlxErrorExt::into_data_error)` instead.
///
/// Integrity rejections become [`DataError::Constraint`] with their kind;
/// everything the driver or pool reports otherwise is passed through as
/// [`DataError::Database`] with the original error as source.
pub trait SqlxErrorExt {
    fn into_data_error(self) -> DataError;
}

impl SqlxErrorExt for sqlx::Error {
    fn into_data_error(self) -> DataError {
        match self {
            sqlx::Error::RowNotFound => DataError::NotFound("Row not found".into()),
            sqlx::Error::Database(db) => match constraint_kind(db.as_ref()) {
                Some(kind) => {
                    let mut violation = ConstraintViolation::new(kind, db.message());
                    if let Some(name) = db.constraint() {
                        violation = violation.with_constraint(name);
                    }
                    DataError::Constraint(violation)
                }
                None => DataError::database(sqlx::Error::Database(db)),
            },
            other => DataError::database(other),
        }
    }
}

fn constraint_kind(err: &dyn DatabaseError) -> Option<ConstraintKind> {
    match err.kind() {
        ErrorKind::UniqueViolation => Some(ConstraintKind::Unique),
        ErrorKind::ForeignKeyViolation => Some(ConstraintKind::ForeignKey),
        ErrorKind::NotNullViolation => Some(ConstraintKind::NotNull),
        ErrorKind::CheckViolation => Some(ConstraintKind::Check),
        _ => None,
    }
}

/// Convenience alias for data-layer results using `DataError`.
pub type SqlxResult<T> = Result<T, DataError>;
