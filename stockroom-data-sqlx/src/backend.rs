//! Per-driver glue: placeholder dialect, argument binding, affected-row counts.

use sqlx::Database;
use stockroom_data::{DataError, Dialect, SqlValue};

/// A SQLx driver the repository engine can run on.
///
/// Only drivers supporting `INSERT/UPDATE ... RETURNING` qualify.
pub trait SqlxBackend: Database {
    const DIALECT: Dialect;

    fn add_argument<'q>(
        args: &mut <Self as Database>::Arguments<'q>,
        value: SqlValue,
    ) -> Result<(), DataError>;

    fn rows_affected(result: &<Self as Database>::QueryResult) -> u64;
}

/// Bind every statement parameter, in placeholder order.
pub(crate) fn bind_all<'q, DB: SqlxBackend>(
    params: Vec<SqlValue>,
) -> Result<<DB as Database>::Arguments<'q>, DataError> {
    let mut args = <<DB as Database>::Arguments<'q> as Default>::default();
    for value in params {
        DB::add_argument(&mut args, value)?;
    }
    Ok(args)
}

fn bind_error(err: sqlx::error::BoxDynError) -> DataError {
    DataError::Other(format!("failed to bind argument: {err}"))
}

#[cfg(feature = "sqlite")]
impl SqlxBackend for sqlx::Sqlite {
    const DIALECT: Dialect = Dialect::Sqlite;

    fn add_argument<'q>(
        args: &mut <Self as Database>::Arguments<'q>,
        value: SqlValue,
    ) -> Result<(), DataError> {
        use sqlx::Arguments;

        let bound = match value {
            SqlValue::Null => args.add(Option::<String>::None),
            SqlValue::Bool(v) => args.add(v),
            SqlValue::Int(v) => args.add(v),
            SqlValue::Float(v) => args.add(v),
            SqlValue::Text(v) => args.add(v),
            // SQLite stores UUIDs as hyphenated text here, not as 16-byte blobs
            SqlValue::Uuid(v) => args.add(v.hyphenated().to_string()),
            SqlValue::Timestamp(v) => args.add(v),
            SqlValue::Date(v) => args.add(v),
            SqlValue::Json(v) => args.add(sqlx::types::Json(v)),
        };
        bound.map_err(bind_error)
    }

    fn rows_affected(result: &<Self as Database>::QueryResult) -> u64 {
        result.rows_affected()
    }
}

#[cfg(feature = "postgres")]
impl SqlxBackend for sqlx::Postgres {
    const DIALECT: Dialect = Dialect::Postgres;

    fn add_argument<'q>(
        args: &mut <Self as Database>::Arguments<'q>,
        value: SqlValue,
    ) -> Result<(), DataError> {
        use sqlx::Arguments;

        let bound = match value {
            SqlValue::Null => args.add(Option::<String>::None),
            SqlValue::Bool(v) => args.add(v),
            SqlValue::Int(v) => args.add(v),
            SqlValue::Float(v) => args.add(v),
            SqlValue::Text(v) => args.add(v),
            SqlValue::Uuid(v) => args.add(v),
            SqlValue::Timestamp(v) => args.add(v),
            SqlValue::Date(v) => args.add(v),
            SqlValue::Json(v) => args.add(sqlx::types::Json(v)),
        };
        bound.map_err(bind_error)
    }

    fn rows_affected(result: &<Self as Database>::QueryResult) -> u64 {
        result.rows_affected()
    }
}
