//! Scoped transactions.
//!
//! [`with_transaction`] borrows one connection from the pool, hands the
//! callback a [`Tx`] and commits or rolls back depending on its outcome. Every
//! exit path releases the connection: an `Err` rolls back explicitly, a panic
//! or a dropped future rolls back when the inner `Transaction` is dropped.

use futures_util::future::BoxFuture;
use sqlx::{Database, Pool, Transaction};
use std::ops::{Deref, DerefMut};
use stockroom_data::DataError;

use crate::error::SqlxErrorExt;

/// Anything that can hand out the pool a transaction is started from.
///
/// ```ignore
/// impl HasPool<Postgres> for AppState {
///     fn pool(&self) -> &Pool<Postgres> {
///         &self.pool
///     }
/// }
/// ```
pub trait HasPool<DB: Database> {
    fn pool(&self) -> &Pool<DB>;
}

impl<DB: Database> HasPool<DB> for Pool<DB> {
    fn pool(&self) -> &Pool<DB> {
        self
    }
}

/// A wrapper around SQLx [`Transaction`].
///
/// Dropping a `Tx` that was neither committed nor rolled back rolls it back.
pub struct Tx<'a, DB: Database>(pub Transaction<'a, DB>);

impl<'a, DB: Database> Deref for Tx<'a, DB> {
    type Target = Transaction<'a, DB>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'a, DB: Database> DerefMut for Tx<'a, DB> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<DB: Database> Tx<'static, DB> {
    pub async fn begin(pool: &Pool<DB>) -> Result<Self, DataError> {
        let tx = pool.begin().await.map_err(SqlxErrorExt::into_data_error)?;
        Ok(Tx(tx))
    }
}

impl<'a, DB: Database> Tx<'a, DB> {
    /// Unwraps the `Tx` into the inner `Transaction`.
    pub fn into_inner(self) -> Transaction<'a, DB> {
        self.0
    }

    /// The connection every statement of this transaction must run on.
    pub fn as_mut(&mut self) -> &mut <DB as Database>::Connection {
        &mut *self.0
    }

    pub async fn commit(self) -> Result<(), DataError> {
        self.0.commit().await.map_err(SqlxErrorExt::into_data_error)
    }

    pub async fn rollback(self) -> Result<(), DataError> {
        self.0.rollback().await.map_err(SqlxErrorExt::into_data_error)
    }
}

/// Run `f` inside one transaction: commit on `Ok`, roll back on `Err`.
///
/// Errors from beginning or committing surface as `E::from(DataError)`. A
/// failing rollback is logged and the callback's own error is returned.
///
/// ```ignore
/// let repo = drugs.clone();
/// let created = with_transaction(&pool, move |tx| {
///     Box::pin(async move {
///         let drug = repo.create_in(tx.as_mut(), new_drug).await?;
///         repo.update_in(tx.as_mut(), drug.id(), restock).await?;
///         Ok::<_, DataError>(drug)
///     })
/// })
/// .await?;
/// ```
pub async fn with_transaction<DB, S, F, R, E>(source: &S, f: F) -> Result<R, E>
where
    DB: Database,
    S: HasPool<DB> + ?Sized,
    F: for<'t> FnOnce(&'t mut Tx<'static, DB>) -> BoxFuture<'t, Result<R, E>>,
    E: From<DataError>,
{
    let mut tx = Tx::begin(source.pool()).await?;
    match f(&mut tx).await {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(error = %rollback_err, "Transaction rollback failed");
            }
            Err(err)
        }
    }
}
