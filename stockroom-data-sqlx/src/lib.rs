//! # stockroom-data-sqlx — SQLx backend for the Stockroom data layer
//!
//! Runs the generic repository engine of [`stockroom_data`] on a
//! [SQLx](https://github.com/launchbadge/sqlx) pool.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`SqlxRepository`] | The engine: CRUD, list, bulk ops, on a pool or a borrowed connection |
//! | [`Tx`] | Transaction wrapper, rolled back on drop |
//! | [`with_transaction`] | Commit-on-`Ok`, rollback-on-`Err` scope |
//! | [`HasPool`] | Anything that hands out a pool |
//! | [`SqlxBackend`] | Driver glue (dialect, argument binding) |
//! | [`SqlxErrorExt`] | `sqlx::Error` → `DataError` classification |
//!
//! # Feature flags
//!
//! | Feature    | Driver |
//! |------------|--------|
//! | `sqlite`   | SQLite via `sqlx/sqlite` (default) |
//! | `postgres` | PostgreSQL via `sqlx/postgres` |
//!
//! # Quick start
//!
//! ```ignore
//! use stockroom_data_sqlx::prelude::*;
//! use sqlx::Sqlite;
//!
//! #[derive(sqlx::FromRow)]
//! struct Drug { id: i64, name: String, unit_price: f64 }
//!
//! impl Entity for Drug {
//!     type Id = i64;
//!     fn table() -> Table {
//!         Table::new("drugs")
//!             .searchable(["drugs.name"])
//!             .sort_field("name", "drugs.name")
//!             .filter(FilterField::new("unit_price", "drugs.unit_price", ValueKind::Float))
//!     }
//!     fn id(&self) -> &i64 { &self.id }
//! }
//!
//! let drugs = SqlxRepository::<Drug, Sqlite>::new(pool.clone())?;
//! let page = drugs
//!     .list(&ListQuery::from_pairs([("unit_price_max", "5"), ("sortBy", "name:asc")]))
//!     .await?;
//! ```
//!
//! # Transactions
//!
//! Every operation has an `_in` twin taking `&mut DB::Connection`:
//!
//! ```ignore
//! let repo = drugs.clone();
//! drugs
//!     .with_transaction(move |tx| {
//!         Box::pin(async move {
//!             let drug = repo.create_in(tx.as_mut(), new_drug).await?;
//!             repo.delete_in(tx.as_mut(), &old_id).await?;
//!             Ok::<_, DataError>(drug)
//!         })
//!     })
//!     .await?;
//! ```

pub mod backend;
pub mod error;
pub mod repository;
pub mod tx;

pub use backend::SqlxBackend;
pub use error::{SqlxErrorExt, SqlxResult};
pub use repository::SqlxRepository;
pub use tx::{with_transaction, HasPool, Tx};

/// Re-exports of the most commonly used types from both `stockroom-data` and this crate.
pub mod prelude {
    pub use crate::{with_transaction, HasPool, SqlxErrorExt, SqlxRepository, Tx};
    pub use stockroom_data::prelude::*;
}
