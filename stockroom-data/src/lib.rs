//! Backend-agnostic core of the generic repository engine.
//!
//! Tables are described once with [`Table`]; list requests ([`ListQuery`])
//! are normalized into a [`ListPlan`] and rendered by [`QueryBuilder`] into
//! parameterized SQL. Drivers live in separate crates (`stockroom-data-sqlx`).

pub mod config;
pub mod entity;
pub mod error;
pub mod filter;
pub mod list;
pub mod page;
pub mod query;
pub mod repository;
pub mod row;
pub mod sort;
pub mod value;

pub use config::DataSettings;
pub use entity::{AuditColumns, Entity, Table};
pub use error::{ConstraintKind, ConstraintViolation, DataError};
pub use filter::{FilterField, FilterMode, FilterSet, UuidValidation};
pub use list::{ListPlan, ListQuery};
pub use page::{Page, PageMeta};
pub use query::{Condition, Dialect, QueryBuilder, QueryError, Statement};
pub use repository::Repository;
pub use row::{IntoRow, RowValues};
pub use sort::{parse_sort, SortClause, SortDirection, SortFieldMap};
pub use value::{SqlValue, ValueKind};

pub mod prelude {
    //! Re-exports of the most commonly used data types.
    pub use crate::{
        AuditColumns, DataError, DataSettings, Entity, FilterField, FilterMode, IntoRow,
        ListQuery, Page, Repository, RowValues, SortDirection, SqlValue, Table, UuidValidation,
        ValueKind,
    };
}
