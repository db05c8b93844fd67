use std::fmt::Display;

use chrono::Utc;

use crate::error::DataError;
use crate::filter::{FilterField, FilterSet, UuidValidation};
use crate::query::{validate_identifier, Dialect, QueryBuilder};
use crate::row::RowValues;
use crate::sort::SortFieldMap;
use crate::value::SqlValue;

/// Trait representing a database entity exposed through the generic repository.
///
/// The row→entity projection is the backend's row decoding (`sqlx::FromRow`
/// for the SQLx backend); the DTO→row projection is [`crate::IntoRow`].
///
/// # Example
///
/// ```ignore
/// impl Entity for Drug {
///     type Id = i64;
///
///     fn table() -> Table {
///         Table::new("inventory.drugs")
///             .searchable(["inventory.drugs.generic_name", "inventory.drugs.trade_name"])
///             .sort_field("genericName", "inventory.drugs.generic_name")
///             .filter(FilterField::new("unit_price", "inventory.drugs.unit_price", ValueKind::Float))
///     }
///
///     fn id(&self) -> &i64 { &self.id }
/// }
/// ```
pub trait Entity: Send + Sync + Unpin + 'static {
    type Id: Into<SqlValue> + Clone + Display + Send + Sync + 'static;

    fn table() -> Table;
    fn id(&self) -> &Self::Id;
}

/// Which audit columns the engine maintains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditColumns {
    pub created_at: bool,
    pub updated_at: bool,
    pub created_by: bool,
    pub updated_by: bool,
}

impl Default for AuditColumns {
    fn default() -> Self {
        Self {
            created_at: true,
            updated_at: true,
            created_by: false,
            updated_by: false,
        }
    }
}

impl AuditColumns {
    pub fn none() -> Self {
        Self {
            created_at: false,
            updated_at: false,
            created_by: false,
            updated_by: false,
        }
    }

    pub fn with_actors(mut self) -> Self {
        self.created_by = true;
        self.updated_by = true;
        self
    }
}

pub const CREATED_AT: &str = "created_at";
pub const UPDATED_AT: &str = "updated_at";
pub const CREATED_BY: &str = "created_by";
pub const UPDATED_BY: &str = "updated_by";

/// Configuration record of one entity table.
///
/// Everything the generic engine needs to know about a table: its name and
/// key, which columns free-text search covers, how sort names and filter keys
/// map to columns, and an optional pre-joined read source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    name: String,
    id_column: String,
    searchable: Vec<String>,
    sort_fields: SortFieldMap,
    fallback_overridden: bool,
    filters: FilterSet,
    join: Option<(String, String)>,
    audit: AuditColumns,
}

impl Table {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            id_column: "id".to_string(),
            searchable: Vec::new(),
            sort_fields: SortFieldMap::new(&format!("{name}.id")),
            fallback_overridden: false,
            filters: FilterSet::new(),
            join: None,
            audit: AuditColumns::default(),
        }
    }

    pub fn id_column(mut self, column: &str) -> Self {
        self.id_column = column.to_string();
        self
    }

    pub fn searchable<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.searchable
            .extend(columns.into_iter().map(|c| c.as_ref().to_string()));
        self
    }

    pub fn sort_field(mut self, name: &str, column: &str) -> Self {
        self.sort_fields.insert(name, column);
        self
    }

    /// Column used when a requested sort name is unknown (default `<table>.<id>`).
    pub fn fallback_sort(mut self, column: &str) -> Self {
        self.sort_fields.set_fallback(column);
        self.fallback_overridden = true;
        self
    }

    pub fn filter(mut self, field: FilterField) -> Self {
        self.filters.push(field);
        self
    }

    /// Read through a joined source. `from` follows `FROM`; `select` is the
    /// column list and must still expose the base table's columns.
    pub fn join(mut self, from: &str, select: &str) -> Self {
        self.join = Some((from.to_string(), select.to_string()));
        self
    }

    pub fn audit(mut self, audit: AuditColumns) -> Self {
        self.audit = audit;
        self
    }

    pub fn uuid_validation(mut self, strategy: UuidValidation) -> Self {
        self.filters.set_uuid_validation(strategy);
        self
    }

    /// Check identifiers and register the implicit sort fields.
    ///
    /// Repositories call this once at construction.
    pub fn validate(mut self) -> Result<Self, DataError> {
        validate_identifier(&self.name, "table")?;
        validate_identifier(&self.id_column, "column")?;
        for column in &self.searchable {
            validate_identifier(column, "column")?;
        }
        for column in self.sort_fields.columns() {
            validate_identifier(column, "column")?;
        }
        for field in self.filters.fields() {
            validate_identifier(&field.column, "column")?;
        }

        let id = self.qualified(&self.id_column);
        if !self.fallback_overridden {
            self.sort_fields.set_fallback(&id);
        }
        self.sort_fields.insert_default("id", &id);
        if self.audit.created_at {
            let col = self.qualified(CREATED_AT);
            self.sort_fields.insert_default(CREATED_AT, &col);
            self.sort_fields.insert_default("createdAt", &col);
        }
        if self.audit.updated_at {
            let col = self.qualified(UPDATED_AT);
            self.sort_fields.insert_default(UPDATED_AT, &col);
            self.sort_fields.insert_default("updatedAt", &col);
        }
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id_column_name(&self) -> &str {
        &self.id_column
    }

    /// `<table>.<column>`
    pub fn qualified(&self, column: &str) -> String {
        format!("{}.{column}", self.name)
    }

    pub fn qualified_id(&self) -> String {
        self.qualified(&self.id_column)
    }

    pub fn searchable_columns(&self) -> &[String] {
        &self.searchable
    }

    pub fn sort_fields(&self) -> &SortFieldMap {
        &self.sort_fields
    }

    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    pub fn has_join(&self) -> bool {
        self.join.is_some()
    }

    pub fn audit_columns(&self) -> AuditColumns {
        self.audit
    }

    /// A builder over this table, reading through the join when configured.
    pub fn query(&self, dialect: Dialect) -> QueryBuilder {
        let q = QueryBuilder::new_with_dialect(&self.name, dialect);
        match &self.join {
            Some((from, select)) => q.join(from, select),
            None => q,
        }
    }

    /// A builder over the bare table, for writes and existence probes.
    pub fn base_query(&self, dialect: Dialect) -> QueryBuilder {
        QueryBuilder::new_with_dialect(&self.name, dialect)
    }

    /// Stamp audit columns on a row about to be inserted.
    pub fn stamp_create(&self, row: &mut RowValues, actor: Option<&SqlValue>) {
        if self.audit.created_at {
            row.insert_missing(CREATED_AT, SqlValue::Timestamp(Utc::now()));
        }
        if let Some(actor) = actor {
            if self.audit.created_by {
                row.insert_missing(CREATED_BY, actor.clone());
            }
            if self.audit.updated_by {
                row.insert_missing(UPDATED_BY, actor.clone());
            }
        }
    }

    /// Stamp audit columns on an update. `updated_at` is always refreshed.
    pub fn stamp_update(&self, row: &mut RowValues, actor: Option<&SqlValue>) {
        if self.audit.updated_at {
            row.insert(UPDATED_AT, SqlValue::Timestamp(Utc::now()));
        }
        if let (Some(actor), true) = (actor, self.audit.updated_by) {
            row.insert(UPDATED_BY, actor.clone());
        }
    }
}
