//! Declarative per-field filters.
//!
//! A repository declares which request keys it understands; the raw key/value
//! bag from a list request is evaluated once against those declarations.

use std::collections::BTreeMap;

use crate::error::DataError;
use crate::query::Condition;
use crate::value::{SqlValue, ValueKind};

/// Keys that never act as filters, whatever the table.
pub const RESERVED_KEYS: &[&str] = &["fields", "format", "include"];

const MIN_SUFFIX: &str = "_min";
const MAX_SUFFIX: &str = "_max";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    /// `name=v` → `column = v`
    Equality,
    /// `name_min=v` → `column >= v`, `name_max=v` → `column <= v`
    Range,
    EqualityAndRange,
    /// `name=v` → case-insensitive substring match
    Contains,
}

/// How a malformed UUID filter value is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UuidValidation {
    /// Drop the filter, like any other unparseable value.
    #[default]
    Graceful,
    /// Reject the request with [`DataError::InvalidInput`].
    Strict,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterField {
    pub name: String,
    pub column: String,
    pub kind: ValueKind,
    pub mode: FilterMode,
}

impl FilterField {
    /// Declare a filter; ordered kinds get equality and range, others equality.
    pub fn new(name: &str, column: &str, kind: ValueKind) -> Self {
        let mode = if kind.is_ordered() {
            FilterMode::EqualityAndRange
        } else {
            FilterMode::Equality
        };
        Self {
            name: name.to_string(),
            column: column.to_string(),
            kind,
            mode,
        }
    }

    pub fn mode(mut self, mode: FilterMode) -> Self {
        self.mode = mode;
        self
    }

    fn accepts_equality(&self) -> bool {
        matches!(self.mode, FilterMode::Equality | FilterMode::EqualityAndRange)
    }

    fn accepts_range(&self) -> bool {
        matches!(self.mode, FilterMode::Range | FilterMode::EqualityAndRange)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bound {
    Exact,
    Min,
    Max,
}

/// The declared filters of one table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSet {
    fields: Vec<FilterField>,
    uuid_validation: UuidValidation,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: FilterField) {
        self.fields.retain(|f| f.name != field.name);
        self.fields.push(field);
    }

    pub fn set_uuid_validation(&mut self, strategy: UuidValidation) {
        self.uuid_validation = strategy;
    }

    pub fn fields(&self) -> &[FilterField] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&FilterField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Match a request key to a declared field and the bound it expresses.
    ///
    /// An exact declared name wins over a `_min`/`_max` reading, so a field
    /// literally called `stock_min` stays an equality filter.
    fn lookup(&self, key: &str) -> Option<(&FilterField, Bound)> {
        if let Some(field) = self.get(key) {
            return match field.mode {
                FilterMode::Contains | FilterMode::Equality | FilterMode::EqualityAndRange => {
                    Some((field, Bound::Exact))
                }
                FilterMode::Range => None,
            };
        }
        if let Some(base) = key.strip_suffix(MIN_SUFFIX) {
            return self
                .get(base)
                .filter(|f| f.accepts_range())
                .map(|f| (f, Bound::Min));
        }
        if let Some(base) = key.strip_suffix(MAX_SUFFIX) {
            return self
                .get(base)
                .filter(|f| f.accepts_range())
                .map(|f| (f, Bound::Max));
        }
        None
    }

    /// Evaluate a raw filter bag into AND-combined conditions.
    ///
    /// Reserved and undeclared keys, empty values and unparseable values are
    /// skipped. Under [`UuidValidation::Strict`] a malformed UUID is an error.
    pub fn resolve(&self, filters: &BTreeMap<String, String>) -> Result<Vec<Condition>, DataError> {
        let mut conditions = Vec::new();
        for (key, raw) in filters {
            if RESERVED_KEYS.contains(&key.as_str()) {
                continue;
            }
            let Some((field, bound)) = self.lookup(key) else {
                tracing::debug!(filter = %key, "Ignoring undeclared filter key");
                continue;
            };
            if raw.trim().is_empty() {
                continue;
            }

            if field.mode == FilterMode::Contains {
                conditions.push(Condition::Contains(field.column.clone(), raw.trim().to_string()));
                continue;
            }

            let Some(value) = self.parse_value(field, key, raw)? else {
                continue;
            };
            let column = field.column.clone();
            conditions.push(match bound {
                Bound::Exact if field.accepts_equality() => Condition::Eq(column, value),
                Bound::Exact => continue,
                Bound::Min => Condition::Gte(column, value),
                Bound::Max => Condition::Lte(column, value),
            });
        }
        Ok(conditions)
    }

    fn parse_value(
        &self,
        field: &FilterField,
        key: &str,
        raw: &str,
    ) -> Result<Option<SqlValue>, DataError> {
        match field.kind.parse(raw) {
            Some(value) => Ok(Some(value)),
            None if field.kind == ValueKind::Uuid
                && self.uuid_validation == UuidValidation::Strict =>
            {
                Err(DataError::InvalidInput(format!(
                    "'{key}' must be a valid UUID"
                )))
            }
            None => {
                tracing::debug!(filter = %key, value = %raw, "Dropping unparseable filter value");
                Ok(None)
            }
        }
    }
}
