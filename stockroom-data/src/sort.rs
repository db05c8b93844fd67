//! Multi-key sort parsing.
//!
//! Client sort names are resolved through a [`SortFieldMap`]; a name the map
//! does not know falls back to a fixed column. The raw client string never
//! reaches an `ORDER BY` clause.

use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    /// Lenient parse: `asc` (any case, surrounding whitespace ignored) is
    /// ascending, anything else is descending.
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("asc") {
            SortDirection::Asc
        } else {
            SortDirection::Desc
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Asc => write!(f, "asc"),
            SortDirection::Desc => write!(f, "desc"),
        }
    }
}

impl<'de> serde::Deserialize<'de> for SortDirection {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(SortDirection::parse(&raw))
    }
}

impl serde::Serialize for SortDirection {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One resolved `ORDER BY` term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortClause {
    pub column: String,
    pub direction: SortDirection,
}

impl SortClause {
    pub fn new(column: &str, direction: SortDirection) -> Self {
        Self {
            column: column.to_string(),
            direction,
        }
    }
}

/// API sort name → fully-qualified column, with a fallback column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortFieldMap {
    fields: BTreeMap<String, String>,
    fallback: String,
}

impl SortFieldMap {
    pub fn new(fallback: &str) -> Self {
        Self {
            fields: BTreeMap::new(),
            fallback: fallback.to_string(),
        }
    }

    pub fn insert(&mut self, name: &str, column: &str) {
        self.fields.insert(name.to_string(), column.to_string());
    }

    /// Register a column only if the name is still free.
    pub fn insert_default(&mut self, name: &str, column: &str) {
        self.fields
            .entry(name.to_string())
            .or_insert_with(|| column.to_string());
    }

    pub fn set_fallback(&mut self, column: &str) {
        self.fallback = column.to_string();
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields
            .values()
            .map(String::as_str)
            .chain(std::iter::once(self.fallback.as_str()))
    }

    /// Resolve a client-supplied name. Unknown names yield the fallback column.
    pub fn resolve(&self, name: &str) -> &str {
        match self.fields.get(name.trim()) {
            Some(column) => column,
            None => {
                tracing::debug!(sort_field = name, fallback = %self.fallback, "Unknown sort field, using fallback");
                &self.fallback
            }
        }
    }
}

/// Field sorted on when the request names none.
pub const DEFAULT_SORT_FIELD: &str = "created_at";

/// Parse a sort request into resolved clauses.
///
/// `sort_by` may be a single name (direction from `sort_order`) or a list
/// `field[:dir](,field[:dir])*`; each clause is resolved independently and
/// empty segments are skipped. With no usable clause the result is
/// `created_at` in `sort_order`.
pub fn parse_sort(
    sort_by: Option<&str>,
    sort_order: SortDirection,
    map: &SortFieldMap,
) -> Vec<SortClause> {
    let clauses: Vec<SortClause> = sort_by
        .unwrap_or_default()
        .split(',')
        .filter_map(|segment| {
            let (field, direction) = match segment.split_once(':') {
                Some((field, dir)) => (field.trim(), SortDirection::parse(dir)),
                None => (segment.trim(), sort_order),
            };
            if field.is_empty() {
                return None;
            }
            Some(SortClause::new(map.resolve(field), direction))
        })
        .collect();

    if clauses.is_empty() {
        vec![SortClause::new(map.resolve(DEFAULT_SORT_FIELD), sort_order)]
    } else {
        clauses
    }
}
