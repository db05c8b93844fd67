//! The inbound list request and its normalized plan.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::config::DataSettings;
use crate::entity::Table;
use crate::error::DataError;
use crate::query::{Condition, Dialect, QueryBuilder};
use crate::sort::{parse_sort, SortClause, SortDirection};

/// Query parameters of a list request.
///
/// Deserializes from a decoded query string (every value a string) as well as
/// from JSON. Keys other than the pagination/search/sort ones are collected in
/// `filters`; which of them actually filter is decided by the table.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "RawListQuery")]
pub struct ListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<SortDirection>,
    pub filters: BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct RawListQuery {
    #[serde(default)]
    page: Option<Value>,
    #[serde(default)]
    limit: Option<Value>,
    #[serde(default)]
    search: Option<Value>,
    #[serde(default, rename = "sortBy", alias = "sort_by")]
    sort_by: Option<Value>,
    #[serde(default, rename = "sortOrder", alias = "sort_order")]
    sort_order: Option<Value>,
    #[serde(flatten)]
    rest: BTreeMap<String, Value>,
}

impl From<RawListQuery> for ListQuery {
    fn from(raw: RawListQuery) -> Self {
        ListQuery {
            page: raw.page.as_ref().and_then(lenient_int),
            limit: raw.limit.as_ref().and_then(lenient_int),
            search: raw.search.as_ref().and_then(scalar_string),
            sort_by: raw.sort_by.as_ref().and_then(scalar_string),
            sort_order: raw
                .sort_order
                .as_ref()
                .and_then(scalar_string)
                .map(|s| SortDirection::parse(&s)),
            filters: raw
                .rest
                .iter()
                .filter_map(|(k, v)| scalar_string(v).map(|s| (k.clone(), s)))
                .collect(),
        }
    }
}

/// Integers arrive as JSON numbers or as query-string text.
fn lenient_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from decoded query-string pairs. A repeated key keeps its last value.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut query = ListQuery::new();
        for (key, value) in pairs {
            let value = value.as_ref();
            match key.as_ref() {
                "page" => query.page = value.trim().parse().ok(),
                "limit" => query.limit = value.trim().parse().ok(),
                "search" => query.search = Some(value.to_string()),
                "sortBy" | "sort_by" => query.sort_by = Some(value.to_string()),
                "sortOrder" | "sort_order" => query.sort_order = Some(SortDirection::parse(value)),
                other => {
                    query.filters.insert(other.to_string(), value.to_string());
                }
            }
        }
        query
    }

    pub fn page(mut self, page: u64) -> Self {
        self.page = Some(i64::try_from(page).unwrap_or(i64::MAX));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(i64::try_from(limit).unwrap_or(i64::MAX));
        self
    }

    pub fn search(mut self, term: &str) -> Self {
        self.search = Some(term.to_string());
        self
    }

    pub fn sort_by(mut self, spec: &str) -> Self {
        self.sort_by = Some(spec.to_string());
        self
    }

    pub fn sort_order(mut self, direction: SortDirection) -> Self {
        self.sort_order = Some(direction);
        self
    }

    pub fn filter(mut self, key: &str, value: impl ToString) -> Self {
        self.filters.insert(key.to_string(), value.to_string());
        self
    }

    /// Normalize this request against a table's configuration.
    pub fn plan(&self, table: &Table, settings: &DataSettings) -> Result<ListPlan, DataError> {
        let page = match self.page {
            Some(p) if p > 1 => p as u64,
            _ => 1,
        };
        let limit = match self.limit {
            Some(l) if l > 0 => (l as u64).min(settings.max_limit),
            _ => settings.default_limit.min(settings.max_limit),
        };
        // databases take OFFSET as a signed 64-bit integer
        let offset = (page - 1).saturating_mul(limit).min(i64::MAX as u64);

        let search = self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty() && !table.searchable_columns().is_empty())
            .map(str::to_string);

        let conditions = table.filters().resolve(&self.filters)?;
        let sort_order = self.sort_order.unwrap_or(settings.default_sort_order);
        let mut sort = parse_sort(self.sort_by.as_deref(), sort_order, table.sort_fields());
        // id breaks ties so pages stay disjoint
        let id = table.qualified_id();
        if !sort.iter().any(|clause| clause.column == id) {
            let direction = sort.last().map_or(sort_order, |clause| clause.direction);
            sort.push(SortClause::new(&id, direction));
        }

        Ok(ListPlan {
            page,
            limit,
            offset,
            search,
            conditions,
            sort,
        })
    }
}

/// A list request after normalization: every value here is safe to render.
#[derive(Debug, Clone, PartialEq)]
pub struct ListPlan {
    pub page: u64,
    pub limit: u64,
    pub offset: u64,
    pub search: Option<String>,
    pub conditions: Vec<Condition>,
    pub sort: Vec<SortClause>,
}

impl ListPlan {
    /// The filtered, sorted, paged query over the table's read source.
    ///
    /// `build_count` on the result counts the whole filtered set; `build_select`
    /// yields the page.
    pub fn query(&self, table: &Table, dialect: Dialect) -> QueryBuilder {
        let mut q = table.query(dialect);
        if let Some(term) = &self.search {
            q = q.where_any_contains(table.searchable_columns(), term);
        }
        q.conditions(self.conditions.iter().cloned())
            .order(self.sort.iter().cloned())
            .limit(self.limit)
            .offset(self.offset)
    }
}
