use crate::value::SqlValue;

/// Column values destined for an INSERT or UPDATE, in insertion order.
///
/// Built by [`IntoRow`] implementations. A field that is absent from a DTO
/// is simply never `set`, which is what makes updates partial.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowValues {
    values: Vec<(String, SqlValue)>,
}

impl RowValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always write `column`. Setting a column twice keeps the last value.
    pub fn set(mut self, column: &str, value: impl Into<SqlValue>) -> Self {
        self.insert(column, value.into());
        self
    }

    /// Write `column` only when the value is present.
    pub fn set_opt<V: Into<SqlValue>>(self, column: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.set(column, v),
            None => self,
        }
    }

    /// Distinguish an absent field (`None`) from an explicit NULL (`Some(None)`).
    pub fn set_nullable<V: Into<SqlValue>>(self, column: &str, value: Option<Option<V>>) -> Self {
        match value {
            Some(Some(v)) => self.set(column, v),
            Some(None) => self.set(column, SqlValue::Null),
            None => self,
        }
    }

    pub(crate) fn insert(&mut self, column: &str, value: SqlValue) {
        if let Some(slot) = self.values.iter_mut().find(|(c, _)| c == column) {
            slot.1 = value;
        } else {
            self.values.push((column.to_string(), value));
        }
    }

    /// Write `column` unless the DTO already did.
    pub(crate) fn insert_missing(&mut self, column: &str, value: SqlValue) {
        if !self.contains(column) {
            self.values.push((column.to_string(), value));
        }
    }

    pub fn contains(&self, column: &str) -> bool {
        self.values.iter().any(|(c, _)| c == column)
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.values.iter().find(|(c, _)| c == column).map(|(_, v)| v)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(c, _)| c.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.values.iter().map(|(c, v)| (c.as_str(), v))
    }

    pub fn into_values(self) -> Vec<(String, SqlValue)> {
        self.values
    }
}

/// Projection of a create/update DTO onto table columns.
///
/// ```ignore
/// impl IntoRow for UpdateDrug {
///     fn into_row(self) -> RowValues {
///         RowValues::new()
///             .set_opt("generic_name", self.generic_name)
///             .set_opt("unit_price", self.unit_price)
///     }
/// }
/// ```
pub trait IntoRow {
    fn into_row(self) -> RowValues;
}

impl IntoRow for RowValues {
    fn into_row(self) -> RowValues {
        self
    }
}
