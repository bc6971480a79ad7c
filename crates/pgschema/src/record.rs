//! Ordered name → value maps used for filters, inserted values and result rows.

use crate::error::{OrmError, OrmResult};
use crate::value::{FromValue, Value};
use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, Serializer};
use tokio_postgres::Row;

/// An insertion-ordered mapping of column (or filter) names to values.
///
/// The order matters: it decides placeholder numbering for filters and the
/// column order of generated `INSERT` statements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: IndexMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert or overwrite a value, keeping the original position on overwrite.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Fetch and convert a value.
    pub fn try_get<T: FromValue>(&self, name: &str) -> OrmResult<T> {
        let value = self
            .fields
            .get(name)
            .cloned()
            .ok_or_else(|| OrmError::decode(name, "no such field in record"))?;
        T::from_value(value).map_err(|e| OrmError::decode(name, e.to_string()))
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.shift_remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.fields.values()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// First value in column order, as returned by `fetch_value*`.
    pub fn first_value(&self) -> Option<&Value> {
        self.fields.first().map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Project the record onto `names`, in that order.
    ///
    /// Returns `None` when any of the names is missing.
    pub fn project(&self, names: &[&str]) -> Option<Vec<Value>> {
        names.iter().map(|n| self.fields.get(*n).cloned()).collect()
    }

    /// Decode every column of a result row.
    pub fn from_row(row: &Row) -> OrmResult<Self> {
        let mut fields = IndexMap::with_capacity(row.len());
        for (idx, column) in row.columns().iter().enumerate() {
            let value: Value = row
                .try_get(idx)
                .map_err(|e| OrmError::decode(column.name(), e.to_string()))?;
            fields.insert(column.name().to_string(), value);
        }
        Ok(Self { fields })
    }

    /// Serialize to a JSON object.
    pub fn to_json(&self) -> OrmResult<serde_json::Value> {
        serde_json::to_value(self).map_err(|e| OrmError::Other(e.to_string()))
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

/// Build a [`Record`] from `name => value` pairs.
///
/// ```ignore
/// let filter = record! { "id" => 1, "name__like" => "a%" };
/// ```
#[macro_export]
macro_rules! record {
    () => {
        $crate::Record::new()
    };
    ($($name:expr => $value:expr),+ $(,)?) => {{
        let mut record = $crate::Record::new();
        $(
            record.insert($name, $value);
        )+
        record
    }};
}
