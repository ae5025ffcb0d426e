use crate::value::Value;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value as JsonValue;

/// Ordered column -> value pairs for inserts, updates and equality filters.
pub type Fields = IndexMap<String, Value>;

/// The name of the surrogate key column added to every automatically created table.
pub const ID_COLUMN: &str = "_id";

/// Builds a [`Fields`] map, keeping the order the pairs are written in.
///
/// ```
/// use core_types::{fields, Value};
///
/// let row = fields! { "name" => "bean", "count" => 3 };
/// assert_eq!(row["count"], Value::Int(3));
/// ```
#[macro_export]
macro_rules! fields {
    () => {
        $crate::Fields::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut fields = $crate::Fields::new();
        $(
            fields.insert(::std::string::String::from($key), $crate::Value::from($value));
        )+
        fields
    }};
}

/// A single row read back from the database. Read-only.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct Record {
    values: Fields,
}

impl Record {
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    /// The `_id` of the row, when the table has one.
    pub fn id(&self) -> Option<i64> {
        match self.values.get(ID_COLUMN) {
            Some(Value::Int(id)) => Some(*id),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn into_fields(self) -> Fields {
        self.values
    }

    pub fn to_json(&self) -> JsonValue {
        JsonValue::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

impl From<Fields> for Record {
    fn from(values: Fields) -> Self {
        Self { values }
    }
}

impl std::ops::Index<&str> for Record {
    type Output = Value;

    fn index(&self, column: &str) -> &Value {
        self.values.get(column).unwrap_or(&Value::Null)
    }
}
