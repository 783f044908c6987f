use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Statistics payload as returned by the realtor statistics endpoint.
///
/// Only the fields the hub reads are typed. Everything else is kept in
/// `extra` so a cached payload serializes back to the same document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawStatsPayload {
    #[serde(rename = "ErrorCode", default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
    #[serde(rename = "Data", default)]
    pub data: Vec<Block>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorCode {
    #[serde(rename = "ProductName", default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One labeled group of records, addressed by its position in `Data`.
///
/// `value` stays raw JSON so one odd block cannot fail the whole payload;
/// its shape is checked only when a view reads it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Block {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default)]
    pub value: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Block {
    pub fn new(key: impl Into<String>, records: Vec<Record>) -> Self {
        Self {
            key: Some(key.into()),
            value: Value::Array(records.into_iter().map(Record::into_value).collect()),
            extra: Map::new(),
        }
    }

    /// The block's records, or what is wrong with them.
    pub fn records(&self) -> std::result::Result<Vec<Record>, String> {
        let items = match &self.value {
            Value::Array(items) => items,
            Value::Null => return Err("block has no value array".to_string()),
            other => return Err(format!("block value is {}, not an array", kind(other))),
        };
        items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                Record::from_value(item)
                    .ok_or_else(|| format!("record {} is not an object with a string key", i))
            })
            .collect()
    }
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub key: String,
    #[serde(default)]
    pub value: Value,
}

impl Record {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// `{"key": "...", "value": ...}`; a missing value reads as null.
    pub fn from_value(item: &Value) -> Option<Self> {
        let obj = item.as_object()?;
        Some(Self {
            key: obj.get("key")?.as_str()?.to_string(),
            value: obj.get("value").cloned().unwrap_or(Value::Null),
        })
    }

    fn into_value(self) -> Value {
        let mut obj = Map::new();
        obj.insert("key".to_string(), Value::String(self.key));
        obj.insert("value".to_string(), self.value);
        Value::Object(obj)
    }

    /// The record's value as text. Upstream mixes JSON strings and numbers.
    pub fn value_text(&self) -> String {
        match &self.value {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

impl RawStatsPayload {
    /// Labels of every block, in payload order. Used for diagnostics.
    pub fn block_labels(&self) -> Vec<&str> {
        self.data
            .iter()
            .map(|b| b.key.as_deref().unwrap_or("?"))
            .collect()
    }
}

/// A cell in the `value` column of a stats table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum StatValue {
    Text(String),
    Int(i64),
}

impl StatValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            StatValue::Int(n) => Some(*n),
            StatValue::Text(_) => None,
        }
    }
}

impl std::fmt::Display for StatValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatValue::Text(s) => f.write_str(s),
            StatValue::Int(n) => write!(f, "{}", n),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatRow {
    pub key: String,
    pub value: StatValue,
}

/// Two-column projection of one block: `key`, then `value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsTable {
    pub rows: Vec<StatRow>,
}

impl StatsTable {
    pub const COLUMNS: [&'static str; 2] = ["key", "value"];

    pub fn columns(&self) -> [&'static str; 2] {
        Self::COLUMNS
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_odd_block_does_not_fail_payload() {
        let p: RawStatsPayload = serde_json::from_value(json!({
            "Data": [
                {"key": "General", "value": [{"key": "Population", "value": "1,000"}]},
                {"key": "Summary", "value": {"Summary": "x"}},
                {"key": "Age", "value": [{"value": "5"}]}
            ]
        }))
        .unwrap();
        assert_eq!(p.data[0].records().unwrap()[0].value_text(), "1,000");
        assert!(p.data[1].records().unwrap_err().contains("an object"));
        assert!(p.data[2].records().unwrap_err().contains("record 0"));
    }

    #[test]
    fn test_block_new_round_trips_records() {
        let b = Block::new("Income", vec![Record::new("$0-$20k", json!("300"))]);
        assert_eq!(b.records().unwrap(), vec![Record::new("$0-$20k", json!("300"))]);
        assert_eq!(b.value, json!([{"key": "$0-$20k", "value": "300"}]));
    }
}
