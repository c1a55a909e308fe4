//! Entity snapshot model
//!
//! Entities arrive from the data source as loosely typed JSON. Deserialization
//! is lenient: bad record counts clamp to zero and malformed sample lists
//! become empty instead of failing the whole snapshot.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A sample record: open mapping of field name to value
pub type Record = Map<String, Value>;

/// A named data group with its record count and a sample of its records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    #[serde(
        rename = "recordCount",
        alias = "record_count",
        default,
        deserialize_with = "lenient_count"
    )]
    pub record_count: u64,
    #[serde(
        rename = "lastUpdated",
        alias = "last_updated",
        default,
        deserialize_with = "lenient_string"
    )]
    pub last_updated: String,
    #[serde(
        rename = "sampleRecords",
        alias = "sample_records",
        default,
        deserialize_with = "lenient_records"
    )]
    pub sample_records: Vec<Record>,
}

impl Entity {
    #[cfg(test)]
    pub fn new(name: impl Into<String>, record_count: u64) -> Self {
        Self {
            name: name.into(),
            record_count,
            last_updated: String::new(),
            sample_records: Vec::new(),
        }
    }

    #[cfg(test)]
    pub fn with_samples(mut self, samples: Vec<Record>) -> Self {
        self.sample_records = samples;
        self
    }

    pub fn summary(&self) -> EntitySummary {
        EntitySummary {
            name: self.name.clone(),
            record_count: self.record_count,
            last_updated: self.last_updated.clone(),
        }
    }
}

/// Overview line handed to the HUD
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntitySummary {
    pub name: String,
    #[serde(rename = "recordCount")]
    pub record_count: u64,
    #[serde(rename = "lastUpdated")]
    pub last_updated: String,
}

/// Sum of record counts over all entities
pub fn total_records(entities: &[Entity]) -> u64 {
    entities
        .iter()
        .fold(0u64, |acc, e| acc.saturating_add(e.record_count))
}

/// Stable identifier of a sample record
///
/// Uses the record's `id` field when it is a string or a number, otherwise
/// the record's position in the sample.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum RecordId {
    Field(String),
    Index(usize),
}

impl RecordId {
    pub fn of(record: &Record, index: usize) -> Self {
        match record.get("id") {
            Some(Value::String(s)) => RecordId::Field(s.clone()),
            Some(Value::Number(n)) => RecordId::Field(n.to_string()),
            _ => RecordId::Index(index),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Field(id) => write!(f, "{}", id),
            RecordId::Index(i) => write!(f, "#{}", i),
        }
    }
}

fn lenient_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(count_from_value(&value))
}

fn count_from_value(value: &Value) -> u64 {
    match value {
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                u
            } else {
                n.as_f64().map(clamp_float_count).unwrap_or(0)
            }
        }
        Value::String(s) => s.trim().parse::<f64>().map(clamp_float_count).unwrap_or(0),
        _ => 0,
    }
}

fn clamp_float_count(v: f64) -> u64 {
    if v.is_finite() && v > 0.0 {
        // `as` saturates at u64::MAX
        v.floor() as u64
    } else {
        0
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

fn lenient_records<'de, D>(deserializer: D) -> Result<Vec<Record>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}
