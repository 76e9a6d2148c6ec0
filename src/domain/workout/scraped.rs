//! The scraper's dictionary shape, validated at the system boundary.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::errors::MalformedInputError;

/// Keys every scraped workout dictionary must carry.
pub const REQUIRED_KEYS: [&str; 7] = [
    "id",
    "title",
    "location",
    "time",
    "duration",
    "available",
    "timestamp",
];

/// One scraped workout exactly as the scraper emits it.
///
/// Timestamps are still ISO-8601 strings here; parsing them happens when
/// the dictionary becomes a [`super::NewWorkout`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedWorkout {
    pub id: i32,
    pub title: String,
    pub location: String,
    pub time: String,
    pub duration: i32,
    pub available: i32,
    pub timestamp: String,
}

impl ScrapedWorkout {
    /// Validates an untyped scraper dictionary.
    ///
    /// Keys are checked in [`REQUIRED_KEYS`] order so the first missing key
    /// is reported deterministically. Unknown extra keys are ignored.
    pub fn from_dict(data: &Value) -> Result<Self, MalformedInputError> {
        let map = data
            .as_object()
            .ok_or_else(|| MalformedInputError::NotAnObject(json_type_name(data)))?;

        if let Some(missing) = REQUIRED_KEYS.iter().find(|key| !map.contains_key(**key)) {
            return Err(MalformedInputError::MissingKey(*missing));
        }

        Ok(Self {
            id: int_field(map, "id")?,
            title: string_field(map, "title")?,
            location: string_field(map, "location")?,
            time: string_field(map, "time")?,
            duration: int_field(map, "duration")?,
            available: int_field(map, "available")?,
            timestamp: string_field(map, "timestamp")?,
        })
    }

    /// Back to the scraper's dictionary shape.
    pub fn to_dict(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("id".into(), self.id.into());
        map.insert("title".into(), self.title.clone().into());
        map.insert("location".into(), self.location.clone().into());
        map.insert("time".into(), self.time.clone().into());
        map.insert("duration".into(), self.duration.into());
        map.insert("available".into(), self.available.into());
        map.insert("timestamp".into(), self.timestamp.clone().into());
        map
    }
}

fn field<'a>(map: &'a Map<String, Value>, key: &'static str) -> Result<&'a Value, MalformedInputError> {
    match map.get(key) {
        None => Err(MalformedInputError::MissingKey(key)),
        Some(Value::Null) => Err(MalformedInputError::InvalidField {
            key,
            reason: "must not be null".to_string(),
        }),
        Some(value) => Ok(value),
    }
}

fn int_field(map: &Map<String, Value>, key: &'static str) -> Result<i32, MalformedInputError> {
    let value = field(map, key)?;
    let wide = value.as_i64().ok_or_else(|| MalformedInputError::InvalidField {
        key,
        reason: format!("expected an integer, got {}", json_type_name(value)),
    })?;
    i32::try_from(wide).map_err(|_| MalformedInputError::InvalidField {
        key,
        reason: format!("{} does not fit in a 32-bit integer", wide),
    })
}

fn string_field(map: &Map<String, Value>, key: &'static str) -> Result<String, MalformedInputError> {
    let value = field(map, key)?;
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| MalformedInputError::InvalidField {
            key,
            reason: format!("expected a string, got {}", json_type_name(value)),
        })
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
