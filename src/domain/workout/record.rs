//! Workout observation records.
//!
//! A record is one point-in-time snapshot of a gym session's capacity.
//! The same session (`barcode`) is observed many times as slots fill up,
//! so records form an append-only log: they are never updated in place,
//! and two identical observations may both be stored.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::domain::foundation::{Barcode, Timestamp, WorkoutId};

use super::errors::MalformedInputError;
use super::scraped::ScrapedWorkout;

/// A workout observation that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewWorkout {
    pub barcode: Barcode,
    pub title: String,
    pub location: String,
    pub start_time: Timestamp,
    pub duration_minutes: i32,
    pub available_slots: i32,
    pub observed_at: Timestamp,
}

impl NewWorkout {
    /// Builds a record from the scraper's dictionary.
    ///
    /// The dictionary's `id` is the booking system's identifier and becomes
    /// the record's `barcode`; storage assigns the record's own id on insert.
    ///
    /// # Errors
    ///
    /// Returns `MalformedInputError` if a required key is absent, has the
    /// wrong type, or a timestamp does not parse.
    pub fn from_dict(data: &Value) -> Result<Self, MalformedInputError> {
        Self::try_from(ScrapedWorkout::from_dict(data)?)
    }
}

impl TryFrom<ScrapedWorkout> for NewWorkout {
    type Error = MalformedInputError;

    fn try_from(scraped: ScrapedWorkout) -> Result<Self, Self::Error> {
        Ok(Self {
            barcode: Barcode::new(scraped.id),
            start_time: Timestamp::parse_iso8601("time", &scraped.time)?,
            observed_at: Timestamp::parse_iso8601("timestamp", &scraped.timestamp)?,
            title: scraped.title,
            location: scraped.location,
            duration_minutes: scraped.duration,
            available_slots: scraped.available,
        })
    }
}

/// A persisted workout observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Workout {
    id: WorkoutId,
    barcode: Barcode,
    title: String,
    location: String,
    start_time: Timestamp,
    duration_minutes: i32,
    available_slots: i32,
    observed_at: Timestamp,
}

impl Workout {
    /// Attaches the storage-assigned id to an inserted record.
    pub fn persisted(id: WorkoutId, record: NewWorkout) -> Self {
        Self {
            id,
            barcode: record.barcode,
            title: record.title,
            location: record.location,
            start_time: record.start_time,
            duration_minutes: record.duration_minutes,
            available_slots: record.available_slots,
            observed_at: record.observed_at,
        }
    }

    pub fn id(&self) -> WorkoutId {
        self.id
    }

    pub fn barcode(&self) -> Barcode {
        self.barcode
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// When the session begins.
    pub fn start_time(&self) -> &Timestamp {
        &self.start_time
    }

    pub fn duration_minutes(&self) -> i32 {
        self.duration_minutes
    }

    /// Remaining capacity at the moment of observation.
    pub fn available_slots(&self) -> i32 {
        self.available_slots
    }

    /// When the scraper took this snapshot.
    pub fn observed_at(&self) -> &Timestamp {
        &self.observed_at
    }

    /// Serializes to the dictionary shape used by the scraper.
    ///
    /// `id` is the storage id, not the scraped one; the scraped id is
    /// reported under `barcode`.
    pub fn to_dict(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("id".into(), self.id.value().into());
        map.insert("barcode".into(), self.barcode.value().into());
        map.insert("title".into(), self.title.clone().into());
        map.insert("location".into(), self.location.clone().into());
        map.insert("time".into(), self.start_time.to_iso8601().into());
        map.insert("duration".into(), self.duration_minutes.into());
        map.insert("available".into(), self.available_slots.into());
        map.insert("timestamp".into(), self.observed_at.to_iso8601().into());
        map
    }
}

/// Read-side filter over the observation log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkoutFilter {
    pub barcode: Option<Barcode>,
    pub limit: Option<u32>,
}

impl WorkoutFilter {
    /// All observations of one session.
    pub fn by_barcode(barcode: Barcode) -> Self {
        Self {
            barcode: Some(barcode),
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether a record passes the barcode predicate (the limit is applied
    /// by the caller after ordering).
    pub fn matches(&self, workout: &Workout) -> bool {
        self.barcode.map_or(true, |b| workout.barcode() == b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;
    use serde_json::json;

    fn yoga() -> Value {
        json!({
            "id": 42,
            "title": "Yoga",
            "location": "Gym A",
            "time": "2024-01-01T09:00:00+00:00",
            "duration": 60,
            "available": 5,
            "timestamp": "2024-01-01T08:00:00+00:00"
        })
    }

    #[test]
    fn from_dict_maps_external_id_to_barcode() {
        let record = NewWorkout::from_dict(&yoga()).unwrap();
        assert_eq!(record.barcode, Barcode::new(42));
        assert_eq!(record.duration_minutes, 60);
        assert_eq!(record.available_slots, 5);
        assert_eq!(
            record.start_time.as_datetime(),
            &Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()
        );
    }

    #[test]
    fn from_dict_rejects_unparseable_timestamp() {
        let mut data = yoga();
        data["timestamp"] = json!("yesterday");
        let err = NewWorkout::from_dict(&data).unwrap_err();
        assert_eq!(err.key(), Some("timestamp"));
    }

    #[test]
    fn from_dict_rejects_missing_key() {
        let mut data = yoga();
        data.as_object_mut().unwrap().remove("available");
        let err = NewWorkout::from_dict(&data).unwrap_err();
        assert_eq!(err, MalformedInputError::MissingKey("available"));
    }

    #[test]
    fn to_dict_reports_storage_id_and_keeps_barcode() {
        let record = NewWorkout::from_dict(&yoga()).unwrap();
        let workout = Workout::persisted(WorkoutId::new(1), record);
        let dict = workout.to_dict();

        assert_eq!(dict["id"], json!(1));
        assert_ne!(dict["id"], yoga()["id"]);
        assert_eq!(dict["barcode"], json!(42));
        assert_eq!(dict["time"], json!("2024-01-01T09:00:00+00:00"));
        assert_eq!(dict["timestamp"], json!("2024-01-01T08:00:00+00:00"));
    }

    #[test]
    fn filter_matches_on_barcode_only() {
        let workout = Workout::persisted(WorkoutId::new(1), NewWorkout::from_dict(&yoga()).unwrap());
        assert!(WorkoutFilter::default().matches(&workout));
        assert!(WorkoutFilter::by_barcode(Barcode::new(42)).matches(&workout));
        assert!(!WorkoutFilter::by_barcode(Barcode::new(7)).matches(&workout));
    }

    fn offset_strategy() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("+00:00".to_string()),
            Just("+01:00".to_string()),
            Just("-05:30".to_string()),
            Just("Z".to_string()),
        ]
    }

    proptest! {
        #[test]
        fn dictionary_round_trip_preserves_fields(
            barcode in any::<i32>(),
            title in "[A-Za-z ]{1,24}",
            location in "[A-Za-z0-9 ]{1,24}",
            start_secs in 0i64..4_000_000_000,
            observed_secs in 0i64..4_000_000_000,
            start_offset in offset_strategy(),
            observed_offset in offset_strategy(),
            duration in 0i32..600,
            available in 0i32..200,
            storage_id in 1i32..i32::MAX,
        ) {
            let start = Utc.timestamp_opt(start_secs, 0).unwrap();
            let observed = Utc.timestamp_opt(observed_secs, 0).unwrap();
            let start_text = format!("{}{}", start.format("%Y-%m-%dT%H:%M:%S"), start_offset);
            let observed_text = format!("{}{}", observed.format("%Y-%m-%dT%H:%M:%S"), observed_offset);

            let input = json!({
                "id": barcode,
                "title": title,
                "location": location,
                "time": start_text,
                "duration": duration,
                "available": available,
                "timestamp": observed_text,
            });

            let workout = Workout::persisted(
                WorkoutId::new(storage_id),
                NewWorkout::from_dict(&input).unwrap(),
            );
            let output = workout.to_dict();

            prop_assert_eq!(&output["barcode"], &input["id"]);
            prop_assert_eq!(&output["id"], &json!(storage_id));
            for key in ["title", "location", "duration", "available"] {
                prop_assert_eq!(&output[key], &input[key]);
            }
            for key in ["time", "timestamp"] {
                let expected = Timestamp::parse_iso8601(key, input[key].as_str().unwrap()).unwrap();
                let actual = Timestamp::parse_iso8601(key, output[key].as_str().unwrap()).unwrap();
                prop_assert_eq!(expected, actual);
            }
        }
    }
}
