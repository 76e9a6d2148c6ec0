//! Integration tests for the workout GraphQL API.
//!
//! These tests drive the built schema end to end against the in-memory
//! adapters:
//! 1. Recorded workouts are queryable by barcode
//! 2. Every request releases its store session, whatever the outcome
//! 3. Ingested batches are stored and archived according to the failure policy

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use async_graphql::{Request, Variables};
use workout_tracker::adapters::graphql::{build_schema, SchemaServices};
use workout_tracker::adapters::{
    ArchivalUploader, ArchiveFailurePolicy, InMemoryObjectStorage, InMemoryWorkoutStore,
};

// =============================================================================
// Test Infrastructure
// =============================================================================

const RECORD_WORKOUT: &str = r#"
    mutation Record($input: WorkoutInput!) {
        recordWorkout(input: $input) { id barcode title availableSlots }
    }
"#;

const INGEST_SCRAPE: &str = r#"
    mutation Ingest($timestamp: String!, $input: [WorkoutInput!]!) {
        ingestScrape(timestamp: $timestamp, input: $input) { inserted archiveKey archived }
    }
"#;

fn yoga(available: i64) -> Value {
    json!({
        "id": 42,
        "title": "Yoga",
        "location": "Gym A",
        "time": "2024-01-01T10:00:00+00:00",
        "duration": 60,
        "available": available,
        "timestamp": "2024-01-01T09:00:00+00:00"
    })
}

fn spin() -> Value {
    json!({
        "id": 7,
        "title": "Spin",
        "location": "Gym B",
        "time": "2024-01-01T18:00:00+00:00",
        "duration": 45,
        "available": 0,
        "timestamp": "2024-01-01T09:00:00+00:00"
    })
}

struct TestApp {
    store: InMemoryWorkoutStore,
    bucket: InMemoryObjectStorage,
    schema: async_graphql::dynamic::Schema,
}

impl TestApp {
    fn without_archive() -> Self {
        let store = InMemoryWorkoutStore::new();
        let schema = build_schema(SchemaServices {
            store: Arc::new(store.clone()),
            uploader: None,
        })
        .unwrap();
        Self {
            store,
            bucket: InMemoryObjectStorage::new(),
            schema,
        }
    }

    fn with_archive(bucket: InMemoryObjectStorage, policy: ArchiveFailurePolicy) -> Self {
        let store = InMemoryWorkoutStore::new();
        let uploader = ArchivalUploader::new(
            Arc::new(bucket.clone()),
            policy,
            Duration::from_secs(5),
        );
        let schema = build_schema(SchemaServices {
            store: Arc::new(store.clone()),
            uploader: Some(Arc::new(uploader)),
        })
        .unwrap();
        Self {
            store,
            bucket,
            schema,
        }
    }

    async fn run(&self, query: &str, variables: Value) -> async_graphql::Response {
        let request = Request::new(query).variables(Variables::from_json(variables));
        self.schema.execute(request).await
    }

    async fn record(&self, input: Value) -> Value {
        let response = self.run(RECORD_WORKOUT, json!({ "input": input })).await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);
        response.data.into_json().unwrap()
    }
}

fn first_error_code(response: &async_graphql::Response) -> Option<async_graphql::Value> {
    response
        .errors
        .first()
        .and_then(|error| error.extensions.as_ref())
        .and_then(|ext| ext.get("code"))
        .cloned()
}

// =============================================================================
// Record and query
// =============================================================================

#[tokio::test]
async fn recorded_workout_is_found_by_barcode() {
    let app = TestApp::without_archive();
    app.record(yoga(5)).await;
    app.record(spin()).await;

    let response = app
        .run(
            "{ workouts(barcode: 42) { barcode title location availableSlots } }",
            json!({}),
        )
        .await;

    assert!(response.errors.is_empty(), "{:?}", response.errors);
    assert_eq!(
        response.data.into_json().unwrap(),
        json!({
            "workouts": [
                { "barcode": 42, "title": "Yoga", "location": "Gym A", "availableSlots": 5 }
            ]
        })
    );
}

#[tokio::test]
async fn repeated_observations_of_one_session_are_kept() {
    let app = TestApp::without_archive();
    app.record(yoga(5)).await;
    app.record(yoga(4)).await;

    let response = app
        .run("{ workouts(barcode: 42) { availableSlots } }", json!({}))
        .await;

    let data = response.data.into_json().unwrap();
    assert_eq!(data["workouts"].as_array().map(Vec::len), Some(2));
    assert_eq!(app.store.len().await, 2);
}

#[tokio::test]
async fn limit_caps_the_listing() {
    let app = TestApp::without_archive();
    app.record(yoga(5)).await;
    app.record(yoga(4)).await;
    app.record(spin()).await;

    let response = app.run("{ workouts(limit: 2) { id } }", json!({})).await;

    let data = response.data.into_json().unwrap();
    assert_eq!(data["workouts"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn missing_key_is_rejected_before_storage() {
    let app = TestApp::without_archive();
    let mut input = yoga(5);
    input.as_object_mut().unwrap().remove("location");

    let response = app.run(RECORD_WORKOUT, json!({ "input": input })).await;

    assert!(response.is_err());
    assert!(app.store.is_empty().await);
}

// =============================================================================
// Session lifecycle
// =============================================================================

#[tokio::test]
async fn sessions_are_released_after_successful_requests() {
    let app = TestApp::without_archive();
    app.record(yoga(5)).await;
    app.run("{ workouts { id } }", json!({})).await;

    assert_eq!(app.store.sessions_opened(), 2);
    assert_eq!(app.store.open_sessions(), 0);
}

#[tokio::test]
async fn sessions_are_released_after_failing_resolvers() {
    let app = TestApp::without_archive();

    let response = app.run("{ workouts(limit: -3) { id } }", json!({})).await;
    assert_eq!(
        first_error_code(&response),
        Some(async_graphql::Value::from("VALIDATION_FAILED"))
    );

    let mut input = yoga(5);
    input["time"] = json!("not a time");
    let response = app.run(RECORD_WORKOUT, json!({ "input": input })).await;
    assert_eq!(
        first_error_code(&response),
        Some(async_graphql::Value::from("MALFORMED_INPUT"))
    );

    assert_eq!(app.store.sessions_opened(), 2);
    assert_eq!(app.store.open_sessions(), 0);
}

// =============================================================================
// Ingest and archival
// =============================================================================

#[tokio::test]
async fn ingest_stores_and_archives_the_batch() {
    let app = TestApp::with_archive(InMemoryObjectStorage::new(), ArchiveFailurePolicy::Log);

    let response = app
        .run(
            INGEST_SCRAPE,
            json!({ "timestamp": "2024-01-01T09:00:00", "input": [yoga(5), spin()] }),
        )
        .await;

    assert!(response.errors.is_empty(), "{:?}", response.errors);
    assert_eq!(
        response.data.into_json().unwrap(),
        json!({
            "ingestScrape": {
                "inserted": 2,
                "archiveKey": "2024-01-01T09:00:00.parquet",
                "archived": true
            }
        })
    );
    assert_eq!(app.store.len().await, 2);
    assert_eq!(app.bucket.keys().await, vec!["2024-01-01T09:00:00.parquet"]);
    assert_eq!(app.store.open_sessions(), 0);
}

#[tokio::test]
async fn archive_failure_does_not_fail_the_ingest() {
    let app = TestApp::with_archive(InMemoryObjectStorage::failing(1), ArchiveFailurePolicy::Log);

    let response = app
        .run(
            INGEST_SCRAPE,
            json!({ "timestamp": "batch-1", "input": [yoga(5)] }),
        )
        .await;

    assert!(response.errors.is_empty(), "{:?}", response.errors);
    let data = response.data.into_json().unwrap();
    assert_eq!(data["ingestScrape"]["inserted"], json!(1));
    assert_eq!(data["ingestScrape"]["archived"], json!(false));
    assert_eq!(app.store.len().await, 1);
    assert!(app.bucket.keys().await.is_empty());
    assert_eq!(app.bucket.attempts(), 1);
}

#[tokio::test]
async fn retry_policy_recovers_from_transient_failures() {
    let policy = ArchiveFailurePolicy::Retry {
        max_attempts: 3,
        initial_backoff: Duration::from_millis(1),
    };
    let app = TestApp::with_archive(InMemoryObjectStorage::failing(2), policy);

    let response = app
        .run(
            INGEST_SCRAPE,
            json!({ "timestamp": "batch-2", "input": [spin()] }),
        )
        .await;

    let data = response.data.into_json().unwrap();
    assert_eq!(data["ingestScrape"]["archived"], json!(true));
    assert_eq!(app.bucket.attempts(), 3);
    assert_eq!(app.bucket.keys().await, vec!["batch-2.parquet"]);
}

#[tokio::test]
async fn malformed_record_aborts_the_whole_batch() {
    let app = TestApp::with_archive(InMemoryObjectStorage::new(), ArchiveFailurePolicy::Log);
    let mut broken = spin();
    broken["time"] = json!("2024-01-01 18:00");

    let response = app
        .run(
            INGEST_SCRAPE,
            json!({ "timestamp": "batch-3", "input": [yoga(5), broken] }),
        )
        .await;

    assert_eq!(
        first_error_code(&response),
        Some(async_graphql::Value::from("MALFORMED_INPUT"))
    );
    assert!(app.store.is_empty().await);
    assert!(app.bucket.keys().await.is_empty());
    assert_eq!(app.store.open_sessions(), 0);
}

#[tokio::test]
async fn empty_timestamp_is_rejected() {
    let app = TestApp::with_archive(InMemoryObjectStorage::new(), ArchiveFailurePolicy::Log);

    let response = app
        .run(INGEST_SCRAPE, json!({ "timestamp": " ", "input": [] }))
        .await;

    assert_eq!(
        first_error_code(&response),
        Some(async_graphql::Value::from("VALIDATION_FAILED"))
    );
    assert_eq!(app.bucket.attempts(), 0);
}
