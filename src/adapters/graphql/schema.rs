//! Workout GraphQL schema.
//!
//! ```graphql
//! type Query {
//!   workouts(barcode: Int, limit: Int): [Workout!]!
//!   workout(id: Int!): Workout
//! }
//!
//! type Mutation {
//!   recordWorkout(input: WorkoutInput!): Workout!
//!   ingestScrape(timestamp: String!, input: [WorkoutInput!]!): IngestResult!
//! }
//! ```
//!
//! Built at startup from explicitly injected services.

use std::sync::Arc;

use async_graphql::dynamic::{
    FieldFuture, InputObject, InputValue, ResolverContext, Schema, SchemaError, TypeRef,
};
use async_graphql::{ErrorExtensions, Value};
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::adapters::archive::ArchivalUploader;
use crate::application::RequestContext;
use crate::domain::foundation::{Barcode, ErrorCode, WorkoutId};
use crate::domain::workout::{NewWorkout, Workout, WorkoutFilter};
use crate::ports::WorkoutStore;

use super::errors::coded;
use super::lifecycle::RequestContextExtension;
use super::resolver::{ArgumentRenameError, FieldDef, ObjectTypeWithContext, Resolved, ResolverArgs};

const WORKOUT: &str = "Workout";
const WORKOUT_INPUT: &str = "WorkoutInput";
const INGEST_RESULT: &str = "IngestResult";

/// Schema construction failed.
#[derive(Debug, Error)]
pub enum SchemaBuildError {
    #[error(transparent)]
    Rename(#[from] ArgumentRenameError),

    #[error("Invalid schema: {0}")]
    Schema(#[from] SchemaError),
}

/// Services the schema's resolvers depend on.
#[derive(Clone)]
pub struct SchemaServices {
    pub store: Arc<dyn WorkoutStore>,
    /// `None` disables archival of ingested batches.
    pub uploader: Option<Arc<ArchivalUploader>>,
}

/// Builds the workout schema with the request lifecycle extension installed.
pub fn build_schema(services: SchemaServices) -> Result<Schema, SchemaBuildError> {
    let builder = Schema::build("Query", Some("Mutation"), None)
        .extension(RequestContextExtension::new(Arc::clone(&services.store)))
        .register(workout_input_type());

    let builder = query_type()?.bind_to_schema(builder);
    let builder = mutation_type(services.uploader)?.bind_to_schema(builder);
    let builder = workout_type().bind_to_schema(builder);
    let builder = ingest_result_type().bind_to_schema(builder);

    Ok(builder.finish()?)
}

// ════════════════════════════════════════════════════════════════════════════
// Root types
// ════════════════════════════════════════════════════════════════════════════

fn query_type() -> Result<ObjectTypeWithContext, ArgumentRenameError> {
    let mut query = ObjectTypeWithContext::<()>::new("Query");
    query
        .field(
            "workouts",
            FieldDef::new(TypeRef::named_nn_list_nn(WORKOUT))
                .description("Observations, newest first")
                .argument("barcode", TypeRef::named(TypeRef::INT))
                .argument("limit", TypeRef::named(TypeRef::INT)),
            list_workouts,
        )?
        .field(
            "workout",
            FieldDef::new(TypeRef::named(WORKOUT)).argument("id", TypeRef::named_nn(TypeRef::INT)),
            find_workout,
        )?;
    Ok(query)
}

fn mutation_type(
    uploader: Option<Arc<ArchivalUploader>>,
) -> Result<ObjectTypeWithContext, ArgumentRenameError> {
    let mut mutation = ObjectTypeWithContext::<()>::new("Mutation");
    mutation
        .field(
            "recordWorkout",
            FieldDef::new(TypeRef::named_nn(WORKOUT))
                .argument("input", TypeRef::named_nn(WORKOUT_INPUT))
                .rename("input", "record"),
            record_workout,
        )?
        .field(
            "ingestScrape",
            FieldDef::new(TypeRef::named_nn(INGEST_RESULT))
                .description("Stores a scrape batch, then archives it")
                .argument("timestamp", TypeRef::named_nn(TypeRef::STRING))
                .argument("input", TypeRef::named_nn_list_nn(WORKOUT_INPUT))
                .rename("input", "workouts"),
            move |_: Option<()>, ctx: Arc<RequestContext>, args: ResolverArgs| {
                ingest_scrape(uploader.clone(), ctx, args)
            },
        )?;
    Ok(mutation)
}

// ════════════════════════════════════════════════════════════════════════════
// Resolvers
// ════════════════════════════════════════════════════════════════════════════

async fn list_workouts(
    _: Option<()>,
    ctx: Arc<RequestContext>,
    args: ResolverArgs,
) -> async_graphql::Result<Resolved> {
    let mut filter = WorkoutFilter::default();
    if let Some(barcode) = args.i32("barcode")? {
        filter.barcode = Some(Barcode::new(barcode));
    }
    if let Some(limit) = args.i32("limit")? {
        let limit = u32::try_from(limit)
            .map_err(|_| coded(ErrorCode::ValidationFailed, "limit must not be negative"))?;
        filter.limit = Some(limit);
    }

    let workouts = ctx.list(&filter).await.map_err(|e| e.extend())?;
    Ok(Resolved::list(workouts.into_iter().map(Resolved::object)))
}

async fn find_workout(
    _: Option<()>,
    ctx: Arc<RequestContext>,
    args: ResolverArgs,
) -> async_graphql::Result<Resolved> {
    let id = args
        .i32("id")?
        .ok_or_else(|| coded(ErrorCode::ValidationFailed, "id is required"))?;

    let workout = ctx
        .find_by_id(WorkoutId::new(id))
        .await
        .map_err(|e| e.extend())?;
    Ok(Resolved::optional_object(workout))
}

async fn record_workout(
    _: Option<()>,
    ctx: Arc<RequestContext>,
    args: ResolverArgs,
) -> async_graphql::Result<Resolved> {
    let record = args.required_json("record")?;
    let workout = NewWorkout::from_dict(&record).map_err(|e| e.extend())?;

    let stored = ctx.insert(&workout).await.map_err(|e| e.extend())?;
    tracing::info!(
        request_id = %ctx.request_id(),
        id = %stored.id(),
        barcode = %stored.barcode(),
        "workout recorded"
    );
    Ok(Resolved::object(stored))
}

/// Result of an ingest mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestSummary {
    pub inserted: usize,
    pub archive_key: String,
    pub archived: bool,
}

async fn ingest_scrape(
    uploader: Option<Arc<ArchivalUploader>>,
    ctx: Arc<RequestContext>,
    args: ResolverArgs,
) -> async_graphql::Result<Resolved> {
    let timestamp = args
        .string("timestamp")?
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| coded(ErrorCode::ValidationFailed, "timestamp must not be empty"))?;
    let batch = match args.required_json("workouts")? {
        JsonValue::Array(items) => items,
        _ => {
            return Err(coded(
                ErrorCode::ValidationFailed,
                "workouts must be a list",
            ))
        }
    };

    // Convert everything before touching the store.
    let records = batch
        .iter()
        .map(NewWorkout::from_dict)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| e.extend())?;

    let inserted = ctx.insert_all(&records).await.map_err(|e| e.extend())?;

    let archive_key = ArchivalUploader::object_key(&timestamp);
    let archived = match &uploader {
        Some(uploader) => uploader.backup(&batch, &timestamp).await.is_uploaded(),
        None => false,
    };

    tracing::info!(
        request_id = %ctx.request_id(),
        inserted = inserted.len(),
        archive_key = %archive_key,
        archived,
        "scrape batch ingested"
    );

    Ok(Resolved::object(IngestSummary {
        inserted: inserted.len(),
        archive_key,
        archived,
    }))
}

// ════════════════════════════════════════════════════════════════════════════
// Output and input types
// ════════════════════════════════════════════════════════════════════════════

fn workout_type() -> ObjectTypeWithContext<Workout> {
    let mut object = ObjectTypeWithContext::<Workout>::new(WORKOUT)
        .description("One observed snapshot of a gym session");

    object
        .add_field("id", TypeRef::named_nn(TypeRef::INT), |ctx| {
            workout_value(ctx, |w| Value::from(w.id().value()))
        }, |f| f.description("Storage-assigned identifier"))
        .add_field("barcode", TypeRef::named_nn(TypeRef::INT), |ctx| {
            workout_value(ctx, |w| Value::from(w.barcode().value()))
        }, |f| f.description("The booking system's session id"))
        .add_field("title", TypeRef::named_nn(TypeRef::STRING), |ctx| {
            workout_value(ctx, |w| Value::from(w.title().to_string()))
        }, |f| f)
        .add_field("location", TypeRef::named_nn(TypeRef::STRING), |ctx| {
            workout_value(ctx, |w| Value::from(w.location().to_string()))
        }, |f| f)
        .add_field("startTime", TypeRef::named_nn(TypeRef::STRING), |ctx| {
            workout_value(ctx, |w| Value::from(w.start_time().to_iso8601()))
        }, |f| f)
        .add_field("durationMinutes", TypeRef::named_nn(TypeRef::INT), |ctx| {
            workout_value(ctx, |w| Value::from(w.duration_minutes()))
        }, |f| f)
        .add_field("availableSlots", TypeRef::named_nn(TypeRef::INT), |ctx| {
            workout_value(ctx, |w| Value::from(w.available_slots()))
        }, |f| f)
        .add_field("observedAt", TypeRef::named_nn(TypeRef::STRING), |ctx| {
            workout_value(ctx, |w| Value::from(w.observed_at().to_iso8601()))
        }, |f| f.description("When the scraper took this snapshot"));

    object
}

fn workout_value<'a>(ctx: ResolverContext<'a>, read: fn(&Workout) -> Value) -> FieldFuture<'a> {
    FieldFuture::new(async move {
        let workout = ctx.parent_value.try_downcast_ref::<Workout>()?;
        Ok(Some(read(workout)))
    })
}

fn ingest_result_type() -> ObjectTypeWithContext<IngestSummary> {
    let mut object = ObjectTypeWithContext::<IngestSummary>::new(INGEST_RESULT);

    object
        .add_field("inserted", TypeRef::named_nn(TypeRef::INT), |ctx| {
            summary_value(ctx, |s| Value::from(s.inserted as i64))
        }, |f| f)
        .add_field("archiveKey", TypeRef::named_nn(TypeRef::STRING), |ctx| {
            summary_value(ctx, |s| Value::from(s.archive_key.clone()))
        }, |f| f)
        .add_field("archived", TypeRef::named_nn(TypeRef::BOOLEAN), |ctx| {
            summary_value(ctx, |s| Value::from(s.archived))
        }, |f| f.description("False when archival failed or is disabled"));

    object
}

fn summary_value<'a>(
    ctx: ResolverContext<'a>,
    read: fn(&IngestSummary) -> Value,
) -> FieldFuture<'a> {
    FieldFuture::new(async move {
        let summary = ctx.parent_value.try_downcast_ref::<IngestSummary>()?;
        Ok(Some(read(summary)))
    })
}

/// Mirrors the scraper's dictionary.
fn workout_input_type() -> InputObject {
    InputObject::new(WORKOUT_INPUT)
        .field(InputValue::new("id", TypeRef::named_nn(TypeRef::INT)))
        .field(InputValue::new("title", TypeRef::named_nn(TypeRef::STRING)))
        .field(InputValue::new("location", TypeRef::named_nn(TypeRef::STRING)))
        .field(InputValue::new("time", TypeRef::named_nn(TypeRef::STRING)))
        .field(InputValue::new("duration", TypeRef::named_nn(TypeRef::INT)))
        .field(InputValue::new("available", TypeRef::named_nn(TypeRef::INT)))
        .field(InputValue::new("timestamp", TypeRef::named_nn(TypeRef::STRING)))
}
