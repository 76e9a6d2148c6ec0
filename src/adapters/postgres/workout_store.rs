//! PostgreSQL implementation of WorkoutStore.
//!
//! Persists workout observations to the `workout` table. Each session owns
//! one pooled connection; dropping the session returns it to the pool.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row};

use crate::config::DatabaseConfig;
use crate::domain::foundation::{Barcode, DomainError, Timestamp, WorkoutId};
use crate::domain::workout::{NewWorkout, Workout, WorkoutFilter};
use crate::ports::{WorkoutSession, WorkoutStore};

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS workout (
        id          SERIAL PRIMARY KEY,
        barcode     INTEGER NOT NULL,
        title       TEXT NOT NULL,
        location    TEXT NOT NULL,
        "time"      TIMESTAMPTZ NOT NULL,
        duration    INTEGER NOT NULL,
        available   INTEGER NOT NULL,
        "timestamp" TIMESTAMPTZ NOT NULL
    )
"#;

// Not unique: the same session is observed many times.
const CREATE_BARCODE_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS workout_barcode_idx ON workout (barcode)";

const SELECT_COLUMNS: &str =
    r#"id, barcode, title, location, "time", duration, available, "timestamp""#;

/// PostgreSQL implementation of WorkoutStore.
#[derive(Clone)]
pub struct PostgresWorkoutStore {
    pool: PgPool,
}

impl PostgresWorkoutStore {
    /// Creates a new PostgresWorkoutStore over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Builds the connection pool described by `config`.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DomainError> {
        let pool = PgPoolOptions::new()
            .min_connections(config.min_connections)
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .idle_timeout(Some(config.idle_timeout()))
            .max_lifetime(Some(config.max_lifetime()))
            .connect(&config.url)
            .await
            .map_err(|e| DomainError::database(format!("Failed to connect to database: {}", e)))?;

        Ok(Self::new(pool))
    }

    /// Closes every pooled connection.
    pub async fn shutdown(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl WorkoutStore for PostgresWorkoutStore {
    async fn ensure_schema(&self) -> Result<(), DomainError> {
        for statement in [CREATE_TABLE, CREATE_BARCODE_INDEX] {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    DomainError::database(format!("Failed to create workout table: {}", e))
                })?;
        }
        tracing::info!("workout table ready");
        Ok(())
    }

    async fn open_session(&self) -> Result<Box<dyn WorkoutSession>, DomainError> {
        let conn = self.pool.acquire().await.map_err(|e| {
            DomainError::database(format!("Failed to acquire connection: {}", e))
        })?;
        Ok(Box::new(PostgresWorkoutSession { conn }))
    }
}

/// One pooled connection held for the duration of a request.
pub struct PostgresWorkoutSession {
    conn: PoolConnection<Postgres>,
}

#[async_trait]
impl WorkoutSession for PostgresWorkoutSession {
    async fn insert(&mut self, workout: &NewWorkout) -> Result<Workout, DomainError> {
        let row = sqlx::query(
            r#"
            INSERT INTO workout (
                barcode, title, location, "time", duration, available, "timestamp"
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(workout.barcode.value())
        .bind(&workout.title)
        .bind(&workout.location)
        .bind(workout.start_time.as_datetime())
        .bind(workout.duration_minutes)
        .bind(workout.available_slots)
        .bind(workout.observed_at.as_datetime())
        .fetch_one(&mut *self.conn)
        .await
        .map_err(|e| DomainError::database(format!("Failed to insert workout: {}", e)))?;

        let id: i32 = row
            .try_get("id")
            .map_err(|e| DomainError::database(format!("Failed to get id: {}", e)))?;

        Ok(Workout::persisted(WorkoutId::new(id), workout.clone()))
    }

    async fn find_by_id(&mut self, id: WorkoutId) -> Result<Option<Workout>, DomainError> {
        let row = sqlx::query(&format!("SELECT {} FROM workout WHERE id = $1", SELECT_COLUMNS))
            .bind(id.value())
            .fetch_optional(&mut *self.conn)
            .await
            .map_err(|e| DomainError::database(format!("Failed to fetch workout: {}", e)))?;

        row.map(row_to_workout).transpose()
    }

    async fn list(&mut self, filter: &WorkoutFilter) -> Result<Vec<Workout>, DomainError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM workout
            WHERE ($1::INTEGER IS NULL OR barcode = $1)
            ORDER BY "timestamp" DESC, id DESC
            LIMIT $2
            "#,
            SELECT_COLUMNS
        ))
        .bind(filter.barcode.map(|b| b.value()))
        .bind(filter.limit.map(i64::from))
        .fetch_all(&mut *self.conn)
        .await
        .map_err(|e| DomainError::database(format!("Failed to list workouts: {}", e)))?;

        rows.into_iter().map(row_to_workout).collect()
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Helper functions
// ════════════════════════════════════════════════════════════════════════════

fn column<'r, T>(row: &'r PgRow, name: &str) -> Result<T, DomainError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(name)
        .map_err(|e| DomainError::database(format!("Failed to get {}: {}", name, e)))
}

fn row_to_workout(row: PgRow) -> Result<Workout, DomainError> {
    let id: i32 = column(&row, "id")?;
    let start_time: DateTime<Utc> = column(&row, "time")?;
    let observed_at: DateTime<Utc> = column(&row, "timestamp")?;

    let record = NewWorkout {
        barcode: Barcode::new(column(&row, "barcode")?),
        title: column(&row, "title")?,
        location: column(&row, "location")?,
        start_time: Timestamp::from_datetime(start_time),
        duration_minutes: column(&row, "duration")?,
        available_slots: column(&row, "available")?,
        observed_at: Timestamp::from_datetime(observed_at),
    };

    Ok(Workout::persisted(WorkoutId::new(id), record))
}
