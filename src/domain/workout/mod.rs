//! Workout module - scraped workout-session observations.

mod errors;
mod record;
mod scraped;

pub use errors::MalformedInputError;
pub use record::{NewWorkout, Workout, WorkoutFilter};
pub use scraped::{ScrapedWorkout, REQUIRED_KEYS};
