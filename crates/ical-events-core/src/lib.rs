//! Core types: occurrences, time window, result assembly, tracing

pub mod assemble;
pub mod occurrence;
pub mod time;
pub mod tracing;

pub use assemble::{EventsResponse, assemble};
pub use occurrence::Occurrence;
pub use time::{FloatingTimePolicy, TimeWindow};
pub use crate::tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
