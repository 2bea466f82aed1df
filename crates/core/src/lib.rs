//! Pure domain logic for the restyle generation pipeline.
//!
//! No I/O and no internal dependencies: status enums, the style catalog
//! and prompt composition, progress checkpoint arithmetic, the batch
//! aggregation reducer, and the collaborator contracts consumed by the
//! pipeline crate.

pub mod batch;
pub mod contracts;
pub mod error;
pub mod job;
pub mod progress;
pub mod prompt;
pub mod status;
pub mod style;
pub mod types;
