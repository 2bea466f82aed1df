//! HTTP handlers, grouped per resource.

pub mod batches;
pub mod health;
pub mod jobs;
pub mod photos;
