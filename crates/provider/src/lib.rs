//! HTTP clients for the external collaborators.
//!
//! [`generation::HttpGenerationClient`] talks to the third-party
//! image-transformation API; [`retry::RetryingGenerator`] wraps any
//! generation provider with the bounded retry/backoff policy;
//! [`face::HttpFaceRestoreClient`] covers the best-effort face services;
//! [`moderation::HttpModerationGate`] fronts the content gate.

pub mod face;
pub mod generation;
pub mod moderation;
pub mod retry;

mod wire;
