use std::sync::Arc;

use restyle_core::contracts::{BlobStore, JobStore};
use restyle_pipeline::service::{BatchStatusService, SubmitService};

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Job/batch record store.
    pub store: Arc<dyn JobStore>,
    /// Blob storage for source photos and styled outputs.
    pub blobs: Arc<dyn BlobStore>,
    /// Submission entry point (row-before-enqueue).
    pub submit: Arc<SubmitService>,
    /// Read-time batch aggregation.
    pub batches: Arc<BatchStatusService>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
}
