use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, Method, StatusCode};
use axum::Router;
use tokio_util::sync::CancellationToken;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use restyle_api::config::ServerConfig;
use restyle_api::{routes, state};
use restyle_core::contracts::{
    BlobStore, FaceRestoreProvider, GenerationProvider, JobStore, ModerationGate,
};
use restyle_db::fs_blob::FsBlobStore;
use restyle_db::pg::PgJobStore;
use restyle_pipeline::pool::{PoolConfig, WorkerPool};
use restyle_pipeline::queue::JobQueue;
use restyle_pipeline::service::{requeue_pending, BatchStatusService, SubmitService};
use restyle_pipeline::ticker::TickerConfig;
use restyle_pipeline::worker::GenerationWorker;
use restyle_provider::face::HttpFaceRestoreClient;
use restyle_provider::generation::HttpGenerationClient;
use restyle_provider::moderation::HttpModerationGate;
use restyle_provider::retry::{RetryConfig, RetryingGenerator};

use state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "restyle_api=debug,restyle_pipeline=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = restyle_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    restyle_db::health_check(&pool)
        .await
        .expect("Database health check failed");

    restyle_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    let store: Arc<dyn JobStore> = Arc::new(PgJobStore::new(pool));

    // --- Blob storage ---
    let fs_blobs = FsBlobStore::new(config.blob_root.clone(), config.blob_public_url.clone());
    fs_blobs
        .ensure_root()
        .await
        .expect("Failed to create blob root directory");
    let blobs: Arc<dyn BlobStore> = Arc::new(fs_blobs);

    // --- External services ---
    let gate: Arc<dyn ModerationGate> = Arc::new(
        HttpModerationGate::new(config.moderation_api_url.clone())
            .expect("Failed to build moderation client"),
    );

    let generation_client = HttpGenerationClient::new(
        config.generation_api_url.clone(),
        config.generation_api_key.clone(),
    );
    let retry_config = RetryConfig {
        attempt_timeout: Duration::from_secs(config.generation_attempt_timeout_secs),
        ..Default::default()
    };
    let generator: Arc<dyn GenerationProvider> =
        Arc::new(RetryingGenerator::new(generation_client, retry_config));

    let faces: Arc<dyn FaceRestoreProvider> = Arc::new(
        HttpFaceRestoreClient::new(config.face_api_url.clone())
            .expect("Failed to build face restoration client"),
    );

    // --- Pipeline ---
    let cancel = CancellationToken::new();
    let queue = Arc::new(JobQueue::new());

    let worker = Arc::new(GenerationWorker::new(
        Arc::clone(&store),
        Arc::clone(&blobs),
        gate,
        generator,
        faces,
        TickerConfig::default(),
        cancel.clone(),
    ));

    let requeued = requeue_pending(&store, &queue)
        .await
        .expect("Failed to scan for requeueable jobs");
    if requeued > 0 {
        tracing::info!(requeued, "Recovered jobs from a previous run");
    }

    let worker_pool = WorkerPool::start(
        Arc::clone(&queue),
        worker,
        PoolConfig {
            width: config.worker_width,
        },
    );
    tracing::info!(width = config.worker_width, "Worker pool started");

    // --- App state ---
    let submit = Arc::new(SubmitService::new(Arc::clone(&store), Arc::clone(&queue)));
    let batches = Arc::new(BatchStatusService::new(Arc::clone(&store)));
    let state = AppState {
        store,
        blobs,
        submit,
        batches,
        config: Arc::new(config.clone()),
    };

    // --- CORS ---
    let cors = build_cors_layer(&config);

    // --- Request ID header name ---
    let request_id_header = HeaderName::from_static("x-request-id");

    // --- Router ---
    let app = Router::new()
        // Health check at root level (not under /api/v1).
        .merge(routes::health_router())
        // API v1 routes.
        .nest("/api/v1", routes::api_routes())
        // Styled outputs and uploads, served from the blob root.
        .nest_service("/blobs", ServeDir::new(&config.blob_root))
        // -- Middleware stack (applied bottom-up) --
        // Panic recovery: catch panics and return 500 JSON.
        .layer(CatchPanicLayer::new())
        // Request timeout.
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
        // Propagate request ID to response.
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        // Structured request/response tracing.
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Set request ID on incoming requests.
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        // CORS.
        .layer(cors)
        // Shared state.
        .with_state(state);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown drain ---
    tracing::info!("Server stopped accepting connections, draining workers");

    // Close the queue: workers finish their in-flight job and exit.
    queue.close();
    worker_pool.join().await;
    // Nothing is running anymore; stop any ticker that outlived its job.
    cancel.cancel();

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager (e.g. systemd, Docker, Kubernetes).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Build the CORS middleware layer from server configuration.
///
/// Panics at startup if any configured origin is invalid, which is the
/// desired behaviour -- we want misconfiguration to fail fast.
fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<_> = config
        .cors_origins
        .iter()
        .map(|o| {
            o.parse()
                .unwrap_or_else(|e| panic!("Invalid CORS origin '{o}': {e}"))
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}
