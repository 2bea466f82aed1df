/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Number of concurrent generation workers (default: `3`).
    pub worker_width: usize,
    /// Directory blobs are stored under (default: `./data/blobs`).
    pub blob_root: String,
    /// Public base URL the blob route is served from.
    pub blob_public_url: String,
    /// Base URL of the image-generation provider.
    pub generation_api_url: String,
    /// Optional bearer token for the generation provider.
    pub generation_api_key: Option<String>,
    /// Per-attempt timeout for generation calls, in seconds (default: `120`).
    pub generation_attempt_timeout_secs: u64,
    /// Base URL of the face restoration service.
    pub face_api_url: String,
    /// Base URL of the moderation service.
    pub moderation_api_url: String,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                           | Default                         |
    /// |-----------------------------------|---------------------------------|
    /// | `HOST`                            | `0.0.0.0`                       |
    /// | `PORT`                            | `3000`                          |
    /// | `CORS_ORIGINS`                    | `http://localhost:5173`         |
    /// | `REQUEST_TIMEOUT_SECS`            | `30`                            |
    /// | `WORKER_WIDTH`                    | `3`                             |
    /// | `BLOB_ROOT`                       | `./data/blobs`                  |
    /// | `BLOB_PUBLIC_URL`                 | `http://localhost:3000/blobs`   |
    /// | `GENERATION_API_URL`              | `http://localhost:8500`         |
    /// | `GENERATION_API_KEY`              | unset                           |
    /// | `GENERATION_ATTEMPT_TIMEOUT_SECS` | `120`                           |
    /// | `FACE_API_URL`                    | `http://localhost:8600`         |
    /// | `MODERATION_API_URL`              | `http://localhost:8700`         |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let worker_width: usize = std::env::var("WORKER_WIDTH")
            .unwrap_or_else(|_| "3".into())
            .parse()
            .expect("WORKER_WIDTH must be a valid usize");

        let blob_root = std::env::var("BLOB_ROOT").unwrap_or_else(|_| "./data/blobs".into());

        let blob_public_url = std::env::var("BLOB_PUBLIC_URL")
            .unwrap_or_else(|_| "http://localhost:3000/blobs".into());

        let generation_api_url = std::env::var("GENERATION_API_URL")
            .unwrap_or_else(|_| "http://localhost:8500".into());

        let generation_api_key = std::env::var("GENERATION_API_KEY").ok();

        let generation_attempt_timeout_secs: u64 =
            std::env::var("GENERATION_ATTEMPT_TIMEOUT_SECS")
                .unwrap_or_else(|_| "120".into())
                .parse()
                .expect("GENERATION_ATTEMPT_TIMEOUT_SECS must be a valid u64");

        let face_api_url =
            std::env::var("FACE_API_URL").unwrap_or_else(|_| "http://localhost:8600".into());

        let moderation_api_url =
            std::env::var("MODERATION_API_URL").unwrap_or_else(|_| "http://localhost:8700".into());

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            worker_width,
            blob_root,
            blob_public_url,
            generation_api_url,
            generation_api_key,
            generation_attempt_timeout_secs,
            face_api_url,
            moderation_api_url,
        }
    }
}
