//! Tally Web Server
//!
//! Axum-based REST API for the Tally receipt and expense tracker.
//!
//! Security features:
//! - Restrictive CORS policy (same-origin unless origins are configured)
//! - Upload size limit and MIME allow-list
//! - Stored file names are generated server-side and never contain paths
//! - Sanitized error responses

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use tower_http::{
    cors::CorsLayer, services::ServeDir, set_header::SetResponseHeaderLayer, trace::TraceLayer,
};
use tracing::{error, info, warn};

use tally_core::db::Database;
use tally_core::import::FieldAliases;
use tally_core::storage::UploadStore;

mod handlers;

/// Maximum file upload size (10 MB)
pub const MAX_UPLOAD_SIZE: usize = 10 * 1024 * 1024;

/// Server configuration
#[derive(Clone)]
pub struct ServerConfig {
    /// Allowed CORS origins (empty = same-origin only)
    pub allowed_origins: Vec<String>,
    /// Directory for uploaded receipt files and imported CSVs
    pub uploads_dir: PathBuf,
    /// Column aliases used to suggest import mappings
    pub aliases: FieldAliases,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![],
            uploads_dir: PathBuf::from("uploads"),
            aliases: FieldAliases::default(),
        }
    }
}

/// Parse a comma-separated origin list (e.g. from TALLY_ALLOWED_ORIGINS)
pub fn parse_allowed_origins(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().trim_end_matches('/').to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub uploads: UploadStore,
    pub config: ServerConfig,
}

impl AppState {
    /// Remove an upload once no receipt references it any more
    pub(crate) fn release_file(&self, file_path: &str) {
        match self.db.count_file_references(file_path) {
            Ok(0) => self.uploads.remove_quietly(file_path),
            Ok(_) => {}
            Err(e) => warn!(file = %file_path, error = %e, "Failed to check file references"),
        }
    }
}

/// Create the application router
pub fn create_router(
    db: Database,
    static_dir: Option<&str>,
    config: ServerConfig,
) -> anyhow::Result<Router> {
    let uploads = UploadStore::new(&config.uploads_dir)?;
    info!("Uploads directory: {}", uploads.dir().display());

    let state = Arc::new(AppState {
        db,
        uploads: uploads.clone(),
        config: config.clone(),
    });

    let api_routes = Router::new()
        // Jobs
        .route("/jobs", get(handlers::list_jobs).post(handlers::create_job))
        .route(
            "/jobs/:id",
            get(handlers::get_job)
                .put(handlers::update_job)
                .delete(handlers::delete_job),
        )
        .route("/jobs/:id/receipts", get(handlers::list_job_receipts))
        // Receipts
        .route(
            "/receipts",
            get(handlers::list_receipts).post(handlers::create_receipt),
        )
        .route(
            "/receipts/:id",
            get(handlers::get_receipt)
                .put(handlers::update_receipt)
                .delete(handlers::delete_receipt),
        )
        .route("/receipts/:id/items", post(handlers::add_item))
        // Line items
        .route("/items", get(handlers::list_items))
        .route("/items/history", get(handlers::item_history))
        .route("/items/history/chart", get(handlers::item_history_chart))
        .route(
            "/items/:id",
            put(handlers::update_item).delete(handlers::delete_item),
        )
        // CSV import
        .route("/upload-csv", post(handlers::upload_csv))
        .route("/import/preview", post(handlers::preview_import))
        .route("/import", post(handlers::run_import))
        // Export
        .route("/export/receipts", get(handlers::export_receipts))
        .route("/export/items", get(handlers::export_items));

    // Build CORS layer
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ];
    // Same-origin only unless origins are configured
    let mut cors = CorsLayer::new()
        .allow_methods(methods)
        .allow_headers([header::CONTENT_TYPE]);
    if !config.allowed_origins.is_empty() {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        cors = cors.allow_origin(origins);
    }

    // Receipt previews load from /uploads; charts are inline SVG
    let csp = HeaderValue::from_static(
        "default-src 'self'; script-src 'self'; style-src 'self' 'unsafe-inline'; img-src 'self' data:; object-src 'self'; frame-ancestors 'none'",
    );

    let mut app = Router::new()
        .nest("/api", api_routes)
        .nest_service("/uploads", ServeDir::new(uploads.dir()))
        .with_state(state)
        // Multipart bodies carry form fields besides the file
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_SIZE + 64 * 1024))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_SECURITY_POLICY,
            csp,
        ));

    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    Ok(app)
}

/// Bind `host:port` and serve until the process exits
pub async fn serve_with_config(
    db: Database,
    host: &str,
    port: u16,
    static_dir: Option<&str>,
    config: ServerConfig,
) -> anyhow::Result<()> {
    if !config.allowed_origins.is_empty() {
        info!("CORS origins: {}", config.allowed_origins.join(", "));
    }

    let app = create_router(db, static_dir, config)?;
    let addr = format!("{}:{}", host, port);

    info!(%addr, "Tally listening");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    fn with_status(status: StatusCode, msg: &str) -> Self {
        Self {
            status,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn bad_request(msg: &str) -> Self {
        Self::with_status(StatusCode::BAD_REQUEST, msg)
    }

    pub fn not_found(msg: &str) -> Self {
        Self::with_status(StatusCode::NOT_FOUND, msg)
    }

    pub fn conflict(msg: &str) -> Self {
        Self::with_status(StatusCode::CONFLICT, msg)
    }

    pub fn internal(msg: &str) -> Self {
        Self::with_status(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(err) = &self.internal {
            error!(error = %err, "Request failed");
        }
        (self.status, Json(serde_json::json!({ "error": self.message }))).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let err = err.into();

        // Domain errors carry user-facing messages
        if let Some(core) = err.downcast_ref::<tally_core::Error>() {
            use tally_core::Error as CoreError;
            match core {
                CoreError::NotFound(what) => return Self::not_found(&format!("{} not found", what)),
                CoreError::InvalidData(msg) | CoreError::Storage(msg) => {
                    return Self::bad_request(msg)
                }
                CoreError::Import(e) => return Self::bad_request(&e.to_string()),
                CoreError::Conflict(msg) => return Self::conflict(msg),
                _ => {}
            }
        }
        if let Some(import) = err.downcast_ref::<tally_core::ImportError>() {
            return Self::bad_request(&import.to_string());
        }

        // Anything else stays server-side; the client sees a generic message
        Self {
            internal: Some(err),
            ..Self::with_status(StatusCode::INTERNAL_SERVER_ERROR, "An internal error occurred")
        }
    }
}
