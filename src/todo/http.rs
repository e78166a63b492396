//! REST API for todos.
//!
//! Requires the `http` feature. Uses axum for routing.
//!
//! ## Routes
//!
//! - `GET /api/todos`: all todos.
//! - `POST /api/todos`: body `{ "todo": NewTodo }`, returns the created todo.
//! - `PATCH /api/todos`: body `{ "id", "updates": TodoPatch }`, returns the updated todo.
//! - `DELETE /api/todos`: body `{ "id" }`, returns `true`.
//!
//! Failures answer `{ "error": message }` with 404 for missing todos and
//! 500 otherwise.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tracing::{info, warn};

use super::{
    CreateTodoBody, DeleteTodoBody, StoreError, Todo, TodoFileStore, UpdateTodoBody,
    DEFAULT_TODOS_PATH,
};

/// Build an axum `Router` serving the todo API from `store`.
pub fn router(store: Arc<TodoFileStore>) -> Router {
    Router::new()
        .route(
            "/api/todos",
            get(list_handler)
                .post(create_handler)
                .patch(update_handler)
                .delete(delete_handler),
        )
        .with_state(store)
}

/// Serve the todo API at the given address (e.g. `"0.0.0.0:3000"`).
pub async fn serve(store: Arc<TodoFileStore>, addr: &str) -> Result<(), std::io::Error> {
    let app = router(store);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "todo api listening");
    axum::serve(listener, app).await
}

struct ApiError(StoreError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            StoreError::FileMissing | StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            StoreError::Io(_) | StoreError::Serde(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            warn!(error = %self.0, "todo api request failed");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError(err)
    }
}

async fn list_handler(
    State(store): State<Arc<TodoFileStore>>,
) -> Result<Json<Vec<Todo>>, ApiError> {
    Ok(Json(store.list().await?))
}

async fn create_handler(
    State(store): State<Arc<TodoFileStore>>,
    Json(body): Json<CreateTodoBody>,
) -> Result<Json<Todo>, ApiError> {
    Ok(Json(store.create(body.todo).await?))
}

async fn update_handler(
    State(store): State<Arc<TodoFileStore>>,
    Json(body): Json<UpdateTodoBody>,
) -> Result<Json<Todo>, ApiError> {
    Ok(Json(store.update(&body.id, &body.updates).await?))
}

async fn delete_handler(
    State(store): State<Arc<TodoFileStore>>,
    Json(body): Json<DeleteTodoBody>,
) -> Result<Json<bool>, ApiError> {
    Ok(Json(store.delete(&body.id).await?))
}

/// Settings for the `todo-server` binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub addr: String,
    pub path: PathBuf,
    pub latency: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 3000)).to_string(),
            path: PathBuf::from(DEFAULT_TODOS_PATH),
            latency: Duration::ZERO,
        }
    }
}

impl ServerConfig {
    /// Read `TODOS_ADDR`, `TODOS_PATH` and `TODOS_LATENCY_MS`, falling back
    /// to the defaults for unset variables.
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let mut config = Self::default();
        if let Some(addr) = lookup("TODOS_ADDR") {
            config.addr = addr;
        }
        if let Some(path) = lookup("TODOS_PATH") {
            config.path = PathBuf::from(path);
        }
        if let Some(latency) = lookup("TODOS_LATENCY_MS") {
            let millis: u64 = latency
                .parse()
                .map_err(|e| format!("invalid TODOS_LATENCY_MS {:?}: {}", latency, e))?;
            config.latency = Duration::from_millis(millis);
        }
        Ok(config)
    }

    pub fn store(&self) -> TodoFileStore {
        TodoFileStore::new(&self.path).with_latency(self.latency)
    }
}
