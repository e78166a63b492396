//! TodoFileStore - todos persisted as a pretty-printed JSON array in one file.

use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use super::{NewTodo, Todo, TodoPatch};
use crate::crud::{CrudError, CrudOperations};
use crate::entity::{IdSeed, ListEntity};

pub const DEFAULT_TODOS_PATH: &str = "./data/todos.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The todos file does not exist yet.
    FileMissing,
    NotFound(String),
    Io(String),
    Serde(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::FileMissing => write!(f, "todos file not found"),
            StoreError::NotFound(id) => write!(f, "todo not found: {}", id),
            StoreError::Io(msg) => write!(f, "todo store io error: {}", msg),
            StoreError::Serde(msg) => write!(f, "todo store serialization error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<StoreError> for CrudError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::FileMissing | StoreError::NotFound(_) => CrudError::NotFound(err.to_string()),
            StoreError::Io(_) | StoreError::Serde(_) => CrudError::Other(err.to_string()),
        }
    }
}

/// File-backed todo store.
///
/// Every operation reads the whole file and writes it back; a mutex keeps
/// read-modify-write cycles from interleaving. Ids are millisecond
/// timestamps, so they are never negative.
pub struct TodoFileStore {
    path: PathBuf,
    latency: Duration,
    write_lock: Mutex<()>,
    seeds: IdSeed,
}

impl TodoFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            latency: Duration::ZERO,
            write_lock: Mutex::new(()),
            seeds: IdSeed::new(),
        }
    }

    /// Delay every operation, to make optimistic updates visible.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All todos. Creates the directory and an empty file on first use.
    pub async fn list(&self) -> Result<Vec<Todo>, StoreError> {
        self.delay().await;
        let _guard = self.write_lock.lock().await;

        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| StoreError::Io(e.to_string()))?;
        }

        match self.read().await {
            Ok(todos) => Ok(todos),
            Err(StoreError::FileMissing) => {
                self.write(&[]).await?;
                Ok(Vec::new())
            }
            Err(err) => Err(err),
        }
    }

    /// Append a todo. New todos always start out not completed.
    pub async fn create(&self, draft: NewTodo) -> Result<Todo, StoreError> {
        self.delay().await;
        let _guard = self.write_lock.lock().await;

        let mut todos = match self.read().await {
            Ok(todos) => todos,
            Err(StoreError::FileMissing) => Vec::new(),
            Err(err) => return Err(err),
        };

        let todo = Todo {
            id: self.seeds.next().to_string(),
            text: draft.text,
            completed: false,
        };
        todos.push(todo.clone());
        self.write(&todos).await?;

        debug!(id = %todo.id, "todo created");
        Ok(todo)
    }

    pub async fn update(&self, id: &str, patch: &TodoPatch) -> Result<Todo, StoreError> {
        self.delay().await;
        let _guard = self.write_lock.lock().await;

        let mut todos = self.read().await?;
        let index = todos
            .iter()
            .position(|todo| todo.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let updated = todos[index].merge(patch);
        todos[index] = updated.clone();
        self.write(&todos).await?;

        debug!(id, "todo updated");
        Ok(updated)
    }

    pub async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        self.delay().await;
        let _guard = self.write_lock.lock().await;

        let mut todos = self.read().await?;
        let index = todos
            .iter()
            .position(|todo| todo.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        todos.remove(index);
        self.write(&todos).await?;

        debug!(id, "todo deleted");
        Ok(true)
    }

    async fn delay(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    async fn read(&self) -> Result<Vec<Todo>, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(StoreError::FileMissing),
            Err(e) => return Err(StoreError::Io(e.to_string())),
        };
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Serde(e.to_string()))
    }

    async fn write(&self, todos: &[Todo]) -> Result<(), StoreError> {
        let json =
            serde_json::to_string_pretty(todos).map_err(|e| StoreError::Serde(e.to_string()))?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| StoreError::Io(e.to_string()))
    }
}

#[async_trait]
impl CrudOperations<Todo> for TodoFileStore {
    async fn fetch(&self) -> Result<Vec<Todo>, CrudError> {
        Ok(self.list().await?)
    }

    async fn create(&self, draft: NewTodo) -> Result<Todo, CrudError> {
        Ok(TodoFileStore::create(self, draft).await?)
    }

    async fn update(&self, id: String, patch: TodoPatch) -> Result<Todo, CrudError> {
        Ok(TodoFileStore::update(self, &id, &patch).await?)
    }

    async fn delete(&self, id: String) -> Result<bool, CrudError> {
        Ok(TodoFileStore::delete(self, &id).await?)
    }
}
