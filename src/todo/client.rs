//! HttpTodoClient - the todo REST API as a remote CRUD service.

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{CreateTodoBody, DeleteTodoBody, NewTodo, Todo, TodoPatch, UpdateTodoBody};
use crate::crud::{CrudError, CrudOperations};

#[derive(Clone)]
pub struct HttpTodoClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTodoClient {
    /// `base_url` is the server root, e.g. `http://127.0.0.1:3000`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn url(&self) -> String {
        format!("{}/api/todos", self.base_url.trim_end_matches('/'))
    }

    async fn send<R: DeserializeOwned>(&self, request: RequestBuilder) -> Result<R, CrudError> {
        let response = request
            .send()
            .await
            .map_err(|e| CrudError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<Value>()
                .await
                .ok()
                .and_then(|body| body.get("error")?.as_str().map(str::to_string))
                .unwrap_or_else(|| status.to_string());
            return Err(if status == StatusCode::NOT_FOUND {
                CrudError::NotFound(message)
            } else {
                CrudError::Status {
                    code: status.as_u16(),
                    message,
                }
            });
        }

        response
            .json::<R>()
            .await
            .map_err(|e| CrudError::Decode(e.to_string()))
    }
}

#[async_trait]
impl CrudOperations<Todo> for HttpTodoClient {
    async fn fetch(&self) -> Result<Vec<Todo>, CrudError> {
        self.send(self.client.get(self.url())).await
    }

    async fn create(&self, draft: NewTodo) -> Result<Todo, CrudError> {
        let body = CreateTodoBody { todo: draft };
        self.send(self.client.post(self.url()).json(&body)).await
    }

    async fn update(&self, id: String, patch: TodoPatch) -> Result<Todo, CrudError> {
        let body = UpdateTodoBody { id, updates: patch };
        self.send(self.client.patch(self.url()).json(&body)).await
    }

    async fn delete(&self, id: String) -> Result<bool, CrudError> {
        let body = DeleteTodoBody { id };
        self.send(self.client.delete(self.url()).json(&body)).await
    }
}
