//! Todo domain: the entity, its file-backed store, and (with the `http`
//! feature) a REST API and client for it.

mod store;

#[cfg(feature = "http")]
mod client;
#[cfg(feature = "http")]
pub mod http;

use serde::{Deserialize, Serialize};

use crate::entity::ListEntity;

pub use store::{StoreError, TodoFileStore, DEFAULT_TODOS_PATH};

#[cfg(feature = "http")]
pub use client::HttpTodoClient;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: String,
    pub text: String,
    pub completed: bool,
}

/// A todo that has not been assigned an id yet.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTodo {
    pub text: String,
    #[serde(default)]
    pub completed: bool,
}

impl NewTodo {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            completed: false,
        }
    }
}

/// Partial update: `None` fields are left as they are.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

impl TodoPatch {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn completed(completed: bool) -> Self {
        Self {
            completed: Some(completed),
            ..Self::default()
        }
    }
}

impl ListEntity for Todo {
    type Id = String;
    type Draft = NewTodo;
    type Patch = TodoPatch;

    fn id(&self) -> &String {
        &self.id
    }

    fn from_draft(id: String, draft: NewTodo) -> Self {
        Todo {
            id,
            text: draft.text,
            completed: draft.completed,
        }
    }

    fn to_draft(&self) -> NewTodo {
        NewTodo {
            text: self.text.clone(),
            completed: self.completed,
        }
    }

    fn merge(&self, patch: &TodoPatch) -> Self {
        Todo {
            id: self.id.clone(),
            text: patch.text.clone().unwrap_or_else(|| self.text.clone()),
            completed: patch.completed.unwrap_or(self.completed),
        }
    }
}

/// `POST /api/todos` body.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateTodoBody {
    pub todo: NewTodo,
}

/// `PATCH /api/todos` body.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UpdateTodoBody {
    pub id: String,
    pub updates: TodoPatch,
}

/// `DELETE /api/todos` body.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeleteTodoBody {
    pub id: String,
}
