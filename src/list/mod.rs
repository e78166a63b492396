//! Optimistic lists - a cached list plus create/update/delete that show up
//! before the server confirms them.
//!
//! ## Example
//!
//! ```ignore
//! use optimistic_list::{InMemoryQueryCache, ListOptions, OptimisticList};
//! use optimistic_list::todo::{NewTodo, TodoFileStore};
//!
//! let cache = InMemoryQueryCache::new();
//! let todos = OptimisticList::new(
//!     cache.clone(),
//!     TodoFileStore::new("./data/todos.json"),
//!     ListOptions::new(["todos"], NewTodo::default()).with_verbose(true),
//! );
//!
//! let current = todos.list().await?;
//! let created = todos.create(NewTodo::new("Buy groceries")).await?;
//! todos.update(created.id.clone(), TodoPatch::completed(true)).await?;
//! todos.delete(created.id).await?;
//! ```

mod auto_refetch;
mod controller;
mod form;
mod options;

pub use auto_refetch::{AutoRefetch, RefetchStats};
pub use controller::OptimisticList;
pub use form::FormState;
pub use options::{ListConfig, ListOptions, DEFAULT_STALE_TIME};
