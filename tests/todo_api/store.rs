use std::sync::Arc;

use optimistic_list::todo::{NewTodo, Todo, TodoFileStore, TodoPatch};
use optimistic_list::{
    CrudError, InMemoryQueryCache, ListOptions, OptimisticList, RetryPolicy, Retrying, Rollback,
};

fn todos(dir: &tempfile::TempDir) -> OptimisticList<Todo, InMemoryQueryCache, Arc<TodoFileStore>> {
    let store = Arc::new(TodoFileStore::new(dir.path().join("todos.json")));
    OptimisticList::new(
        InMemoryQueryCache::new(),
        store,
        ListOptions::new(["todos"], NewTodo::default()).with_verbose(true),
    )
}

#[tokio::test]
async fn crud_round_trip_through_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let todos = todos(&dir);

    assert!(todos.list().await.unwrap().is_empty());

    let groceries = todos.create(NewTodo::new("Buy groceries")).await.unwrap();
    let dog = todos.create(NewTodo::new("Walk the dog")).await.unwrap();
    assert_eq!(*todos.snapshot().unwrap().unwrap().data, vec![groceries.clone(), dog.clone()]);

    let done = todos
        .update(groceries.id.clone(), TodoPatch::completed(true))
        .await
        .unwrap();
    assert!(done.completed);

    assert!(todos.delete(dog.id.clone()).await.unwrap());

    let listed = todos.list().await.unwrap();
    assert_eq!(*listed, vec![done]);

    let on_disk: Vec<Todo> =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("todos.json")).unwrap())
            .unwrap();
    assert_eq!(on_disk, *listed);
}

#[tokio::test]
async fn deleting_unknown_todo_rolls_nothing_back() {
    let dir = tempfile::tempdir().unwrap();
    let todos = todos(&dir);
    todos.list().await.unwrap();

    let err = todos.delete("404".into()).await.unwrap_err();

    assert!(matches!(err.remote(), Some(CrudError::NotFound(_))));
    assert_eq!(err.rollback(), Some(&Rollback::NoContext));
}

#[tokio::test]
async fn retry_decorator_passes_through_client_errors() {
    let dir = tempfile::tempdir().unwrap();
    let store = TodoFileStore::new(dir.path().join("todos.json"));
    let todos = OptimisticList::new(
        InMemoryQueryCache::new(),
        Retrying::new(store, RetryPolicy::default()),
        ListOptions::new(["todos"], NewTodo::default()),
    );
    todos.list().await.unwrap();

    let err = todos
        .update("missing".into(), TodoPatch::completed(true))
        .await
        .unwrap_err();
    assert!(matches!(err.remote(), Some(CrudError::NotFound(_))));
}
