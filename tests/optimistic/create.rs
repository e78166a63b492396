use std::sync::Arc;

use optimistic_list::todo::NewTodo;
use optimistic_list::{CrudError, OptimisticError, OptimisticId, QueryCache, Rollback};

use crate::support::{abc, ids, todo, transport_error, Call, Fixture};

#[tokio::test]
async fn create_is_visible_before_server_responds() {
    let mut fx = Fixture::new(vec![todo("a", "A"), todo("b", "B")]);
    let gate = fx.remote.gate_next();

    let list = fx.list.clone();
    let task = tokio::spawn(async move { list.create(NewTodo::new("C")).await });
    assert_eq!(fx.next_call().await, Call::Create(NewTodo::new("C")));

    let interim = fx.cached();
    assert_eq!(interim.len(), 3);
    let optimistic = &interim[2];
    assert!(optimistic.id.is_optimistic());
    assert!(!["a", "b"].contains(&optimistic.id.as_str()));
    assert_eq!(optimistic.text, "C");
    assert_eq!(fx.invalidations(), 0);

    gate.send(Ok(())).unwrap();
    let created = task.await.unwrap().unwrap();
    assert!(!created.id.is_optimistic());
}

#[tokio::test]
async fn create_success_replaces_optimistic_entry_in_place() {
    let mut fx = Fixture::new(vec![todo("a", "A"), todo("b", "B")]);
    let gate = fx.remote.gate_next();

    let list = fx.list.clone();
    let task = tokio::spawn(async move { list.create(NewTodo::new("C")).await });
    fx.next_call().await;

    gate.send(Ok(())).unwrap();
    let created = task.await.unwrap().unwrap();

    assert_eq!(fx.cached_ids(), vec!["a".to_string(), "b".into(), created.id.clone()]);
    assert_eq!(fx.cached()[2], created);
    assert_eq!(fx.invalidations(), 1);
}

#[tokio::test]
async fn create_failure_restores_pre_mutation_snapshot() {
    let fx = Fixture::new(vec![todo("a", "A"), todo("b", "B")]);
    let before = fx.snapshot().unwrap();
    fx.remote.fail_next(transport_error());

    let err = fx.list.create(NewTodo::new("C")).await.unwrap_err();

    assert_eq!(
        err,
        OptimisticError::Remote {
            source: transport_error(),
            rollback: Rollback::Restored,
        }
    );
    let after = fx.snapshot().unwrap();
    assert!(Arc::ptr_eq(&before.data, &after.data));
    assert_eq!(fx.cached_ids(), vec!["a", "b"]);
    assert_eq!(fx.invalidations(), 1);
}

#[tokio::test]
async fn create_on_empty_cache_rolls_back_to_empty_list() {
    let fx = Fixture::empty(Vec::new());
    fx.remote.fail_next(CrudError::Status {
        code: 500,
        message: "boom".into(),
    });

    let err = fx.list.create(NewTodo::new("C")).await.unwrap_err();

    assert_eq!(err.rollback(), Some(&Rollback::Restored));
    assert!(fx.snapshot().unwrap().data.is_empty());
}

#[tokio::test]
async fn form_is_reset_during_create_and_restored_on_failure() {
    let mut fx = Fixture::new(abc());
    fx.list.form().set(NewTodo::new("Call mom"));
    let gate = fx.remote.gate_next();

    let list = fx.list.clone();
    let draft = list.form().get();
    let task = tokio::spawn(async move { list.create(draft).await });
    fx.next_call().await;

    assert_eq!(fx.list.form().get(), NewTodo::default());

    gate.send(Err(transport_error())).unwrap();
    assert!(task.await.unwrap().is_err());
    assert_eq!(fx.list.form().get(), NewTodo::new("Call mom"));
}

#[tokio::test]
async fn form_stays_reset_after_successful_create() {
    let fx = Fixture::new(abc());
    fx.list.form().set(NewTodo::new("Call mom"));

    fx.list.create(fx.list.form().get()).await.unwrap();

    assert_eq!(fx.list.form().get(), NewTodo::default());
}

#[tokio::test]
async fn create_success_is_noop_when_optimistic_entry_is_gone() {
    let mut fx = Fixture::new(abc());
    let gate = fx.remote.gate_next();

    let list = fx.list.clone();
    let task = tokio::spawn(async move { list.create(NewTodo::new("C")).await });
    fx.next_call().await;

    // Someone else replaced the whole list meanwhile.
    fx.cache.set(&crate::support::key(), Arc::new(vec![todo("z", "Z")])).unwrap();

    gate.send(Ok(())).unwrap();
    task.await.unwrap().unwrap();

    assert_eq!(fx.cached_ids(), vec!["z"]);
}

#[tokio::test]
async fn rapid_creates_get_distinct_optimistic_ids() {
    let mut fx = Fixture::new(Vec::new());
    let gates: Vec<_> = (0..5).map(|_| fx.remote.gate_next()).collect();

    let mut tasks = Vec::new();
    for n in 0..5 {
        let list = fx.list.clone();
        tasks.push(tokio::spawn(async move {
            list.create(NewTodo::new(format!("todo {}", n))).await
        }));
        fx.next_call().await;
    }

    let cached = fx.cached();
    assert_eq!(cached.len(), 5);
    let mut optimistic = ids(&cached);
    assert!(optimistic.iter().all(|id| id.is_optimistic()));
    optimistic.sort();
    optimistic.dedup();
    assert_eq!(optimistic.len(), 5);

    for gate in gates {
        gate.send(Ok(())).unwrap();
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }
    assert!(fx.cached().iter().all(|t| !t.id.is_optimistic()));
    assert_eq!(fx.invalidations(), 5);
}
