use optimistic_list::todo::{NewTodo, TodoPatch};
use optimistic_list::{ListOptions, OptimisticId, OptimisticList, Rollback};

use crate::support::{key, todo, transport_error, Call, Fixture, TodoList};

#[tokio::test]
async fn stale_rollback_is_skipped() {
    let mut fx = Fixture::new(vec![todo("a", "A"), todo("b", "B")]);
    let first_gate = fx.remote.gate_next();
    let second_gate = fx.remote.gate_next();

    let list = fx.list.clone();
    let first = tokio::spawn(async move { list.create(NewTodo::new("first")).await });
    fx.next_call().await;

    let list = fx.list.clone();
    let second = tokio::spawn(async move { list.create(NewTodo::new("second")).await });
    fx.next_call().await;

    let raced = fx.snapshot().unwrap();
    assert_eq!(raced.data.len(), 4);
    assert_eq!(raced.data[2].text, "first");
    assert_eq!(raced.data[3].text, "second");

    // The first mutation fails after the second one wrote over it.
    first_gate.send(Err(transport_error())).unwrap();
    let err = first.await.unwrap().unwrap_err();
    assert_eq!(err.rollback(), Some(&Rollback::SkippedStale));

    let after = fx.snapshot().unwrap();
    assert_eq!(after.version, raced.version);
    assert_eq!(after.data.len(), 4);

    second_gate.send(Ok(())).unwrap();
    let created = second.await.unwrap().unwrap();

    let cached = fx.cached();
    assert_eq!(cached[..2], [todo("a", "A"), todo("b", "B")]);
    assert!(cached[2].id.is_optimistic());
    assert_eq!(cached[3], created);
    assert_eq!(fx.invalidations(), 2);
}

#[tokio::test]
async fn latest_writer_rolls_back_to_its_own_base() {
    let mut fx = Fixture::new(vec![todo("a", "A")]);
    let first_gate = fx.remote.gate_next();
    let second_gate = fx.remote.gate_next();

    let list = fx.list.clone();
    let first = tokio::spawn(async move { list.create(NewTodo::new("first")).await });
    fx.next_call().await;

    let list = fx.list.clone();
    let second = tokio::spawn(async move { list.create(NewTodo::new("second")).await });
    fx.next_call().await;

    // The second mutation is still current, so its rollback applies and
    // restores the list it was computed from: the one holding `first`.
    second_gate.send(Err(transport_error())).unwrap();
    let err = second.await.unwrap().unwrap_err();
    assert_eq!(err.rollback(), Some(&Rollback::Restored));

    let cached = fx.cached();
    assert_eq!(cached.len(), 2);
    assert_eq!(cached[1].text, "first");

    first_gate.send(Ok(())).unwrap();
    let created = first.await.unwrap().unwrap();
    assert_eq!(fx.cached(), vec![todo("a", "A"), created]);
}

#[tokio::test]
async fn stacked_failures_unwind_newest_first() {
    let mut fx = Fixture::new(vec![todo("a", "A")]);
    let before = fx.snapshot().unwrap();
    let first_gate = fx.remote.gate_next();
    let second_gate = fx.remote.gate_next();

    let list = fx.list.clone();
    let first = tokio::spawn(async move { list.create(NewTodo::new("first")).await });
    fx.next_call().await;
    let after_first = fx.snapshot().unwrap();

    let list = fx.list.clone();
    let second = tokio::spawn(async move { list.create(NewTodo::new("second")).await });
    fx.next_call().await;

    second_gate.send(Err(transport_error())).unwrap();
    let err = second.await.unwrap().unwrap_err();
    assert_eq!(err.rollback(), Some(&Rollback::Restored));

    // Back to exactly what the first mutation wrote, token included.
    let restored = fx.snapshot().unwrap();
    assert_eq!(restored.version, after_first.version);
    assert!(std::sync::Arc::ptr_eq(&restored.data, &after_first.data));

    first_gate.send(Err(transport_error())).unwrap();
    let err = first.await.unwrap().unwrap_err();
    assert_eq!(err.rollback(), Some(&Rollback::Restored));

    assert_eq!(fx.cached(), vec![todo("a", "A")]);
    assert_eq!(fx.snapshot().unwrap().version, before.version);
    assert_eq!(fx.invalidations(), 2);
}

#[tokio::test]
async fn lists_sharing_a_key_mint_distinct_ids() {
    let mut fx = Fixture::new(vec![todo("a", "A")]);
    let other: TodoList = OptimisticList::new(
        fx.cache.clone(),
        fx.remote.clone(),
        ListOptions::new(key(), NewTodo::default()),
    );
    let first_gate = fx.remote.gate_next();
    let second_gate = fx.remote.gate_next();

    let list = fx.list.clone();
    let first = tokio::spawn(async move { list.create(NewTodo::new("first")).await });
    fx.next_call().await;

    let second = tokio::spawn(async move { other.create(NewTodo::new("second")).await });
    fx.next_call().await;

    let pending = fx.cached();
    assert_eq!(pending.len(), 3);
    assert!(pending[1].id.is_optimistic());
    assert!(pending[2].id.is_optimistic());
    assert_ne!(pending[1].id, pending[2].id);

    // The later create resolves first and must only replace its own entry.
    second_gate.send(Ok(())).unwrap();
    let second = second.await.unwrap().unwrap();
    first_gate.send(Ok(())).unwrap();
    let first = first.await.unwrap().unwrap();

    assert_eq!(fx.cached(), vec![todo("a", "A"), first, second]);
}

#[tokio::test]
async fn update_rollback_skipped_after_concurrent_delete() {
    let mut fx = Fixture::new(vec![todo("a", "A"), todo("b", "B")]);
    let update_gate = fx.remote.gate_next();

    let list = fx.list.clone();
    let update =
        tokio::spawn(async move { list.update("a".into(), TodoPatch::completed(true)).await });
    fx.next_call().await;

    fx.list.delete("b".into()).await.unwrap();
    assert_eq!(fx.cached_ids(), vec!["a"]);
    assert!(fx.cached()[0].completed);

    update_gate.send(Err(transport_error())).unwrap();
    let err = update.await.unwrap().unwrap_err();
    assert_eq!(err.rollback(), Some(&Rollback::SkippedStale));

    // The delete's result survives; the refetch after settlement repairs
    // the stale `completed` flag.
    assert_eq!(fx.cached_ids(), vec!["a"]);
    assert_eq!(fx.invalidations(), 2);
}

#[tokio::test]
async fn mutation_cancels_in_flight_refetch() {
    let mut fx = Fixture::new(vec![todo("a", "A")]);
    let fetch_gate = fx.remote.gate_next();
    let create_gate = fx.remote.gate_next();

    let list = fx.list.clone();
    let refresh = tokio::spawn(async move { list.refresh().await });
    assert_eq!(fx.next_call().await, Call::Fetch);

    let list = fx.list.clone();
    let create = tokio::spawn(async move { list.create(NewTodo::new("new")).await });
    fx.next_call().await;
    let optimistic = fx.snapshot().unwrap();

    // The refetch answers with the server's old list; it must not clobber
    // the optimistic entry.
    fetch_gate.send(Ok(())).unwrap();
    let fetched = refresh.await.unwrap().unwrap();
    assert_eq!(fetched.len(), 2);
    assert_eq!(fx.snapshot().unwrap().version, optimistic.version);

    create_gate.send(Ok(())).unwrap();
    let created = create.await.unwrap().unwrap();
    assert_eq!(fx.cached(), vec![todo("a", "A"), created]);
}
