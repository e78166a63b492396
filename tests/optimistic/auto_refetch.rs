use std::time::Duration;

use optimistic_list::todo::TodoPatch;
use optimistic_list::AutoRefetch;

use crate::support::{abc, Call, Fixture};

const HOUR: Duration = Duration::from_secs(3600);

#[tokio::test]
async fn loads_empty_cache_and_refetches_after_mutation() {
    let mut fx = Fixture::empty(abc());
    let refetch = AutoRefetch::spawn(fx.list.clone(), fx.cache.subscribe(), HOUR);

    assert_eq!(fx.next_call().await, Call::Fetch);

    fx.list
        .update("a".into(), TodoPatch::completed(true))
        .await
        .unwrap();
    assert_eq!(
        fx.next_call().await,
        Call::Update("a".into(), TodoPatch::completed(true))
    );
    assert_eq!(fx.next_call().await, Call::Fetch);

    let stats = refetch.stop().await;
    assert_eq!(stats.refetches, 2);
    assert_eq!(stats.failures, 0);
    assert_eq!(stats.polls, 1);
    assert!(fx.cached()[0].completed);
}

#[tokio::test]
async fn ignores_other_keys() {
    let mut fx = Fixture::new(abc());
    let refetch = AutoRefetch::spawn(fx.list.clone(), fx.cache.subscribe(), HOUR);

    let other = optimistic_list::CacheKey::from(["other"]);
    optimistic_list::QueryCache::<optimistic_list::todo::Todo>::invalidate(&fx.cache, &other)
        .unwrap();
    tokio::task::yield_now().await;

    let stats = refetch.stop().await;
    assert_eq!(stats.refetches, 0);
    assert!(fx.called.try_recv().is_err());
}

#[tokio::test]
async fn counts_failed_refetches() {
    let mut fx = Fixture::empty(abc());
    fx.remote.fail_next(crate::support::transport_error());
    let refetch = AutoRefetch::spawn(fx.list.clone(), fx.cache.subscribe(), HOUR);

    assert_eq!(fx.next_call().await, Call::Fetch);
    tokio::task::yield_now().await;

    let stats = refetch.stop().await;
    assert_eq!(stats.failures, 1);
    assert_eq!(stats.refetches, 0);
    assert!(fx.snapshot().is_none());
}
