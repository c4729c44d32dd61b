//! Integration tests for the background token renewal.
//!
//! Runs on a paused clock: sleeping in the test advances time to the next
//! timer, so the 14-minute period elapses instantly and deterministically.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use taskdeck::cache::{InMemoryKeyValueStore, KeyValueStore};
use taskdeck::gateway::memory::InMemoryGateway;
use taskdeck::session::{
    ACCESS_TOKEN_KEY, AuthState, DEFAULT_REFRESH_INTERVAL, REFRESH_TOKEN_KEY, Session,
};
use taskdeck_proto::auth::TokenPair;

fn signed_in() -> (Arc<Session>, Arc<InMemoryKeyValueStore>) {
    let kv = Arc::new(InMemoryKeyValueStore::new());
    let session = Arc::new(Session::init(kv.clone()));
    session.sign_in(TokenPair::new("a0", "r0")).unwrap();
    (session, kv)
}

#[tokio::test(start_paused = true)]
async fn no_renewal_before_first_interval() {
    let (session, _) = signed_in();
    let gateway = Arc::new(InMemoryGateway::new());
    let task = session.spawn_refresh_task(gateway.clone(), DEFAULT_REFRESH_INTERVAL);

    tokio::time::sleep(Duration::from_secs(13 * 60)).await;
    assert_eq!(gateway.call_count(), 0);
    assert_eq!(session.access_token().as_deref(), Some("a0"));
    task.abort();
}

#[tokio::test(start_paused = true)]
async fn renews_every_interval_and_persists() {
    let (session, kv) = signed_in();
    let gateway = Arc::new(InMemoryGateway::new());
    let task = session.spawn_refresh_task(gateway.clone(), DEFAULT_REFRESH_INTERVAL);

    tokio::time::sleep(DEFAULT_REFRESH_INTERVAL + Duration::from_secs(1)).await;
    assert_eq!(gateway.call_count(), 1);
    let first = session.access_token().unwrap();
    assert_ne!(first, "a0");
    assert_eq!(kv.get(ACCESS_TOKEN_KEY).unwrap(), Some(first.clone()));

    tokio::time::sleep(DEFAULT_REFRESH_INTERVAL).await;
    assert_eq!(gateway.call_count(), 2);
    assert_ne!(session.access_token().unwrap(), first);
    assert_eq!(session.state(), AuthState::SignedIn);
    task.abort();
}

#[tokio::test(start_paused = true)]
async fn failed_renewal_signs_out_without_retry() {
    let (session, kv) = signed_in();
    let gateway = Arc::new(InMemoryGateway::new());
    gateway.set_unauthorized(true);
    let mut state = session.subscribe();
    let task = session.spawn_refresh_task(gateway.clone(), DEFAULT_REFRESH_INTERVAL);

    tokio::time::sleep(DEFAULT_REFRESH_INTERVAL + Duration::from_secs(1)).await;
    assert_eq!(*state.borrow_and_update(), AuthState::SignedOut);
    assert!(kv.get(ACCESS_TOKEN_KEY).unwrap().is_none());
    assert!(kv.get(REFRESH_TOKEN_KEY).unwrap().is_none());

    // Signed out: later ticks do not call the API again.
    tokio::time::sleep(DEFAULT_REFRESH_INTERVAL * 3).await;
    assert_eq!(gateway.call_count(), 1);
    task.abort();
}

#[tokio::test(start_paused = true)]
async fn sign_in_resumes_renewal() {
    let kv = Arc::new(InMemoryKeyValueStore::new());
    let session = Arc::new(Session::init(kv));
    let gateway = Arc::new(InMemoryGateway::new());
    let task = session.spawn_refresh_task(gateway.clone(), DEFAULT_REFRESH_INTERVAL);

    tokio::time::sleep(DEFAULT_REFRESH_INTERVAL * 2 + Duration::from_secs(1)).await;
    assert_eq!(gateway.call_count(), 0);

    session.sign_in(TokenPair::new("a1", "r1")).unwrap();
    tokio::time::sleep(DEFAULT_REFRESH_INTERVAL).await;
    assert_eq!(gateway.call_count(), 1);
    assert_ne!(session.access_token().as_deref(), Some("a1"));
    task.abort();
}
