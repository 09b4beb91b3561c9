use std::time::Duration;

use super::*;
use crate::backend::test_helpers::FakeBackend;
use crate::guard::NavigationGuard;
use crate::location::{Location, MemoryHistory};
use crate::navigator::OAuthRecovery;
use crate::role_cache::RoleCache;
use crate::routes::RouteTable;
use crate::supabase::types::AuthEvent;

const SETTLE: Duration = Duration::from_secs(2);

fn navigator_at(backend: &Arc<FakeBackend>, start: &str) -> Arc<Navigator<MemoryHistory>> {
    let guard = NavigationGuard::new(backend.clone(), Arc::new(RouteTable::default()), RoleCache::default());
    Arc::new(Navigator::new(
        MemoryHistory::new(Location::parse(start)),
        guard,
        OAuthRecovery::ClientSide,
    ))
}

async fn settle(subscription: &AuthSubscription, count: u64) {
    let done = tokio::time::timeout(SETTLE, subscription.wait_for(count))
        .await
        .expect("listener did not settle");
    assert!(done, "listener stopped before handling {count} events");
}

// =============================================================================
// Redirects
// =============================================================================

#[tokio::test]
async fn signed_in_at_login_lands_on_dashboard() {
    let backend = Arc::new(FakeBackend::default());
    let nav = navigator_at(&backend, "/");
    let subscription = install(&*backend, nav.clone());

    let session = backend.sign_in_as("User");
    backend.emit(AuthEvent::SignedIn, Some(session));
    settle(&subscription, 1).await;

    assert_eq!(nav.current().await, Location::from_path("/dashboard"));
}

#[tokio::test]
async fn oauth_error_query_removed_after_sign_in() {
    let backend = Arc::new(FakeBackend::default());
    let nav = navigator_at(&backend, "/?error=server_error&error_code=unexpected_failure");
    let subscription = install(&*backend, nav.clone());

    let session = backend.sign_in_as("User");
    backend.emit(AuthEvent::SignedIn, Some(session));
    settle(&subscription, 1).await;

    nav.with_history(|h| {
        assert!(h.entries().iter().all(|l| !l.has_oauth_error_signature()));
        assert_eq!(h.current().path, "/dashboard");
    })
    .await;
}

#[tokio::test]
async fn signed_out_event_leaves_protected_page() {
    let backend = Arc::new(FakeBackend::default());
    backend.sign_in_as("User");
    let nav = navigator_at(&backend, "/settings");
    let subscription = install(&*backend, nav.clone());

    backend.sign_out();
    backend.emit(AuthEvent::SignedOut, None);
    settle(&subscription, 1).await;

    assert_eq!(nav.current().await.path, "/");
}

#[tokio::test]
async fn no_events_means_no_redirect() {
    let backend = Arc::new(FakeBackend::default());
    backend.sign_in_as("User");
    let nav = navigator_at(&backend, "/");
    let subscription = install(&*backend, nav.clone());

    tokio::task::yield_now().await;
    assert!(subscription.is_active());
    assert_eq!(subscription.handled(), 0);
    assert_eq!(nav.current().await.path, "/");
}

// =============================================================================
// Stream failures
// =============================================================================

#[tokio::test]
async fn lagging_listener_keeps_listening() {
    let backend = Arc::new(FakeBackend::default());
    let session = backend.sign_in_as("User");
    let nav = navigator_at(&backend, "/");
    let subscription = install(&*backend, nav.clone());

    // The listener has not run yet on this runtime, so these overflow it.
    for _ in 0..20 {
        backend.emit(AuthEvent::TokenRefreshed, Some(session.clone()));
    }
    // Skipped events still count, so waiting on every emitted event ends.
    settle(&subscription, 20).await;
    assert_eq!(subscription.handled(), 20);
    assert!(subscription.is_active());

    backend.emit(AuthEvent::SignedIn, Some(session));
    settle(&subscription, 21).await;
    assert_eq!(nav.current().await.path, "/dashboard");
}

#[tokio::test]
async fn closed_stream_ends_listener() {
    let guard_backend = Arc::new(FakeBackend::default());
    let events = Arc::new(FakeBackend::default());
    let nav = navigator_at(&guard_backend, "/");
    let subscription = install(&*events, nav);

    drop(events);
    let finished = tokio::time::timeout(SETTLE, subscription.wait_for(1)).await.unwrap();
    assert!(!finished);
    assert_eq!(subscription.handled(), 0);
}

// =============================================================================
// Disposal
// =============================================================================

#[tokio::test]
async fn shutdown_stops_listener() {
    let backend = Arc::new(FakeBackend::default());
    let nav = navigator_at(&backend, "/");
    let subscription = install(&*backend, nav.clone());
    assert_eq!(backend.receivers(), 1);

    subscription.shutdown().await;
    assert_eq!(backend.receivers(), 0);

    let session = backend.sign_in_as("User");
    backend.emit(AuthEvent::SignedIn, Some(session));
    tokio::task::yield_now().await;
    assert_eq!(nav.current().await.path, "/");
}

#[tokio::test]
async fn drop_aborts_listener() {
    let backend = Arc::new(FakeBackend::default());
    let nav = navigator_at(&backend, "/");
    drop(install(&*backend, nav));

    tokio::time::timeout(SETTLE, async {
        while backend.receivers() > 0 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("listener still subscribed after drop");
}
