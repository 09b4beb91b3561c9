use std::sync::Arc;

use super::*;
use crate::backend::test_helpers::FakeBackend;
use crate::location::MemoryHistory;
use crate::role_cache::RoleCache;
use crate::routes::{RouteDescriptor, RouteTable};
use crate::supabase::types::Session;

fn navigator_at(backend: &Arc<FakeBackend>, start: &str, recovery: OAuthRecovery) -> Navigator<MemoryHistory> {
    let guard = NavigationGuard::new(backend.clone(), Arc::new(RouteTable::default()), RoleCache::default());
    Navigator::new(MemoryHistory::new(Location::parse(start)), guard, recovery)
}

fn signed_in(session: &Session) -> AuthChange {
    AuthChange { event: AuthEvent::SignedIn, session: Some(session.clone()) }
}

fn paths(history: &MemoryHistory) -> Vec<String> {
    history.entries().into_iter().map(|l| l.to_string()).collect()
}

// =============================================================================
// navigate
// =============================================================================

#[tokio::test]
async fn dashboard_without_session_lands_on_public() {
    let backend = Arc::new(FakeBackend::default());
    let nav = navigator_at(&backend, "/signup", OAuthRecovery::ClientSide);
    let outcome = nav.navigate("/dashboard").await.unwrap();
    assert_eq!(outcome.committed.path, "/");
    assert_eq!(outcome.redirects.len(), 1);
    assert_eq!(outcome.redirects[0].reason, RedirectReason::Unauthenticated);
    assert_eq!(nav.current().await, Location::from_path("/"));
}

#[tokio::test]
async fn login_with_session_lands_on_dashboard() {
    let backend = Arc::new(FakeBackend::default());
    backend.sign_in_as("User");
    let nav = navigator_at(&backend, "/settings", OAuthRecovery::ClientSide);
    let outcome = nav.navigate("/").await.unwrap();
    assert_eq!(outcome.committed.path, "/dashboard");
    assert!(outcome.was_redirected());
}

#[tokio::test]
async fn destinations_by_role() {
    let backend = Arc::new(FakeBackend::default());
    backend.sign_in_as("User");
    let nav = navigator_at(&backend, "/dashboard", OAuthRecovery::ClientSide);
    assert_eq!(nav.navigate("/destinations").await.unwrap().committed.path, "/dashboard");

    let backend = Arc::new(FakeBackend::default());
    backend.sign_in_as("Admin");
    let nav = navigator_at(&backend, "/dashboard", OAuthRecovery::ClientSide);
    let outcome = nav.navigate("/destinations").await.unwrap();
    assert_eq!(outcome.committed.path, "/destinations");
    assert!(!outcome.was_redirected());
}

#[tokio::test]
async fn unknown_route_chains_to_dashboard_when_signed_in() {
    let backend = Arc::new(FakeBackend::default());
    backend.sign_in_as("User");
    let nav = navigator_at(&backend, "/settings", OAuthRecovery::ClientSide);
    let outcome = nav.navigate("/missing").await.unwrap();
    let reasons: Vec<RedirectReason> = outcome.redirects.iter().map(|r| r.reason).collect();
    assert_eq!(reasons, vec![RedirectReason::UnknownRoute, RedirectReason::GuestOnly]);
    assert_eq!(outcome.committed.path, "/dashboard");
}

#[tokio::test]
async fn committed_location_has_no_query_or_fragment() {
    let backend = Arc::new(FakeBackend::default());
    backend.sign_in_as("User");
    let nav = navigator_at(&backend, "/dashboard", OAuthRecovery::ClientSide);
    for target in ["/settings?tab=profile", "/aboutus#team", "/dashboard?a=1#b", "/?x=1"] {
        let outcome = nav.navigate(target).await.unwrap();
        assert!(outcome.committed.is_clean(), "{target}");
        assert!(nav.current().await.is_clean(), "{target}");
    }
}

#[tokio::test]
async fn same_path_replaces_instead_of_pushing() {
    let backend = Arc::new(FakeBackend::default());
    backend.sign_in_as("User");
    let nav = navigator_at(&backend, "/dashboard", OAuthRecovery::ClientSide);
    nav.navigate("/dashboard?ref=mail").await.unwrap();
    nav.with_history(|h| assert_eq!(paths(h), vec!["/dashboard"])).await;

    nav.navigate("/settings").await.unwrap();
    nav.with_history(|h| assert_eq!(paths(h), vec!["/dashboard", "/settings"])).await;
}

#[tokio::test]
async fn redirect_loop_is_bounded() {
    let routes = RouteTable::new(
        vec![
            RouteDescriptor {
                path: "/".into(),
                name: "Login".into(),
                requires_auth: false,
                requires_admin: false,
                guest_only: true,
            },
            RouteDescriptor {
                path: "/console".into(),
                name: "Console".into(),
                requires_auth: true,
                requires_admin: true,
                guest_only: false,
            },
        ],
        "/",
        "/console",
    )
    .unwrap();
    let backend = Arc::new(FakeBackend::default());
    backend.sign_in_as("User");
    let guard = NavigationGuard::new(backend.clone(), Arc::new(routes), RoleCache::default());
    let nav = Navigator::new(MemoryHistory::new(Location::from_path("/")), guard, OAuthRecovery::ClientSide);

    let err = nav.navigate("/console").await.unwrap_err();
    let NavigationError::TooManyRedirects { hops, .. } = err;
    assert_eq!(hops.len(), MAX_REDIRECTS + 2);
    nav.with_history(|h| assert_eq!(h.entries().len(), 1)).await;
}

// =============================================================================
// handle_auth_change
// =============================================================================

#[tokio::test]
async fn signed_in_on_login_redirects_to_dashboard() {
    let backend = Arc::new(FakeBackend::default());
    let session = backend.sign_in_as("User");
    let nav = navigator_at(&backend, "/", OAuthRecovery::ClientSide);
    let outcome = nav.handle_auth_change(&signed_in(&session)).await.unwrap().unwrap();
    assert_eq!(outcome.committed.path, "/dashboard");
    nav.with_history(|h| assert_eq!(paths(h), vec!["/", "/dashboard"])).await;
}

#[tokio::test]
async fn signed_in_on_dashboard_stays() {
    let backend = Arc::new(FakeBackend::default());
    let session = backend.sign_in_as("User");
    let nav = navigator_at(&backend, "/dashboard", OAuthRecovery::ClientSide);
    assert!(nav.handle_auth_change(&signed_in(&session)).await.unwrap().is_none());
    nav.with_history(|h| assert_eq!(h.entries().len(), 1)).await;
}

#[tokio::test]
async fn signed_in_without_session_is_ignored() {
    let backend = Arc::new(FakeBackend::default());
    let nav = navigator_at(&backend, "/", OAuthRecovery::ClientSide);
    let change = AuthChange { event: AuthEvent::SignedIn, session: None };
    assert!(nav.handle_auth_change(&change).await.unwrap().is_none());
    assert_eq!(nav.current().await.path, "/");
}

#[tokio::test]
async fn oauth_error_query_replaced_then_redirected() {
    let backend = Arc::new(FakeBackend::default());
    let session = backend.sign_in_as("User");
    let nav = navigator_at(&backend, "/?error=server_error&error_description=x", OAuthRecovery::ClientSide);
    nav.handle_auth_change(&signed_in(&session)).await.unwrap();
    nav.with_history(|h| {
        assert_eq!(paths(h), vec!["/", "/dashboard"]);
        assert_eq!(h.reload_count(), 0);
    })
    .await;
}

#[tokio::test]
async fn leftover_token_fragment_on_dashboard_is_replaced() {
    let backend = Arc::new(FakeBackend::default());
    let session = backend.sign_in_as("User");
    let nav = navigator_at(&backend, "/dashboard#access_token=abc&refresh_token=def", OAuthRecovery::ClientSide);
    assert!(nav.handle_auth_change(&signed_in(&session)).await.unwrap().is_none());
    nav.with_history(|h| assert_eq!(paths(h), vec!["/dashboard"])).await;
}

#[tokio::test]
async fn full_reload_recovery_lands_on_dashboard() {
    let backend = Arc::new(FakeBackend::default());
    let session = backend.sign_in_as("Admin");
    let nav = navigator_at(&backend, "/?error=server_error", OAuthRecovery::FullReload);
    nav.guard().roles().insert(session.user.id, "Admin");

    assert!(nav.handle_auth_change(&signed_in(&session)).await.unwrap().is_none());
    nav.with_history(|h| {
        assert_eq!(h.current(), &Location::from_path("/dashboard"));
        assert_eq!(h.reload_count(), 1);
    })
    .await;
    assert!(nav.guard().roles().is_empty());
}

#[tokio::test]
async fn signed_in_clears_role_cache() {
    let backend = Arc::new(FakeBackend::default());
    let session = backend.sign_in_as("User");
    let nav = navigator_at(&backend, "/dashboard", OAuthRecovery::ClientSide);
    nav.guard().roles().insert(session.user.id, "Admin");
    nav.handle_auth_change(&signed_in(&session)).await.unwrap();
    assert!(nav.guard().roles().is_empty());
}

#[tokio::test]
async fn signed_out_on_protected_page_falls_back_to_public() {
    let backend = Arc::new(FakeBackend::default());
    let session = backend.sign_in_as("Admin");
    let nav = navigator_at(&backend, "/destinations", OAuthRecovery::ClientSide);
    nav.guard().roles().insert(session.user.id, "Admin");

    backend.sign_out();
    let change = AuthChange { event: AuthEvent::SignedOut, session: None };
    let outcome = nav.handle_auth_change(&change).await.unwrap().unwrap();
    assert_eq!(outcome.committed.path, "/");
    assert!(nav.guard().roles().is_empty());
}

#[tokio::test]
async fn other_events_do_not_navigate() {
    let backend = Arc::new(FakeBackend::default());
    let session = backend.sign_in_as("User");
    let nav = navigator_at(&backend, "/", OAuthRecovery::ClientSide);
    for event in [
        AuthEvent::InitialSession,
        AuthEvent::TokenRefreshed,
        AuthEvent::UserUpdated,
        AuthEvent::PasswordRecovery,
    ] {
        let change = AuthChange { event, session: Some(session.clone()) };
        assert!(nav.handle_auth_change(&change).await.unwrap().is_none());
    }
    nav.with_history(|h| assert_eq!(paths(h), vec!["/"])).await;
}

#[tokio::test]
async fn concurrent_navigation_and_sign_in_settle_on_one_outcome() {
    let backend = Arc::new(FakeBackend::default());
    let session = backend.sign_in_as("User");
    let nav = Arc::new(navigator_at(&backend, "/", OAuthRecovery::ClientSide));

    let a = tokio::spawn({
        let nav = nav.clone();
        async move { nav.navigate("/settings").await.map(|_| ()) }
    });
    let b = tokio::spawn({
        let nav = nav.clone();
        let change = signed_in(&session);
        async move { nav.handle_auth_change(&change).await.map(|_| ()) }
    });
    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    let current = nav.current().await.path;
    assert!(current == "/settings" || current == "/dashboard", "{current}");
    nav.with_history(|h| {
        let entries = paths(h);
        assert_eq!(entries.first().map(String::as_str), Some("/"));
        assert!(entries.iter().all(|p| !p.contains(['?', '#'])));
    })
    .await;
}
