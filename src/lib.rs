//! Auth orchestration for a single-page travel app backed by a hosted
//! Supabase project.
//!
//! The browser is modelled as a `History`; every transition goes through
//! one `Navigator`, which consults the `NavigationGuard` before committing.
//! The bootstrap listener turns auth-state changes into navigations on the
//! same navigator.

pub mod app;
pub mod backend;
pub mod bootstrap;
pub mod config;
pub mod guard;
pub mod helpers;
pub mod location;
pub mod navigator;
pub mod role_cache;
pub mod routes;
pub mod store;
pub mod supabase;
