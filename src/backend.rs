//! The seam between navigation logic and the hosted auth service.
//!
//! `SupabaseClient` is the production implementation. The guard and the
//! bootstrap listener only ever see `dyn AuthBackend`, so they can be driven
//! by an in-process fake in tests.

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::supabase::types::{AuthChange, Session, SupabaseError, User};

#[async_trait::async_trait]
pub trait AuthBackend: Send + Sync {
    /// Current session, if any. Every call is a fresh query.
    async fn get_session(&self) -> Result<Option<Session>, SupabaseError>;

    /// Identity behind the current session.
    async fn get_user(&self) -> Result<Option<User>, SupabaseError>;

    /// `profiles.role` for `user_id`.
    async fn fetch_role(&self, user_id: Uuid) -> Result<String, SupabaseError>;

    /// Auth-state change stream.
    fn subscribe(&self) -> broadcast::Receiver<AuthChange>;
}
