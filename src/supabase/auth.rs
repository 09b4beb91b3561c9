//! Auth endpoints (`/auth/v1`): password sign-in, sign-up, sign-out,
//! refresh, user lookup/update, and OAuth redirect handling.
//!
//! Every operation that changes the session emits the matching
//! `AuthEvent` after the new state is stored, so listeners observe a
//! consistent client when they react.

use serde_json::json;
use tracing::{debug, info, warn};

use super::types::{AuthEvent, Session, SignUpOutcome, SupabaseError, User, unix_now};
use super::{SupabaseClient, read_body, read_json, request_error};
use crate::location::Location;

impl SupabaseClient {
    /// `POST /auth/v1/token?grant_type=password`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the credentials are rejected.
    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, SupabaseError> {
        let response = self
            .http
            .post(self.endpoint("/auth/v1/token?grant_type=password"))
            .header("apikey", &self.anon_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(request_error)?;
        let session = read_json::<Session>(response)
            .await?
            .with_expiry_from(unix_now());

        self.set_session(session.clone()).await;
        info!(user_id = %session.user.id, "signed in with password");
        self.emit(AuthEvent::SignedIn, Some(session.clone()));
        Ok(session)
    }

    /// `POST /auth/v1/signup`. Optional `metadata` becomes `user_metadata`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the service rejects it.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<SignUpOutcome, SupabaseError> {
        let mut body = json!({ "email": email, "password": password });
        if let Some(data) = metadata {
            body["data"] = data;
        }
        let response = self
            .http
            .post(self.endpoint("/auth/v1/signup"))
            .header("apikey", &self.anon_key)
            .json(&body)
            .send()
            .await
            .map_err(request_error)?;
        let outcome = parse_sign_up(read_json(response).await?, unix_now())?;

        if let Some(session) = &outcome.session {
            self.set_session(session.clone()).await;
            info!(user_id = %outcome.user.id, "signed up and signed in");
            self.emit(AuthEvent::SignedIn, Some(session.clone()));
        } else {
            info!(user_id = %outcome.user.id, "signed up; confirmation pending");
        }
        Ok(outcome)
    }

    /// `POST /auth/v1/logout`, then drop the local session regardless of the
    /// remote outcome.
    pub async fn sign_out(&self) {
        let token = self
            .session
            .read()
            .await
            .as_ref()
            .map(|s| s.access_token.clone());

        if let Some(token) = token {
            let result = self
                .http
                .post(self.endpoint("/auth/v1/logout"))
                .header("apikey", &self.anon_key)
                .bearer_auth(&token)
                .send()
                .await;
            match result {
                Ok(resp) if resp.status().is_success() => debug!("remote session revoked"),
                Ok(resp) => warn!(status = resp.status().as_u16(), "remote logout rejected; clearing locally"),
                Err(e) => warn!(error = %e, "remote logout failed; clearing locally"),
            }
        }

        self.clear_session().await;
        info!("signed out");
        self.emit(AuthEvent::SignedOut, None);
    }

    /// Exchange the refresh token for a new session.
    ///
    /// A 4xx answer means the refresh token is dead: the session is cleared
    /// and `SIGNED_OUT` is emitted before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns `NotAuthenticated` without a session, otherwise the remote error.
    pub async fn refresh_session(&self) -> Result<Session, SupabaseError> {
        let refresh_token = self
            .session
            .read()
            .await
            .as_ref()
            .map(|s| s.refresh_token.clone())
            .ok_or(SupabaseError::NotAuthenticated)?;

        match self.request_refresh(&refresh_token).await {
            Ok(session) => {
                self.set_session(session.clone()).await;
                debug!(user_id = %session.user.id, "session refreshed");
                self.emit(AuthEvent::TokenRefreshed, Some(session.clone()));
                Ok(session)
            }
            Err(e) => {
                if e.status().is_some_and(|s| (400..500).contains(&s)) {
                    warn!(error = %e, "refresh token rejected; signing out");
                    self.clear_session().await;
                    self.emit(AuthEvent::SignedOut, None);
                }
                Err(e)
            }
        }
    }

    async fn request_refresh(&self, refresh_token: &str) -> Result<Session, SupabaseError> {
        let response = self
            .http
            .post(self.endpoint("/auth/v1/token?grant_type=refresh_token"))
            .header("apikey", &self.anon_key)
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await
            .map_err(request_error)?;
        Ok(read_json::<Session>(response)
            .await?
            .with_expiry_from(unix_now()))
    }

    /// Current session, refreshed first when it is about to expire.
    ///
    /// # Errors
    ///
    /// Returns an error if a needed refresh fails for a reason other than a
    /// rejected refresh token (which reads as "no session").
    pub async fn get_session(&self) -> Result<Option<Session>, SupabaseError> {
        let current = self.session.read().await.clone();
        match current {
            Some(session) if session.is_expiring_at(unix_now()) => match self.refresh_session().await {
                Ok(fresh) => Ok(Some(fresh)),
                Err(e) if e.status().is_some_and(|s| (400..500).contains(&s)) => Ok(None),
                Err(e) => Err(e),
            },
            other => Ok(other),
        }
    }

    /// `GET /auth/v1/user` for the current session; `None` when signed out.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the token is rejected.
    pub async fn get_user(&self) -> Result<Option<User>, SupabaseError> {
        let Some(session) = self.get_session().await? else {
            return Ok(None);
        };
        self.fetch_user(&session.access_token).await.map(Some)
    }

    async fn fetch_user(&self, access_token: &str) -> Result<User, SupabaseError> {
        let response = self
            .http
            .get(self.endpoint("/auth/v1/user"))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(request_error)?;
        read_json(response).await
    }

    /// `PUT /auth/v1/user` with `attributes` (e.g. `{"data": {...}}` or
    /// `{"password": "..."}`).
    ///
    /// # Errors
    ///
    /// Returns `NotAuthenticated` without a session, otherwise the remote error.
    pub async fn update_user(&self, attributes: &serde_json::Value) -> Result<User, SupabaseError> {
        let session = self
            .get_session()
            .await?
            .ok_or(SupabaseError::NotAuthenticated)?;
        let response = self
            .http
            .put(self.endpoint("/auth/v1/user"))
            .header("apikey", &self.anon_key)
            .bearer_auth(&session.access_token)
            .json(attributes)
            .send()
            .await
            .map_err(request_error)?;
        let user: User = read_json(response).await?;

        let updated = Session { user: user.clone(), ..session };
        self.set_session(updated.clone()).await;
        self.emit(AuthEvent::UserUpdated, Some(updated));
        Ok(user)
    }

    /// Provider sign-in URL (`/auth/v1/authorize?provider=...`).
    ///
    /// # Errors
    ///
    /// Returns an error if the project URL cannot carry a query string.
    pub fn oauth_authorize_url(&self, provider: &str, redirect_to: Option<&str>) -> Result<String, SupabaseError> {
        let mut url = reqwest::Url::parse(&self.endpoint("/auth/v1/authorize"))
            .map_err(|e| SupabaseError::InvalidUrl(e.to_string()))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("provider", provider);
            if let Some(redirect_to) = redirect_to {
                query.append_pair("redirect_to", redirect_to);
            }
        }
        Ok(url.into())
    }

    /// Consume an OAuth redirect landing.
    ///
    /// Returns `Ok(None)` when the location carries no tokens. Fragment
    /// tokens are validated by fetching their user, then stored and
    /// announced as `SIGNED_IN`.
    ///
    /// # Errors
    ///
    /// Returns `OAuthCallback` when the provider reported an error, or the
    /// remote error if the token is rejected.
    pub async fn session_from_url(&self, location: &Location) -> Result<Option<Session>, SupabaseError> {
        if let Some(error) = callback_error(location) {
            return Err(error);
        }
        let Some(tokens) = FragmentTokens::from_location(location) else {
            return Ok(None);
        };

        let user = self.fetch_user(&tokens.access_token).await?;
        let session = tokens.into_session(user).with_expiry_from(unix_now());

        self.set_session(session.clone()).await;
        info!(user_id = %session.user.id, "signed in from oauth redirect");
        self.emit(AuthEvent::SignedIn, Some(session.clone()));
        Ok(Some(session))
    }

    /// Ping the auth health endpoint; useful to check project settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the service is unreachable or unhealthy.
    pub async fn health(&self) -> Result<(), SupabaseError> {
        let response = self
            .http
            .get(self.endpoint("/auth/v1/health"))
            .header("apikey", &self.anon_key)
            .send()
            .await
            .map_err(request_error)?;
        read_body(response).await.map(|_| ())
    }
}

// =============================================================================
// PARSING
// =============================================================================

/// Sign-up answers with a full session (auto-confirm) or just the user.
pub(crate) fn parse_sign_up(value: serde_json::Value, now: i64) -> Result<SignUpOutcome, SupabaseError> {
    let parse_err = |e: serde_json::Error| SupabaseError::ApiParse(e.to_string());
    if value.get("access_token").is_some() {
        let session = serde_json::from_value::<Session>(value)
            .map_err(parse_err)?
            .with_expiry_from(now);
        return Ok(SignUpOutcome { user: session.user.clone(), session: Some(session) });
    }
    let user_value = value.get("user").cloned().unwrap_or(value);
    let user = serde_json::from_value(user_value).map_err(parse_err)?;
    Ok(SignUpOutcome { user, session: None })
}

fn callback_error(location: &Location) -> Option<SupabaseError> {
    let error = location
        .query_param("error")
        .or_else(|| location.fragment_param("error"))?;
    let description = location
        .query_param("error_description")
        .or_else(|| location.fragment_param("error_description"))
        .unwrap_or_default();
    Some(SupabaseError::OAuthCallback { error, description })
}

/// Tokens left in the fragment by an implicit-grant redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FragmentTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub expires_at: Option<i64>,
}

impl FragmentTokens {
    pub(crate) fn from_location(location: &Location) -> Option<Self> {
        let access_token = location
            .fragment_param("access_token")
            .filter(|t| !t.is_empty())?;
        Some(Self {
            access_token,
            refresh_token: location.fragment_param("refresh_token").unwrap_or_default(),
            token_type: location
                .fragment_param("token_type")
                .unwrap_or_else(|| "bearer".to_owned()),
            expires_in: location
                .fragment_param("expires_in")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            expires_at: location
                .fragment_param("expires_at")
                .and_then(|v| v.parse().ok()),
        })
    }

    fn into_session(self, user: User) -> Session {
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            token_type: self.token_type,
            expires_in: self.expires_in,
            expires_at: self.expires_at,
            user,
        }
    }
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
