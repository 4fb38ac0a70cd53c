//! Session adapter
//!
//! Tracks the signed-in user behind a watch channel so views can react to
//! sign-in and sign-out. Token signatures are checked by the gateway; the
//! client only reads `sub` and `exp`.

use chrono::{DateTime, Utc};
use paperlens_common::auth::decode_unverified;
use paperlens_common::errors::{AppError, Result};
use tokio::sync::watch;
use uuid::Uuid;

/// The signed-in user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub user_id: Uuid,
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl SessionState {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

pub struct Session {
    tx: watch::Sender<Option<SessionState>>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Adopt an access token issued by the identity provider
    pub fn sign_in(&self, access_token: &str) -> Result<SessionState> {
        let claims = decode_unverified(access_token)?;
        let user_id = claims.user_id()?;
        let expires_at = DateTime::<Utc>::from_timestamp(claims.exp, 0).ok_or(AppError::InvalidToken)?;

        let state = SessionState {
            user_id,
            access_token: access_token.to_string(),
            expires_at,
        };
        if state.is_expired() {
            return Err(AppError::ExpiredToken);
        }

        self.tx.send_replace(Some(state.clone()));
        tracing::debug!(user_id = %user_id, "Signed in");
        Ok(state)
    }

    pub fn sign_out(&self) {
        if self.tx.send_replace(None).is_some() {
            tracing::debug!("Signed out");
        }
    }

    pub fn current(&self) -> Option<SessionState> {
        self.tx.borrow().clone()
    }

    /// Current user id, if signed in
    pub fn user_id(&self) -> Option<Uuid> {
        self.tx.borrow().as_ref().map(|s| s.user_id)
    }

    /// Credential for authenticated calls
    pub fn bearer(&self) -> Result<String> {
        match self.tx.borrow().as_ref() {
            None => Err(AppError::Unauthorized {
                message: "Not signed in".to_string(),
            }),
            Some(state) if state.is_expired() => Err(AppError::ExpiredToken),
            Some(state) => Ok(state.access_token.clone()),
        }
    }

    /// Receive every session change
    pub fn subscribe(&self) -> watch::Receiver<Option<SessionState>> {
        self.tx.subscribe()
    }
}
