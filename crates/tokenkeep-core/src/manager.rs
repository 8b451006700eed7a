//! Token lifecycle manager.
//!
//! [`TokenManager`] is the single entry point the rest of an application
//! uses for its bearer token. Bootstrap builds one, calls
//! [`TokenManager::initialize`] once, and shares it behind an `Arc`.
//!
//! `set_token`, `get_token` and `clear_token` return typed errors so the
//! caller can tell an expired credential from a storage failure. The query
//! helpers (`is_token_valid`, `is_token_expiring_soon`,
//! `get_token_expiration`, `status`) never fail.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::OnceCell;

use crate::error::{Result, TokenError};
use crate::expiry::{expiration_instant, is_expired, is_expiring_soon};
use crate::jwt::decode_claims;
use crate::migration::{LegacyMigration, MigrationOutcome};
use crate::store::{
    BackendKind, FileStore, KeyValueStore, Platform, StoreLocations, open_backend, select_backend,
};
use crate::TOKEN_KEY;

/// Owns the stored bearer token.
#[derive(Debug)]
pub struct TokenManager {
    store: Arc<dyn KeyValueStore>,
    legacy: Arc<dyn KeyValueStore>,
    initialized: OnceCell<()>,
}

impl TokenManager {
    /// Build a manager over an active store and the legacy plaintext store.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, legacy: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            legacy,
            initialized: OnceCell::new(),
        }
    }

    /// Select and open the backend for `platform`.
    ///
    /// The legacy store is always the plaintext file. When the platform has
    /// no secure backend the plaintext file is also the active store.
    #[must_use]
    pub fn open(platform: Platform, locations: &StoreLocations) -> Self {
        let kind = select_backend(platform);
        let store = open_backend(kind, locations);
        let legacy: Arc<dyn KeyValueStore> = match kind {
            BackendKind::Secure => Arc::new(FileStore::new(locations.plain_file.clone())),
            BackendKind::Plain => Arc::clone(&store),
        };
        log::debug!("token manager using {kind} backend on {platform}");
        Self::new(store, legacy)
    }

    /// Which backend holds the token.
    #[must_use]
    pub fn backend_kind(&self) -> BackendKind {
        self.store.kind()
    }

    /// Run the legacy migration once for this process.
    ///
    /// Later calls return immediately. Migration errors are logged and
    /// swallowed: a failed migration leaves the user signed out rather than
    /// blocking startup.
    pub async fn initialize(&self) {
        self.initialized
            .get_or_init(|| async {
                match self.migrate().await {
                    Ok(outcome) => log::debug!("token store initialized: {outcome:?}"),
                    Err(e) => log::warn!("legacy token migration failed: {e}"),
                }
            })
            .await;
    }

    /// Run the legacy migration now, reporting what it did.
    ///
    /// Safe to call repeatedly; the persisted sentinel makes every run after
    /// the first a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Storage`] if either store fails.
    pub async fn migrate(&self) -> Result<MigrationOutcome> {
        LegacyMigration::new(&*self.store, &*self.legacy)
            .run()
            .await
            .map_err(|e| TokenError::storage("migrating legacy token", e))
    }

    /// Store a token, or delete the stored one when `token` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Expired`] without writing anything if the token
    /// is already expired or has no readable expiry, and
    /// [`TokenError::Storage`] if the backend fails.
    pub async fn set_token(&self, token: Option<&str>) -> Result<()> {
        let Some(token) = token else {
            return self.clear_token().await;
        };

        if is_expired(token) {
            return Err(TokenError::Expired(
                "refusing to store an expired token".to_string(),
            ));
        }

        self.store
            .set(TOKEN_KEY, token)
            .await
            .map_err(|e| TokenError::storage("writing token", e))?;
        log::debug!("stored token in {} backend", self.backend_kind());
        Ok(())
    }

    /// Read the stored token.
    ///
    /// Returns `Ok(None)` when nothing is stored. An expired token is deleted
    /// before the error is returned, so the next call sees no token.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Expired`] if the stored token is expired and
    /// [`TokenError::Storage`] if the backend fails.
    pub async fn get_token(&self) -> Result<Option<String>> {
        let Some(token) = self
            .store
            .get(TOKEN_KEY)
            .await
            .map_err(|e| TokenError::storage("reading token", e))?
        else {
            return Ok(None);
        };

        if is_expired(&token) {
            log::info!("stored token expired, removing it");
            self.store
                .delete(TOKEN_KEY)
                .await
                .map_err(|e| TokenError::storage("removing expired token", e))?;
            return Err(TokenError::Expired("stored token has expired".to_string()));
        }

        Ok(Some(token))
    }

    /// Delete the stored token.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Storage`] if the backend fails.
    pub async fn clear_token(&self) -> Result<()> {
        self.store
            .delete(TOKEN_KEY)
            .await
            .map_err(|e| TokenError::storage("deleting token", e))?;
        log::debug!("cleared token from {} backend", self.backend_kind());
        Ok(())
    }

    /// Whether a usable token is stored. Never fails.
    pub async fn is_token_valid(&self) -> bool {
        matches!(self.get_token().await, Ok(Some(_)))
    }

    /// Whether the stored token expires within five minutes.
    ///
    /// `false` when there is no usable token. Never fails.
    pub async fn is_token_expiring_soon(&self) -> bool {
        match self.get_token().await {
            Ok(Some(token)) => is_expiring_soon(&token),
            _ => false,
        }
    }

    /// Expiry of the stored token, or `None` on any failure.
    pub async fn get_token_expiration(&self) -> Option<DateTime<Utc>> {
        match self.get_token().await {
            Ok(Some(token)) => expiration_instant(&token),
            _ => None,
        }
    }

    /// Snapshot of the stored token for display. Never fails.
    pub async fn status(&self) -> TokenStatus {
        let backend = self.backend_kind();
        match self.get_token().await {
            Ok(Some(token)) => {
                let claims = decode_claims(&token);
                TokenStatus {
                    backend,
                    valid: true,
                    expiring_soon: is_expiring_soon(&token),
                    expires_at: expiration_instant(&token),
                    subject: claims.as_ref().and_then(|c| c.sub()).map(str::to_string),
                    problem: None,
                }
            }
            Ok(None) => TokenStatus::empty(backend, None),
            Err(e) => TokenStatus::empty(backend, Some(e.to_string())),
        }
    }
}

/// Point-in-time view of the stored token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenStatus {
    /// Backend holding the token.
    pub backend: BackendKind,
    /// Whether a usable token is stored.
    pub valid: bool,
    /// Whether it expires within five minutes.
    pub expiring_soon: bool,
    /// Expiry instant.
    pub expires_at: Option<DateTime<Utc>>,
    /// `sub` claim.
    pub subject: Option<String>,
    /// Why no token could be read, if reading failed.
    pub problem: Option<String>,
}

impl TokenStatus {
    const fn empty(backend: BackendKind, problem: Option<String>) -> Self {
        Self {
            backend,
            valid: false,
            expiring_soon: false,
            expires_at: None,
            subject: None,
            problem,
        }
    }
}
