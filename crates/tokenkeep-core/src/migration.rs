//! One-shot migration from the legacy plaintext store to the secure store.
//!
//! Older installs kept the token in plain storage under [`LEGACY_TOKEN_KEY`].
//! The first run on a host with a secure backend moves it over:
//!
//! 1. skip entirely when the active backend is not secure
//! 2. stop if the sentinel says the migration already ran
//! 3. copy the legacy token to [`TOKEN_KEY`] if it is still valid
//! 4. delete the legacy token whether or not it was copied
//! 5. write the sentinel
//!
//! The sentinel lives in the secure store and is never cleared.

use serde::Serialize;

use crate::error::StorageError;
use crate::expiry::is_expired;
use crate::store::{BackendKind, KeyValueStore};
use crate::{LEGACY_TOKEN_KEY, MIGRATION_SENTINEL_KEY, TOKEN_KEY};

/// Value written under the sentinel key once migration has run.
const SENTINEL_DONE: &str = "true";

/// Persisted migration state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationState {
    /// The legacy store has not been drained yet.
    NotMigrated,
    /// Migration completed. Terminal.
    Migrated,
}

/// What a migration run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum MigrationOutcome {
    /// The active backend is not secure, so there is nothing to migrate to.
    Skipped,
    /// The sentinel was already set.
    AlreadyMigrated,
    /// The legacy store was drained and the sentinel written.
    Migrated {
        /// Whether a valid legacy token was copied into the secure store.
        carried_token: bool,
    },
}

/// Moves a token from a legacy plaintext store into the secure store.
#[derive(Debug, Clone, Copy)]
pub struct LegacyMigration<'a> {
    secure: &'a dyn KeyValueStore,
    legacy: &'a dyn KeyValueStore,
}

impl<'a> LegacyMigration<'a> {
    /// Prepare a migration from `legacy` into `secure`.
    #[must_use]
    pub const fn new(secure: &'a dyn KeyValueStore, legacy: &'a dyn KeyValueStore) -> Self {
        Self { secure, legacy }
    }

    /// Read the persisted state from the sentinel.
    ///
    /// # Errors
    ///
    /// Returns an error if the secure store cannot be read.
    pub async fn state(&self) -> Result<MigrationState, StorageError> {
        let sentinel = self.secure.get(MIGRATION_SENTINEL_KEY).await?;
        Ok(match sentinel.as_deref() {
            Some(SENTINEL_DONE) => MigrationState::Migrated,
            _ => MigrationState::NotMigrated,
        })
    }

    /// Run the migration if it has not run yet.
    ///
    /// # Errors
    ///
    /// Returns the first storage error. Nothing is rolled back; a later run
    /// retries because the sentinel is written last.
    pub async fn run(&self) -> Result<MigrationOutcome, StorageError> {
        if self.secure.kind() != BackendKind::Secure {
            log::debug!("no secure backend, skipping legacy token migration");
            return Ok(MigrationOutcome::Skipped);
        }

        if self.state().await? == MigrationState::Migrated {
            log::debug!("legacy token migration already done");
            return Ok(MigrationOutcome::AlreadyMigrated);
        }

        let legacy_token = self.legacy.get(LEGACY_TOKEN_KEY).await?;
        let carried_token = match legacy_token {
            Some(token) if !is_expired(&token) => {
                self.secure.set(TOKEN_KEY, &token).await?;
                true
            }
            Some(_) => {
                log::info!("dropping expired legacy token");
                false
            }
            None => false,
        };

        self.legacy.delete(LEGACY_TOKEN_KEY).await?;
        self.secure.set(MIGRATION_SENTINEL_KEY, SENTINEL_DONE).await?;

        log::info!("legacy token migration complete (token carried over: {carried_token})");
        Ok(MigrationOutcome::Migrated { carried_token })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::tests::token_expiring_at;
    use crate::store::MemoryStore;

    fn stores() -> (MemoryStore, MemoryStore) {
        (
            MemoryStore::with_kind(BackendKind::Secure),
            MemoryStore::new(),
        )
    }

    #[tokio::test]
    async fn carries_valid_legacy_token() {
        let (secure, legacy) = stores();
        let token = token_expiring_at(9_999_999_999);
        legacy.set(LEGACY_TOKEN_KEY, &token).await.expect("seed");

        let migration = LegacyMigration::new(&secure, &legacy);
        assert_eq!(
            migration.state().await.expect("state"),
            MigrationState::NotMigrated
        );
        let outcome = migration.run().await.expect("run");

        assert_eq!(outcome, MigrationOutcome::Migrated { carried_token: true });
        assert_eq!(secure.get(TOKEN_KEY).await.expect("get"), Some(token));
        assert!(legacy.is_empty().await);
        assert_eq!(
            migration.state().await.expect("state"),
            MigrationState::Migrated
        );
    }

    #[tokio::test]
    async fn drops_expired_legacy_token() {
        let (secure, legacy) = stores();
        legacy
            .set(LEGACY_TOKEN_KEY, "eyJhbGciOiJIUzI1NiJ9.eyJleHAiOjF9.sig")
            .await
            .expect("seed");

        let outcome = LegacyMigration::new(&secure, &legacy).run().await.expect("run");

        assert_eq!(outcome, MigrationOutcome::Migrated { carried_token: false });
        assert_eq!(secure.get(TOKEN_KEY).await.expect("get"), None);
        assert!(legacy.is_empty().await);
    }

    #[tokio::test]
    async fn empty_legacy_store_still_sets_sentinel() {
        let (secure, legacy) = stores();
        let migration = LegacyMigration::new(&secure, &legacy);

        let outcome = migration.run().await.expect("run");

        assert_eq!(outcome, MigrationOutcome::Migrated { carried_token: false });
        assert_eq!(secure.len().await, 1);
        assert_eq!(
            secure.get(MIGRATION_SENTINEL_KEY).await.expect("get").as_deref(),
            Some("true")
        );
    }

    #[tokio::test]
    async fn second_run_is_a_no_op() {
        let (secure, legacy) = stores();
        let token = token_expiring_at(9_999_999_999);
        legacy.set(LEGACY_TOKEN_KEY, &token).await.expect("seed");
        let migration = LegacyMigration::new(&secure, &legacy);
        migration.run().await.expect("first run");

        // a legacy token appearing later must not be picked up again
        legacy.set(LEGACY_TOKEN_KEY, "stale").await.expect("reseed");
        let outcome = migration.run().await.expect("second run");

        assert_eq!(outcome, MigrationOutcome::AlreadyMigrated);
        assert_eq!(secure.get(TOKEN_KEY).await.expect("get"), Some(token));
        assert_eq!(secure.len().await, 2);
        assert_eq!(
            legacy.get(LEGACY_TOKEN_KEY).await.expect("get").as_deref(),
            Some("stale")
        );
    }

    #[tokio::test]
    async fn skipped_without_secure_backend() {
        let plain = MemoryStore::new();
        plain.set(LEGACY_TOKEN_KEY, "legacy").await.expect("seed");

        let outcome = LegacyMigration::new(&plain, &plain).run().await.expect("run");

        assert_eq!(outcome, MigrationOutcome::Skipped);
        assert_eq!(
            plain.get(LEGACY_TOKEN_KEY).await.expect("get").as_deref(),
            Some("legacy")
        );
        assert_eq!(plain.get(MIGRATION_SENTINEL_KEY).await.expect("get"), None);
    }

    #[test]
    fn outcome_serializes_with_tag() {
        let json = serde_json::to_value(MigrationOutcome::Migrated { carried_token: true })
            .expect("json");
        assert_eq!(json["outcome"], "migrated");
        assert_eq!(json["carried_token"], true);
    }
}
