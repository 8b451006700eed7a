//! Core library for tokenkeep - bearer token lifecycle management.
//!
//! This crate provides:
//! - Storage backends: OS credential store, plaintext file, in-memory
//! - JWT claims decoding and the expiry policy built on it
//! - One-time migration of a legacy plaintext token into secure storage
//! - `TokenManager`, the façade used by HTTP clients and app bootstrap
//! - An HTTP client that attaches the stored token as a bearer header
//! - Configuration loading and XDG-compliant path resolution

pub mod config;
pub mod error;
pub mod expiry;
pub mod http;
pub mod jwt;
pub mod manager;
pub mod migration;
pub mod paths;
pub mod store;

pub use config::{AppConfig, LogLevel, LoggingConfig, PathsConfig, PlatformSetting, StorageConfig};
pub use error::{Result, StorageError, TokenError};
pub use http::{ApiError, AuthorizedClient};
pub use jwt::{Claims, decode_claims, decode_claims_strict};
pub use manager::{TokenManager, TokenStatus};
pub use migration::{LegacyMigration, MigrationOutcome, MigrationState};
pub use paths::{AppPaths, default_data_dir};
pub use store::{BackendKind, KeyValueStore, Platform, StoreLocations, select_backend};

/// Application name used for config directories, environment prefix and
/// the default keyring service.
pub const APP_NAME: &str = "tokenkeep";

/// Storage key of the current token.
pub const TOKEN_KEY: &str = "auth_token";

/// Storage key of the migration sentinel.
pub const MIGRATION_SENTINEL_KEY: &str = "token_migrated_to_secure";

/// Storage key used by the pre-migration plaintext store.
pub const LEGACY_TOKEN_KEY: &str = "auth-token";

/// Returns the environment variable prefix for this application.
#[must_use]
pub fn env_prefix() -> String {
    APP_NAME
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}
