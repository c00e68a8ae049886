//! Remote state document client.
//!
//! The rotation state lives in a single GitHub Gist file and is always read
//! and written whole. [`StateStore`] is the seam the controller consumes;
//! [`GistStore`] is the HTTP implementation.

mod gist;

pub use gist::{GistStore, STATE_FILE};

use async_trait::async_trait;
use boxrotate_types::RotationState;

/// Opaque freshness token captured at load time and required at save time.
/// A save against a stale version fails with [`StoreError::Conflict`]
/// instead of silently clobbering a concurrent writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateVersion(pub String);

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("state store request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("state store returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("state document `{0}` not present in the gist")]
    MissingDocument(String),

    #[error("state document is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("state document changed since it was loaded (expected version {expected}, found {found})")]
    Conflict { expected: String, found: String },
}

/// Read/write access to the single rotation-state document.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Fetch the current document together with its version token.
    async fn load(&self) -> Result<(RotationState, StateVersion), StoreError>;

    /// Persist the whole document. `expected` must be the version returned
    /// by the `load` this state was derived from.
    async fn save(&self, state: &RotationState, expected: &StateVersion)
        -> Result<(), StoreError>;
}
