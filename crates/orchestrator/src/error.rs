use thiserror::Error;

use boxrotate_session::SessionError;
use boxrotate_store::StoreError;
use boxrotate_transfer::TransferError;

use crate::validator::ValidationFailed;

/// Terminal rotation failures. Every external failure is translated into
/// exactly one of these at the controller boundary; none of them is retried
/// in-process. Re-running is a scheduler decision.
#[derive(Debug, Error)]
pub enum RotationError {
    /// The target slot's credentials and stored session were both rejected.
    /// Without the target account there is no rotation to perform.
    #[error("target account authentication failed: {0}")]
    TargetAuth(#[source] SessionError),

    /// The free offering was unavailable or priced above zero. The
    /// reservation has been rolled back.
    #[error("free server offering refused: {reason}")]
    ProvisionRefused { reason: String },

    /// A provisioning action against the target account failed.
    #[error("provisioning failed: {0}")]
    Provision(#[source] SessionError),

    /// The freshly bought server never became visible.
    #[error("new server not visible after {attempts} polls")]
    ServerNotFound { attempts: u32 },

    #[error(transparent)]
    Validation(#[from] ValidationFailed),

    /// Push to the target failed; the server must not start with a partial
    /// world.
    #[error("world transfer failed: {0}")]
    Transfer(#[from] TransferError),

    /// The state document moved underneath this run. Nothing was written.
    #[error("state document conflict: {0}")]
    Conflict(#[source] StoreError),

    /// Any other state store failure. Fatal on read (no meaningful run
    /// without state) and loud on write (a provisioned server whose state
    /// was never recorded needs manual intervention).
    #[error("state store failure: {0}")]
    Store(#[source] StoreError),
}

impl From<StoreError> for RotationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { .. } => RotationError::Conflict(err),
            other => RotationError::Store(other),
        }
    }
}
