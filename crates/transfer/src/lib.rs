//! World data transfer pipeline.
//!
//! Moves the `/world` directory from the outgoing server to the incoming one
//! through a local scratch directory: mirror-pull, then mirror-push. The
//! actual mirroring is behind the [`MirrorTool`] seam; production uses
//! [`LftpTool`], tests use recording mocks.

mod lftp;
mod pipeline;

pub use lftp::LftpTool;
pub use pipeline::{TransferPipeline, DEFAULT_SCRATCH_DIR};

use async_trait::async_trait;
use boxrotate_types::FtpCredentials;
use std::path::PathBuf;

/// Direction of a single mirror operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorDirection {
    /// Remote to local.
    Pull,
    /// Local to remote.
    Push,
}

/// One mirror operation handed to the tool.
#[derive(Debug, Clone)]
pub struct MirrorRequest {
    pub credentials: FtpCredentials,
    pub remote_path: String,
    pub local_path: PathBuf,
    pub direction: MirrorDirection,
}

#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    #[error("failed to spawn transfer tool: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("transfer tool exited with status {status}: {stderr}")]
    Failed { status: i32, stderr: String },

    #[error("transfer did not finish within {secs}s")]
    TimedOut { secs: u64 },
}

/// Fatal pipeline failures. Pull-stage problems never surface here; they
/// degrade to a clean start instead.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("push to target server failed: {0}")]
    TargetPush(#[source] MirrorError),
}

/// What the pipeline ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    /// No source credentials, nothing to migrate.
    Skipped,
    /// Pull from the source failed; the new server starts with no data.
    CleanStart,
    /// World data mirrored across.
    Mirrored,
}

/// Executes one mirror operation. Implementations own their timeout.
#[async_trait]
pub trait MirrorTool: Send + Sync {
    async fn mirror(&self, request: &MirrorRequest) -> Result<(), MirrorError>;
}

/// The migration seam the rotation controller consumes.
#[async_trait]
pub trait WorldMigrator: Send + Sync {
    async fn migrate(
        &self,
        source: Option<&FtpCredentials>,
        target: &FtpCredentials,
    ) -> Result<TransferOutcome, TransferError>;
}
