use async_trait::async_trait;
use boxrotate_types::{FtpCredentials, WORLD_DIR};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::{
    MirrorDirection, MirrorRequest, MirrorTool, TransferError, TransferOutcome, WorldMigrator,
};

/// Fixed scratch location. Not per-run-unique: the worker assumes at most
/// one run at a time, and a stable path means an interrupted run leaves
/// nothing behind that the next run's cleanup cannot claim.
pub const DEFAULT_SCRATCH_DIR: &str = "/tmp/boxrotate_transfer";

/// Pull-then-push migration of the world directory through local scratch.
pub struct TransferPipeline<T: MirrorTool> {
    tool: T,
    scratch_dir: PathBuf,
    remote_dir: String,
}

impl<T: MirrorTool> TransferPipeline<T> {
    pub fn new(tool: T) -> Self {
        Self::with_scratch_dir(tool, DEFAULT_SCRATCH_DIR)
    }

    pub fn with_scratch_dir(tool: T, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            tool,
            scratch_dir: scratch_dir.into(),
            remote_dir: WORLD_DIR.to_string(),
        }
    }

    fn request(
        &self,
        credentials: &FtpCredentials,
        local: &Path,
        direction: MirrorDirection,
    ) -> MirrorRequest {
        MirrorRequest {
            credentials: credentials.clone(),
            remote_path: self.remote_dir.clone(),
            local_path: local.to_path_buf(),
            direction,
        }
    }
}

#[async_trait]
impl<T: MirrorTool> WorldMigrator for TransferPipeline<T> {
    async fn migrate(
        &self,
        source: Option<&FtpCredentials>,
        target: &FtpCredentials,
    ) -> Result<TransferOutcome, TransferError> {
        let Some(source) = source.filter(|s| !s.host.is_empty()) else {
            info!("No source server, skipping world transfer");
            return Ok(TransferOutcome::Skipped);
        };

        // Dropped on every exit path below, removing the scratch tree.
        let scratch = ScratchDir::create(&self.scratch_dir);
        let world_local = scratch.path().join("world");

        info!(source_host = %source.host, "Pulling world data");
        let pull = self
            .tool
            .mirror(&self.request(source, &world_local, MirrorDirection::Pull))
            .await;
        if let Err(e) = pull {
            // Stale source credentials are expected after a missed
            // decommission; the new server simply starts clean.
            warn!(error = %e, "World pull failed, new server starts clean");
            return Ok(TransferOutcome::CleanStart);
        }

        info!(target_host = %target.host, "Pushing world data");
        self.tool
            .mirror(&self.request(target, &world_local, MirrorDirection::Push))
            .await
            .map_err(TransferError::TargetPush)?;

        info!("World transfer completed");
        Ok(TransferOutcome::Mirrored)
    }
}

/// Scratch directory with guaranteed removal.
struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    fn create(path: &Path) -> Self {
        if let Err(e) = std::fs::create_dir_all(path) {
            warn!(path = %path.display(), error = %e, "Could not create scratch directory");
        }
        Self {
            path: path.to_path_buf(),
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if self.path.exists() {
            if let Err(e) = std::fs::remove_dir_all(&self.path) {
                warn!(path = %self.path.display(), error = %e, "Scratch cleanup failed");
            }
        }
    }
}
