use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::{MirrorDirection, MirrorError, MirrorRequest, MirrorTool};

const DEFAULT_PARALLEL: u32 = 5;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Drives the external `lftp` binary for recursive FTP mirroring.
pub struct LftpTool {
    parallel: u32,
    timeout: Duration,
}

impl LftpTool {
    pub fn new() -> Self {
        Self {
            parallel: DEFAULT_PARALLEL,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_limits(parallel: u32, timeout: Duration) -> Self {
        Self { parallel, timeout }
    }

    fn script(&self, request: &MirrorRequest) -> String {
        let local = request.local_path.display();
        match request.direction {
            MirrorDirection::Pull => format!(
                "mirror --verbose --parallel={} {} {}; quit",
                self.parallel, request.remote_path, local
            ),
            MirrorDirection::Push => format!(
                "mirror --reverse --verbose --parallel={} {} {}; quit",
                self.parallel, local, request.remote_path
            ),
        }
    }
}

impl Default for LftpTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MirrorTool for LftpTool {
    async fn mirror(&self, request: &MirrorRequest) -> Result<(), MirrorError> {
        let creds = &request.credentials;
        let script = self.script(request);
        debug!(host = %creds.host, direction = ?request.direction, %script, "Running lftp mirror");

        let mut command = Command::new("lftp");
        command
            .arg("-u")
            .arg(format!("{},{}", creds.user, creds.password))
            .arg(format!("ftp://{}", creds.host))
            .arg("-e")
            .arg(&script)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = timeout(self.timeout, command.output())
            .await
            .map_err(|_| MirrorError::TimedOut {
                secs: self.timeout.as_secs(),
            })??;

        if !output.status.success() {
            return Err(MirrorError::Failed {
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        info!(host = %creds.host, direction = ?request.direction, "Mirror completed");
        Ok(())
    }
}
