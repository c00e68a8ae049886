use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use boxrotate_config::{WorkerConfig, DEFAULT_FTP_PASSWORD};
use boxrotate_session::{ProviderClient, PurchaseOutcome, Session};
use boxrotate_store::{StateStore, StateVersion};
use boxrotate_transfer::{TransferOutcome, WorldMigrator};
use boxrotate_types::{FtpCredentials, ProvisionedSlot, RotationState, Slot};

use crate::error::RotationError;
use crate::validator::{self, ValidationFailed, ValidationIssue};

/// Stage tracking for logs and the end-of-run summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationStep {
    Load,
    Decommission,
    Provision,
    Validate,
    Transfer,
    Start,
    Commit,
}

/// Tunables for one rotation run.
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    /// DNS label assigned to the new server.
    pub dns_label: String,

    /// Operator override for the shared FTP secret.
    pub ftp_password_override: Option<String>,

    /// How many times to poll for the freshly bought server.
    pub poll_attempts: u32,

    /// Fixed delay between polls.
    pub poll_delay: Duration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            dns_label: boxrotate_config::DEFAULT_DNS_LABEL.to_string(),
            ftp_password_override: None,
            poll_attempts: 10,
            poll_delay: Duration::from_secs(3),
        }
    }
}

impl ControllerSettings {
    pub fn from_config(config: &WorkerConfig) -> Self {
        Self {
            dns_label: config.dns_label.clone(),
            ftp_password_override: config.ftp_password.clone(),
            ..Self::default()
        }
    }
}

/// End-of-run summary for a successful rotation.
#[derive(Debug, Clone)]
pub struct RotationReport {
    pub previous_active_index: usize,
    pub new_active_index: usize,
    pub server_id: String,
    pub transfer: TransferOutcome,
    /// Whether the final start succeeded. A missed start is
    /// operator-recoverable and does not block the commit.
    pub started: bool,
    pub steps_completed: Vec<RotationStep>,
}

/// Immutable view of the loaded document, captured once at Load. Steps pass
/// values forward instead of mutating shared state, and the committed
/// document is derived from this snapshot in one place.
struct RotationSnapshot {
    state: RotationState,
    version: StateVersion,
    outgoing_index: usize,
    incoming_index: usize,
}

impl RotationSnapshot {
    fn capture(state: RotationState, version: StateVersion) -> Result<Self, ValidationFailed> {
        let mut issues = Vec::new();
        if state.accounts.len() != 2 {
            issues.push(ValidationIssue::WrongSlotCount(state.accounts.len()));
        }
        if state.active_account_index > 1 {
            issues.push(ValidationIssue::ActiveIndexOutOfRange(
                state.active_account_index,
            ));
        }
        if !issues.is_empty() {
            return Err(ValidationFailed { issues });
        }

        let outgoing_index = state.active_account_index;
        let incoming_index = state.standby_index();
        Ok(Self {
            state,
            version,
            outgoing_index,
            incoming_index,
        })
    }

    fn outgoing(&self) -> &Slot {
        &self.state.accounts[self.outgoing_index]
    }

    fn incoming(&self) -> &Slot {
        &self.state.accounts[self.incoming_index]
    }

    /// Derive the document to persist: active index flipped, redundant
    /// current-server id set, and the incoming slot's four harvested fields
    /// overwritten as a unit. The outgoing slot keeps its (now stale)
    /// record for audit until its own next provisioning overwrites it.
    fn committed(&self, harvest: &ProvisionedSlot) -> RotationState {
        let mut state = self.state.clone();
        state.active_account_index = self.incoming_index;
        state.current_server_id = Some(harvest.server_id.clone());

        let slot = &mut state.accounts[self.incoming_index];
        slot.cookies = harvest.cookies.clone();
        slot.ftp_host = Some(harvest.ftp_host.clone());
        slot.ftp_user = Some(harvest.ftp_user.clone());
        slot.server_id = Some(harvest.server_id.clone());

        state
    }
}

/// The rotation state machine. Owns the only write path to the state store
/// and sequences decommission, provisioning, transfer, start and commit.
pub struct RotationController {
    store: Arc<dyn StateStore>,
    provider: Arc<dyn ProviderClient>,
    migrator: Arc<dyn WorldMigrator>,
    settings: ControllerSettings,
}

impl RotationController {
    pub fn new(
        store: Arc<dyn StateStore>,
        provider: Arc<dyn ProviderClient>,
        migrator: Arc<dyn WorldMigrator>,
        settings: ControllerSettings,
    ) -> Self {
        Self {
            store,
            provider,
            migrator,
            settings,
        }
    }

    /// Execute one full rotation. Strictly sequential; every terminal
    /// outcome is either a committed state or a [`RotationError`] with
    /// nothing persisted.
    pub async fn run(&self) -> Result<RotationReport, RotationError> {
        let mut steps = Vec::new();

        // 1. Load
        info!(step = ?RotationStep::Load, "Fetching rotation state");
        let (state, version) = self.store.load().await?;
        let snapshot = RotationSnapshot::capture(state, version)?;
        let ftp_password = self.resolve_ftp_password(&snapshot.state);
        info!(
            outgoing = %snapshot.outgoing().email,
            incoming = %snapshot.incoming().email,
            "Rotating"
        );
        steps.push(RotationStep::Load);

        // 2. Decommission (never fatal)
        let source = if snapshot.outgoing().server_id.is_none() {
            info!(step = ?RotationStep::Decommission, "Outgoing slot is dormant, nothing to tear down");
            None
        } else {
            info!(step = ?RotationStep::Decommission, email = %snapshot.outgoing().email, "Decommissioning outgoing server");
            self.decommission(snapshot.outgoing(), &ftp_password).await
        };
        steps.push(RotationStep::Decommission);

        // 3. Provision
        info!(step = ?RotationStep::Provision, email = %snapshot.incoming().email, "Provisioning incoming server");
        let harvest = self.provision(snapshot.incoming(), &ftp_password).await?;
        steps.push(RotationStep::Provision);

        // 4. Validate the harvest before trusting the new server with
        // anything.
        info!(step = ?RotationStep::Validate, server_id = %harvest.server_id, "Validating harvested data");
        validator::validate_harvest(&harvest)?;
        steps.push(RotationStep::Validate);

        // 5. Transfer
        info!(step = ?RotationStep::Transfer, "Migrating world data");
        let target_creds = FtpCredentials {
            host: harvest.ftp_host.clone(),
            user: harvest.ftp_user.clone(),
            password: ftp_password.clone(),
        };
        let transfer = self.migrator.migrate(source.as_ref(), &target_creds).await?;
        steps.push(RotationStep::Transfer);

        // 6. Start (never blocks the commit)
        info!(step = ?RotationStep::Start, server_id = %harvest.server_id, "Starting new server");
        let started = self.start(snapshot.incoming(), &harvest).await;
        steps.push(RotationStep::Start);

        // 7. Commit
        info!(step = ?RotationStep::Commit, "Persisting rotation state");
        let new_state = snapshot.committed(&harvest);
        validator::validate_document(&new_state, snapshot.incoming_index)?;
        self.store.save(&new_state, &snapshot.version).await?;
        steps.push(RotationStep::Commit);

        let report = RotationReport {
            previous_active_index: snapshot.outgoing_index,
            new_active_index: snapshot.incoming_index,
            server_id: harvest.server_id.clone(),
            transfer,
            started,
            steps_completed: steps,
        };
        info!(
            new_active_index = report.new_active_index,
            server_id = %report.server_id,
            started = report.started,
            "Rotation committed"
        );
        Ok(report)
    }

    fn resolve_ftp_password(&self, state: &RotationState) -> String {
        self.settings
            .ftp_password_override
            .clone()
            .filter(|p| !p.is_empty())
            .or_else(|| state.ftp_password.clone().filter(|p| !p.is_empty()))
            .unwrap_or_else(|| DEFAULT_FTP_PASSWORD.to_string())
    }

    /// Tear down the outgoing server: detach its DNS, stop it, and capture
    /// whatever FTP credentials the slot has on file as the migration
    /// source. A slot we cannot authenticate against yields no source; a
    /// missed teardown costs money, not correctness, so nothing here aborts
    /// the run.
    async fn decommission(&self, slot: &Slot, ftp_password: &str) -> Option<FtpCredentials> {
        let session = match self
            .provider
            .login(&slot.email, &slot.password, slot.session_cookie())
            .await
        {
            Ok(session) => session,
            Err(e) => {
                warn!(email = %slot.email, error = %e, "Outgoing account authentication failed, skipping decommission");
                return None;
            }
        };

        match self.provider.current_server_id(&session).await {
            Ok(Some(server_id)) => {
                // Detach the public address first so nobody reconnects to a
                // server that is about to stop.
                if let Err(e) = self.provider.set_server_dns(&session, &server_id, "").await {
                    warn!(%server_id, error = %e, "Could not clear server DNS");
                }
                if let Err(e) = self.provider.stop_server(&session, &server_id).await {
                    warn!(%server_id, error = %e, "Could not stop outgoing server");
                }
            }
            Ok(None) => {
                warn!(email = %slot.email, "No server visible on outgoing account");
            }
            Err(e) => {
                warn!(email = %slot.email, error = %e, "Could not look up outgoing server");
            }
        }

        // Captured from what is on file, independent of whether the
        // teardown above succeeded.
        let source = FtpCredentials::from_slot(slot, ftp_password);

        if let Err(e) = self.provider.logout(session).await {
            warn!(email = %slot.email, error = %e, "Outgoing logout failed");
        }
        source
    }

    async fn provision(
        &self,
        slot: &Slot,
        ftp_password: &str,
    ) -> Result<ProvisionedSlot, RotationError> {
        let session = self
            .provider
            .login(&slot.email, &slot.password, slot.session_cookie())
            .await
            .map_err(RotationError::TargetAuth)?;

        let result = self.provision_steps(&session, ftp_password).await;

        // Harvest the session token set before ending the session, and end
        // it on every path.
        let cookies = session.cookies().clone();
        if let Err(e) = self.provider.logout(session).await {
            warn!(email = %slot.email, error = %e, "Incoming logout failed");
        }

        let (server_id, ftp_host, ftp_user) = result?;
        Ok(ProvisionedSlot {
            server_id,
            ftp_host,
            ftp_user,
            cookies,
        })
    }

    async fn provision_steps(
        &self,
        session: &Session,
        ftp_password: &str,
    ) -> Result<(String, String, String), RotationError> {
        match self
            .provider
            .buy_free_server(session)
            .await
            .map_err(RotationError::Provision)?
        {
            PurchaseOutcome::Purchased => {}
            PurchaseOutcome::Refused { reason } => {
                // Leave the provider clean: a half-committed reservation
                // would poison the next attempt.
                if let Err(e) = self.provider.empty_cart(session).await {
                    warn!(error = %e, "Could not empty cart after refused purchase");
                }
                return Err(RotationError::ProvisionRefused { reason });
            }
        }

        let server_id = self.poll_for_server(session).await?;

        self.provider
            .set_server_dns(session, &server_id, &self.settings.dns_label)
            .await
            .map_err(RotationError::Provision)?;

        let ftp = self
            .provider
            .create_ftp_account(session, &server_id, ftp_password)
            .await
            .map_err(RotationError::Provision)?;

        self.provider
            .install_modpack(session, &server_id)
            .await
            .map_err(RotationError::Provision)?;

        Ok((server_id, ftp.host, ftp.user))
    }

    /// Bounded poll for the freshly bought server: fixed attempt count,
    /// fixed delay, no backoff.
    async fn poll_for_server(&self, session: &Session) -> Result<String, RotationError> {
        for attempt in 1..=self.settings.poll_attempts {
            match self.provider.current_server_id(session).await {
                Ok(Some(server_id)) => {
                    info!(%server_id, attempt, "New server visible");
                    return Ok(server_id);
                }
                Ok(None) => {
                    info!(attempt, max = self.settings.poll_attempts, "Waiting for new server");
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Server lookup failed");
                }
            }
            if attempt < self.settings.poll_attempts {
                tokio::time::sleep(self.settings.poll_delay).await;
            }
        }
        Err(RotationError::ServerNotFound {
            attempts: self.settings.poll_attempts,
        })
    }

    /// Start the new server with the freshly harvested session. The server
    /// exists and is configured either way, so failure is reported, not
    /// fatal.
    async fn start(&self, slot: &Slot, harvest: &ProvisionedSlot) -> bool {
        let cookie = harvest
            .cookies
            .get(boxrotate_types::SESSION_COOKIE)
            .map(String::as_str)
            .filter(|v| !v.is_empty());

        let session = match self
            .provider
            .login(&slot.email, &slot.password, cookie)
            .await
        {
            Ok(session) => session,
            Err(e) => {
                warn!(email = %slot.email, error = %e, "Could not re-authenticate to start the server");
                return false;
            }
        };

        let started = match self
            .provider
            .start_server(&session, &harvest.server_id)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(server_id = %harvest.server_id, error = %e, "Server start failed; start it manually");
                false
            }
        };

        if let Err(e) = self.provider.logout(session).await {
            warn!(email = %slot.email, error = %e, "Logout after start failed");
        }
        started
    }
}
