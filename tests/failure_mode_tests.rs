//! Failure-injection flows through the real transfer pipeline: the mirror
//! tool is scripted, everything above it is the production code path. The
//! invariant under test is that the state document only ever changes on a
//! fully successful run.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use boxrotate_orchestrator::{ControllerSettings, RotationController};
use boxrotate_session::{
    FtpAccount, ProviderClient, PurchaseOutcome, Session, SessionError,
};
use boxrotate_store::{StateStore, StateVersion, StoreError};
use boxrotate_transfer::{
    MirrorDirection, MirrorError, MirrorRequest, MirrorTool, TransferOutcome, TransferPipeline,
};
use boxrotate_types::{RotationState, Slot, SESSION_COOKIE};

struct MemoryStore {
    document: Mutex<RotationState>,
    saves: Mutex<u64>,
}

impl MemoryStore {
    fn new(document: RotationState) -> Self {
        Self {
            document: Mutex::new(document),
            saves: Mutex::new(0),
        }
    }

    fn current(&self) -> RotationState {
        self.document.lock().unwrap().clone()
    }

    fn save_count(&self) -> u64 {
        *self.saves.lock().unwrap()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn load(&self) -> Result<(RotationState, StateVersion), StoreError> {
        Ok((self.current(), StateVersion("v1".to_string())))
    }

    async fn save(
        &self,
        state: &RotationState,
        _expected: &StateVersion,
    ) -> Result<(), StoreError> {
        *self.document.lock().unwrap() = state.clone();
        *self.saves.lock().unwrap() += 1;
        Ok(())
    }
}

/// Happy-path provider with an optional purchase refusal.
struct ScriptedProvider {
    refuse_purchase: Option<String>,
    fresh_server_id: String,
}

impl ScriptedProvider {
    fn new(fresh_server_id: &str) -> Self {
        Self {
            refuse_purchase: None,
            fresh_server_id: fresh_server_id.to_string(),
        }
    }

    fn refusing(reason: &str) -> Self {
        Self {
            refuse_purchase: Some(reason.to_string()),
            fresh_server_id: String::new(),
        }
    }
}

#[async_trait]
impl ProviderClient for ScriptedProvider {
    async fn login(
        &self,
        email: &str,
        _password: &str,
        _session_cookie: Option<&str>,
    ) -> Result<Session, SessionError> {
        let mut cookies = HashMap::new();
        cookies.insert(SESSION_COOKIE.to_string(), format!("sess-{email}"));
        Ok(Session::from_cookies(cookies))
    }

    async fn current_server_id(
        &self,
        _session: &Session,
    ) -> Result<Option<String>, SessionError> {
        Ok(Some(self.fresh_server_id.clone()).filter(|id| !id.is_empty()))
    }

    async fn set_server_dns(
        &self,
        _session: &Session,
        _server_id: &str,
        _label: &str,
    ) -> Result<(), SessionError> {
        Ok(())
    }

    async fn stop_server(&self, _session: &Session, _server_id: &str) -> Result<(), SessionError> {
        Ok(())
    }

    async fn start_server(&self, _session: &Session, _server_id: &str) -> Result<(), SessionError> {
        Ok(())
    }

    async fn buy_free_server(&self, _session: &Session) -> Result<PurchaseOutcome, SessionError> {
        match &self.refuse_purchase {
            Some(reason) => Ok(PurchaseOutcome::Refused {
                reason: reason.clone(),
            }),
            None => Ok(PurchaseOutcome::Purchased),
        }
    }

    async fn empty_cart(&self, _session: &Session) -> Result<(), SessionError> {
        Ok(())
    }

    async fn create_ftp_account(
        &self,
        _session: &Session,
        server_id: &str,
        _password: &str,
    ) -> Result<FtpAccount, SessionError> {
        Ok(FtpAccount {
            host: format!("ftp{server_id}.boxtoplay.com"),
            user: format!("user_{server_id}"),
        })
    }

    async fn install_modpack(
        &self,
        _session: &Session,
        _server_id: &str,
    ) -> Result<(), SessionError> {
        Ok(())
    }

    async fn logout(&self, _session: Session) -> Result<(), SessionError> {
        Ok(())
    }
}

struct ScriptedMirror {
    calls: Mutex<Vec<MirrorDirection>>,
    fail_pull: bool,
    fail_push: bool,
}

impl ScriptedMirror {
    fn new(fail_pull: bool, fail_push: bool) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_pull,
            fail_push,
        }
    }
}

#[async_trait]
impl MirrorTool for ScriptedMirror {
    async fn mirror(&self, request: &MirrorRequest) -> Result<(), MirrorError> {
        self.calls.lock().unwrap().push(request.direction);
        let fail = match request.direction {
            MirrorDirection::Pull => self.fail_pull,
            MirrorDirection::Push => self.fail_push,
        };
        if fail {
            Err(MirrorError::Failed {
                status: 1,
                stderr: "mirror: Login failed".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

fn steady_state() -> RotationState {
    let mut outgoing_cookies = HashMap::new();
    outgoing_cookies.insert(SESSION_COOKIE.to_string(), "sess-one@example.com".to_string());
    RotationState {
        active_account_index: 0,
        current_server_id: Some("111222".to_string()),
        ftp_password: Some("sharedpass".to_string()),
        accounts: vec![
            Slot {
                email: "one@example.com".to_string(),
                password: "pw1".to_string(),
                cookies: outgoing_cookies,
                ftp_host: Some("ftp1.boxtoplay.com".to_string()),
                ftp_user: Some("user_111".to_string()),
                server_id: Some("111222".to_string()),
            },
            Slot {
                email: "two@example.com".to_string(),
                password: "pw2".to_string(),
                cookies: HashMap::new(),
                ftp_host: None,
                ftp_user: None,
                server_id: None,
            },
        ],
    }
}

fn settings() -> ControllerSettings {
    ControllerSettings {
        poll_delay: Duration::from_millis(1),
        ..ControllerSettings::default()
    }
}

fn scratch_dir(tag: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("boxrotate-itest-{tag}-{}", std::process::id()))
}

#[tokio::test]
async fn pull_failure_commits_a_clean_start() {
    let store = Arc::new(MemoryStore::new(steady_state()));
    let pipeline =
        TransferPipeline::with_scratch_dir(ScriptedMirror::new(true, false), scratch_dir("pull"));

    let controller = RotationController::new(
        store.clone(),
        Arc::new(ScriptedProvider::new("445566")),
        Arc::new(pipeline),
        settings(),
    );

    let report = controller.run().await.unwrap();
    assert_eq!(report.transfer, TransferOutcome::CleanStart);

    // The rotation still commits: the new server simply has no world data.
    assert_eq!(store.save_count(), 1);
    assert_eq!(store.current().active_account_index, 1);
}

#[tokio::test]
async fn push_failure_leaves_document_untouched() {
    let initial = steady_state();
    let store = Arc::new(MemoryStore::new(initial.clone()));
    let mirror = Arc::new(ScriptedMirror::new(false, true));
    let pipeline = TransferPipeline::with_scratch_dir(
        SharedMirror(mirror.clone()),
        scratch_dir("push"),
    );

    let controller = RotationController::new(
        store.clone(),
        Arc::new(ScriptedProvider::new("445566")),
        Arc::new(pipeline),
        settings(),
    );

    let err = controller.run().await.unwrap_err();
    assert!(err.to_string().contains("push to target server failed"));

    // The pull happened, the push was attempted once, nothing was saved.
    assert_eq!(
        *mirror.calls.lock().unwrap(),
        vec![MirrorDirection::Pull, MirrorDirection::Push]
    );
    assert_eq!(store.save_count(), 0);
    assert_eq!(store.current(), initial);
}

#[tokio::test]
async fn refused_purchase_leaves_document_untouched() {
    let initial = steady_state();
    let store = Arc::new(MemoryStore::new(initial.clone()));
    let pipeline = TransferPipeline::with_scratch_dir(
        ScriptedMirror::new(false, false),
        scratch_dir("refused"),
    );

    let controller = RotationController::new(
        store.clone(),
        Arc::new(ScriptedProvider::refusing("price 4,99 €")),
        Arc::new(pipeline),
        settings(),
    );

    let err = controller.run().await.unwrap_err();
    assert!(err.to_string().contains("refused"));
    assert_eq!(store.save_count(), 0);
    assert_eq!(store.current(), initial);
}

/// Lets a test keep a handle on the mirror while the pipeline owns it.
struct SharedMirror(Arc<ScriptedMirror>);

#[async_trait]
impl MirrorTool for SharedMirror {
    async fn mirror(&self, request: &MirrorRequest) -> Result<(), MirrorError> {
        self.0.mirror(request).await
    }
}
