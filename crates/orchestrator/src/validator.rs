//! Validation gate.
//!
//! Pure predicates over already-harvested data; nothing here talks to the
//! provider. Every failing check becomes its own [`ValidationIssue`], and
//! the gate collects all of them instead of stopping at the first, so a
//! rejected run reports everything wrong at once.

use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

use boxrotate_types::{ProvisionedSlot, RotationState, PROVIDER_DOMAIN_MARKER, SESSION_COOKIE};

/// Minimum length of a plausible FTP account name.
const MIN_FTP_USER_LEN: usize = 3;

/// One failed predicate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationIssue {
    #[error("server id is empty")]
    EmptyServerId,

    #[error("server id `{0}` is not numeric")]
    NonNumericServerId(String),

    #[error("ftp host is empty")]
    EmptyFtpHost,

    #[error("ftp host `{0}` looks invalid")]
    SuspectFtpHost(String),

    #[error("ftp user is empty")]
    EmptyFtpUser,

    #[error("ftp user `{0}` is too short")]
    FtpUserTooShort(String),

    #[error("session cookie `{SESSION_COOKIE}` missing or empty")]
    MissingSessionCookie,

    #[error("document has {0} accounts, expected exactly 2")]
    WrongSlotCount(usize),

    #[error("active account index {0} is out of range")]
    ActiveIndexOutOfRange(usize),

    #[error("current server id `{0}` is not numeric")]
    InvalidCurrentServerId(String),

    #[error("current server id `{current}` does not match account {index} server id `{slot}`")]
    ServerIdMismatch {
        current: String,
        slot: String,
        index: usize,
    },
}

/// Aggregated gate failure. Always carries at least one issue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ValidationFailed {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation failed ({} issues):", self.issues.len())?;
        for issue in &self.issues {
            write!(f, " [{}]", issue)?;
        }
        Ok(())
    }
}

fn check_server_id(id: &str, issues: &mut Vec<ValidationIssue>) {
    if id.is_empty() {
        issues.push(ValidationIssue::EmptyServerId);
    } else if !id.bytes().all(|b| b.is_ascii_digit()) {
        issues.push(ValidationIssue::NonNumericServerId(id.to_string()));
    }
}

fn check_ftp_host(host: &str, issues: &mut Vec<ValidationIssue>) {
    if host.is_empty() {
        issues.push(ValidationIssue::EmptyFtpHost);
    } else if !host.to_lowercase().contains(PROVIDER_DOMAIN_MARKER) && !host.contains('.') {
        issues.push(ValidationIssue::SuspectFtpHost(host.to_string()));
    }
}

fn check_ftp_user(user: &str, issues: &mut Vec<ValidationIssue>) {
    if user.is_empty() {
        issues.push(ValidationIssue::EmptyFtpUser);
    } else if user.len() < MIN_FTP_USER_LEN {
        issues.push(ValidationIssue::FtpUserTooShort(user.to_string()));
    }
}

fn check_cookies(cookies: &HashMap<String, String>, issues: &mut Vec<ValidationIssue>) {
    let present = cookies
        .get(SESSION_COOKIE)
        .map(|v| !v.is_empty())
        .unwrap_or(false);
    if !present {
        issues.push(ValidationIssue::MissingSessionCookie);
    }
}

/// Gate a freshly harvested provisioning result before anything is migrated
/// to it or persisted about it.
pub fn validate_harvest(harvest: &ProvisionedSlot) -> Result<(), ValidationFailed> {
    let mut issues = Vec::new();
    check_server_id(&harvest.server_id, &mut issues);
    check_ftp_host(&harvest.ftp_host, &mut issues);
    check_ftp_user(&harvest.ftp_user, &mut issues);
    check_cookies(&harvest.cookies, &mut issues);

    if issues.is_empty() {
        Ok(())
    } else {
        Err(ValidationFailed { issues })
    }
}

/// Gate a whole rotation document against the target slot before it is
/// written back to the store.
pub fn validate_document(
    state: &RotationState,
    target_index: usize,
) -> Result<(), ValidationFailed> {
    let mut issues = Vec::new();

    if state.accounts.len() != 2 {
        issues.push(ValidationIssue::WrongSlotCount(state.accounts.len()));
    }
    if state.active_account_index > 1 {
        issues.push(ValidationIssue::ActiveIndexOutOfRange(
            state.active_account_index,
        ));
    }

    if let Some(current) = state.current_server_id.as_deref() {
        if current.is_empty() || !current.bytes().all(|b| b.is_ascii_digit()) {
            issues.push(ValidationIssue::InvalidCurrentServerId(current.to_string()));
        }
    }

    if let Some(target) = state.accounts.get(target_index) {
        check_server_id(target.server_id.as_deref().unwrap_or(""), &mut issues);
        check_ftp_host(target.ftp_host.as_deref().unwrap_or(""), &mut issues);
        check_ftp_user(target.ftp_user.as_deref().unwrap_or(""), &mut issues);
        check_cookies(&target.cookies, &mut issues);

        if let (Some(current), Some(slot_id)) = (
            state.current_server_id.as_deref(),
            target.server_id.as_deref(),
        ) {
            if !current.is_empty() && !slot_id.is_empty() && current != slot_id {
                issues.push(ValidationIssue::ServerIdMismatch {
                    current: current.to_string(),
                    slot: slot_id.to_string(),
                    index: target_index,
                });
            }
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(ValidationFailed { issues })
    }
}
