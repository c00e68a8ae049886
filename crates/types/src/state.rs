use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::SESSION_COOKIE;

/// One of the two rotation participants. Order inside
/// [`RotationState::accounts`] is the slot identity: index 0 is slot 0
/// forever, regardless of which slot currently owns the live server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    /// Login email, stable across rotations.
    pub email: String,

    /// Login password, stable across rotations.
    pub password: String,

    /// Last harvested session cookies. Empty when the slot is dormant or
    /// the cookies have gone stale.
    #[serde(default)]
    pub cookies: HashMap<String, String>,

    /// FTP hostname for the slot's server. `None` while dormant.
    #[serde(default)]
    pub ftp_host: Option<String>,

    /// FTP account name for the slot's server. `None` while dormant.
    #[serde(default)]
    pub ftp_user: Option<String>,

    /// Server owned by this slot, as a decimal string. `None` while dormant.
    /// Kept as a string end to end so persistence round-trips can never
    /// reformat or truncate it.
    #[serde(default)]
    pub server_id: Option<String>,
}

impl Slot {
    /// The provider session cookie on file, if any.
    pub fn session_cookie(&self) -> Option<&str> {
        self.cookies
            .get(SESSION_COOKIE)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

/// The single persisted rotation document. Read and written whole; there is
/// no field-level update path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationState {
    /// Which slot currently owns the live server (0 or 1).
    pub active_account_index: usize,

    /// Server id of the live server, duplicated from the active slot so the
    /// two can be cross-checked before every write.
    #[serde(default)]
    pub current_server_id: Option<String>,

    /// Shared secret used when creating fresh FTP accounts. An
    /// operator-supplied value takes precedence over this one.
    #[serde(default)]
    pub ftp_password: Option<String>,

    /// The ordered slot pair. Exactly two entries in a well-formed document;
    /// enforced by the validation gate rather than the type so a malformed
    /// document is reported instead of failing deserialization.
    pub accounts: Vec<Slot>,
}

impl RotationState {
    /// Index of the slot that will be provisioned by the next rotation.
    pub fn standby_index(&self) -> usize {
        if self.active_account_index == 0 { 1 } else { 0 }
    }

    pub fn active_slot(&self) -> Option<&Slot> {
        self.accounts.get(self.active_account_index)
    }

    pub fn standby_slot(&self) -> Option<&Slot> {
        self.accounts.get(self.standby_index())
    }
}

/// Everything harvested from a freshly provisioned slot. Applied to the
/// document as a unit at commit time, never field by field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedSlot {
    pub server_id: String,
    pub ftp_host: String,
    pub ftp_user: String,
    pub cookies: HashMap<String, String>,
}
