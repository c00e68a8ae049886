use crate::Slot;

/// Host/user/secret triple granting FTP access to one server's data
/// directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtpCredentials {
    pub host: String,
    pub user: String,
    pub password: String,
}

impl FtpCredentials {
    /// Assemble credentials from what a slot has on file, if it has a host.
    /// Returns `None` for dormant slots so callers fall through to the
    /// no-source migration path.
    pub fn from_slot(slot: &Slot, password: &str) -> Option<Self> {
        let host = slot.ftp_host.clone().filter(|h| !h.is_empty())?;
        Some(Self {
            host,
            user: slot.ftp_user.clone().unwrap_or_default(),
            password: password.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn slot(host: Option<&str>, user: Option<&str>) -> Slot {
        Slot {
            email: "a@example.com".to_string(),
            password: "pw".to_string(),
            cookies: HashMap::new(),
            ftp_host: host.map(str::to_string),
            ftp_user: user.map(str::to_string),
            server_id: None,
        }
    }

    #[test]
    fn dormant_slot_yields_none() {
        assert_eq!(FtpCredentials::from_slot(&slot(None, None), "s"), None);
        assert_eq!(FtpCredentials::from_slot(&slot(Some(""), None), "s"), None);
    }

    #[test]
    fn provisioned_slot_yields_credentials() {
        let creds =
            FtpCredentials::from_slot(&slot(Some("ftp.boxtoplay.com"), Some("user_1")), "secret")
                .unwrap();
        assert_eq!(creds.host, "ftp.boxtoplay.com");
        assert_eq!(creds.user, "user_1");
        assert_eq!(creds.password, "secret");
    }
}
