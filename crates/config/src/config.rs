use serde::Deserialize;

use crate::{ConfigError, Result};

/// DNS label assigned to the freshly provisioned server when none is
/// configured.
pub const DEFAULT_DNS_LABEL: &str = "orny";

/// Last-resort FTP secret when neither the environment nor the state
/// document carries one.
pub const DEFAULT_FTP_PASSWORD: &str = "defaultpass";

/// Worker configuration, loaded from `BOXROTATE_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    /// Id of the remote document holding the rotation state.
    pub gist_id: String,

    /// API token authorizing reads and writes of the state document.
    pub gh_token: String,

    /// DNS label given to the new server, e.g. "orny" for
    /// orny.boxtoplay.com.
    #[serde(default = "default_dns_label")]
    pub dns_label: String,

    /// Operator override for the shared FTP secret. Falls back to the value
    /// embedded in the state document, then to [`DEFAULT_FTP_PASSWORD`].
    #[serde(default)]
    pub ftp_password: Option<String>,
}

fn default_dns_label() -> String {
    DEFAULT_DNS_LABEL.to_string()
}

impl WorkerConfig {
    /// Reject configurations that cannot possibly produce a working run.
    pub fn validate(&self) -> Result<()> {
        if self.gist_id.trim().is_empty() {
            return Err(ConfigError::Missing("gist_id"));
        }
        if self.gh_token.trim().is_empty() {
            return Err(ConfigError::Missing("gh_token"));
        }
        Ok(())
    }

    /// Resolve the FTP secret, preferring the operator-supplied value over
    /// the document-embedded one.
    pub fn resolve_ftp_password(&self, document_password: Option<&str>) -> String {
        self.ftp_password
            .clone()
            .filter(|p| !p.is_empty())
            .or_else(|| {
                document_password
                    .filter(|p| !p.is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| DEFAULT_FTP_PASSWORD.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(ftp_password: Option<&str>) -> WorkerConfig {
        WorkerConfig {
            gist_id: "abc123".to_string(),
            gh_token: "token".to_string(),
            dns_label: DEFAULT_DNS_LABEL.to_string(),
            ftp_password: ftp_password.map(str::to_string),
        }
    }

    #[test]
    fn validate_rejects_blank_required_fields() {
        let mut cfg = config(None);
        cfg.gist_id = "  ".to_string();
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Missing("gist_id"))
        ));

        let mut cfg = config(None);
        cfg.gh_token = String::new();
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Missing("gh_token"))
        ));

        assert!(config(None).validate().is_ok());
    }

    #[test]
    fn ftp_password_precedence() {
        // Environment beats document.
        assert_eq!(
            config(Some("from-env")).resolve_ftp_password(Some("from-doc")),
            "from-env"
        );
        // Document beats the hardcoded default.
        assert_eq!(
            config(None).resolve_ftp_password(Some("from-doc")),
            "from-doc"
        );
        // Blank values are treated as absent.
        assert_eq!(
            config(Some("")).resolve_ftp_password(Some("")),
            DEFAULT_FTP_PASSWORD
        );
    }
}
