use async_trait::async_trait;
use boxrotate_types::RotationState;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

use crate::{StateStore, StateVersion, StoreError};

/// File inside the gist that holds the rotation document.
pub const STATE_FILE: &str = "boxtoplay.json";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// GitHub-Gist-backed state store.
pub struct GistStore {
    base_url: String,
    gist_id: String,
    token: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct GistResponse {
    updated_at: String,
    files: HashMap<String, GistFile>,
}

#[derive(Debug, Deserialize)]
struct GistFile {
    content: String,
}

#[derive(Debug, Serialize)]
struct GistPatch {
    files: HashMap<String, GistPatchFile>,
}

#[derive(Debug, Serialize)]
struct GistPatchFile {
    content: String,
}

impl GistStore {
    pub fn new(gist_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self::with_base_url("https://api.github.com", gist_id, token)
    }

    /// Point the client at a different API root. Used by tests.
    pub fn with_base_url(
        base_url: impl Into<String>,
        gist_id: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            gist_id: gist_id.into(),
            token: token.into(),
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .user_agent("boxrotate")
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    async fn fetch(&self) -> Result<GistResponse, StoreError> {
        let url = format!("{}/gists/{}", self.base_url, self.gist_id);
        debug!(%url, "Fetching state gist");

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("token {}", self.token))
            .header("Accept", "application/vnd.github.v3+json")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Status { status, body });
        }

        Ok(response.json().await?)
    }

    fn parse_state(gist: &GistResponse) -> Result<RotationState, StoreError> {
        let file = gist
            .files
            .get(STATE_FILE)
            .ok_or_else(|| StoreError::MissingDocument(STATE_FILE.to_string()))?;
        Ok(serde_json::from_str(&file.content)?)
    }

    /// Write precondition: the remote stamp must still be the one the state
    /// was loaded under.
    fn check_version(found: &str, expected: &StateVersion) -> Result<(), StoreError> {
        if found != expected.0 {
            return Err(StoreError::Conflict {
                expected: expected.0.clone(),
                found: found.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl StateStore for GistStore {
    async fn load(&self) -> Result<(RotationState, StateVersion), StoreError> {
        let gist = self.fetch().await?;
        let state = Self::parse_state(&gist)?;
        info!(
            active_account_index = state.active_account_index,
            current_server_id = ?state.current_server_id,
            "Loaded rotation state"
        );
        Ok((state, StateVersion(gist.updated_at)))
    }

    async fn save(
        &self,
        state: &RotationState,
        expected: &StateVersion,
    ) -> Result<(), StoreError> {
        // The gist API has no native write precondition, so the best
        // available check is re-reading the stamp immediately before the
        // write. A concurrent writer landing inside that window still wins,
        // but the common stale-run case is caught.
        let current = self.fetch().await?;
        Self::check_version(&current.updated_at, expected)?;

        let mut files = HashMap::new();
        files.insert(
            STATE_FILE.to_string(),
            GistPatchFile {
                content: serde_json::to_string_pretty(state)?,
            },
        );

        let url = format!("{}/gists/{}", self.base_url, self.gist_id);
        let response = self
            .client
            .patch(&url)
            .header("Authorization", format!("token {}", self.token))
            .header("Accept", "application/vnd.github.v3+json")
            .json(&GistPatch { files })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Status { status, body });
        }

        info!(
            active_account_index = state.active_account_index,
            current_server_id = ?state.current_server_id,
            "Saved rotation state"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gist_payload(updated_at: &str, content: &str) -> GistResponse {
        serde_json::from_value(serde_json::json!({
            "updated_at": updated_at,
            "files": { STATE_FILE: { "content": content } }
        }))
        .unwrap()
    }

    #[test]
    fn parses_state_out_of_gist_payload() {
        let doc = r#"{
            "active_account_index": 1,
            "current_server_id": "9001",
            "accounts": [
                {"email": "a@x.com", "password": "p"},
                {"email": "b@x.com", "password": "q", "server_id": "9001"}
            ]
        }"#;
        let gist = gist_payload("2026-01-01T00:00:00Z", doc);
        let state = GistStore::parse_state(&gist).unwrap();
        assert_eq!(state.active_account_index, 1);
        assert_eq!(state.accounts[1].server_id.as_deref(), Some("9001"));
    }

    #[test]
    fn missing_state_file_is_reported() {
        let gist: GistResponse = serde_json::from_value(serde_json::json!({
            "updated_at": "2026-01-01T00:00:00Z",
            "files": { "other.json": { "content": "{}" } }
        }))
        .unwrap();
        assert!(matches!(
            GistStore::parse_state(&gist),
            Err(StoreError::MissingDocument(_))
        ));
    }

    #[test]
    fn moved_version_stamp_is_a_conflict() {
        let loaded = StateVersion("2026-01-01T00:00:00Z".to_string());
        assert!(GistStore::check_version("2026-01-01T00:00:00Z", &loaded).is_ok());

        let err = GistStore::check_version("2026-01-01T08:00:00Z", &loaded).unwrap_err();
        match err {
            StoreError::Conflict { expected, found } => {
                assert_eq!(expected, "2026-01-01T00:00:00Z");
                assert_eq!(found, "2026-01-01T08:00:00Z");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn malformed_document_is_a_parse_error() {
        let gist = gist_payload("2026-01-01T00:00:00Z", "not json");
        assert!(matches!(
            GistStore::parse_state(&gist),
            Err(StoreError::Parse(_))
        ));
    }
}
