use async_trait::async_trait;
use reqwest::header::{COOKIE, SET_COOKIE};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

use crate::{FtpAccount, ProviderClient, PurchaseOutcome, Session, SessionError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Catalogue id of the free server offering.
const FREE_OFFER_ID: u32 = 12;

/// Version id of the default modpack installed on every fresh server.
const DEFAULT_PACK_VERSION: u32 = 10517;

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0";

/// Plain-HTTP provider backend. Drives the provider's action endpoints
/// directly; no browser engine involved. The controller only sees the
/// [`ProviderClient`] trait, so this backend is swappable.
pub struct HttpProvider {
    base_url: String,
    client: reqwest::Client,
}

impl HttpProvider {
    pub fn new() -> Self {
        Self::with_base_url("https://www.boxtoplay.com")
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .user_agent(USER_AGENT)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(
        &self,
        session: &Session,
        path: &str,
        context: &'static str,
    ) -> Result<reqwest::Response, SessionError> {
        let response = self
            .client
            .get(self.url(path))
            .header(COOKIE, session.cookie_header())
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(SessionError::UnexpectedStatus {
                status: response.status().as_u16(),
                context,
            });
        }
        Ok(response)
    }

    async fn post_form(
        &self,
        session: &Session,
        path: &str,
        form: &[(&str, &str)],
        context: &'static str,
    ) -> Result<reqwest::Response, SessionError> {
        let response = self
            .client
            .post(self.url(path))
            .header(COOKIE, session.cookie_header())
            .header("X-Requested-With", "XMLHttpRequest")
            .form(form)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(SessionError::UnexpectedStatus {
                status: response.status().as_u16(),
                context,
            });
        }
        Ok(response)
    }

    /// Check that a session reaches the authenticated panel.
    async fn panel_reachable(&self, session: &Session) -> Result<bool, SessionError> {
        let response = self
            .client
            .get(self.url("/panel"))
            .header(COOKIE, session.cookie_header())
            .send()
            .await?;
        Ok(response.status().is_success() && response.url().path().contains("panel"))
    }
}

impl Default for HttpProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderClient for HttpProvider {
    async fn login(
        &self,
        email: &str,
        password: &str,
        session_cookie: Option<&str>,
    ) -> Result<Session, SessionError> {
        // Cookie fast path: reuse the stored session if the panel still
        // accepts it.
        if let Some(cookie) = session_cookie.filter(|c| !c.is_empty()) {
            let mut session = Session::default();
            session.insert(
                boxrotate_types::SESSION_COOKIE.to_string(),
                cookie.to_string(),
            );
            if self.panel_reachable(&session).await.unwrap_or(false) {
                info!(email, "Authenticated via stored session cookie");
                return Ok(session);
            }
            debug!(email, "Stored session cookie rejected, falling back to credentials");
        }

        let response = self
            .client
            .post(self.url("/fr/login"))
            .form(&[("email", email), ("password", password)])
            .send()
            .await?;

        let mut session = Session::default();
        for value in response.headers().get_all(SET_COOKIE) {
            if let Ok(raw) = value.to_str() {
                if let Some((name, val)) = parse_set_cookie(raw) {
                    session.insert(name, val);
                }
            }
        }

        if session.session_cookie().is_none() || !self.panel_reachable(&session).await? {
            return Err(SessionError::AuthRejected {
                email: email.to_string(),
            });
        }

        info!(email, "Authenticated via credentials");
        Ok(session)
    }

    async fn current_server_id(
        &self,
        session: &Session,
    ) -> Result<Option<String>, SessionError> {
        let body = self
            .get(session, "/panel", "panel fetch")
            .await?
            .text()
            .await?;
        // The panel lists servers newest-last as "#<id>" markers.
        Ok(extract_server_ids(&body).into_iter().last())
    }

    async fn set_server_dns(
        &self,
        session: &Session,
        server_id: &str,
        label: &str,
    ) -> Result<(), SessionError> {
        self.post_form(
            session,
            "/minecraft/setServerDNS",
            &[("name", ""), ("value", label), ("pk", server_id)],
            "dns update",
        )
        .await?;
        info!(server_id, label, "Server DNS updated");
        Ok(())
    }

    async fn stop_server(&self, session: &Session, server_id: &str) -> Result<(), SessionError> {
        self.get(
            session,
            &format!("/minecraft/stop/{}", server_id),
            "server stop",
        )
        .await?;
        info!(server_id, "Server stopped");
        Ok(())
    }

    async fn start_server(&self, session: &Session, server_id: &str) -> Result<(), SessionError> {
        self.get(
            session,
            &format!("/minecraft/start/{}", server_id),
            "server start",
        )
        .await?;
        info!(server_id, "Server started");
        Ok(())
    }

    async fn buy_free_server(&self, session: &Session) -> Result<PurchaseOutcome, SessionError> {
        self.get(
            session,
            &format!("/fr/cart/ajoutPanier/{}", FREE_OFFER_ID),
            "cart add",
        )
        .await?;

        let cart = self.get(session, "/fr/cart", "cart fetch").await?.text().await?;
        match extract_cart_price(&cart) {
            Some(price) if price > 0.0 => {
                return Ok(PurchaseOutcome::Refused {
                    reason: format!("offering priced at {:.2}, expected free", price),
                });
            }
            Some(_) => {}
            None => {
                return Ok(PurchaseOutcome::Refused {
                    reason: "offering not present in cart".to_string(),
                });
            }
        }

        self.post_form(session, "/fr/cart/livraison", &[], "checkout")
            .await?;
        self.post_form(session, "/fr/cart/confirm", &[("gcu", "1")], "order confirm")
            .await?;

        info!("Free server offering reserved");
        Ok(PurchaseOutcome::Purchased)
    }

    async fn empty_cart(&self, session: &Session) -> Result<(), SessionError> {
        self.get(session, "/fr/cart/vider", "cart empty").await?;
        info!("Cart emptied");
        Ok(())
    }

    async fn create_ftp_account(
        &self,
        session: &Session,
        server_id: &str,
        password: &str,
    ) -> Result<FtpAccount, SessionError> {
        let page = self
            .get(
                session,
                &format!("/minecraft/ftp/{}", server_id),
                "ftp page fetch",
            )
            .await?
            .text()
            .await?;

        let host = extract_ftp_host(&page).ok_or(SessionError::MissingData("ftp host"))?;
        let user = format!("user_{}", unix_timestamp());

        self.post_form(
            session,
            &format!("/minecraft/ftp/{}/add", server_id),
            &[("username", user.as_str()), ("password", password)],
            "ftp account create",
        )
        .await?;

        info!(server_id, %host, %user, "FTP account created");
        Ok(FtpAccount { host, user })
    }

    async fn install_modpack(
        &self,
        session: &Session,
        server_id: &str,
    ) -> Result<(), SessionError> {
        let path = format!(
            "/minecraft/modpacks/cursemodpacks/install/{}?packVersionId={}&mapReset=true&pluginsReset=true",
            server_id, DEFAULT_PACK_VERSION
        );
        self.get(session, &path, "modpack install").await?;
        info!(server_id, "Default modpack installed");
        Ok(())
    }

    async fn logout(&self, session: Session) -> Result<(), SessionError> {
        if let Err(e) = self.get(&session, "/fr/login/logout", "logout").await {
            // A failed logout leaks nothing the next run cannot recover
            // from; the session cookie simply stays valid a while longer.
            warn!(error = %e, "Logout failed");
        }
        Ok(())
    }
}

fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Split a `Set-Cookie` header into its name/value pair.
fn parse_set_cookie(raw: &str) -> Option<(String, String)> {
    let first = raw.split(';').next()?;
    let (name, value) = first.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), value.trim().to_string()))
}

/// Pull every "#<digits>" server marker out of a panel page, in document
/// order.
fn extract_server_ids(body: &str) -> Vec<String> {
    let mut ids = Vec::new();
    let bytes = body.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'#' {
            let start = i + 1;
            let mut end = start;
            while end < bytes.len() && bytes[end].is_ascii_digit() {
                end += 1;
            }
            if end > start {
                ids.push(body[start..end].to_string());
                i = end;
                continue;
            }
        }
        i += 1;
    }
    ids
}

/// Find the FTP hostname on the server's FTP page. Hostnames look like
/// `ftp<n>.boxtoplay.com`.
fn extract_ftp_host(body: &str) -> Option<String> {
    for token in body.split(|c: char| c.is_whitespace() || c == '<' || c == '>' || c == '"') {
        let token = token.trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '.' && c != '-');
        if token.starts_with("ftp") && token.contains(boxrotate_types::PROVIDER_DOMAIN_MARKER) {
            return Some(token.to_string());
        }
    }
    None
}

/// Parse the cart total out of the cart page. Accepts both decimal comma
/// and decimal point ("4,99 €" / "4.99 €"); an explicit free marker parses
/// as zero.
fn extract_cart_price(body: &str) -> Option<f64> {
    let lower = body.to_lowercase();
    if lower.contains("gratuit") || lower.contains("free") {
        return Some(0.0);
    }

    for token in body.split_whitespace() {
        let cleaned: String = token
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
            .collect();
        if cleaned.is_empty() {
            continue;
        }
        if token.contains('€') || body.contains(&format!("{} €", token)) {
            let normalized = cleaned.replace(',', ".");
            if let Ok(price) = normalized.parse::<f64>() {
                return Some(price);
            }
        }
    }
    None
}
