//! Authenticated Provider HTTP client.
//!
//! Two endpoints: match-by-identity (jeuInfos) and search-by-name
//! (jeuRecherche). Each call is a single attempt — retry scheduling and
//! rate limiting belong to the scheduler and throttle, not here. The
//! Provider returns HTTP 200 for most failures and signals them with
//! French text in the body, so classification order matters.

use std::collections::HashMap;

use tokio::time::Duration;

use curateur_core::HashAlgorithm;

use crate::error::ScrapeError;
use crate::types::{
    GameRecord, JeuInfosResponse, JeuRechercheResponse, UserInfo, UserInfoResponse, UserQuota,
};

const BASE_URL: &str = "https://api.screenscraper.fr/api2";

/// Developer and user credentials for the Provider.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub dev_id: String,
    pub dev_password: String,
    pub soft_name: String,
    pub user_id: Option<String>,
    pub user_password: Option<String>,
}

impl Credentials {
    /// Load credentials from environment variables.
    ///
    /// Required: `SCREENSCRAPER_DEVID`, `SCREENSCRAPER_DEVPASSWORD`.
    /// Optional: `SCREENSCRAPER_SSID`, `SCREENSCRAPER_SSPASSWORD`,
    /// `SCREENSCRAPER_SOFTNAME`.
    pub fn from_env() -> Result<Self, ScrapeError> {
        let dev_id = std::env::var("SCREENSCRAPER_DEVID").map_err(|_| {
            ScrapeError::Config("Missing dev_id: set SCREENSCRAPER_DEVID".to_string())
        })?;
        let dev_password = std::env::var("SCREENSCRAPER_DEVPASSWORD").map_err(|_| {
            ScrapeError::Config("Missing dev_password: set SCREENSCRAPER_DEVPASSWORD".to_string())
        })?;
        Ok(Self {
            dev_id,
            dev_password,
            soft_name: std::env::var("SCREENSCRAPER_SOFTNAME")
                .unwrap_or_else(|_| "curateur".to_string()),
            user_id: std::env::var("SCREENSCRAPER_SSID").ok(),
            user_password: std::env::var("SCREENSCRAPER_SSPASSWORD").ok(),
        })
    }
}

/// Identity fields sent on a match-by-identity lookup.
#[derive(Debug, Clone)]
pub struct LookupIdentity<'a> {
    /// Primary file name (disc 1 for playlists).
    pub filename: &'a str,
    /// Primary file size in bytes.
    pub size: u64,
    /// Uppercase hex content hash, absent when the size cap skipped it.
    pub hash: Option<&'a str>,
    pub algorithm: HashAlgorithm,
}

/// Pooled HTTP client for the Provider.
pub struct ProviderClient {
    http: reqwest::Client,
    creds: Credentials,
    timeout: Duration,
}

impl ProviderClient {
    /// Build the client and validate credentials by fetching account
    /// info, which also carries the server-reported caps.
    pub async fn connect(
        creds: Credentials,
        timeout: Duration,
    ) -> Result<(Self, UserInfo), ScrapeError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(10))
            .tcp_keepalive(Duration::from_secs(30))
            .tcp_nodelay(true)
            .build()?;

        let client = Self {
            http,
            creds,
            timeout,
        };
        let info = client.user_info().await?;
        Ok((client, info))
    }

    /// Shared transport for media downloads.
    pub fn http(&self) -> reqwest::Client {
        self.http.clone()
    }

    async fn user_info(&self) -> Result<UserInfo, ScrapeError> {
        let params = self.base_params();
        let text = self
            .get_text(&format!("{BASE_URL}/ssuserInfos.php"), params)
            .await?;

        if text.contains("Erreur de login") || text.contains("Identifiants") {
            return Err(ScrapeError::InvalidCredentials(
                "Invalid developer or user credentials".to_string(),
            ));
        }

        let info: UserInfoResponse = serde_json::from_str(&text).map_err(|e| {
            ScrapeError::Malformed(format!("user info: {e}. Response: {}", head(&text)))
        })?;
        Ok(info.response.ssuser)
    }

    /// Match-by-identity lookup. Returns the game record plus any quota
    /// block embedded in the response.
    pub async fn match_identity(
        &self,
        system_id: u32,
        identity: &LookupIdentity<'_>,
    ) -> Result<(GameRecord, Option<UserQuota>), ScrapeError> {
        let mut params = self.base_params();
        params.insert("systemeid", system_id.to_string());
        params.insert("romtype", "rom".to_string());
        params.insert("romnom", identity.filename.to_string());
        params.insert("romtaille", identity.size.to_string());
        if let Some(hash) = identity.hash {
            match identity.algorithm {
                HashAlgorithm::Crc32 => params.insert("crc", hash.to_uppercase()),
                HashAlgorithm::Md5 => params.insert("md5", hash.to_lowercase()),
                HashAlgorithm::Sha1 => params.insert("sha1", hash.to_lowercase()),
            };
        }

        let text = self
            .get_text(&format!("{BASE_URL}/jeuInfos.php"), params)
            .await?;
        classify_body(&text)?;

        let resp: JeuInfosResponse = serde_json::from_str(&text).map_err(|e| {
            ScrapeError::Malformed(format!("game info: {e}. Response: {}", head(&text)))
        })?;
        Ok((
            GameRecord::from_wire(&resp.response.jeu, "en"),
            resp.response.ssuser,
        ))
    }

    /// Search-by-name lookup. Returns zero or more candidate records.
    pub async fn search(
        &self,
        system_id: Option<u32>,
        query: &str,
    ) -> Result<(Vec<GameRecord>, Option<UserQuota>), ScrapeError> {
        let mut params = self.base_params();
        params.insert("recherche", query.to_string());
        if let Some(id) = system_id {
            params.insert("systemeid", id.to_string());
        }

        let text = self
            .get_text(&format!("{BASE_URL}/jeuRecherche.php"), params)
            .await?;
        match classify_body(&text) {
            // An empty result set is a plain empty list, not an error.
            Err(ScrapeError::NotFound) => return Ok((Vec::new(), None)),
            Err(e) => return Err(e),
            Ok(()) => {}
        }

        let resp: JeuRechercheResponse = serde_json::from_str(&text).map_err(|e| {
            ScrapeError::Malformed(format!("search: {e}. Response: {}", head(&text)))
        })?;
        let records = resp
            .response
            .jeux
            .iter()
            .map(|jeu| GameRecord::from_wire(jeu, "en"))
            .collect();
        Ok((records, resp.response.ssuser))
    }

    fn base_params(&self) -> HashMap<&'static str, String> {
        let mut params = HashMap::new();
        params.insert("output", "json".to_string());
        params.insert("devid", self.creds.dev_id.clone());
        params.insert("devpassword", self.creds.dev_password.clone());
        params.insert("softname", self.creds.soft_name.clone());
        if let Some(ref id) = self.creds.user_id {
            params.insert("ssid", id.clone());
        }
        if let Some(ref pw) = self.creds.user_password {
            params.insert("sspassword", pw.clone());
        }
        params
    }

    /// One HTTP GET with status mapping. No retries here.
    async fn get_text(
        &self,
        url: &str,
        params: HashMap<&'static str, String>,
    ) -> Result<String, ScrapeError> {
        let request = async {
            let resp = self
                .http
                .get(url)
                .query(&params)
                .send()
                .await
                .map_err(|e| ScrapeError::ServerError {
                    status: 0,
                    message: redact_credentials(&e.to_string()),
                })?;

            let status = resp.status();
            if status == reqwest::StatusCode::UNAUTHORIZED
                || status == reqwest::StatusCode::FORBIDDEN
            {
                return Err(ScrapeError::InvalidCredentials(
                    "Credentials rejected".to_string(),
                ));
            }
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                let retry_after = resp
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok());
                return Err(ScrapeError::RateLimit { retry_after });
            }
            if status.is_server_error() {
                return Err(ScrapeError::ServerError {
                    status: status.as_u16(),
                    message: format!("Server returned HTTP {}", status.as_u16()),
                });
            }

            let text = resp.text().await.map_err(|e| ScrapeError::ServerError {
                status: 200,
                message: format!(
                    "Failed to read response body: {}",
                    redact_credentials(&e.to_string())
                ),
            })?;

            // CDN/proxy errors sometimes arrive as HTML with a 200 status.
            if looks_like_html_error(&text) {
                return Err(ScrapeError::ServerError {
                    status: 200,
                    message: "Server returned HTML error page instead of JSON".to_string(),
                });
            }

            Ok(text)
        };

        match tokio::time::timeout(self.timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(ScrapeError::Timeout(self.timeout.as_secs())),
        }
    }
}

/// Classify error patterns in a 200-status response body.
///
/// Fatal conditions contain "Erreur" too, so they are checked before the
/// general error handler.
fn classify_body(text: &str) -> Result<(), ScrapeError> {
    if text.is_empty() {
        return Err(ScrapeError::ServerError {
            status: 200,
            message: "Empty response from API".to_string(),
        });
    }
    if text.contains("API ferm\u{e9}") || text.contains("API closed") {
        return Err(ScrapeError::ServerClosed(
            "Provider API is temporarily closed".to_string(),
        ));
    }
    if text.contains("Le quota de scrape journalier") {
        return Err(ScrapeError::QuotaExceeded { used: 0, max: 0 });
    }
    // "non trouvé(e)" marks games that genuinely don't exist upstream.
    if text.contains("non trouv\u{e9}") {
        return Err(ScrapeError::NotFound);
    }
    // Remaining "Erreur" messages (login trouble, server hiccups) are NOT
    // not-found; surface them as retryable so entries aren't permanently
    // marked missing.
    if text.contains("Erreur") {
        return Err(ScrapeError::ServerError {
            status: 200,
            message: format!("Provider error: {}", head(text)),
        });
    }
    Ok(())
}

fn looks_like_html_error(text: &str) -> bool {
    let trimmed = text.trim_start();
    trimmed.starts_with("<!DOCTYPE") || trimmed.starts_with("<html") || trimmed.starts_with("<HTML")
}

fn head(text: &str) -> &str {
    &text[..text.len().min(200)]
}

/// Redact credential query parameters from error messages that may echo
/// request URLs.
fn redact_credentials(msg: &str) -> String {
    let mut result = msg.to_string();
    for param in &["devpassword", "sspassword", "devid", "ssid"] {
        let prefix = format!("{param}=");
        while let Some(start) = result.find(&prefix) {
            let value_start = start + prefix.len();
            let value_end = result[value_start..]
                .find(|c: char| c == '&' || c.is_whitespace() || c == '"' || c == '\'')
                .map(|i| value_start + i)
                .unwrap_or(result.len());
            result.replace_range(value_start..value_end, "[REDACTED]");
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_classification_ordering() {
        assert!(matches!(
            classify_body(""),
            Err(ScrapeError::ServerError { .. })
        ));
        assert!(matches!(
            classify_body("Erreur : API ferm\u{e9} pour maintenance"),
            Err(ScrapeError::ServerClosed(_))
        ));
        assert!(matches!(
            classify_body("Erreur : Le quota de scrape journalier atteint"),
            Err(ScrapeError::QuotaExceeded { .. })
        ));
        assert!(matches!(
            classify_body("Erreur : Jeu non trouv\u{e9} !"),
            Err(ScrapeError::NotFound)
        ));
        assert!(matches!(
            classify_body("Erreur de login"),
            Err(ScrapeError::ServerError { .. })
        ));
        assert!(classify_body("{\"response\": {}}").is_ok());
    }

    #[test]
    fn html_error_pages_detected() {
        assert!(looks_like_html_error("<!DOCTYPE html><html>502</html>"));
        assert!(looks_like_html_error("  <html>oops</html>"));
        assert!(!looks_like_html_error("{\"ok\": true}"));
    }

    #[test]
    fn credentials_redacted_from_messages() {
        let msg = "GET https://api/x?devid=secret&devpassword=hunter2&romnom=a.zip failed";
        let redacted = redact_credentials(msg);
        assert!(!redacted.contains("hunter2"));
        assert!(!redacted.contains("devid=secret"));
        assert!(redacted.contains("romnom=a.zip"));
    }
}
