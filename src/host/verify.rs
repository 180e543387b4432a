use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{HostError, HostResult};
use crate::session::{Clock, SystemClock};

/// Checks a card key against the licensing backend.
/// Returns the expiration (epoch seconds) of an accepted key.
#[async_trait]
pub trait CardVerifier: Send + Sync {
    async fn verify(&self, key: &str) -> HostResult<i64>;
}

#[derive(Serialize)]
struct CardVerifyRequest<'a> {
    key: &'a str,
    hwid: &'a str,
}

#[derive(Debug, Deserialize)]
struct CardInfo {
    /// "used" once bound to a machine, otherwise "unused" or "expired"
    status: String,
    #[serde(default, rename = "expiredAt")]
    expired_at: Option<String>,
    #[serde(default)]
    hwid: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CardVerifyResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: String,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    card: Option<CardInfo>,
}

/// `Ok(expiration)` while `now` is strictly before it
pub fn check_expiration(expiration: i64, now: i64) -> HostResult<i64> {
    if now >= expiration {
        Err(HostError::Expired)
    } else {
        debug!("Session valid for another {}s", expiration - now);
        Ok(expiration)
    }
}

fn interpret(response: CardVerifyResponse, now: i64) -> HostResult<i64> {
    if !response.success {
        let message = response
            .error
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| "verification failed".to_string());
        return Err(HostError::Rejected(message));
    }
    debug!("Verification response: {}", response.message);

    let card = response
        .card
        .ok_or_else(|| HostError::rejected("server returned no card information"))?;

    if card.status != "used" {
        let message = match card.status.as_str() {
            "unused" => "card key has not been activated",
            "expired" => "card key has expired",
            _ => "card key status is invalid",
        };
        return Err(HostError::rejected(message));
    }
    if let Some(bound) = card.hwid.as_deref() {
        debug!("Card bound to hwid {}", bound);
    }

    let expired_at = card
        .expired_at
        .ok_or_else(|| HostError::rejected("server returned no expiration time"))?;
    let expiration = chrono::DateTime::parse_from_rfc3339(&expired_at)
        .map_err(|_| HostError::rejected("could not parse expiration time"))?
        .timestamp();

    check_expiration(expiration, now)
}

/// Verifier backed by `POST {backend}/api/cards/verify`
pub struct HttpCardVerifier {
    client: reqwest::Client,
    backend_url: String,
    hwid: String,
    clock: SystemClock,
}

impl HttpCardVerifier {
    pub fn new(backend_url: &str, timeout: Duration) -> HostResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            backend_url: backend_url.trim_end_matches('/').to_string(),
            hwid: hardware_id().to_string(),
            clock: SystemClock,
        })
    }

    pub fn with_hwid(mut self, hwid: impl Into<String>) -> Self {
        self.hwid = hwid.into();
        self
    }

    /// Startup connectivity check against `GET {backend}/api`
    pub async fn probe(&self) -> bool {
        let url = format!("{}/api", self.backend_url);
        warn!("Requesting connection to {}", url);
        match self.client.get(&url).send().await {
            Ok(_) => {
                info!("Connected to the verification server");
                true
            }
            Err(e) => {
                error!("Connection to the verification server failed: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl CardVerifier for HttpCardVerifier {
    async fn verify(&self, key: &str) -> HostResult<i64> {
        if key.is_empty() {
            return Err(HostError::rejected("card key must not be empty"));
        }
        if self.hwid.is_empty() {
            return Err(HostError::rejected("could not determine hardware id"));
        }

        let url = format!("{}/api/cards/verify", self.backend_url);
        debug!("Verifying card key at {}", url);

        let body = CardVerifyRequest {
            key,
            hwid: &self.hwid,
        };
        let text = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await?
            .text()
            .await?;
        debug!("Verification server replied: {}", text);

        let response: CardVerifyResponse = serde_json::from_str(&text)?;
        interpret(response, self.clock.now_secs())
    }
}

static HARDWARE_ID: Lazy<String> = Lazy::new(|| {
    let raw = raw_hardware_id();
    if raw.is_empty() {
        warn!("No hardware id available on this machine");
        return String::new();
    }
    Uuid::new_v5(&Uuid::NAMESPACE_OID, raw.as_bytes())
        .simple()
        .to_string()
});

/// Stable digest of a machine identifier, empty when none could be read
pub fn hardware_id() -> &'static str {
    &HARDWARE_ID
}

#[cfg(target_os = "windows")]
fn raw_hardware_id() -> String {
    use std::process::Command;

    let output = Command::new("powershell")
        .args([
            "-NoProfile",
            "-Command",
            "Get-PnpDevice -Class Monitor | Select-Object -First 1 -ExpandProperty InstanceId",
        ])
        .output();

    match output {
        Ok(output) if output.status.success() => {
            String::from_utf8_lossy(&output.stdout).trim().to_string()
        }
        Ok(output) => {
            warn!("PowerShell exited with {}", output.status);
            String::new()
        }
        Err(e) => {
            warn!("Failed to query monitor id: {}", e);
            String::new()
        }
    }
}

#[cfg(target_os = "linux")]
fn raw_hardware_id() -> String {
    ["/etc/machine-id", "/var/lib/dbus/machine-id"]
        .iter()
        .find_map(|path| std::fs::read_to_string(path).ok())
        .map(|id| id.trim().to_string())
        .unwrap_or_default()
}

#[cfg(not(any(target_os = "windows", target_os = "linux")))]
fn raw_hardware_id() -> String {
    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn parse(json: &str) -> CardVerifyResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_accepted_card() {
        let response = parse(
            r#"{
                "success": true,
                "message": "ok",
                "card": {
                    "id": 3,
                    "key": "CARD-1",
                    "status": "used",
                    "expiredAt": "2023-11-15T00:00:00Z",
                    "hwid": "abc"
                }
            }"#,
        );
        assert_eq!(interpret(response, NOW), Ok(1_700_006_400));
    }

    #[test]
    fn test_backend_error_message_is_kept() {
        let response = parse(r#"{"success": false, "error": "hwid mismatch"}"#);
        assert_eq!(
            interpret(response, NOW),
            Err(HostError::rejected("hwid mismatch"))
        );

        let response = parse(r#"{"success": false}"#);
        assert_eq!(
            interpret(response, NOW),
            Err(HostError::rejected("verification failed"))
        );
    }

    #[test]
    fn test_card_status() {
        for (status, message) in [
            ("unused", "card key has not been activated"),
            ("expired", "card key has expired"),
            ("banned", "card key status is invalid"),
        ] {
            let json = format!(
                r#"{{"success": true, "card": {{"status": "{}", "expiredAt": "2030-01-01T00:00:00Z"}}}}"#,
                status
            );
            assert_eq!(interpret(parse(&json), NOW), Err(HostError::rejected(message)));
        }
    }

    #[test]
    fn test_missing_or_bad_expiration() {
        let response = parse(r#"{"success": true, "card": {"status": "used"}}"#);
        assert_eq!(
            interpret(response, NOW),
            Err(HostError::rejected("server returned no expiration time"))
        );

        let response = parse(r#"{"success": true, "card": {"status": "used", "expiredAt": "tomorrow"}}"#);
        assert_eq!(
            interpret(response, NOW),
            Err(HostError::rejected("could not parse expiration time"))
        );

        let response = parse(r#"{"success": true}"#);
        assert!(interpret(response, NOW).is_err());
    }

    #[test]
    fn test_expired_card_is_rejected() {
        let response = parse(
            r#"{"success": true, "card": {"status": "used", "expiredAt": "2020-01-01T00:00:00+08:00"}}"#,
        );
        assert_eq!(interpret(response, NOW), Err(HostError::Expired));
    }

    #[test]
    fn test_check_expiration_boundary() {
        assert_eq!(check_expiration(NOW + 1, NOW), Ok(NOW + 1));
        assert_eq!(check_expiration(NOW, NOW), Err(HostError::Expired));
    }

    #[tokio::test]
    async fn test_empty_hwid_is_rejected_before_request() {
        let verifier = HttpCardVerifier::new("http://127.0.0.1:9", Duration::from_secs(1))
            .unwrap()
            .with_hwid("");
        assert_eq!(
            verifier.verify("CARD-1").await,
            Err(HostError::rejected("could not determine hardware id"))
        );
        assert_eq!(
            verifier.verify("").await,
            Err(HostError::rejected("card key must not be empty"))
        );
    }
}
