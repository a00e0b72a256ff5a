use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::{CancelSlot, ScanAdapter, ScanError, ScanResult};

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Deserialize)]
struct BridgeScanResponse {
    serial_number: Option<String>,
    error: Option<String>,
}

/// Scans through a local bridge service that owns the NFC reader.
///
/// `POST {base}/scan` blocks until the bridge reads a tag and answers
/// `{serial_number}` or `{error}`.
pub struct BridgeScanner {
    client: reqwest::Client,
    base_url: String,
    scan_timeout: Duration,
    cancel: CancelSlot,
}

impl BridgeScanner {
    pub fn new(base_url: &str, scan_timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            scan_timeout,
            cancel: CancelSlot::default(),
        }
    }

    /// True if `GET {base}/health` answers 2xx quickly
    pub async fn probe(base_url: &str) -> bool {
        let url = format!("{}/health", base_url.trim_end_matches('/'));
        let client = reqwest::Client::new();
        match client.get(&url).timeout(PROBE_TIMEOUT).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::debug!(%url, error = %e, "bridge not reachable");
                false
            }
        }
    }

    async fn request_scan(&self) -> ScanResult {
        let url = format!("{}/scan", self.base_url);
        let resp = match self.client.post(&url).send().await {
            Ok(resp) => resp,
            Err(e) => return ScanResult::failure(ScanError::Unavailable(e.to_string())),
        };

        let status = resp.status();
        let body = match resp.json::<BridgeScanResponse>().await {
            Ok(body) => body,
            Err(e) => {
                return ScanResult::failure(ScanError::Transport(format!(
                    "invalid bridge reply (HTTP {}): {}",
                    status.as_u16(),
                    e
                )));
            }
        };

        match (body.serial_number, body.error) {
            (Some(serial), None) => ScanResult::from_raw(&serial),
            (_, Some(error)) => ScanResult::failure(ScanError::Transport(error)),
            (None, None) => ScanResult::failure(ScanError::EmptySerial),
        }
    }
}

#[async_trait]
impl ScanAdapter for BridgeScanner {
    async fn scan(&self) -> ScanResult {
        let cancelled = self.cancel.arm();

        let result = tokio::select! {
            _ = cancelled => ScanResult::failure(ScanError::Cancelled),
            read = tokio::time::timeout(self.scan_timeout, self.request_scan()) => {
                read.unwrap_or_else(|_| ScanResult::failure(ScanError::Timeout))
            }
        };

        self.cancel.disarm();
        tracing::debug!(transport = "bridge", ?result, "scan finished");
        result
    }

    fn stop_scanning(&self) {
        self.cancel.cancel();
    }

    fn transport_name(&self) -> &'static str {
        "bridge"
    }
}
