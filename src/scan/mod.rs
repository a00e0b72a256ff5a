//! One card serial from NFC hardware, whichever transport is available.

pub mod bridge;
pub mod wedge;

use async_trait::async_trait;
use std::sync::Mutex;
use tokio::sync::oneshot;

use crate::serial::normalize;

pub use bridge::BridgeScanner;
pub use wedge::WedgeScanner;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScanError {
    #[error("scan cancelled")]
    Cancelled,
    #[error("no card presented before the scan timed out")]
    Timeout,
    #[error("card returned an empty serial")]
    EmptySerial,
    #[error("scanner unavailable: {0}")]
    Unavailable(String),
    #[error("scanner error: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanResult {
    Success { serial_number: String },
    Failure { error: ScanError },
}

impl ScanResult {
    /// Builds a result from a raw reading, normalizing the serial
    pub fn from_raw(raw: &str) -> Self {
        let serial_number = normalize(raw);
        if serial_number.is_empty() {
            ScanResult::Failure { error: ScanError::EmptySerial }
        } else {
            ScanResult::Success { serial_number }
        }
    }

    pub fn failure(error: ScanError) -> Self {
        ScanResult::Failure { error }
    }
}

/// A scan transport.
///
/// Implementations hold no state between scans beyond the cancel handle of
/// the scan currently in flight.
#[async_trait]
pub trait ScanAdapter: Send + Sync {
    /// Waits until a card is read, the scan is cancelled, or the transport fails
    async fn scan(&self) -> ScanResult;

    /// Cancels the scan in flight, if any. Idempotent.
    fn stop_scanning(&self);

    fn transport_name(&self) -> &'static str;
}

/// What the host can scan with, probed once before offering the scan action
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanCapabilities {
    pub in_process: bool,
    pub bridge_reachable: bool,
}

impl ScanCapabilities {
    pub fn is_supported(&self) -> bool {
        self.in_process || self.bridge_reachable
    }
}

/// Picks the transport once; `None` means scanning must not be offered.
/// The in-process reader wins when both are present.
pub fn select_adapter(
    caps: ScanCapabilities,
    in_process: impl FnOnce() -> Box<dyn ScanAdapter>,
    bridge: impl FnOnce() -> Box<dyn ScanAdapter>,
) -> Option<Box<dyn ScanAdapter>> {
    if caps.in_process {
        Some(in_process())
    } else if caps.bridge_reachable {
        Some(bridge())
    } else {
        None
    }
}

/// Cancel handle for the scan currently in flight
#[derive(Default)]
pub(crate) struct CancelSlot(Mutex<Option<oneshot::Sender<()>>>);

impl CancelSlot {
    /// Registers a new scan, replacing any stale handle
    pub(crate) fn arm(&self) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        *self.0.lock().unwrap_or_else(|e| e.into_inner()) = Some(tx);
        rx
    }

    pub(crate) fn cancel(&self) {
        if let Some(tx) = self.0.lock().unwrap_or_else(|e| e.into_inner()).take() {
            let _ = tx.send(());
        }
    }

    pub(crate) fn disarm(&self) {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).take();
    }
}
