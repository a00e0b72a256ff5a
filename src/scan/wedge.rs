use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, Lines};
use tokio::sync::Mutex;

use super::{CancelSlot, ScanAdapter, ScanError, ScanResult};

/// In-process reader for keyboard-wedge NFC readers.
///
/// Such readers type the tag UID followed by Enter, so a scan is the next
/// non-blank line from the shared line source.
pub struct WedgeScanner<R> {
    lines: Arc<Mutex<Lines<R>>>,
    scan_timeout: Duration,
    cancel: CancelSlot,
}

impl<R> WedgeScanner<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    pub fn new(lines: Arc<Mutex<Lines<R>>>, scan_timeout: Duration) -> Self {
        Self {
            lines,
            scan_timeout,
            cancel: CancelSlot::default(),
        }
    }

    async fn next_serial(&self) -> ScanResult {
        let mut lines = self.lines.lock().await;
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => return ScanResult::from_raw(&line),
                Ok(None) => {
                    return ScanResult::failure(ScanError::Unavailable("reader input closed".to_string()));
                }
                Err(e) => return ScanResult::failure(ScanError::Transport(e.to_string())),
            }
        }
    }
}

#[async_trait]
impl<R> ScanAdapter for WedgeScanner<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn scan(&self) -> ScanResult {
        let cancelled = self.cancel.arm();

        // `next_line` is cancel safe, so dropping it on cancel/timeout loses no input
        let result = tokio::select! {
            _ = cancelled => ScanResult::failure(ScanError::Cancelled),
            read = tokio::time::timeout(self.scan_timeout, self.next_serial()) => {
                read.unwrap_or_else(|_| ScanResult::failure(ScanError::Timeout))
            }
        };

        self.cancel.disarm();
        tracing::debug!(transport = "wedge", ?result, "scan finished");
        result
    }

    fn stop_scanning(&self) {
        self.cancel.cancel();
    }

    fn transport_name(&self) -> &'static str {
        "wedge"
    }
}
