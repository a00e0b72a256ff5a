use anyhow::Result;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::Mutex;

use crate::{
    assignment::{AssignmentMachine, AssignmentState, CompletedAssignment, CooldownTicker},
    backend::{AssignmentBackend, HttpBackend},
    config::ClientConfig,
    scan::{BridgeScanner, ScanAdapter, ScanCapabilities, WedgeScanner, select_adapter},
};

type SharedLines<R> = Arc<Mutex<Lines<R>>>;

/// Interactive `assign` command: one card, one customer, driven from stdin.
pub async fn run_assign(config: ClientConfig) -> Result<()> {
    let backend = HttpBackend::new(&config.backend_url, config.request_timeout())?;
    let lines = Arc::new(Mutex::new(BufReader::new(tokio::io::stdin()).lines()));
    let scanner = detect_scanner(&config, lines.clone()).await;

    match &scanner {
        Some(s) => tracing::info!(transport = s.transport_name(), "card scanning available"),
        None => tracing::info!("no card reader found; serials must be typed"),
    }

    let mut session = Session::new(AssignmentMachine::new(backend), lines, scanner);
    match session.run(config.serial, config.mobile).await? {
        Some(done) => println!(
            "Card {} assigned to {} (customer {})",
            done.card_serial, done.customer.name, done.customer.id
        ),
        None => match session.machine.last_error() {
            Some(e) => println!("No card assigned. Last error: {}", e),
            None => println!("No card assigned."),
        },
    }
    Ok(())
}

async fn detect_scanner<R>(config: &ClientConfig, lines: SharedLines<R>) -> Option<Box<dyn ScanAdapter>>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    let bridge_url = config.bridge_url.clone().unwrap_or_default();
    let bridge_reachable = !bridge_url.is_empty() && BridgeScanner::probe(&bridge_url).await;
    let caps = ScanCapabilities {
        in_process: config.wedge_reader,
        bridge_reachable,
    };
    let scan_timeout = config.scan_timeout();
    tracing::debug!(?caps, supported = caps.is_supported(), "scan capabilities probed");

    select_adapter(
        caps,
        || Box::new(WedgeScanner::new(lines, scan_timeout)),
        || Box::new(BridgeScanner::new(&bridge_url, scan_timeout)),
    )
}

fn prompt(text: &str) {
    print!("{}", text);
    let _ = std::io::stdout().flush();
}

enum OtpPhase {
    Done(CompletedAssignment),
    Back,
    Closed,
}

struct Session<B, R> {
    machine: AssignmentMachine<B>,
    lines: SharedLines<R>,
    scanner: Option<Box<dyn ScanAdapter>>,
}

impl<B, R> Session<B, R>
where
    B: AssignmentBackend,
    R: AsyncBufRead + Unpin + Send,
{
    fn new(machine: AssignmentMachine<B>, lines: SharedLines<R>, scanner: Option<Box<dyn ScanAdapter>>) -> Self {
        Self { machine, lines, scanner }
    }

    async fn read_line(&self) -> Result<Option<String>> {
        Ok(self.lines.lock().await.next_line().await?)
    }

    /// Runs until a card is assigned or input closes. Preset values are
    /// used for the first attempt only.
    async fn run(&mut self, mut serial: Option<String>, mut mobile: Option<String>) -> Result<Option<CompletedAssignment>> {
        loop {
            let Some(card) = self.card_serial(serial.take()).await? else {
                return Ok(None);
            };
            let Some(number) = self.mobile_number(mobile.take()).await? else {
                return Ok(None);
            };

            if let Err(e) = self.machine.submit(&card, &number).await {
                println!("Error: {}", e);
                continue;
            }

            match self.otp_phase().await? {
                OtpPhase::Done(done) => {
                    self.machine.reset();
                    return Ok(Some(done));
                }
                OtpPhase::Back => continue,
                OtpPhase::Closed => return Ok(None),
            }
        }
    }

    async fn card_serial(&mut self, preset: Option<String>) -> Result<Option<String>> {
        if let Some(serial) = preset {
            return Ok(Some(serial));
        }
        loop {
            if self.scanner.is_some() {
                prompt("Card serial (empty line to scan): ");
            } else {
                prompt("Card serial: ");
            }
            let Some(line) = self.read_line().await? else {
                return Ok(None);
            };
            if !line.trim().is_empty() {
                return Ok(Some(line));
            }
            let Some(scanner) = self.scanner.as_deref() else {
                continue;
            };

            println!("Present a card to the reader (Ctrl-C to cancel)...");
            let result = {
                let scan = self.machine.scan(scanner);
                tokio::pin!(scan);
                tokio::select! {
                    result = &mut scan => result,
                    _ = tokio::signal::ctrl_c() => {
                        scanner.stop_scanning();
                        scan.await
                    }
                }
            };
            match result {
                Ok(serial) => {
                    println!("Card {} is available", serial);
                    return Ok(Some(serial));
                }
                Err(e) => {
                    println!("Error: {}", e);
                    if let Some(read) = self.machine.scanned_serial() {
                        println!("Last card read: {}", read);
                    }
                }
            }
        }
    }

    async fn mobile_number(&mut self, preset: Option<String>) -> Result<Option<String>> {
        if let Some(mobile) = preset {
            return Ok(Some(mobile));
        }
        prompt("Customer mobile number: ");
        self.read_line().await
    }

    async fn otp_phase(&mut self) -> Result<OtpPhase> {
        if let Some(pending) = self.machine.pending() {
            println!(
                "OTP sent to {} for card {} at {} UTC. Enter the OTP, 'r' to resend, 'b' to go back.",
                pending.customer.name,
                pending.card_serial,
                pending.otp_dispatched_at.format("%H:%M:%S")
            );
        }

        let mut ticker = CooldownTicker::start();
        loop {
            let line = {
                let mut lines = self.lines.lock().await;
                tokio::select! {
                    line = lines.next_line() => line?,
                    _ = ticker.tick() => {
                        if self.machine.resend_cooldown_remaining() == 1 {
                            println!("You can now request a new OTP with 'r'.");
                        }
                        self.machine.tick();
                        continue;
                    }
                }
            };
            let Some(line) = line else {
                return Ok(OtpPhase::Closed);
            };

            match line.trim() {
                "r" | "R" => match self.machine.resend().await {
                    Ok(true) => {
                        ticker.restart();
                        println!("A new OTP has been sent.");
                    }
                    Ok(false) => println!(
                        "Please wait {}s before requesting a new OTP.",
                        self.machine.resend_cooldown_remaining()
                    ),
                    Err(e) => println!("Error: {}", e),
                },
                "b" | "B" => {
                    self.machine.back()?;
                    println!(
                        "Back to details (was card {}, mobile {}).",
                        self.machine.serial(),
                        self.machine.mobile()
                    );
                    return Ok(OtpPhase::Back);
                }
                otp => {
                    if let Err(e) = self.machine.submit_otp(otp).await {
                        println!("Error: {}", e);
                    }
                }
            }

            if let Some(code) = self.machine.hashed_code() {
                println!("Hashed code: {}", code);
            }
            if let AssignmentState::Success(done) = self.machine.state() {
                return Ok(OtpPhase::Done(done.clone()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assignment::state::StateName,
        db::queries,
        handlers::{build_router, tests::seeded_state},
        otp::RecordingOtpSender,
    };
    use std::time::Duration;
    use tokio::io::{AsyncWriteExt, DuplexStream, duplex};
    use tokio::net::TcpListener;

    async fn backend() -> (HttpBackend, sqlx::SqlitePool, Arc<RecordingOtpSender>) {
        let (state, sender) = seeded_state(0).await;
        let pool = state.pool.clone();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, build_router(state)).await.unwrap();
        });
        let backend = HttpBackend::new(&format!("http://127.0.0.1:{}", port), Duration::from_secs(5)).unwrap();
        (backend, pool, sender)
    }

    async fn wait_for_otp(sender: &RecordingOtpSender, count: usize) -> String {
        for _ in 0..200 {
            if sender.count() >= count {
                return sender.last_otp().unwrap();
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("OTP {} never dispatched", count);
    }

    fn lines(reader: DuplexStream) -> SharedLines<BufReader<DuplexStream>> {
        Arc::new(Mutex::new(BufReader::new(reader).lines()))
    }

    #[tokio::test]
    async fn test_session_retries_then_assigns() {
        let (backend, pool, sender) = backend().await;
        let (mut input, reader) = duplex(1024);
        let mut session = Session::new(AssignmentMachine::new(backend), lines(reader), None);

        // Taken card first, then the available one; back out once, resend inside the cooldown
        input
            .write_all(b"tr002\n+15550102030\ntr001\n+15550102030\nb\ntr001\n+15550102030\nr\n")
            .await
            .unwrap();

        let driver = tokio::spawn(async move {
            let otp = wait_for_otp(&sender, 2).await;
            input.write_all(b"999999x\n").await.unwrap();
            input.write_all(format!("{}\n", otp).as_bytes()).await.unwrap();
            input
        });

        let done = session.run(None, None).await.unwrap().unwrap();
        driver.await.unwrap();

        assert_eq!(done.card_serial, "TR001");
        assert_eq!(done.customer.name, "Ada");
        assert_eq!(session.machine.state_name(), StateName::Input);

        let card = queries::get_card(&pool, "TR001").await.unwrap().unwrap();
        assert_eq!(card.hashed_code, Some(done.hashed_code.to_string()));
    }

    #[tokio::test]
    async fn test_session_stops_when_input_closes() {
        let (backend, _pool, _sender) = backend().await;
        let (input, reader) = duplex(64);
        drop(input);
        let mut session = Session::new(AssignmentMachine::new(backend), lines(reader), None);

        assert!(session.run(None, None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_session_scans_with_wedge_reader() {
        let (backend, _pool, sender) = backend().await;
        let (mut input, reader) = duplex(1024);
        let shared = lines(reader);
        let scanner = WedgeScanner::new(shared.clone(), Duration::from_secs(5));
        let mut session = Session::new(AssignmentMachine::new(backend), shared, Some(Box::new(scanner)));

        // Empty line triggers a scan; the reader then types the tag
        input.write_all(b"\n tr001 \n+15550102030\n").await.unwrap();
        let driver = tokio::spawn(async move {
            let otp = wait_for_otp(&sender, 1).await;
            input.write_all(format!("{}\n", otp).as_bytes()).await.unwrap();
            input
        });

        let done = session.run(None, None).await.unwrap().unwrap();
        driver.await.unwrap();
        assert_eq!(done.card_serial, "TR001");
    }
}
