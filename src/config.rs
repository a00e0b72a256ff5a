use clap::{Args, Parser, Subcommand};
use std::time::Duration;

use crate::crypto::AesKey;

#[derive(Parser, Debug)]
#[command(name = "card-assign")]
#[command(about = "NFC card to customer assignment: OTP-gated client and reference backend")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the reference assignment backend
    Serve(ServerConfig),
    /// Assign one card to one customer against a running backend
    Assign(ClientConfig),
}

#[derive(Args, Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value = "8080")]
    pub port: u16,

    /// SQLite database URL
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://card-assign.db")]
    pub database_url: String,

    /// Hex AES-128 key for OTP digests and hashed codes (random per process if unset)
    #[arg(long, env = "CODE_KEY")]
    pub code_key: Option<AesKey>,

    /// Lifetime of a dispatched OTP in seconds
    #[arg(long, env = "OTP_TTL_SECS", default_value = "300")]
    pub otp_ttl_secs: i64,

    /// Minimum seconds between two dispatches for the same pending assignment
    #[arg(long, env = "RESEND_COOLDOWN_SECS", default_value = "20")]
    pub resend_cooldown_secs: i64,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Args, Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the assignment backend
    #[arg(long, env = "BACKEND_URL", default_value = "http://127.0.0.1:8080")]
    pub backend_url: String,

    /// Base URL of a local NFC bridge service
    #[arg(long, env = "BRIDGE_URL")]
    pub bridge_url: Option<String>,

    /// Read card serials typed by a keyboard-wedge NFC reader on stdin
    #[arg(long)]
    pub wedge_reader: bool,

    /// Timeout for each backend request in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value = "20")]
    pub request_timeout_secs: u64,

    /// How long a single scan may wait for a card, in seconds
    #[arg(long, env = "SCAN_TIMEOUT_SECS", default_value = "60")]
    pub scan_timeout_secs: u64,

    /// Card serial; prompted (or scanned) when omitted
    #[arg(long)]
    pub serial: Option<String>,

    /// Customer mobile number; prompted when omitted
    #[arg(long)]
    pub mobile: Option<String>,
}

impl ClientConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }
}
