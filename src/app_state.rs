use sqlx::{Pool, Sqlite};
use std::sync::Arc;
use crate::{config::ServerConfig, crypto::AesKey, otp::OtpSender};

#[derive(Clone)]
pub struct AppState {
    pub pool: Pool<Sqlite>,
    pub config: Arc<ServerConfig>,
    pub code_key: AesKey,
    pub otp_sender: Arc<dyn OtpSender>,
}
