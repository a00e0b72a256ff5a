use anyhow::Result;
use async_trait::async_trait;

/// Delivers an assignment OTP to a customer's mobile.
#[async_trait]
pub trait OtpSender: Send + Sync {
    async fn send_otp(&self, mobile_number: &str, card_serial: &str, otp: &str) -> Result<()>;
}

/// Sender that only writes the OTP to the log, for local setups without an SMS gateway
pub struct LogOtpSender;

#[async_trait]
impl OtpSender for LogOtpSender {
    async fn send_otp(&self, mobile_number: &str, card_serial: &str, otp: &str) -> Result<()> {
        tracing::info!(mobile = %mobile_number, card = %card_serial, %otp, "OTP dispatched");
        Ok(())
    }
}

/// Records every dispatch so tests can read the OTP back
#[cfg(test)]
#[derive(Default)]
pub struct RecordingOtpSender {
    pub sent: std::sync::Mutex<Vec<(String, String, String)>>,
}

#[cfg(test)]
impl RecordingOtpSender {
    pub fn last_otp(&self) -> Option<String> {
        self.sent.lock().unwrap().last().map(|(_, _, otp)| otp.clone())
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[cfg(test)]
#[async_trait]
impl OtpSender for RecordingOtpSender {
    async fn send_otp(&self, mobile_number: &str, card_serial: &str, otp: &str) -> Result<()> {
        self.sent.lock().unwrap().push((
            mobile_number.to_string(),
            card_serial.to_string(),
            otp.to_string(),
        ));
        Ok(())
    }
}
