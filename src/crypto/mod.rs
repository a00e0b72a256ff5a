use aes::Aes128;
use anyhow::{Result, anyhow};
use cmac::{Cmac, Mac};
use rand::Rng;
use std::fmt;
use std::str::FromStr;

/// Number of digits in an assignment OTP
pub const OTP_DIGITS: usize = 6;

/// A 16-byte AES key used as the backend's CMAC secret
#[derive(Clone, PartialEq, Eq)]
pub struct AesKey([u8; 16]);

impl AesKey {
    pub fn generate() -> Self {
        let bytes: [u8; 16] = rand::random();
        Self(bytes)
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim())?;
        if bytes.len() != 16 {
            return Err(anyhow!("AES key must be 16 bytes"));
        }
        let mut arr = [0u8; 16];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl FromStr for AesKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl fmt::Display for AesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

// Keep the secret out of logs and panics.
impl fmt::Debug for AesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AesKey(..)")
    }
}

fn cmac(key: &AesKey) -> Result<Cmac<Aes128>> {
    <Cmac<Aes128> as Mac>::new_from_slice(key.as_bytes())
        .map_err(|e| anyhow!("Invalid key length: {:?}", e))
}

/// Fresh numeric OTP, zero-padded to `OTP_DIGITS`
pub fn generate_otp() -> String {
    let mut rng = rand::rng();
    (0..OTP_DIGITS)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}

fn otp_message(card_serial: &str, customer_mobile: &str, otp: &str) -> Vec<u8> {
    let mut msg = Vec::with_capacity(4 + card_serial.len() + customer_mobile.len() + otp.len() + 2);
    msg.extend_from_slice(b"OTP\0");
    msg.extend_from_slice(card_serial.as_bytes());
    msg.push(0);
    msg.extend_from_slice(customer_mobile.as_bytes());
    msg.push(0);
    msg.extend_from_slice(otp.as_bytes());
    msg
}

/// Digest stored in place of the OTP, bound to the pending pair.
pub fn otp_digest(key: &AesKey, card_serial: &str, customer_mobile: &str, otp: &str) -> Result<String> {
    let mut mac = cmac(key)?;
    mac.update(&otp_message(card_serial, customer_mobile, otp));
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time check of a submitted OTP against a stored digest
pub fn verify_otp_digest(
    key: &AesKey,
    card_serial: &str,
    customer_mobile: &str,
    otp: &str,
    stored_digest: &str,
) -> Result<bool> {
    let expected = hex::decode(stored_digest)?;
    let mut mac = cmac(key)?;
    mac.update(&otp_message(card_serial, customer_mobile, otp));
    Ok(mac.verify_slice(&expected).is_ok())
}

/// Derive the code written onto the card once an assignment is confirmed.
///
/// AES-CMAC over `"CARD" || serial || 0x00 || customer_id || 0x00 || nonce`,
/// rendered as uppercase hex. The nonce makes every completed run unique.
pub fn derive_hashed_code(
    key: &AesKey,
    card_serial: &str,
    customer_id: i64,
    nonce: &[u8; 16],
) -> Result<String> {
    let mut mac = cmac(key)?;
    mac.update(b"CARD");
    mac.update(card_serial.as_bytes());
    mac.update(&[0]);
    mac.update(customer_id.to_string().as_bytes());
    mac.update(&[0]);
    mac.update(nonce);
    Ok(hex::encode_upper(mac.finalize().into_bytes()))
}
