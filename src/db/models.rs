use anyhow::Result;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Format used for every timestamp column (SQLite `datetime()` compatible)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    Ok(NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)?.and_utc())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardStatus {
    Available,
    Assigned,
    Delivered,
}

impl CardStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardStatus::Available => "available",
            CardStatus::Assigned => "assigned",
            CardStatus::Delivered => "delivered",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "available" => Some(CardStatus::Available),
            "assigned" => Some(CardStatus::Assigned),
            "delivered" => Some(CardStatus::Delivered),
            _ => None,
        }
    }
}

impl fmt::Display for CardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Card {
    pub serial_number: String,
    pub status: String,
    pub customer_id: Option<i64>,
    pub hashed_code: Option<String>,
    pub assigned_at: Option<String>,
    pub created_at: Option<String>,
}

impl Card {
    /// Unknown status strings are treated as not assignable
    pub fn status(&self) -> Option<CardStatus> {
        CardStatus::parse(&self.status)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Customer {
    pub customer_id: i64,
    pub mobile_number: String,
    pub name: String,
    pub is_registered: bool,
    pub is_active: bool,
    pub created_at: Option<String>,
}

impl Customer {
    pub fn can_assign_card(&self) -> bool {
        self.is_registered && self.is_active
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PendingAssignment {
    pub card_serial: String,
    pub customer_mobile: String,
    pub otp_digest: String,
    pub otp_dispatched_at: String,
    pub otp_expires_at: String,
    /// Wrong OTPs entered against the current dispatch
    pub failed_attempts: i64,
}

impl PendingAssignment {
    pub fn is_expired(&self, now: DateTime<Utc>) -> Result<bool> {
        Ok(parse_timestamp(&self.otp_expires_at)? <= now)
    }

    /// Seconds since the last dispatch, saturating at zero for clock skew
    pub fn secs_since_dispatch(&self, now: DateTime<Utc>) -> Result<i64> {
        let dispatched = parse_timestamp(&self.otp_dispatched_at)?;
        Ok((now - dispatched).num_seconds().max(0))
    }
}
