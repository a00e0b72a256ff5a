use chrono::{DateTime, Utc};
use std::fmt;

use crate::backend::{HashedCode, VerifiedCustomer};

/// Seconds the operator must wait after each dispatch before asking for a resend
pub const RESEND_COOLDOWN_SECS: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateName {
    Input,
    Verifying,
    AwaitingOtp,
    Success,
}

impl fmt::Display for StateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StateName::Input => "entering details",
            StateName::Verifying => "verifying",
            StateName::AwaitingOtp => "awaiting OTP",
            StateName::Success => "assigned",
        })
    }
}

/// Assignment waiting on the customer's OTP. Lives only while the machine is
/// in `AwaitingOtp`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAssignment {
    pub card_serial: String,
    pub customer: VerifiedCustomer,
    pub otp_dispatched_at: DateTime<Utc>,
    pub resend_cooldown_remaining: u32,
}

impl PendingAssignment {
    pub fn new(card_serial: String, customer: VerifiedCustomer) -> Self {
        Self {
            card_serial,
            customer,
            otp_dispatched_at: Utc::now(),
            resend_cooldown_remaining: RESEND_COOLDOWN_SECS,
        }
    }

    pub fn customer_mobile(&self) -> &str {
        &self.customer.mobile_number
    }

    pub(crate) fn redispatched(&mut self) {
        self.otp_dispatched_at = Utc::now();
        self.resend_cooldown_remaining = RESEND_COOLDOWN_SECS;
    }

    /// One second elapsed; floors at zero
    pub(crate) fn tick(&mut self) -> u32 {
        self.resend_cooldown_remaining = self.resend_cooldown_remaining.saturating_sub(1);
        self.resend_cooldown_remaining
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedAssignment {
    pub card_serial: String,
    pub customer: VerifiedCustomer,
    pub hashed_code: HashedCode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignmentState {
    Input,
    /// A submit is running; no second submit may start
    Verifying,
    AwaitingOtp(PendingAssignment),
    Success(CompletedAssignment),
}

impl AssignmentState {
    pub fn name(&self) -> StateName {
        match self {
            AssignmentState::Input => StateName::Input,
            AssignmentState::Verifying => StateName::Verifying,
            AssignmentState::AwaitingOtp(_) => StateName::AwaitingOtp,
            AssignmentState::Success(_) => StateName::Success,
        }
    }
}
