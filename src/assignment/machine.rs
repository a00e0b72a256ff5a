use crate::{
    backend::{
        AssignmentBackend, CustomerOutcome, HashedCode, Ineligibility, InitiateOutcome,
        ResendOutcome, ValidationOutcome, VerifyOutcome,
    },
    scan::{ScanAdapter, ScanError, ScanResult},
    serial::{normalize, normalize_mobile},
};

use super::{
    error::{AssignmentError, Step},
    state::{AssignmentState, CompletedAssignment, PendingAssignment, StateName},
};

/// Drives one card-to-customer assignment:
/// `Input → Verifying → AwaitingOtp → Success`.
///
/// Failures never get a state of their own. They are kept in `last_error`
/// while the machine stays in `Input` or `AwaitingOtp`. Nothing is retried
/// automatically; every retry is an explicit call by the operator.
pub struct AssignmentMachine<B> {
    backend: B,
    state: AssignmentState,
    serial: String,
    mobile: String,
    scanned_serial: Option<String>,
    last_error: Option<AssignmentError>,
}

impl<B: AssignmentBackend> AssignmentMachine<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            state: AssignmentState::Input,
            serial: String::new(),
            mobile: String::new(),
            scanned_serial: None,
            last_error: None,
        }
    }

    #[cfg(test)]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn state(&self) -> &AssignmentState {
        &self.state
    }

    pub fn state_name(&self) -> StateName {
        self.state.name()
    }

    pub fn last_error(&self) -> Option<&AssignmentError> {
        self.last_error.as_ref()
    }

    /// Serial of the current attempt, normalized
    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn mobile(&self) -> &str {
        &self.mobile
    }

    pub fn scanned_serial(&self) -> Option<&str> {
        self.scanned_serial.as_deref()
    }

    pub fn pending(&self) -> Option<&PendingAssignment> {
        match &self.state {
            AssignmentState::AwaitingOtp(pending) => Some(pending),
            _ => None,
        }
    }

    /// Zero outside `AwaitingOtp`
    pub fn resend_cooldown_remaining(&self) -> u32 {
        self.pending().map_or(0, |p| p.resend_cooldown_remaining)
    }

    pub fn hashed_code(&self) -> Option<&HashedCode> {
        match &self.state {
            AssignmentState::Success(done) => Some(&done.hashed_code),
            _ => None,
        }
    }

    fn fail<T>(&mut self, err: AssignmentError) -> Result<T, AssignmentError> {
        tracing::warn!(state = %self.state.name(), category = ?err.category(), error = %err, "assignment step failed");
        self.last_error = Some(err.clone());
        Err(err)
    }

    fn expect_state(&self, action: &'static str, expected: StateName) -> Result<(), AssignmentError> {
        let state = self.state.name();
        if state != expected {
            return Err(AssignmentError::InvalidTransition { action, state });
        }
        Ok(())
    }

    /// Reads one card through `adapter` and validates it straight away.
    ///
    /// The serial is kept as the scanned-serial cache even when the card turns
    /// out not to be assignable, so the operator can see what was read.
    pub async fn scan(&mut self, adapter: &dyn ScanAdapter) -> Result<String, AssignmentError> {
        self.expect_state("scan", StateName::Input)?;

        let serial = match adapter.scan().await {
            ScanResult::Success { serial_number } => normalize(&serial_number),
            // Operator-initiated; nothing to report
            ScanResult::Failure { error: ScanError::Cancelled } => {
                return Err(AssignmentError::Scan(ScanError::Cancelled));
            }
            ScanResult::Failure { error } => return self.fail(error.into()),
        };
        if serial.is_empty() {
            return self.fail(ScanError::EmptySerial.into());
        }

        tracing::info!(transport = adapter.transport_name(), card = %serial, "card scanned");
        self.serial = serial.clone();
        self.scanned_serial = Some(serial.clone());

        match self.check_card(&serial).await {
            Ok(()) => {
                self.last_error = None;
                Ok(serial)
            }
            Err(e) => self.fail(e),
        }
    }

    /// Validates the card, then the customer, then asks the backend to send
    /// the OTP. Each step runs only if the one before it passed.
    pub async fn submit(&mut self, serial: &str, mobile: &str) -> Result<(), AssignmentError> {
        self.expect_state("submit", StateName::Input)?;

        let serial = normalize(serial);
        let mobile = normalize_mobile(mobile);
        self.serial = serial.clone();
        self.mobile = mobile.clone();

        if serial.is_empty() {
            return self.fail(AssignmentError::MissingSerial);
        }
        if mobile.is_empty() {
            return self.fail(AssignmentError::MissingMobile);
        }

        self.last_error = None;
        self.state = AssignmentState::Verifying;

        match self.initiate(serial, &mobile).await {
            Ok(pending) => {
                tracing::info!(card = %pending.card_serial, customer_id = pending.customer.id, "OTP dispatched");
                self.state = AssignmentState::AwaitingOtp(pending);
                Ok(())
            }
            Err(e) => {
                self.state = AssignmentState::Input;
                self.fail(e)
            }
        }
    }

    async fn check_card(&self, serial: &str) -> Result<(), AssignmentError> {
        let outcome = self
            .backend
            .validate_card(serial)
            .await
            .map_err(AssignmentError::transport(Step::ValidateCard))?;

        match outcome {
            ValidationOutcome::Assignable => Ok(()),
            ValidationOutcome::NotFound => Err(AssignmentError::CardNotFound(serial.to_string())),
            ValidationOutcome::AlreadyAssigned(reason) => Err(AssignmentError::CardUnavailable {
                serial: serial.to_string(),
                reason,
            }),
        }
    }

    async fn initiate(&self, serial: String, mobile: &str) -> Result<PendingAssignment, AssignmentError> {
        // Always re-validated: the card may have been taken since the last check
        self.check_card(&serial).await?;

        let customer = match self
            .backend
            .verify_customer(mobile)
            .await
            .map_err(AssignmentError::transport(Step::VerifyCustomer))?
        {
            CustomerOutcome::Eligible(customer) => customer,
            CustomerOutcome::NotFound => return Err(AssignmentError::CustomerNotFound(mobile.to_string())),
            CustomerOutcome::Ineligible(Ineligibility::NotRegistered) => {
                return Err(AssignmentError::CustomerNotRegistered);
            }
            CustomerOutcome::Ineligible(Ineligibility::Inactive) => {
                return Err(AssignmentError::CustomerInactive);
            }
        };

        match self
            .backend
            .initiate_assignment(&serial, mobile)
            .await
            .map_err(AssignmentError::transport(Step::InitiateAssignment))?
        {
            InitiateOutcome::Dispatched { .. } => Ok(PendingAssignment::new(serial, customer)),
            InitiateOutcome::Rejected(reason) => Err(AssignmentError::InitiationRejected(reason)),
        }
    }

    /// A wrong or expired OTP keeps the pending assignment; the operator can
    /// try again or resend.
    pub async fn submit_otp(&mut self, otp: &str) -> Result<(), AssignmentError> {
        let AssignmentState::AwaitingOtp(pending) = &self.state else {
            return Err(AssignmentError::InvalidTransition {
                action: "submit an OTP",
                state: self.state.name(),
            });
        };
        let pending = pending.clone();

        let otp = otp.trim();
        if otp.is_empty() {
            return self.fail(AssignmentError::MissingOtp);
        }

        let outcome = match self
            .backend
            .verify_assignment_otp(&pending.card_serial, pending.customer_mobile(), otp)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => return self.fail(AssignmentError::transport(Step::VerifyOtp)(e)),
        };

        match outcome {
            VerifyOutcome::Success(hashed_code) => {
                tracing::info!(card = %pending.card_serial, customer_id = pending.customer.id, "card assigned");
                self.last_error = None;
                self.state = AssignmentState::Success(CompletedAssignment {
                    card_serial: pending.card_serial,
                    customer: pending.customer,
                    hashed_code,
                });
                Ok(())
            }
            VerifyOutcome::InvalidOtp => self.fail(AssignmentError::InvalidOtp),
            VerifyOutcome::Expired => self.fail(AssignmentError::OtpExpired),
            VerifyOutcome::OtherFailure(reason) => self.fail(AssignmentError::OtpRejected(reason)),
        }
    }

    /// Asks for a fresh OTP. Returns `Ok(false)` without any network call
    /// while the cooldown is running.
    pub async fn resend(&mut self) -> Result<bool, AssignmentError> {
        let AssignmentState::AwaitingOtp(pending) = &self.state else {
            return Err(AssignmentError::InvalidTransition {
                action: "resend the OTP",
                state: self.state.name(),
            });
        };
        if pending.resend_cooldown_remaining > 0 {
            tracing::debug!(remaining = pending.resend_cooldown_remaining, "resend ignored during cooldown");
            return Ok(false);
        }
        let (serial, mobile) = (pending.card_serial.clone(), pending.customer_mobile().to_string());

        let outcome = match self.backend.resend_assignment_otp(&serial, &mobile).await {
            Ok(outcome) => outcome,
            Err(e) => return self.fail(AssignmentError::transport(Step::ResendOtp)(e)),
        };

        match outcome {
            ResendOutcome::Dispatched { .. } => {
                if let AssignmentState::AwaitingOtp(pending) = &mut self.state {
                    pending.redispatched();
                }
                tracing::info!(card = %serial, "OTP resent");
                self.last_error = None;
                Ok(true)
            }
            ResendOutcome::Rejected(reason) => self.fail(AssignmentError::ResendRejected(reason)),
        }
    }

    /// Abandons the pending OTP and returns to `Input`. The OTP already sent
    /// is left to expire on the backend.
    pub fn back(&mut self) -> Result<(), AssignmentError> {
        self.expect_state("go back", StateName::AwaitingOtp)?;
        tracing::info!(card = %self.serial, "pending assignment abandoned");
        self.state = AssignmentState::Input;
        self.last_error = None;
        Ok(())
    }

    /// Returns to a blank `Input`. Accepted from every state, including a
    /// `Verifying` left behind by a dropped submit.
    pub fn reset(&mut self) {
        self.state = AssignmentState::Input;
        self.serial.clear();
        self.mobile.clear();
        self.scanned_serial = None;
        self.last_error = None;
    }

    /// Advances the resend cooldown by one second; returns what remains
    pub fn tick(&mut self) -> u32 {
        match &mut self.state {
            AssignmentState::AwaitingOtp(pending) => pending.tick(),
            _ => 0,
        }
    }
}
