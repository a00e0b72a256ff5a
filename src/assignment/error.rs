use std::fmt;

use crate::{backend::BackendError, scan::ScanError};

use super::state::StateName;

/// Backend step a transport failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    ValidateCard,
    VerifyCustomer,
    InitiateAssignment,
    VerifyOtp,
    ResendOtp,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Step::ValidateCard => "card validation",
            Step::VerifyCustomer => "customer verification",
            Step::InitiateAssignment => "assignment request",
            Step::VerifyOtp => "OTP verification",
            Step::ResendOtp => "OTP resend",
        })
    }
}

/// Which kind of remediation an error calls for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Validation,
    Eligibility,
    Initiation,
    Otp,
    Transport,
    Scan,
    Protocol,
}

/// Error surfaced to the operator for the current attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssignmentError {
    #[error("card serial is required")]
    MissingSerial,
    #[error("customer mobile number is required")]
    MissingMobile,
    #[error("OTP is required")]
    MissingOtp,

    #[error("card {0} was not found")]
    CardNotFound(String),
    #[error("card {serial} cannot be assigned: {reason}")]
    CardUnavailable { serial: String, reason: String },

    #[error("no customer found with mobile number {0}")]
    CustomerNotFound(String),
    #[error("customer is not registered; complete registration before assigning a card")]
    CustomerNotRegistered,
    #[error("customer account is inactive; reactivate it before assigning a card")]
    CustomerInactive,

    #[error("assignment rejected: {0}")]
    InitiationRejected(String),

    #[error("the OTP entered is incorrect")]
    InvalidOtp,
    #[error("the OTP has expired; request a new one")]
    OtpExpired,
    #[error("OTP verification failed: {0}")]
    OtpRejected(String),
    #[error("could not resend the OTP: {0}")]
    ResendRejected(String),

    #[error("{step} failed: {source}")]
    Transport {
        step: Step,
        #[source]
        source: BackendError,
    },

    #[error("{0}")]
    Scan(#[from] ScanError),

    #[error("cannot {action} while {state}")]
    InvalidTransition { action: &'static str, state: StateName },
}

impl AssignmentError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MissingSerial | Self::MissingMobile | Self::MissingOtp => ErrorCategory::Input,
            Self::CardNotFound(_) | Self::CardUnavailable { .. } => ErrorCategory::Validation,
            Self::CustomerNotFound(_) | Self::CustomerNotRegistered | Self::CustomerInactive => {
                ErrorCategory::Eligibility
            }
            Self::InitiationRejected(_) => ErrorCategory::Initiation,
            Self::InvalidOtp | Self::OtpExpired | Self::OtpRejected(_) | Self::ResendRejected(_) => {
                ErrorCategory::Otp
            }
            Self::Transport { .. } => ErrorCategory::Transport,
            Self::Scan(_) => ErrorCategory::Scan,
            Self::InvalidTransition { .. } => ErrorCategory::Protocol,
        }
    }

    pub(crate) fn transport(step: Step) -> impl FnOnce(BackendError) -> Self {
        move |source| Self::Transport { step, source }
    }
}
