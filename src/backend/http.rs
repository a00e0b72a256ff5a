use anyhow::Result;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;

use super::{
    AssignmentBackend, BackendError, CustomerOutcome, HashedCode, Ineligibility, InitiateOutcome,
    ResendOutcome, ValidationOutcome, VerifyOutcome,
};
use crate::wire::{
    self, AssignmentRequest, CustomerResponse, ErrorBody, HashedCodeResponse, MessageResponse,
    ValidateCardRequest, ValidateCardResponse, VerifyCustomerRequest, VerifyOtpRequest,
};

/// Either the success body or the backend's `{code, message}` error
enum Reply<T> {
    Ok(T),
    Err { status: u16, body: ErrorBody },
}

/// `AssignmentBackend` over the JSON HTTP routes of the reference backend
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<Reply<T>, BackendError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status();
        let bytes = resp.bytes().await.map_err(transport_error)?;
        tracing::debug!(%url, status = status.as_u16(), "backend replied");

        if status.is_success() {
            return serde_json::from_slice(&bytes)
                .map(Reply::Ok)
                .map_err(|e| BackendError::UnexpectedResponse {
                    status: status.as_u16(),
                    message: format!("invalid body: {}", e),
                });
        }

        match serde_json::from_slice::<ErrorBody>(&bytes) {
            Ok(body) => Ok(Reply::Err { status: status.as_u16(), body }),
            Err(_) => Err(BackendError::UnexpectedResponse {
                status: status.as_u16(),
                message: String::from_utf8_lossy(&bytes).trim().to_string(),
            }),
        }
    }
}

fn transport_error(e: reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::Timeout
    } else {
        BackendError::Network(e.to_string())
    }
}

fn unexpected(status: u16, body: ErrorBody) -> BackendError {
    BackendError::UnexpectedResponse {
        status,
        message: format!("{}: {}", body.code, body.message),
    }
}

#[async_trait]
impl AssignmentBackend for HttpBackend {
    async fn validate_card(&self, serial: &str) -> Result<ValidationOutcome, BackendError> {
        let req = ValidateCardRequest { serial_number: serial.to_string() };
        match self.post::<_, ValidateCardResponse>("/api/cards/validate", &req).await? {
            Reply::Ok(resp) => Ok(resp.into()),
            Reply::Err { body, .. } if body.code == wire::CARD_NOT_FOUND => Ok(ValidationOutcome::NotFound),
            Reply::Err { status, body } => Err(unexpected(status, body)),
        }
    }

    async fn verify_customer(&self, mobile: &str) -> Result<CustomerOutcome, BackendError> {
        let req = VerifyCustomerRequest { mobile_number: mobile.to_string() };
        match self.post::<_, CustomerResponse>("/api/customers/verify", &req).await? {
            Reply::Ok(resp) => Ok(CustomerOutcome::from_response(mobile, resp)),
            Reply::Err { status: 404, .. } => Ok(CustomerOutcome::NotFound),
            Reply::Err { body, .. } if body.code == wire::CUSTOMER_NOT_REGISTERED => {
                Ok(CustomerOutcome::Ineligible(Ineligibility::NotRegistered))
            }
            Reply::Err { body, .. } if body.code == wire::CUSTOMER_INACTIVE => {
                Ok(CustomerOutcome::Ineligible(Ineligibility::Inactive))
            }
            Reply::Err { status, body } => Err(unexpected(status, body)),
        }
    }

    async fn initiate_assignment(
        &self,
        card_serial: &str,
        customer_mobile: &str,
    ) -> Result<InitiateOutcome, BackendError> {
        let req = AssignmentRequest {
            card_serial: card_serial.to_string(),
            customer_mobile: customer_mobile.to_string(),
        };
        // Any error reply is final for this attempt, including a 5xx: the OTP
        // may or may not have gone out.
        match self.post::<_, MessageResponse>("/api/assignments/initiate", &req).await? {
            Reply::Ok(resp) => Ok(InitiateOutcome::Dispatched { message: resp.message }),
            Reply::Err { body, .. } => Ok(InitiateOutcome::Rejected(body.message)),
        }
    }

    async fn verify_assignment_otp(
        &self,
        card_serial: &str,
        customer_mobile: &str,
        otp: &str,
    ) -> Result<VerifyOutcome, BackendError> {
        let req = VerifyOtpRequest {
            card_serial: card_serial.to_string(),
            customer_mobile: customer_mobile.to_string(),
            otp: otp.to_string(),
        };
        match self.post::<_, HashedCodeResponse>("/api/assignments/verify-otp", &req).await? {
            Reply::Ok(resp) => Ok(match HashedCode::new(resp.hashed_code) {
                Some(code) => VerifyOutcome::Success(code),
                None => VerifyOutcome::OtherFailure("backend returned an empty hashed code".to_string()),
            }),
            Reply::Err { body, .. } if body.code == wire::INVALID_OTP => Ok(VerifyOutcome::InvalidOtp),
            Reply::Err { body, .. } if body.code == wire::OTP_EXPIRED => Ok(VerifyOutcome::Expired),
            Reply::Err { body, .. } => Ok(VerifyOutcome::OtherFailure(body.message)),
        }
    }

    async fn resend_assignment_otp(
        &self,
        card_serial: &str,
        customer_mobile: &str,
    ) -> Result<ResendOutcome, BackendError> {
        let req = AssignmentRequest {
            card_serial: card_serial.to_string(),
            customer_mobile: customer_mobile.to_string(),
        };
        match self.post::<_, MessageResponse>("/api/assignments/resend-otp", &req).await? {
            Reply::Ok(resp) => Ok(ResendOutcome::Dispatched { message: resp.message }),
            Reply::Err { body, .. } => Ok(ResendOutcome::Rejected(body.message)),
        }
    }
}
