use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    config::{ClientConfig, TransportTarget},
    handler::ApiResponse,
    schema::{validate_record, FieldError, FormSchema, ValidationMode},
    submission::RecordKind,
};

pub const RELAY_THANKS: &str = "Thank you! We'll contact you soon.";

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("server responded with status {status}")]
    Status { status: u16, message: Option<String> },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("submission rejected: {0}")]
    Rejected(String),

    #[error("submission was abandoned before it finished")]
    Cancelled,

    #[error("could not encode submission: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        TransportError::Network(e)
    }
}

/// What a successful delivery reports back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Receipt {
    pub message: Option<String>,
}

/// Sends one validated submission somewhere. Implementations make a single
/// attempt and never retry.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn deliver(&self, kind: RecordKind, body: Value) -> Result<Receipt, TransportError>;
}

pub struct HttpTransport {
    client: reqwest::Client,
    target: TransportTarget,
}

impl HttpTransport {
    pub fn new(target: TransportTarget) -> Self {
        HttpTransport {
            client: reqwest::Client::new(),
            target,
        }
    }

    pub fn target(&self) -> &TransportTarget {
        &self.target
    }

    fn url_for(&self, kind: RecordKind) -> String {
        match &self.target {
            TransportTarget::Backend { base_url } => {
                format!("{}{}", base_url.trim_end_matches('/'), kind.api_path())
            }
            TransportTarget::Relay { endpoint } => endpoint.clone(),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn deliver(&self, kind: RecordKind, body: Value) -> Result<Receipt, TransportError> {
        let url = self.url_for(kind);
        debug!(?kind, %url, "Posting submission");

        let response = self
            .client
            .post(&url)
            .header(ACCEPT, "application/json")
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ApiResponse<Value>>(&bytes)
                .ok()
                .and_then(|envelope| envelope.message);
            return Err(TransportError::Status {
                status: status.as_u16(),
                message,
            });
        }

        match self.target {
            TransportTarget::Backend { .. } => {
                let envelope: ApiResponse<Value> = serde_json::from_slice(&bytes)
                    .map_err(|e| TransportError::Malformed(e.to_string()))?;
                if !envelope.success {
                    return Err(TransportError::Rejected(envelope.message.unwrap_or_default()));
                }
                Ok(Receipt {
                    message: envelope.message,
                })
            }
            TransportTarget::Relay { .. } => {
                let reply: Value = serde_json::from_slice(&bytes)
                    .map_err(|e| TransportError::Malformed(e.to_string()))?;
                if reply.get("ok") == Some(&Value::Bool(false)) || reply.get("errors").is_some() {
                    return Err(TransportError::Rejected(reply.to_string()));
                }
                Ok(Receipt::default())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeVariant {
    Default,
    Destructive,
}

/// A user-visible message, shown once per submit attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub description: String,
    pub variant: NoticeVariant,
}

impl Notice {
    fn success(description: impl Into<String>) -> Self {
        Notice {
            title: "Success!".to_string(),
            description: description.into(),
            variant: NoticeVariant::Default,
        }
    }

    fn invalid(error: &FieldError) -> Self {
        Notice {
            title: "Validation Error".to_string(),
            description: error.message.clone(),
            variant: NoticeVariant::Destructive,
        }
    }

    fn failed(kind: RecordKind) -> Self {
        let description = match kind {
            RecordKind::Quote => "Failed to submit quote request. Please try again.",
            RecordKind::Contact => "Failed to send message. Please try again.",
        };
        Notice {
            title: "Error".to_string(),
            description: description.to_string(),
            variant: NoticeVariant::Destructive,
        }
    }
}

#[derive(Debug)]
pub enum FormState {
    Idle,
    Validating,
    Invalid(FieldError),
    Submitting,
    Success { message: Option<String> },
    /// The transport error is kept for diagnostics; users only see a generic
    /// notice.
    Failed(TransportError),
}

/// Marks an in-flight submission as failed if its future is dropped before
/// the transport answers.
struct InFlight<'a> {
    state: &'a mut FormState,
    settled: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            warn!("Submission dropped while in flight");
            *self.state = FormState::Failed(TransportError::Cancelled);
        }
    }
}

/// Drives one form instance: validate, send once, report.
///
/// The transport is fixed at construction so a form never mixes backends.
pub struct FormController<T, X> {
    draft: T,
    state: FormState,
    transport: X,
    timeout: Duration,
}

impl<T> FormController<T, HttpTransport>
where
    T: FormSchema + Clone + Default + Serialize + Send,
{
    pub fn from_config(config: &ClientConfig) -> Self {
        let transport = HttpTransport::new(config.target_for(T::KIND));
        FormController::new(transport, config.submit_timeout)
    }
}

impl<T, X> FormController<T, X>
where
    T: FormSchema + Clone + Default + Serialize + Send,
    X: Transport,
{
    pub fn new(transport: X, timeout: Duration) -> Self {
        FormController {
            draft: T::default(),
            state: FormState::Idle,
            transport,
            timeout,
        }
    }

    pub fn state(&self) -> &FormState {
        &self.state
    }

    pub fn draft(&self) -> &T {
        &self.draft
    }

    pub fn transport(&self) -> &X {
        &self.transport
    }

    /// False while a submission is in flight.
    pub fn can_submit(&self) -> bool {
        !matches!(self.state, FormState::Validating | FormState::Submitting)
    }

    /// Applies a user edit. Any settled outcome is cleared back to `Idle`.
    pub fn edit(&mut self, change: impl FnOnce(&mut T)) {
        change(&mut self.draft);
        if matches!(
            self.state,
            FormState::Invalid(_) | FormState::Failed(_) | FormState::Success { .. }
        ) {
            self.state = FormState::Idle;
        }
    }

    /// Returns `None` when the submit is ignored because one is already in
    /// flight.
    pub async fn submit(&mut self) -> Option<Notice> {
        if !self.can_submit() {
            let kind = T::KIND;
            debug!(?kind, "Submit ignored while another is in flight");
            return None;
        }

        self.state = FormState::Validating;
        let validated = match validate_record(self.draft.clone(), ValidationMode::FirstError) {
            Ok(validated) => validated,
            Err(errors) => {
                let first = errors.into_iter().next().unwrap_or_else(|| {
                    FieldError::malformed_body("Please fill all required fields correctly.")
                });
                let notice = Notice::invalid(&first);
                self.state = FormState::Invalid(first);
                return Some(notice);
            }
        };

        self.state = FormState::Submitting;
        let body = match serde_json::to_value(&*validated) {
            Ok(body) => body,
            Err(e) => return Some(self.fail(TransportError::from(e))),
        };

        let outcome = {
            let mut in_flight = InFlight {
                state: &mut self.state,
                settled: false,
            };
            let delivery = self.transport.deliver(T::KIND, body);
            let outcome = match tokio::time::timeout(self.timeout, delivery).await {
                Ok(result) => result,
                Err(_) => Err(TransportError::Timeout(self.timeout)),
            };
            in_flight.settled = true;
            outcome
        };

        match outcome {
            Ok(receipt) => {
                self.draft = T::default();
                let description = receipt
                    .message
                    .clone()
                    .unwrap_or_else(|| RELAY_THANKS.to_string());
                let notice = Notice::success(description);
                self.state = FormState::Success {
                    message: receipt.message,
                };
                Some(notice)
            }
            Err(e) => Some(self.fail(e)),
        }
    }

    fn fail(&mut self, error: TransportError) -> Notice {
        let kind = T::KIND;
        warn!(?kind, "Submission failed: {}", error);
        self.state = FormState::Failed(error);
        Notice::failed(T::KIND)
    }
}
