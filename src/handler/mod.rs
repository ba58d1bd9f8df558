use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Json, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::{
    db::Storage,
    schema::{
        offerings, validate_record, FieldError, ServiceCategory, ServiceOption, ValidationErrorKind,
        ValidationMode,
    },
    submission::{Contact, NewContact, NewQuote, Quote, RecordKind},
};

pub const QUOTE_CREATED: &str = "Quote request sent successfully! We'll get back to you soon.";
pub const CONTACT_CREATED: &str =
    "Message sent successfully! We'll respond as soon as possible.";
pub const INVALID_FORM_DATA: &str = "Invalid form data";

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
}

impl AppState {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        AppState { storage }
    }
}

/// Uniform wrapper for every JSON response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
}

impl<T> ApiResponse<T> {
    pub fn created(message: &str, data: T) -> Self {
        ApiResponse {
            success: true,
            message: Some(message.to_string()),
            data: Some(data),
            errors: None,
        }
    }

    pub fn listing(data: T) -> Self {
        ApiResponse {
            success: true,
            message: None,
            data: Some(data),
            errors: None,
        }
    }
}

#[derive(Debug)]
pub enum AppError {
    BadRequest(Vec<FieldError>),
    /// `public` goes to the caller, `detail` only to the log.
    InternalServerError { public: &'static str, detail: String },
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::BadRequest(errors) => (
                StatusCode::BAD_REQUEST,
                ApiResponse::<()> {
                    success: false,
                    message: Some(INVALID_FORM_DATA.to_string()),
                    data: None,
                    errors: Some(errors),
                },
            ),
            AppError::InternalServerError { public, detail } => {
                error!("Internal Server Error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiResponse::<()> {
                        success: false,
                        message: Some(public.to_string()),
                        data: None,
                        errors: None,
                    },
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

fn reject_body(kind: RecordKind, rejection: JsonRejection) -> AppError {
    warn!(?kind, "Rejected malformed submission: {}", rejection.body_text());
    AppError::BadRequest(vec![FieldError::malformed_body(rejection.body_text())])
}

fn note_unlisted_service(kind: RecordKind, service: &str) {
    if ServiceCategory::from_value(service).is_none() {
        debug!(?kind, service, "Submission names a service outside the catalogue");
    }
}

pub async fn submit_quote(
    State(state): State<AppState>,
    payload: Result<Json<NewQuote>, JsonRejection>,
) -> Result<Json<ApiResponse<Quote>>, AppError> {
    let Json(quote) = payload.map_err(|e| reject_body(RecordKind::Quote, e))?;
    let quote = validate_record(quote, ValidationMode::CollectAll).map_err(|errors| {
        info!(count = errors.len(), "Quote failed validation");
        AppError::BadRequest(errors)
    })?;
    note_unlisted_service(RecordKind::Quote, &quote.service);

    let quote = state
        .storage
        .create_quote(quote)
        .await
        .map_err(|e| AppError::InternalServerError {
            public: "Failed to submit quote request",
            detail: format!("Failed to create quote: {}", e),
        })?;

    info!(id = %quote.id, "Quote request stored");
    Ok(Json(ApiResponse::created(QUOTE_CREATED, quote)))
}

pub async fn list_quotes(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Quote>>>, AppError> {
    let quotes = state
        .storage
        .get_quotes()
        .await
        .map_err(|e| AppError::InternalServerError {
            public: "Failed to fetch quotes",
            detail: format!("Failed to list quotes: {}", e),
        })?;
    Ok(Json(ApiResponse::listing(quotes)))
}

pub async fn submit_contact(
    State(state): State<AppState>,
    payload: Result<Json<NewContact>, JsonRejection>,
) -> Result<Json<ApiResponse<Contact>>, AppError> {
    let Json(contact) = payload.map_err(|e| reject_body(RecordKind::Contact, e))?;
    let contact = validate_record(contact, ValidationMode::CollectAll).map_err(|errors| {
        info!(count = errors.len(), "Contact message failed validation");
        AppError::BadRequest(errors)
    })?;
    note_unlisted_service(RecordKind::Contact, &contact.service);

    let contact = state
        .storage
        .create_contact(contact)
        .await
        .map_err(|e| AppError::InternalServerError {
            public: "Failed to send message",
            detail: format!("Failed to create contact: {}", e),
        })?;

    info!(id = %contact.id, "Contact message stored");
    Ok(Json(ApiResponse::created(CONTACT_CREATED, contact)))
}

pub async fn list_contacts(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Contact>>>, AppError> {
    let contacts = state
        .storage
        .get_contacts()
        .await
        .map_err(|e| AppError::InternalServerError {
            public: "Failed to fetch contacts",
            detail: format!("Failed to list contacts: {}", e),
        })?;
    Ok(Json(ApiResponse::listing(contacts)))
}

#[derive(Debug, Deserialize)]
pub struct ServicesQuery {
    form: Option<RecordKind>,
}

pub async fn list_services(
    query: Result<Query<ServicesQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<ServiceOption>>>, AppError> {
    let Query(query) = query.map_err(|e| {
        warn!("Rejected service listing query: {}", e.body_text());
        AppError::BadRequest(vec![FieldError::new(
            "form",
            ValidationErrorKind::InvalidFormat,
            "Form must be quote or contact",
        )])
    })?;
    let kind = query.form.unwrap_or(RecordKind::Contact);
    Ok(Json(ApiResponse::listing(offerings(kind))))
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "Status: OK" }))
        .route(RecordKind::Quote.api_path(), get(list_quotes).post(submit_quote))
        .route(
            RecordKind::Contact.api_path(),
            get(list_contacts).post(submit_contact),
        )
        .route("/api/services", get(list_services))
        .with_state(state)
}
