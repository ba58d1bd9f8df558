use std::ops::Deref;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::submission::{NewContact, NewQuote, RecordKind};

mod services;
pub use services::{offerings, ServiceCategory, ServiceOption};

pub const INVALID_EMAIL: &str = "Invalid email address";
pub const DISPOSABLE_EMAIL: &str = "Please use a valid, non-disposable email address";
pub const INVALID_PHONE: &str = "Please enter a valid phone number";

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_.\-]+@([A-Za-z0-9_\-]+\.)+[A-Za-z0-9_\-]{2,4}$")
        .expect("email pattern compiles")
});

// optional +91 / 91 country code, then a 10-digit mobile number starting 6-9
static PHONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\+?91[\-\s]?)?[6-9][0-9]{9}$").expect("phone pattern compiles")
});

static DISPOSABLE_DOMAINS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "mailinator.com",
        "guerrillamail.com",
        "10minutemail.com",
        "tempmail.com",
        "yopmail.com",
        "fakeinbox.com",
        "trashmail.com",
        "sharklasers.com",
        "getnada.com",
        "dispostable.com",
        "maildrop.cc",
        "spamgourmet.com",
        "throwawaymail.com",
        "mailcatch.com",
        "moakt.com",
        "dropmail.me",
        "inboxkitten.com",
        "mohmal.com",
        "tmail.com",
        "tempinbox.com",
        "mytemp.email",
        "discard.email",
        "trashmail.de",
        "temp-mail.org",
        "emailondeck.com",
        "anonmails.de",
        "burnermail.io",
        "inboxalias.com",
    ]
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationErrorKind {
    Required,
    InvalidFormat,
    DisposableDomain,
    MalformedBody,
}

/// A single user-correctable problem with a submitted field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub code: ValidationErrorKind,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, code: ValidationErrorKind, message: &str) -> Self {
        FieldError {
            field: field.to_string(),
            code,
            message: message.to_string(),
        }
    }

    /// The body could not be read as the insertable shape at all.
    pub fn malformed_body(detail: impl Into<String>) -> Self {
        FieldError {
            field: "body".to_string(),
            code: ValidationErrorKind::MalformedBody,
            message: detail.into(),
        }
    }
}

pub fn validate_non_empty(s: &str) -> Result<(), ValidationErrorKind> {
    if s.trim().is_empty() {
        return Err(ValidationErrorKind::Required);
    }
    Ok(())
}

pub fn validate_email(s: &str) -> Result<(), ValidationErrorKind> {
    if !EMAIL_RE.is_match(s) {
        return Err(ValidationErrorKind::InvalidFormat);
    }
    let domain = s
        .split_once('@')
        .map(|(_, domain)| domain.to_ascii_lowercase())
        .ok_or(ValidationErrorKind::InvalidFormat)?;
    if is_disposable_domain(&domain) {
        return Err(ValidationErrorKind::DisposableDomain);
    }
    Ok(())
}

pub fn validate_phone(s: &str) -> Result<(), ValidationErrorKind> {
    if !PHONE_RE.is_match(s) {
        return Err(ValidationErrorKind::InvalidFormat);
    }
    Ok(())
}

/// `domain` must already be lowercase. Any suffix match counts.
fn is_disposable_domain(domain: &str) -> bool {
    DISPOSABLE_DOMAINS.iter().any(|entry| domain.ends_with(entry))
}

#[derive(Debug, Clone, Copy)]
pub enum Check {
    /// Blank values fail with the given message. Without this check a blank
    /// value skips the remaining checks for the field.
    Required(&'static str),
    Email,
    Phone,
}

impl Check {
    fn apply(self, field: &str, value: &str) -> Result<(), FieldError> {
        match self {
            Check::Required(message) => validate_non_empty(value)
                .map_err(|kind| FieldError::new(field, kind, message)),
            Check::Email => validate_email(value).map_err(|kind| {
                let message = match kind {
                    ValidationErrorKind::DisposableDomain => DISPOSABLE_EMAIL,
                    _ => INVALID_EMAIL,
                };
                FieldError::new(field, kind, message)
            }),
            Check::Phone => {
                validate_phone(value).map_err(|kind| FieldError::new(field, kind, INVALID_PHONE))
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub field: &'static str,
    pub checks: &'static [Check],
}

/// A form whose fields are checked by a shared rule table. The same table is
/// applied by the browser-side controller and by the server handlers.
pub trait FormSchema: Sized {
    const KIND: RecordKind;
    /// Rules in field-declaration order.
    const RULES: &'static [FieldRule];

    fn field(&self, name: &str) -> Option<&str>;

    fn normalize(self) -> Self {
        self
    }
}

impl FormSchema for NewQuote {
    const KIND: RecordKind = RecordKind::Quote;
    const RULES: &'static [FieldRule] = &[
        FieldRule {
            field: "firstName",
            checks: &[Check::Required("First name is required")],
        },
        FieldRule {
            field: "lastName",
            checks: &[Check::Required("Last name is required")],
        },
        FieldRule {
            field: "email",
            checks: &[Check::Required("Email is required"), Check::Email],
        },
        // phone is free text and optional on a quote
        FieldRule {
            field: "phone",
            checks: &[],
        },
        FieldRule {
            field: "service",
            checks: &[Check::Required("Service is required")],
        },
        FieldRule {
            field: "message",
            checks: &[Check::Required("Message is required")],
        },
    ];

    fn field(&self, name: &str) -> Option<&str> {
        match name {
            "firstName" => Some(&self.first_name),
            "lastName" => Some(&self.last_name),
            "email" => Some(&self.email),
            "phone" => self.phone.as_deref(),
            "service" => Some(&self.service),
            "message" => Some(&self.message),
            _ => None,
        }
    }

    fn normalize(mut self) -> Self {
        if self.phone.as_deref().is_some_and(|p| p.trim().is_empty()) {
            self.phone = None;
        }
        self
    }
}

impl FormSchema for NewContact {
    const KIND: RecordKind = RecordKind::Contact;
    const RULES: &'static [FieldRule] = &[
        FieldRule {
            field: "name",
            checks: &[Check::Required("Name is required")],
        },
        FieldRule {
            field: "email",
            checks: &[Check::Required("Email is required"), Check::Email],
        },
        FieldRule {
            field: "phone",
            checks: &[Check::Required("Phone number is required"), Check::Phone],
        },
        FieldRule {
            field: "service",
            checks: &[Check::Required("Service is required")],
        },
        FieldRule {
            field: "message",
            checks: &[Check::Required("Message is required")],
        },
    ];

    fn field(&self, name: &str) -> Option<&str> {
        match name {
            "name" => Some(&self.name),
            "email" => Some(&self.email),
            "phone" => Some(&self.phone),
            "service" => Some(&self.service),
            "message" => Some(&self.message),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    /// Stop at the first failing field. Used by the form controller.
    FirstError,
    /// Report every failing field. Used by the server.
    CollectAll,
}

/// A payload that has passed its rule table. Only [`validate_record`] builds
/// one, so storage cannot be handed unchecked input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validated<T>(T);

impl<T> Validated<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for Validated<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

/// Runs every rule of `T` against `payload`. Each field reports at most its
/// first failing check.
pub fn validate_record<T: FormSchema>(
    payload: T,
    mode: ValidationMode,
) -> Result<Validated<T>, Vec<FieldError>> {
    let mut errors = Vec::new();

    for rule in T::RULES {
        let value = payload.field(rule.field).unwrap_or("");
        let required = rule.checks.iter().any(|c| matches!(c, Check::Required(_)));
        if !required && value.trim().is_empty() {
            continue;
        }

        if let Some(err) = rule
            .checks
            .iter()
            .find_map(|check| check.apply(rule.field, value).err())
        {
            errors.push(err);
            if mode == ValidationMode::FirstError {
                break;
            }
        }
    }

    if errors.is_empty() {
        Ok(Validated(payload.normalize()))
    } else {
        Err(errors)
    }
}
