use serde::Serialize;

use crate::submission::RecordKind;

/// Offerings shown in the service picker. The submitted `service` value is
/// still stored as free text; this list only drives what forms offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceCategory {
    CustomSoftware,
    WebDevelopment,
    MobileDevelopment,
    BackendServices,
    CloudDeployment,
    TechnicalConsulting,
    Other,
}

impl ServiceCategory {
    pub const ALL: [ServiceCategory; 7] = [
        ServiceCategory::CustomSoftware,
        ServiceCategory::WebDevelopment,
        ServiceCategory::MobileDevelopment,
        ServiceCategory::BackendServices,
        ServiceCategory::CloudDeployment,
        ServiceCategory::TechnicalConsulting,
        ServiceCategory::Other,
    ];

    pub fn value(self) -> &'static str {
        match self {
            ServiceCategory::CustomSoftware => "custom-software",
            ServiceCategory::WebDevelopment => "web-development",
            ServiceCategory::MobileDevelopment => "mobile-development",
            ServiceCategory::BackendServices => "backend-services",
            ServiceCategory::CloudDeployment => "cloud-deployment",
            ServiceCategory::TechnicalConsulting => "technical-consulting",
            ServiceCategory::Other => "Other",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ServiceCategory::CustomSoftware => "Custom Software Development",
            ServiceCategory::WebDevelopment => "Web Development",
            ServiceCategory::MobileDevelopment => "Mobile Development",
            ServiceCategory::BackendServices => "Backend Services",
            ServiceCategory::CloudDeployment => "Cloud Deployment",
            ServiceCategory::TechnicalConsulting => "Technical Consulting",
            ServiceCategory::Other => "Other",
        }
    }

    pub fn from_value(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.value() == value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceOption {
    pub value: &'static str,
    pub label: &'static str,
}

/// Picker options for a form. Only the contact form offers `Other`.
pub fn offerings(kind: RecordKind) -> Vec<ServiceOption> {
    ServiceCategory::ALL
        .into_iter()
        .filter(|s| kind == RecordKind::Contact || *s != ServiceCategory::Other)
        .map(|s| ServiceOption {
            value: s.value(),
            label: s.label(),
        })
        .collect()
}
