use std::{env, time::Duration};

use crate::submission::RecordKind;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Selects how the server logs when `RUST_LOG` is not set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    /// `production` / `prod`; anything else is development.
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "production" | "prod" => AppEnv::Production,
            _ => AppEnv::Development,
        }
    }

    pub fn default_log_filter(self) -> &'static str {
        match self {
            AppEnv::Development => "formgate=debug,info",
            AppEnv::Production => "info",
        }
    }

    /// Colour codes only on a developer's terminal.
    pub fn ansi_logs(self) -> bool {
        self == AppEnv::Development
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres { database_url: String },
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub env: AppEnv,
    pub http_port: u16,
    pub storage: StorageBackend,
}

/// Where a form's submissions are sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportTarget {
    /// This service's own `/api/*` endpoints under `base_url`.
    Backend { base_url: String },
    /// A third-party form relay that accepts the same JSON body.
    Relay { endpoint: String },
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_base_url: String,
    /// Single switch for the contact form. Quotes always go to the backend.
    pub contact_target: TransportTarget,
    pub submit_timeout: Duration,
}

/// Entry point to load configuration
pub fn load() -> Result<Config> {
    load_dotenv()?;
    Config::from_env()
}

/// Load .env base, then .env.{APP_ENV}
fn load_dotenv() -> Result<()> {
    let _ = dotenvy::dotenv();

    let env_name = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

    let filename = format!(".env.{}", env_name);
    let _ = dotenvy::from_filename(&filename);

    Ok(())
}

fn var(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key).filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env_str = var(&lookup, "APP_ENV").unwrap_or_else(|| "development".to_string());
        let env = AppEnv::from_name(&env_str);

        let http_port: u16 = var(&lookup, "HTTP_PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse()
            .map_err(|_| "HTTP_PORT must be a valid u16")?;

        let database_url = var(&lookup, "DATABASE_URL");
        let backend = var(&lookup, "STORAGE_BACKEND").map(|b| b.to_lowercase());
        let storage = match (backend.as_deref(), database_url) {
            (Some("memory"), _) => StorageBackend::Memory,
            (Some("postgres") | None, Some(database_url)) => {
                StorageBackend::Postgres { database_url }
            }
            (Some("postgres"), None) => {
                return Err("DATABASE_URL env var is required for the postgres backend".into())
            }
            (None, None) => StorageBackend::Memory,
            (Some(other), _) => {
                return Err(format!("STORAGE_BACKEND must be postgres or memory, got {other}").into())
            }
        };

        Ok(Self {
            env,
            http_port,
            storage,
        })
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_base_url = var(&lookup, "API_BASE_URL")
            .unwrap_or_else(|| "http://localhost:3000".to_string())
            .trim_end_matches('/')
            .to_string();

        let transport = var(&lookup, "CONTACT_TRANSPORT")
            .unwrap_or_else(|| "backend".to_string())
            .to_lowercase();
        let contact_target = match transport.as_str() {
            "backend" => TransportTarget::Backend {
                base_url: api_base_url.clone(),
            },
            "relay" => TransportTarget::Relay {
                endpoint: var(&lookup, "FORM_RELAY_URL")
                    .ok_or("FORM_RELAY_URL env var is required when CONTACT_TRANSPORT=relay")?,
            },
            other => {
                return Err(format!("CONTACT_TRANSPORT must be backend or relay, got {other}").into())
            }
        };

        let timeout_secs: u64 = var(&lookup, "SUBMIT_TIMEOUT_SECS")
            .unwrap_or_else(|| "15".to_string())
            .parse()
            .map_err(|_| "SUBMIT_TIMEOUT_SECS must be a whole number of seconds")?;

        Ok(Self {
            api_base_url,
            contact_target,
            submit_timeout: Duration::from_secs(timeout_secs),
        })
    }

    pub fn target_for(&self, kind: RecordKind) -> TransportTarget {
        match kind {
            RecordKind::Quote => TransportTarget::Backend {
                base_url: self.api_base_url.clone(),
            },
            RecordKind::Contact => self.contact_target.clone(),
        }
    }
}
