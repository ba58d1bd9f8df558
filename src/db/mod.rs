use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    schema::Validated,
    submission::{Contact, NewContact, NewQuote, Quote},
};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Where submissions end up. Every create either stores the full record,
/// with its generated `id` and `created_at`, or stores nothing.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn create_quote(&self, quote: Validated<NewQuote>) -> Result<Quote, StorageError>;
    async fn get_quotes(&self) -> Result<Vec<Quote>, StorageError>;
    async fn create_contact(&self, contact: Validated<NewContact>)
        -> Result<Contact, StorageError>;
    async fn get_contacts(&self) -> Result<Vec<Contact>, StorageError>;
}

pub async fn connect_db(db_url: &str) -> Result<Pool<Postgres>, sqlx::Error> {
    let pool: Pool<Postgres> = match Pool::connect(db_url).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("Error connecting to the database: {}", e);
            return Err(e);
        }
    };
    Ok(pool)
}

pub async fn initialize_db(pool: &Pool<Postgres>) -> Result<(), StorageError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Database migrations applied");
    Ok(())
}

#[derive(Debug, Clone)]
pub struct PgStorage {
    pool: Pool<Postgres>,
}

impl PgStorage {
    pub fn new(pool: Pool<Postgres>) -> Self {
        PgStorage { pool }
    }
}

#[async_trait]
impl Storage for PgStorage {
    #[tracing::instrument(name = "Insert quote", skip_all)]
    async fn create_quote(&self, quote: Validated<NewQuote>) -> Result<Quote, StorageError> {
        let quote = quote.into_inner();
        let row = sqlx::query_as::<_, Quote>(
            "INSERT INTO quotes (first_name, last_name, email, phone, service, message)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING id, first_name, last_name, email, phone, service, message, created_at",
        )
        .bind(quote.first_name)
        .bind(quote.last_name)
        .bind(quote.email)
        .bind(quote.phone)
        .bind(quote.service)
        .bind(quote.message)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    #[tracing::instrument(name = "Fetch all quotes", skip_all)]
    async fn get_quotes(&self) -> Result<Vec<Quote>, StorageError> {
        let quotes = sqlx::query_as::<_, Quote>(
            "SELECT id, first_name, last_name, email, phone, service, message, created_at
             FROM quotes ORDER BY created_at, id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(quotes)
    }

    #[tracing::instrument(name = "Insert contact", skip_all)]
    async fn create_contact(
        &self,
        contact: Validated<NewContact>,
    ) -> Result<Contact, StorageError> {
        let contact = contact.into_inner();
        let row = sqlx::query_as::<_, Contact>(
            "INSERT INTO contacts (name, email, phone, service, message)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id, name, email, phone, service, message, created_at",
        )
        .bind(contact.name)
        .bind(contact.email)
        .bind(contact.phone)
        .bind(contact.service)
        .bind(contact.message)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    #[tracing::instrument(name = "Fetch all contacts", skip_all)]
    async fn get_contacts(&self) -> Result<Vec<Contact>, StorageError> {
        let contacts = sqlx::query_as::<_, Contact>(
            "SELECT id, name, email, phone, service, message, created_at
             FROM contacts ORDER BY created_at, id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(contacts)
    }
}

#[derive(Debug, Default)]
struct MemTables {
    quotes: Vec<Quote>,
    contacts: Vec<Contact>,
    last_created: Option<DateTime<Utc>>,
}

impl MemTables {
    // timestamps never go backwards, even if the wall clock does
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let stamp = match self.last_created {
            Some(last) if last > now => last,
            _ => now,
        };
        self.last_created = Some(stamp);
        stamp
    }
}

/// In-process storage for development runs and tests. Contents are lost on
/// restart.
#[derive(Debug, Default)]
pub struct MemStorage {
    tables: RwLock<MemTables>,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemStorage {
    async fn create_quote(&self, quote: Validated<NewQuote>) -> Result<Quote, StorageError> {
        let mut tables = self.tables.write().await;
        let created_at = tables.next_timestamp();
        let quote = Quote::from_new(Uuid::new_v4(), created_at, quote.into_inner());
        tables.quotes.push(quote.clone());
        Ok(quote)
    }

    async fn get_quotes(&self) -> Result<Vec<Quote>, StorageError> {
        Ok(self.tables.read().await.quotes.clone())
    }

    async fn create_contact(
        &self,
        contact: Validated<NewContact>,
    ) -> Result<Contact, StorageError> {
        let mut tables = self.tables.write().await;
        let created_at = tables.next_timestamp();
        let contact = Contact::from_new(Uuid::new_v4(), created_at, contact.into_inner());
        tables.contacts.push(contact.clone());
        Ok(contact)
    }

    async fn get_contacts(&self) -> Result<Vec<Contact>, StorageError> {
        Ok(self.tables.read().await.contacts.clone())
    }
}
