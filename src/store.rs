//! Record storage.
//!
//! The pipeline and the renderer only ever talk to a [`RecordStore`]: insert
//! one record, list them all by date, disconnect. Two backends:
//!
//! - [`MongoStore`]: the production store. Records live in a single
//!   collection whose documents are the camelCase form of
//!   [`GeneratedImageRecord`].
//! - [`MemoryStore`]: a `Vec` behind a mutex with the same validation and
//!   ordering, for tests and dry runs.

use crate::types::{GeneratedImageRecord, MissingField, SortOrder};
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::options::FindOptions;
use mongodb::{Client, Collection};
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),
    #[error("Invalid record: {0}")]
    Validation(#[from] MissingField),
}

/// Persistence boundary for generated image records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Validate and insert a record. Nothing is written if validation fails.
    async fn insert(&self, record: GeneratedImageRecord)
    -> Result<GeneratedImageRecord, StoreError>;

    /// Every record, sorted by `date` in the given direction.
    async fn list_sorted_by_date(
        &self,
        order: SortOrder,
    ) -> Result<Vec<GeneratedImageRecord>, StoreError>;

    /// Release the connection. Safe to call on the failure path.
    async fn disconnect(&self) -> Result<(), StoreError>;
}

// =============================================================================
// MongoDB
// =============================================================================

pub struct MongoStore {
    client: Client,
    collection: Collection<GeneratedImageRecord>,
}

impl MongoStore {
    /// Connect and verify the server answers a `ping`.
    ///
    /// The driver connects lazily, so without the ping an unreachable server
    /// would only surface at the first insert.
    pub async fn connect(uri: &str, database: &str, collection: &str) -> Result<Self, StoreError> {
        let client = Client::with_uri_str(uri).await?;
        let db = client.database(database);
        db.run_command(doc! { "ping": 1 }, None).await?;
        info!(database, collection, "Connected to MongoDB");
        Ok(Self {
            collection: db.collection(collection),
            client,
        })
    }
}

#[async_trait]
impl RecordStore for MongoStore {
    async fn insert(
        &self,
        record: GeneratedImageRecord,
    ) -> Result<GeneratedImageRecord, StoreError> {
        record.validate()?;
        let result = self.collection.insert_one(&record, None).await?;
        debug!(id = %result.inserted_id, "Inserted record");
        Ok(record)
    }

    async fn list_sorted_by_date(
        &self,
        order: SortOrder,
    ) -> Result<Vec<GeneratedImageRecord>, StoreError> {
        let options = FindOptions::builder()
            .sort(doc! { "date": order.as_mongo() })
            .build();
        let cursor = self.collection.find(None, options).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn disconnect(&self) -> Result<(), StoreError> {
        self.client.clone().shutdown().await;
        debug!("Disconnected from MongoDB");
        Ok(())
    }
}

// =============================================================================
// In-memory
// =============================================================================

/// In-process store with the same contract as [`MongoStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<GeneratedImageRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populated store, in insertion order.
    pub fn with_records(records: impl IntoIterator<Item = GeneratedImageRecord>) -> Self {
        Self {
            records: Mutex::new(records.into_iter().collect()),
        }
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<GeneratedImageRecord>> {
        // A panic while holding the lock cannot leave a half-written record.
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn insert(
        &self,
        record: GeneratedImageRecord,
    ) -> Result<GeneratedImageRecord, StoreError> {
        record.validate()?;
        self.lock().push(record.clone());
        Ok(record)
    }

    async fn list_sorted_by_date(
        &self,
        order: SortOrder,
    ) -> Result<Vec<GeneratedImageRecord>, StoreError> {
        let mut records = self.lock().clone();
        match order {
            SortOrder::Ascending => records.sort_by(|a, b| a.date.cmp(&b.date)),
            SortOrder::Descending => records.sort_by(|a, b| b.date.cmp(&a.date)),
        }
        Ok(records)
    }

    async fn disconnect(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
