//! Collaborator seams for the reconciler.
//!
//! - [`FruitSource`] abstracts the upstream catalog (e.g. the Fruityvice API)
//! - [`FruitStore`] abstracts persistence (e.g. PostgreSQL)

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::{FetchedCatalog, FruitRecord, NewRunLog, Nutrition, UpsertOutcome};

/// Provides the full fruit catalog.
#[async_trait]
pub trait FruitSource: Send + Sync {
    /// Fetches every fruit the upstream knows about.
    ///
    /// A non-success HTTP status is not an error: it is reported through
    /// [`FetchedCatalog::http_status`]. Errors are reserved for failures that
    /// leave no data to process.
    async fn fetch_all(&self) -> Result<FetchedCatalog, AppError>;
}

/// Upsert-by-key persistence for the catalog entities and the audit log.
///
/// Every method commits its own change before returning.
#[async_trait]
pub trait FruitStore: Send + Sync {
    async fn upsert_genus(&self, name: &str) -> Result<UpsertOutcome, AppError>;

    async fn upsert_family(&self, name: &str) -> Result<UpsertOutcome, AppError>;

    async fn upsert_order(&self, name: &str) -> Result<UpsertOutcome, AppError>;

    /// Creates or overwrites the nutrition facts for `fruit_id`.
    async fn upsert_nutrition(
        &self,
        fruit_id: i64,
        nutrition: &Nutrition,
    ) -> Result<UpsertOutcome, AppError>;

    /// Creates or overwrites a fruit, linking it to the genus, family and
    /// order named in the record and to its nutrition row when one exists.
    async fn upsert_fruit(&self, record: &FruitRecord) -> Result<UpsertOutcome, AppError>;

    /// Appends one audit row and returns its id.
    async fn append_log(&self, log: &NewRunLog) -> Result<uuid::Uuid, AppError>;
}
