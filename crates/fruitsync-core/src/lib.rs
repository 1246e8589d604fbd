//! fruitsync core - domain types, error handling, configuration and the
//! reconciliation pass.
//!
//! The [`Reconciler`] is generic over two traits so it can be driven by the
//! real HTTP client and PostgreSQL repository, or by in-memory fakes:
//!
//! - [`FruitSource`] - provides the upstream catalog
//! - [`FruitStore`] - upsert-by-key persistence and the audit log

pub mod config;
pub mod error;
pub mod models;
pub mod reconcile;
pub mod sync;
pub mod traits;

pub use config::{
    default_config_path, load_config, DbConfig, FileConfig, HttpConfig, SourceConfig,
};
pub use error::AppError;
pub use models::{
    DatabaseStats, FetchedCatalog, FruitRecord, NewRunLog, Nutrition, RunLog, UpsertOutcome,
};
pub use reconcile::Reconciler;
pub use sync::{
    join_errors, Entity, EntityCounts, RecordOutcome, RunCounters, RunStatus, RunSummary,
    StepResult,
};
pub use traits::{FruitSource, FruitStore};
