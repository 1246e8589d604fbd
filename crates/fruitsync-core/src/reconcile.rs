//! The reconciliation pass: fetch the catalog, upsert every record, write the audit row.
//!
//! The run is strictly sequential. Each upsert commits on its own, so a run
//! that dies halfway leaves the rows it already wrote in place; the audit row
//! is only written once every record has been visited.

use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::error::AppError;
use crate::models::{FruitRecord, NewRunLog};
use crate::sync::{
    join_errors, Entity, RecordOutcome, RunCounters, RunStatus, RunSummary, StepResult, HTTP_OK,
};
use crate::traits::{FruitSource, FruitStore};

/// Synchronizes a [`FruitStore`] with a [`FruitSource`].
///
/// # Examples
///
/// ```ignore
/// use fruitsync_core::Reconciler;
///
/// let reconciler = Reconciler::new(client, repo);
/// let summary = reconciler.run().await?;
/// println!("{} ({} errors)", summary.status, summary.error_message);
/// ```
pub struct Reconciler<S, D> {
    source: S,
    store: D,
}

impl<S, D> Reconciler<S, D>
where
    S: FruitSource,
    D: FruitStore,
{
    pub fn new(source: S, store: D) -> Self {
        Self { source, store }
    }

    #[cfg(test)]
    pub(crate) fn store(&self) -> &D {
        &self.store
    }

    /// Runs one full pass.
    ///
    /// Only a failed fetch is returned as `Err`; in that case no audit row is
    /// written. A failed audit write is reported through
    /// [`RunSummary::logged`].
    pub async fn run(&self) -> Result<RunSummary, AppError> {
        info!("Fetching fruit catalog...");
        let catalog = self.source.fetch_all().await?;

        if catalog.http_status != HTTP_OK {
            warn!(
                "Catalog fetch returned HTTP {}, continuing with {} records",
                catalog.http_status,
                catalog.records.len()
            );
        }

        let total = catalog.records.len();
        info!("Processing {} fruit records", total);

        let mut counters = RunCounters::new();
        let mut errors = Vec::new();
        let mut unexpected = 0;

        for (i, raw) in catalog.records.into_iter().enumerate() {
            let outcome = self.process_record(i, raw).await;
            if outcome.unexpected {
                unexpected += 1;
            }
            counters += outcome.counters;
            errors.extend(outcome.errors);
        }

        let status = RunStatus::resolve(catalog.http_status, unexpected);
        let error_message = join_errors(&errors);

        info!(
            "Reconciliation finished with status {}: {} inserted, {} updated, {} errors",
            status,
            counters.total_inserted(),
            counters.total_updated(),
            errors.len()
        );

        let log = NewRunLog::new(counters, status, error_message.clone());
        let log_id = match self.store.append_log(&log).await {
            Ok(id) => Some(id),
            Err(e) => {
                error!("Failed to write run log: {}", e);
                None
            }
        };

        Ok(RunSummary {
            counters,
            status,
            error_message,
            records: total,
            log_id,
        })
    }

    /// Runs the five upsert steps for one raw catalog entry.
    ///
    /// `position` is zero-based and only used in messages.
    pub async fn process_record(&self, position: usize, raw: Value) -> RecordOutcome {
        let record = match FruitRecord::from_value(raw) {
            Ok(record) => record,
            Err(e) => {
                error!("Record {} skipped: {}", position + 1, e);
                return RecordOutcome::unexpected(format!("record {}: {}", position + 1, e));
            }
        };

        debug!("Reconciling fruit {} ({})", record.id, record.name);

        let genus = StepResult::from_upsert(
            Entity::Genus,
            record.id,
            self.store.upsert_genus(&record.genus).await,
        );
        let family = StepResult::from_upsert(
            Entity::Family,
            record.id,
            self.store.upsert_family(&record.family).await,
        );
        let order = StepResult::from_upsert(
            Entity::Order,
            record.id,
            self.store.upsert_order(&record.order).await,
        );
        let nutrition = match &record.nutritions {
            Some(nutrition) => StepResult::from_upsert(
                Entity::Nutrition,
                record.id,
                self.store.upsert_nutrition(record.id, nutrition).await,
            ),
            None => StepResult::skipped(Entity::Nutrition),
        };
        let fruit = StepResult::from_upsert(
            Entity::Fruit,
            record.id,
            self.store.upsert_fruit(&record).await,
        );

        let steps = [genus, family, order, nutrition, fruit];
        for message in steps.iter().filter_map(|s| s.error.as_deref()) {
            warn!("{}", message);
        }

        RecordOutcome::from_steps(steps)
    }
}
