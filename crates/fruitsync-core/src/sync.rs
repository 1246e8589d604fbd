//! Counters, status resolution and per-record outcomes for a reconciliation run.
//!
//! Pure values only: nothing here touches the network or the database, so the
//! accounting rules can be tested without any collaborator.

use std::fmt;
use std::ops::AddAssign;
use std::str::FromStr;

use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::UpsertOutcome;

/// Separator used when joining a run's error messages into the audit row.
pub const ERROR_SEPARATOR: &str = "; ";

/// HTTP status the catalog fetch must return for a run to count as healthy.
pub const HTTP_OK: u16 = 200;

/// The five entity kinds upserted for every record, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    Genus,
    Family,
    Order,
    Nutrition,
    Fruit,
}

impl Entity {
    pub const PIPELINE: [Entity; 5] = [
        Entity::Genus,
        Entity::Family,
        Entity::Order,
        Entity::Nutrition,
        Entity::Fruit,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Entity::Genus => "genus",
            Entity::Family => "family",
            Entity::Order => "order",
            Entity::Nutrition => "nutrition",
            Entity::Fruit => "fruit",
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Insert/update counts for one entity kind.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EntityCounts {
    pub inserted: u32,
    pub updated: u32,
}

impl EntityCounts {
    pub fn from_outcome(outcome: &UpsertOutcome) -> Self {
        if outcome.is_created() {
            Self {
                inserted: 1,
                updated: 0,
            }
        } else {
            Self {
                inserted: 0,
                updated: 1,
            }
        }
    }
}

impl AddAssign for EntityCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.inserted += rhs.inserted;
        self.updated += rhs.updated;
    }
}

/// The ten counters persisted with every run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunCounters {
    pub genus: EntityCounts,
    pub family: EntityCounts,
    pub order: EntityCounts,
    pub nutrition: EntityCounts,
    pub fruit: EntityCounts,
}

impl RunCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, entity: Entity) -> EntityCounts {
        match entity {
            Entity::Genus => self.genus,
            Entity::Family => self.family,
            Entity::Order => self.order,
            Entity::Nutrition => self.nutrition,
            Entity::Fruit => self.fruit,
        }
    }

    /// Adds counts for a single entity kind.
    pub fn record(&mut self, entity: Entity, counts: EntityCounts) {
        let slot = match entity {
            Entity::Genus => &mut self.genus,
            Entity::Family => &mut self.family,
            Entity::Order => &mut self.order,
            Entity::Nutrition => &mut self.nutrition,
            Entity::Fruit => &mut self.fruit,
        };
        *slot += counts;
    }

    pub fn total_inserted(&self) -> u32 {
        Entity::PIPELINE.iter().map(|e| self.get(*e).inserted).sum()
    }

    pub fn total_updated(&self) -> u32 {
        Entity::PIPELINE.iter().map(|e| self.get(*e).updated).sum()
    }
}

impl AddAssign for RunCounters {
    fn add_assign(&mut self, rhs: Self) {
        for entity in Entity::PIPELINE {
            self.record(entity, rhs.get(entity));
        }
    }
}

/// Outcome classification of a whole run.
///
/// Stored by name in the `statuses` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    PartialFailure,
    TransportFailure,
}

impl RunStatus {
    pub const ALL: [RunStatus; 3] = [
        RunStatus::Success,
        RunStatus::PartialFailure,
        RunStatus::TransportFailure,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::PartialFailure => "partial_failure",
            RunStatus::TransportFailure => "transport_failure",
        }
    }

    /// Status implied by the catalog fetch alone.
    pub fn from_http_status(http_status: u16) -> Self {
        if http_status == HTTP_OK {
            RunStatus::Success
        } else {
            RunStatus::PartialFailure
        }
    }

    /// Final status of a run. An unexpected record error always wins over the
    /// fetch classification.
    pub fn resolve(http_status: u16, unexpected_errors: usize) -> Self {
        if unexpected_errors > 0 {
            RunStatus::TransportFailure
        } else {
            Self::from_http_status(http_status)
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

impl FromStr for RunStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RunStatus::ALL
            .into_iter()
            .find(|status| status.name() == s)
            .ok_or_else(|| AppError::StatusNotFound(s.to_string()))
    }
}

/// Decodes the status name joined into persisted log rows.
impl TryFrom<String> for RunStatus {
    type Error = AppError;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        name.parse()
    }
}

/// Result of one upsert step for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepResult {
    pub entity: Entity,
    pub counts: EntityCounts,
    pub error: Option<String>,
    /// Set when the store could not be reached at all.
    pub unexpected: bool,
}

impl StepResult {
    /// Converts a store call into counts, or zero counts plus a message on failure.
    ///
    /// Transport-level store errors (see [`AppError::is_transport`]) are still
    /// recorded as step errors but also flag the step as unexpected.
    pub fn from_upsert(
        entity: Entity,
        fruit_id: i64,
        result: Result<UpsertOutcome, AppError>,
    ) -> Self {
        match result {
            Ok(outcome) => Self {
                entity,
                counts: EntityCounts::from_outcome(&outcome),
                error: None,
                unexpected: false,
            },
            Err(e) => Self {
                entity,
                counts: EntityCounts::default(),
                error: Some(format!(
                    "{} upsert failed for fruit {}: {}",
                    entity, fruit_id, e
                )),
                unexpected: e.is_transport(),
            },
        }
    }

    /// A step that had nothing to do.
    pub fn skipped(entity: Entity) -> Self {
        Self {
            entity,
            counts: EntityCounts::default(),
            error: None,
            unexpected: false,
        }
    }
}

/// Everything one record contributed to the run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecordOutcome {
    pub counters: RunCounters,
    pub errors: Vec<String>,
    /// Set when the record could not be decoded, or a step lost the store.
    pub unexpected: bool,
}

impl RecordOutcome {
    pub fn from_steps(steps: impl IntoIterator<Item = StepResult>) -> Self {
        let mut outcome = Self::default();
        for step in steps {
            outcome.counters.record(step.entity, step.counts);
            outcome.errors.extend(step.error);
            outcome.unexpected |= step.unexpected;
        }
        outcome
    }

    pub fn unexpected(message: String) -> Self {
        Self {
            counters: RunCounters::default(),
            errors: vec![message],
            unexpected: true,
        }
    }
}

/// Joins a run's error messages into the single string stored in the audit row.
pub fn join_errors(errors: &[String]) -> String {
    errors.join(ERROR_SEPARATOR)
}

/// What a finished run reports back to its caller.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub counters: RunCounters,
    pub status: RunStatus,
    pub error_message: String,
    /// Number of records in the fetched catalog.
    pub records: usize,
    /// Id of the persisted audit row, `None` if writing it failed.
    pub log_id: Option<Uuid>,
}

impl RunSummary {
    pub fn logged(&self) -> bool {
        self.log_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_counters_default() {
        let counters = RunCounters::new();
        assert_eq!(counters.total_inserted(), 0);
        assert_eq!(counters.total_updated(), 0);
    }

    #[test]
    fn test_run_counters_record() {
        let mut counters = RunCounters::new();
        counters.record(
            Entity::Genus,
            EntityCounts {
                inserted: 1,
                updated: 0,
            },
        );
        counters.record(
            Entity::Genus,
            EntityCounts {
                inserted: 0,
                updated: 1,
            },
        );
        counters.record(
            Entity::Fruit,
            EntityCounts {
                inserted: 1,
                updated: 0,
            },
        );

        assert_eq!(counters.genus.inserted, 1);
        assert_eq!(counters.genus.updated, 1);
        assert_eq!(counters.fruit.inserted, 1);
        assert_eq!(counters.total_inserted(), 2);
        assert_eq!(counters.total_updated(), 1);
    }

    #[test]
    fn test_run_counters_add_assign() {
        let mut total = RunCounters::new();
        let mut one = RunCounters::new();
        one.record(
            Entity::Order,
            EntityCounts {
                inserted: 1,
                updated: 0,
            },
        );
        one.record(
            Entity::Nutrition,
            EntityCounts {
                inserted: 0,
                updated: 1,
            },
        );

        total += one;
        total += one;

        assert_eq!(total.order.inserted, 2);
        assert_eq!(total.nutrition.updated, 2);
        assert_eq!(total.family, EntityCounts::default());
    }

    #[test]
    fn test_status_from_http_status() {
        assert_eq!(RunStatus::from_http_status(200), RunStatus::Success);
        assert_eq!(RunStatus::from_http_status(204), RunStatus::PartialFailure);
        assert_eq!(RunStatus::from_http_status(503), RunStatus::PartialFailure);
    }

    #[test]
    fn test_status_resolve_precedence() {
        assert_eq!(RunStatus::resolve(200, 0), RunStatus::Success);
        assert_eq!(RunStatus::resolve(500, 0), RunStatus::PartialFailure);
        assert_eq!(RunStatus::resolve(200, 1), RunStatus::TransportFailure);
        assert_eq!(RunStatus::resolve(500, 3), RunStatus::TransportFailure);
    }

    #[test]
    fn test_status_name_round_trip() {
        for status in RunStatus::ALL {
            assert_eq!(status.name().parse::<RunStatus>().unwrap(), status);
        }
        assert!(matches!(
            "unknown".parse::<RunStatus>(),
            Err(AppError::StatusNotFound(_))
        ));
    }

    #[test]
    fn test_step_result_from_created() {
        let step = StepResult::from_upsert(
            Entity::Family,
            1,
            Ok(UpsertOutcome::Created(Uuid::new_v4())),
        );
        assert_eq!(step.counts.inserted, 1);
        assert_eq!(step.counts.updated, 0);
        assert!(step.error.is_none());
    }

    #[test]
    fn test_step_result_from_error() {
        let step = StepResult::from_upsert(
            Entity::Fruit,
            42,
            Err(AppError::Generic("duplicate key".to_string())),
        );
        assert_eq!(step.counts, EntityCounts::default());
        assert_eq!(
            step.error.as_deref(),
            Some("fruit upsert failed for fruit 42: Error: duplicate key")
        );
        assert!(!step.unexpected);
    }

    #[test]
    fn test_step_result_from_lost_connection() {
        let step = StepResult::from_upsert(
            Entity::Genus,
            7,
            Err(AppError::DatabaseError(sqlx::Error::PoolTimedOut)),
        );
        assert_eq!(step.counts, EntityCounts::default());
        assert!(step
            .error
            .as_deref()
            .unwrap()
            .starts_with("genus upsert failed for fruit 7"));
        assert!(step.unexpected);

        let outcome = RecordOutcome::from_steps([step, StepResult::skipped(Entity::Nutrition)]);
        assert!(outcome.unexpected);
        assert_eq!(outcome.errors.len(), 1);
    }

    #[test]
    fn test_status_display_pads() {
        assert_eq!(format!("[{:<9}]", RunStatus::Success), "[success  ]");
        assert_eq!(RunStatus::PartialFailure.to_string(), "partial_failure");
    }

    #[test]
    fn test_status_serializes_by_name() {
        for status in RunStatus::ALL {
            assert_eq!(
                serde_json::to_value(status).unwrap(),
                serde_json::Value::String(status.name().to_string())
            );
        }
    }

    #[test]
    fn test_status_try_from_stored_name() {
        assert_eq!(
            RunStatus::try_from("transport_failure".to_string()).unwrap(),
            RunStatus::TransportFailure
        );
        assert!(RunStatus::try_from("retired".to_string()).is_err());
    }

    #[test]
    fn test_record_outcome_from_steps() {
        let id = Uuid::new_v4();
        let outcome = RecordOutcome::from_steps([
            StepResult::from_upsert(Entity::Genus, 1, Ok(UpsertOutcome::Updated(id))),
            StepResult::from_upsert(
                Entity::Family,
                1,
                Err(AppError::Generic("boom".to_string())),
            ),
            StepResult::skipped(Entity::Nutrition),
            StepResult::from_upsert(Entity::Fruit, 1, Ok(UpsertOutcome::Created(id))),
        ]);

        assert_eq!(outcome.counters.genus.updated, 1);
        assert_eq!(outcome.counters.family, EntityCounts::default());
        assert_eq!(outcome.counters.nutrition, EntityCounts::default());
        assert_eq!(outcome.counters.fruit.inserted, 1);
        assert_eq!(outcome.errors.len(), 1);
        assert!(!outcome.unexpected);
    }

    #[test]
    fn test_join_errors() {
        assert_eq!(join_errors(&[]), "");
        assert_eq!(
            join_errors(&["msgA".to_string(), "msgB".to_string()]),
            "msgA; msgB"
        );
    }

    #[test]
    fn test_run_summary_logged() {
        let mut summary = RunSummary {
            counters: RunCounters::new(),
            status: RunStatus::Success,
            error_message: String::new(),
            records: 0,
            log_id: None,
        };
        assert!(!summary.logged());
        summary.log_id = Some(Uuid::new_v4());
        assert!(summary.logged());
    }
}
