use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

use crate::error::AppError;
use crate::sync::{RunCounters, RunStatus};

/// Nutrition facts attached to an upstream fruit record.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Nutrition {
    pub carbohydrates: f64,
    pub protein: f64,
    pub fat: f64,
    pub calories: f64,
    pub sugar: f64,
}

/// One upstream entry describing a single fruit.
///
/// Fields the API sends that are not listed here are ignored.
///
/// # Examples
///
/// ```
/// use fruitsync_core::FruitRecord;
///
/// let value = serde_json::json!({
///     "id": 6,
///     "name": "Apple",
///     "genus": "Malus",
///     "family": "Rosaceae",
///     "order": "Rosales",
///     "nutritions": {
///         "carbohydrates": 11.4, "protein": 0.3, "fat": 0.4,
///         "calories": 52.0, "sugar": 10.3
///     }
/// });
///
/// let record = FruitRecord::from_value(value).unwrap();
/// assert_eq!(record.id, 6);
/// assert_eq!(record.genus, "Malus");
/// assert!(record.nutritions.is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FruitRecord {
    /// Upstream natural id, stored as `fruit_id`.
    pub id: i64,
    pub name: String,
    pub genus: String,
    pub family: String,
    pub order: String,
    /// `null`, `{}` and a missing key all mean "no nutrition payload".
    #[serde(default, deserialize_with = "empty_as_none")]
    pub nutritions: Option<Nutrition>,
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<Nutrition>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Object(map)) if map.is_empty() => Ok(None),
        Some(serde_json::Value::Array(items)) if items.is_empty() => Ok(None),
        Some(value) => serde_json::from_value(value).map(Some).map_err(D::Error::custom),
    }
}

impl FruitRecord {
    /// Decodes a raw catalog entry, checking that every required field is present.
    pub fn from_value(value: serde_json::Value) -> Result<Self, AppError> {
        serde_json::from_value(value).map_err(|e| AppError::InvalidRecord(e.to_string()))
    }
}

/// Raw result of fetching the whole catalog.
///
/// Records are kept undecoded so that one malformed entry cannot fail the
/// whole fetch.
#[derive(Debug, Clone, Default)]
pub struct FetchedCatalog {
    pub http_status: u16,
    pub records: Vec<serde_json::Value>,
}

impl FetchedCatalog {
    pub fn new(http_status: u16, records: Vec<serde_json::Value>) -> Self {
        Self {
            http_status,
            records,
        }
    }
}

/// Result of an upsert-by-key against the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created(Uuid),
    Updated(Uuid),
}

impl UpsertOutcome {
    pub fn id(&self) -> Uuid {
        match self {
            UpsertOutcome::Created(id) | UpsertOutcome::Updated(id) => *id,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, UpsertOutcome::Created(_))
    }
}

/// Audit row to append at the end of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRunLog {
    pub date: DateTime<Utc>,
    pub counters: RunCounters,
    pub error_message: String,
    pub notification_sent: bool,
    pub status: RunStatus,
}

impl NewRunLog {
    /// Builds the audit row for a finished run. The notification flag always
    /// starts out false; a separate process flips it once the run is reported.
    pub fn new(counters: RunCounters, status: RunStatus, error_message: String) -> Self {
        Self {
            date: Utc::now(),
            counters,
            error_message,
            notification_sent: false,
            status,
        }
    }
}

/// A persisted row of the `logs` table, joined with its status name.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RunLog {
    pub id: Uuid,
    pub date: DateTime<Utc>,
    pub fruits_inserted: i32,
    pub fruits_updated: i32,
    pub families_inserted: i32,
    pub families_updated: i32,
    pub genera_inserted: i32,
    pub genera_updated: i32,
    pub orders_inserted: i32,
    pub orders_updated: i32,
    pub nutritions_inserted: i32,
    pub nutritions_updated: i32,
    pub error_message: String,
    pub notification_sent: bool,
    #[sqlx(try_from = "String")]
    pub status: RunStatus,
}

/// Row counts per table plus the most recent run.
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseStats {
    pub fruits: i64,
    pub genera: i64,
    pub families: i64,
    pub orders: i64,
    pub nutritions: i64,
    pub runs: i64,
    pub last_run: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_without_nutritions() {
        let record = FruitRecord::from_value(json!({
            "id": 2,
            "name": "Pear",
            "genus": "Pyrus",
            "family": "Rosaceae",
            "order": "Rosales"
        }))
        .unwrap();
        assert_eq!(record.name, "Pear");
        assert!(record.nutritions.is_none());
    }

    #[test]
    fn test_record_ignores_unknown_fields() {
        let record = FruitRecord::from_value(json!({
            "id": 3,
            "name": "Banana",
            "genus": "Musa",
            "family": "Musaceae",
            "order": "Zingiberales",
            "nutritions": {
                "carbohydrates": 22.0, "protein": 1.0, "fat": 0.2,
                "calories": 96.0, "sugar": 17.2
            },
            "extra": "ignored"
        }))
        .unwrap();
        assert_eq!(record.nutritions.map(|n| n.calories), Some(96.0));
    }

    #[test]
    fn test_record_missing_genus_is_invalid() {
        let err = FruitRecord::from_value(json!({
            "id": 4,
            "name": "Mystery",
            "family": "Rosaceae",
            "order": "Rosales"
        }))
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidRecord(ref msg) if msg.contains("genus")));
    }

    #[test]
    fn test_record_partial_nutritions_is_invalid() {
        let result = FruitRecord::from_value(json!({
            "id": 5,
            "name": "Lemon",
            "genus": "Citrus",
            "family": "Rutaceae",
            "order": "Sapindales",
            "nutritions": { "calories": 29.0 }
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_nutritions_means_absent() {
        for nutritions in [json!({}), json!(null), json!([])] {
            let record = FruitRecord::from_value(json!({
                "id": 8,
                "name": "Durian",
                "genus": "Durio",
                "family": "Malvaceae",
                "order": "Malvales",
                "nutritions": nutritions
            }))
            .unwrap();
            assert!(record.nutritions.is_none(), "nutritions: {}", nutritions);
        }
    }

    #[test]
    fn test_record_mistyped_nutritions_is_invalid() {
        let err = FruitRecord::from_value(json!({
            "id": 9,
            "name": "Kiwi",
            "genus": "Actinidia",
            "family": "Actinidiaceae",
            "order": "Struthioniflorae",
            "nutritions": "plenty"
        }))
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidRecord(_)));
    }

    #[test]
    fn test_upsert_outcome() {
        let id = Uuid::new_v4();
        assert!(UpsertOutcome::Created(id).is_created());
        assert!(!UpsertOutcome::Updated(id).is_created());
        assert_eq!(UpsertOutcome::Updated(id).id(), id);
    }

    #[test]
    fn test_new_run_log_starts_unnotified() {
        let log = NewRunLog::new(RunCounters::default(), RunStatus::Success, String::new());
        assert!(!log.notification_sent);
        assert_eq!(log.status, RunStatus::Success);
    }
}
