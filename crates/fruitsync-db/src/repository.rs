//! Fruit catalog repository for PostgreSQL.
//!
//! Every write is a single autocommitted statement, so each upsert is durable
//! as soon as it returns. Insert-vs-update is read back from the upserted
//! row's `xmax` (zero only for freshly inserted tuples).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fruitsync_core::error::AppError;
use fruitsync_core::models::{
    DatabaseStats, FruitRecord, NewRunLog, Nutrition, RunLog, UpsertOutcome,
};
use fruitsync_core::sync::RunStatus;
use fruitsync_core::traits::FruitStore;
use sqlx::{PgPool, Pool, Postgres};
use tracing::debug;
use uuid::Uuid;

/// Column list for log SELECT queries. Must remain a const literal to ensure SQL safety
/// since format!() bypasses sqlx compile-time validation.
const LOG_COLUMNS: &str = "l.id, l.date, l.fruits_inserted, l.fruits_updated, l.families_inserted, l.families_updated, l.genera_inserted, l.genera_updated, l.orders_inserted, l.orders_updated, l.nutritions_inserted, l.nutritions_updated, l.error_message, l.notification_sent, s.name AS status";

/// Lookup tables keyed by a unique `name`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NamedTable {
    Genera,
    Families,
    Orders,
}

impl NamedTable {
    fn table(&self) -> &'static str {
        match self {
            NamedTable::Genera => "genera",
            NamedTable::Families => "families",
            NamedTable::Orders => "orders",
        }
    }
}

/// Repository for the fruit catalog and the run audit log.
///
/// Expects the `statuses`, `genera`, `families`, `orders`, `nutritions`,
/// `fruits` and `logs` tables to exist; creating them is left to the
/// deployment's migration tooling.
///
/// # Examples
///
/// ```no_run
/// use sqlx::postgres::PgPoolOptions;
/// use fruitsync_db::FruitRepository;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = PgPoolOptions::new()
///     .max_connections(5)
///     .connect("postgresql://localhost/fruitsync")
///     .await?;
///
/// let repo = FruitRepository::new(pool);
/// repo.seed_statuses().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct FruitRepository {
    pool: Pool<Postgres>,
}

impl FruitRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Ensures the three run statuses exist. Safe to call on every start.
    pub async fn seed_statuses(&self) -> Result<(), AppError> {
        for status in RunStatus::ALL {
            sqlx::query(
                r#"
                INSERT INTO statuses (id, name)
                VALUES ($1, $2)
                ON CONFLICT (name) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(status.name())
            .execute(&self.pool)
            .await
            .map_err(AppError::DatabaseError)?;
        }

        Ok(())
    }

    async fn upsert_named(&self, table: NamedTable, name: &str) -> Result<UpsertOutcome, AppError> {
        let query = format!(
            "INSERT INTO {} (id, name) VALUES ($1, $2) \
             ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name \
             RETURNING id, (xmax = 0) AS inserted",
            table.table()
        );

        let row: UpsertRow = sqlx::query_as(&query)
            .bind(Uuid::new_v4())
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::DatabaseError)?;

        let outcome = row.into_outcome();
        debug!("Upserted {} '{}' ({})", table.table(), name, outcome.id());
        Ok(outcome)
    }

    /// Lists the most recent runs, newest first.
    pub async fn recent_logs(
        &self,
        limit: usize,
        pending_only: bool,
    ) -> Result<Vec<RunLog>, AppError> {
        let filter = if pending_only {
            "WHERE NOT l.notification_sent"
        } else {
            ""
        };
        let query = format!(
            "SELECT {} FROM logs l JOIN statuses s ON s.id = l.status_id {} ORDER BY l.date DESC LIMIT $1",
            LOG_COLUMNS, filter
        );

        let logs = sqlx::query_as::<_, RunLog>(&query)
            .bind(to_db_limit(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::DatabaseError)?;

        Ok(logs)
    }

    /// Returns row counts per table and the date of the latest run.
    pub async fn get_stats(&self) -> Result<DatabaseStats, AppError> {
        let row: StatsRow = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM fruits) AS fruits,
                (SELECT COUNT(*) FROM genera) AS genera,
                (SELECT COUNT(*) FROM families) AS families,
                (SELECT COUNT(*) FROM orders) AS orders,
                (SELECT COUNT(*) FROM nutritions) AS nutritions,
                (SELECT COUNT(*) FROM logs) AS runs,
                (SELECT MAX(date) FROM logs) AS last_run
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;

        Ok(DatabaseStats {
            fruits: row.fruits.unwrap_or(0),
            genera: row.genera.unwrap_or(0),
            families: row.families.unwrap_or(0),
            orders: row.orders.unwrap_or(0),
            nutritions: row.nutritions.unwrap_or(0),
            runs: row.runs.unwrap_or(0),
            last_run: row.last_run,
        })
    }
}

#[async_trait]
impl FruitStore for FruitRepository {
    async fn upsert_genus(&self, name: &str) -> Result<UpsertOutcome, AppError> {
        self.upsert_named(NamedTable::Genera, name).await
    }

    async fn upsert_family(&self, name: &str) -> Result<UpsertOutcome, AppError> {
        self.upsert_named(NamedTable::Families, name).await
    }

    async fn upsert_order(&self, name: &str) -> Result<UpsertOutcome, AppError> {
        self.upsert_named(NamedTable::Orders, name).await
    }

    async fn upsert_nutrition(
        &self,
        fruit_id: i64,
        nutrition: &Nutrition,
    ) -> Result<UpsertOutcome, AppError> {
        let row: UpsertRow = sqlx::query_as(
            r#"
            INSERT INTO nutritions (
                id,
                fruit_id,
                carbohydrates,
                protein,
                fat,
                calories,
                sugar
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (fruit_id)
            DO UPDATE SET
                carbohydrates = EXCLUDED.carbohydrates,
                protein = EXCLUDED.protein,
                fat = EXCLUDED.fat,
                calories = EXCLUDED.calories,
                sugar = EXCLUDED.sugar
            RETURNING id, (xmax = 0) AS inserted
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(fruit_id)
        .bind(nutrition.carbohydrates)
        .bind(nutrition.protein)
        .bind(nutrition.fat)
        .bind(nutrition.calories)
        .bind(nutrition.sugar)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;

        Ok(row.into_outcome())
    }

    async fn upsert_fruit(&self, record: &FruitRecord) -> Result<UpsertOutcome, AppError> {
        // Relations missing from their tables resolve to NULL. An existing
        // nutrition link is kept when no nutrition row exists for the fruit.
        let row: UpsertRow = sqlx::query_as(
            r#"
            INSERT INTO fruits (
                id,
                fruit_id,
                name,
                genus_id,
                family_id,
                order_id,
                nutrition_id
            )
            VALUES (
                $1,
                $2,
                $3,
                (SELECT id FROM genera WHERE name = $4),
                (SELECT id FROM families WHERE name = $5),
                (SELECT id FROM orders WHERE name = $6),
                (SELECT id FROM nutritions WHERE fruit_id = $2)
            )
            ON CONFLICT (fruit_id)
            DO UPDATE SET
                name = EXCLUDED.name,
                genus_id = EXCLUDED.genus_id,
                family_id = EXCLUDED.family_id,
                order_id = EXCLUDED.order_id,
                nutrition_id = COALESCE(EXCLUDED.nutrition_id, fruits.nutrition_id)
            RETURNING id, (xmax = 0) AS inserted
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(record.id)
        .bind(&record.name)
        .bind(&record.genus)
        .bind(&record.family)
        .bind(&record.order)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;

        Ok(row.into_outcome())
    }

    async fn append_log(&self, log: &NewRunLog) -> Result<Uuid, AppError> {
        let c = &log.counters;

        let rec: Option<(Uuid,)> = sqlx::query_as(
            r#"
            INSERT INTO logs (
                id,
                date,
                fruits_inserted,
                fruits_updated,
                families_inserted,
                families_updated,
                genera_inserted,
                genera_updated,
                orders_inserted,
                orders_updated,
                nutritions_inserted,
                nutritions_updated,
                error_message,
                notification_sent,
                status_id
            )
            SELECT $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, s.id
            FROM statuses s
            WHERE s.name = $15
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(log.date)
        .bind(to_db_count(c.fruit.inserted))
        .bind(to_db_count(c.fruit.updated))
        .bind(to_db_count(c.family.inserted))
        .bind(to_db_count(c.family.updated))
        .bind(to_db_count(c.genus.inserted))
        .bind(to_db_count(c.genus.updated))
        .bind(to_db_count(c.order.inserted))
        .bind(to_db_count(c.order.updated))
        .bind(to_db_count(c.nutrition.inserted))
        .bind(to_db_count(c.nutrition.updated))
        .bind(&log.error_message)
        .bind(log.notification_sent)
        .bind(log.status.name())
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;

        rec.map(|(id,)| id)
            .ok_or_else(|| AppError::StatusNotFound(log.status.name().to_string()))
    }
}

/// Counters are stored as `INTEGER`.
fn to_db_count(n: u32) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

/// `LIMIT` takes a `BIGINT`; anything larger means "no limit".
fn to_db_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

/// Helper struct for deserializing `RETURNING id, inserted` rows
#[derive(sqlx::FromRow)]
struct UpsertRow {
    id: Uuid,
    inserted: bool,
}

impl UpsertRow {
    fn into_outcome(self) -> UpsertOutcome {
        if self.inserted {
            UpsertOutcome::Created(self.id)
        } else {
            UpsertOutcome::Updated(self.id)
        }
    }
}

/// Helper struct for deserializing stats query results
#[derive(sqlx::FromRow)]
struct StatsRow {
    fruits: Option<i64>,
    genera: Option<i64>,
    families: Option<i64>,
    orders: Option<i64>,
    nutritions: Option<i64>,
    runs: Option<i64>,
    last_run: Option<DateTime<Utc>>,
}
