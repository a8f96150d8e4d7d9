use sqlx::SqlitePool;
use tracing::info;

/// Centralized database migrations.
///
/// Safe to call multiple times (idempotent): `IF NOT EXISTS` throughout.
pub(crate) async fn migrate(pool: &SqlitePool) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS goals (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            tracker_id TEXT NOT NULL,
            description TEXT,
            frequency INTEGER NOT NULL DEFAULT 0,
            frequency_unit TEXT,
            threshold_min REAL,
            threshold_max REAL,
            threshold_unit TEXT,
            goal_start_date TEXT,
            target_value REAL,
            conditions TEXT,
            meta TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_goals_user_active
         ON goals(user_id, is_active)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            tracker_id TEXT NOT NULL,
            value_number REAL,
            value_text TEXT,
            value_json TEXT,
            metadata TEXT,
            timestamp TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_logs_range
         ON logs(user_id, tracker_id, timestamp)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS goal_period_results (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            goal_id TEXT NOT NULL,
            period_type TEXT NOT NULL,
            period_index INTEGER NOT NULL,
            period_start TEXT NOT NULL,
            period_end TEXT NOT NULL,
            next_period_start TEXT,
            target_success_count INTEGER NOT NULL,
            actual_success_count INTEGER NOT NULL,
            target_value REAL,
            actual_value_agg REAL NOT NULL,
            status TEXT NOT NULL,
            is_full_run INTEGER NOT NULL,
            goal_reached INTEGER NOT NULL,
            run_date TEXT NOT NULL,
            run_day TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            metadata TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    // The natural key; the upsert's conflict target.
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_results_natural_key
         ON goal_period_results(goal_id, period_start, period_end, run_day, is_full_run)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_results_last_full
         ON goal_period_results(goal_id, is_full_run, period_end DESC)",
    )
    .execute(pool)
    .await?;

    info!("database migrations complete");
    Ok(())
}
