use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::Row;

use super::*;

#[async_trait]
impl crate::traits::ResultStore for SqliteStateStore {
    async fn find_last_full_run(&self, goal_id: &str) -> anyhow::Result<Option<LastFullRun>> {
        let row = sqlx::query(
            "SELECT period_end, period_index FROM goal_period_results
             WHERE goal_id = ? AND is_full_run = 1
             ORDER BY period_end DESC LIMIT 1",
        )
        .bind(goal_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let period_end_raw: String = row.get("period_end");
        let period_end = NaiveDate::parse_from_str(&period_end_raw, "%Y-%m-%d")
            .map_err(|e| anyhow::anyhow!("unreadable period_end '{}': {}", period_end_raw, e))?;

        Ok(Some(LastFullRun {
            period_end,
            period_index: row.get("period_index"),
        }))
    }

    async fn upsert_period_result(&self, result: &PeriodResult) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO goal_period_results (
                user_id, goal_id, period_type, period_index,
                period_start, period_end, next_period_start,
                target_success_count, actual_success_count, target_value, actual_value_agg,
                status, is_full_run, goal_reached, run_date, run_day, updated_at, metadata
             )
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (goal_id, period_start, period_end, run_day, is_full_run) DO UPDATE SET
                user_id = excluded.user_id,
                period_type = excluded.period_type,
                period_index = excluded.period_index,
                next_period_start = excluded.next_period_start,
                target_success_count = excluded.target_success_count,
                actual_success_count = excluded.actual_success_count,
                target_value = excluded.target_value,
                actual_value_agg = excluded.actual_value_agg,
                status = excluded.status,
                goal_reached = excluded.goal_reached,
                run_date = excluded.run_date,
                updated_at = excluded.updated_at,
                metadata = excluded.metadata",
        )
        .bind(&result.user_id)
        .bind(&result.goal_id)
        .bind(&result.period_type)
        .bind(result.period_index)
        .bind(result.period_start.to_string())
        .bind(result.period_end.to_string())
        .bind(result.next_period_start.to_string())
        .bind(result.target_success_count)
        .bind(result.actual_success_count)
        .bind(result.target_value)
        .bind(result.actual_value_agg)
        .bind(&result.status)
        .bind(result.is_full_run)
        .bind(result.goal_reached)
        .bind(result.run_date.to_rfc3339())
        .bind(result.run_day.to_string())
        .bind(result.updated_at.to_rfc3339())
        .bind(result.metadata.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
