use async_trait::async_trait;
use serde_json::Value;
use sqlx::Row;

use super::*;

fn goal_from_row(row: &sqlx::sqlite::SqliteRow) -> Goal {
    let meta_json: Option<String> = row.get("meta");
    let meta = meta_json.and_then(|j| serde_json::from_str(&j).ok());

    let goal_start_raw: Option<String> = row.get("goal_start_date");
    let goal_start_date = goal_start_raw.and_then(|s| parse_utc_timestamp(&s));

    Goal {
        id: row.get("id"),
        user_id: row.get("user_id"),
        tracker_id: row.get("tracker_id"),
        description: row.get("description"),
        frequency: row.get("frequency"),
        frequency_unit: row.get("frequency_unit"),
        threshold_min: row.get("threshold_min"),
        threshold_max: row.get("threshold_max"),
        threshold_unit: row.get("threshold_unit"),
        goal_start_date,
        target_value: row.get("target_value"),
        conditions: row.get("conditions"),
        meta,
        is_active: row.get::<i64, _>("is_active") != 0,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl crate::traits::GoalStore for SqliteStateStore {
    async fn create_goal(&self, goal: &Goal) -> anyhow::Result<()> {
        let meta_json = goal.meta.as_ref().map(|m| m.to_string());

        sqlx::query(
            "INSERT INTO goals (
                id, user_id, tracker_id, description, frequency, frequency_unit,
                threshold_min, threshold_max, threshold_unit, goal_start_date,
                target_value, conditions, meta, is_active, created_at, updated_at
             )
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&goal.id)
        .bind(&goal.user_id)
        .bind(&goal.tracker_id)
        .bind(&goal.description)
        .bind(goal.frequency)
        .bind(&goal.frequency_unit)
        .bind(goal.threshold_min)
        .bind(goal.threshold_max)
        .bind(&goal.threshold_unit)
        .bind(goal.goal_start_date.map(|d| d.to_rfc3339()))
        .bind(goal.target_value)
        .bind(&goal.conditions)
        .bind(meta_json)
        .bind(goal.is_active as i64)
        .bind(&goal.created_at)
        .bind(&goal.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_active_goals(&self, user_id: &str) -> anyhow::Result<Vec<Goal>> {
        let rows = sqlx::query(
            "SELECT id, user_id, tracker_id, description, frequency, frequency_unit,
             threshold_min, threshold_max, threshold_unit, goal_start_date,
             target_value, conditions, meta, is_active, created_at, updated_at
             FROM goals WHERE user_id = ? AND is_active = 1
             ORDER BY created_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(goal_from_row).collect())
    }

    async fn list_active_goal_meta(&self, user_id: &str) -> anyhow::Result<Vec<Value>> {
        let rows = sqlx::query(
            "SELECT meta FROM goals
             WHERE user_id = ? AND is_active = 1 AND meta IS NOT NULL
             ORDER BY created_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .filter_map(|row| {
                let raw: String = row.get("meta");
                serde_json::from_str(&raw).ok()
            })
            .collect())
    }
}
