use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use tracing::warn;

use super::*;

#[async_trait]
impl crate::traits::LogStore for SqliteStateStore {
    async fn insert_log(&self, entry: &NewLogEntry) -> anyhow::Result<LogEntry> {
        let timestamp = entry.timestamp.unwrap_or_else(Utc::now);
        let value_json = entry.value_json.as_ref().map(|v| v.to_string());
        let metadata = entry.metadata.as_ref().map(|v| v.to_string());

        let result = sqlx::query(
            "INSERT INTO logs (user_id, tracker_id, value_number, value_text, value_json, metadata, timestamp)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&entry.user_id)
        .bind(&entry.tracker_id)
        .bind(entry.value_number)
        .bind(&entry.value_text)
        .bind(value_json)
        .bind(metadata)
        .bind(timestamp.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(LogEntry {
            id: result.last_insert_rowid(),
            user_id: entry.user_id.clone(),
            tracker_id: entry.tracker_id.clone(),
            value_number: entry.value_number,
            value_text: entry.value_text.clone(),
            value_json: entry.value_json.clone(),
            metadata: entry.metadata.clone(),
            timestamp: timestamp.to_rfc3339(),
        })
    }

    async fn query_by_range(
        &self,
        user_id: &str,
        tracker_id: &str,
        start: chrono::DateTime<Utc>,
        end: chrono::DateTime<Utc>,
    ) -> anyhow::Result<Vec<ActivityRecord>> {
        let rows = sqlx::query(
            "SELECT value_number, timestamp FROM logs
             WHERE user_id = ? AND tracker_id = ? AND timestamp >= ? AND timestamp < ?
             ORDER BY timestamp",
        )
        .bind(user_id)
        .bind(tracker_id)
        .bind(start.to_rfc3339())
        .bind(end.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            // Lenient value read: junk in value_number degrades to "no value"
            // (excluded from evaluation) rather than failing the query.
            let value: Option<f64> = match row.try_get::<Option<f64>, _>("value_number") {
                Ok(v) => v,
                Err(_) => row
                    .try_get::<Option<String>, _>("value_number")
                    .ok()
                    .flatten()
                    .and_then(|s| s.trim().parse().ok()),
            };

            let timestamp_raw: String = row.get("timestamp");
            let Some(timestamp) = parse_utc_timestamp(&timestamp_raw) else {
                warn!(tracker_id, timestamp = %timestamp_raw, "skipping log row with unreadable timestamp");
                continue;
            };

            records.push(ActivityRecord { value, timestamp });
        }

        Ok(records)
    }
}
