use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ==================== Goals + Logs Data Model ====================

/// A tracked recurring goal ("exercise 3 times per week").
///
/// Immutable for the duration of one evaluation run. Created and edited by
/// surfaces outside the evaluation engine; the engine only reads them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub id: String,
    pub user_id: String,
    /// The activity stream this goal is measured against.
    pub tracker_id: String,
    pub description: Option<String>,
    /// Required hits per period. A zero or unset frequency can never be
    /// reached, regardless of hit count.
    pub frequency: i64,
    /// Only "week" (case-insensitive) is evaluated; other units are skipped.
    pub frequency_unit: Option<String>,
    /// Inclusive lower bound on a log value for it to count as a hit.
    pub threshold_min: Option<f64>,
    /// Inclusive upper bound on a log value for it to count as a hit.
    pub threshold_max: Option<f64>,
    pub threshold_unit: Option<String>,
    pub goal_start_date: Option<DateTime<Utc>>,
    pub target_value: Option<f64>,
    /// Success conditions (human-readable).
    pub conditions: Option<String>,
    /// Free-form goal document, surfaced to the extraction prompt.
    pub meta: Option<Value>,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl Goal {
    /// Create a new active weekly goal. Goal authoring lives with the
    /// companion tracker surface; this constructor backs fixtures and seeds.
    #[allow(dead_code)]
    pub fn new_weekly(user_id: &str, tracker_id: &str, description: &str, frequency: i64) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            tracker_id: tracker_id.to_string(),
            description: Some(description.to_string()),
            frequency,
            frequency_unit: Some("week".to_string()),
            threshold_min: None,
            threshold_max: None,
            threshold_unit: None,
            goal_start_date: None,
            target_value: None,
            conditions: None,
            meta: None,
            is_active: true,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// One logged activity occurrence as seen by the evaluator.
///
/// `value` is `None` for rows whose stored value is absent or not a number;
/// such records are excluded from evaluation, never treated as zero.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityRecord {
    pub value: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// A raw log row to ingest. Exactly one of the three value fields must be
/// set; the HTTP surface enforces this before the store is touched.
#[derive(Debug, Clone, Default)]
pub struct NewLogEntry {
    pub user_id: String,
    pub tracker_id: String,
    pub value_number: Option<f64>,
    pub value_text: Option<String>,
    pub value_json: Option<Value>,
    pub metadata: Option<Value>,
    /// Defaults to the insert time when absent.
    pub timestamp: Option<DateTime<Utc>>,
}

/// A stored log row, echoed back to the ingestion caller.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub id: i64,
    pub user_id: String,
    pub tracker_id: String,
    pub value_number: Option<f64>,
    pub value_text: Option<String>,
    pub value_json: Option<Value>,
    pub metadata: Option<Value>,
    pub timestamp: String,
}

// ==================== Period Results ====================

/// One persisted evaluation of one goal over one week window.
///
/// Natural key: `(goal_id, period_start, period_end, run_day, is_full_run)`.
/// Re-running evaluation the same calendar day overwrites the row in place; a
/// partial-run row is superseded by a full-run row for the same period once
/// the period closes (different key). Rows are never deleted.
#[derive(Debug, Clone, Serialize)]
pub struct PeriodResult {
    pub user_id: String,
    pub goal_id: String,
    /// Always "week".
    pub period_type: String,
    /// 1-based, monotonically increasing per goal.
    pub period_index: i64,
    pub period_start: NaiveDate,
    /// Exclusive; `[period_start, period_end)`.
    pub period_end: NaiveDate,
    pub next_period_start: NaiveDate,
    pub target_success_count: i64,
    pub actual_success_count: i64,
    pub target_value: Option<f64>,
    pub actual_value_agg: f64,
    /// "met" or "not_met".
    pub status: String,
    /// Whether the period had fully elapsed at evaluation time.
    pub is_full_run: bool,
    pub goal_reached: i64,
    pub run_date: DateTime<Utc>,
    pub run_day: NaiveDate,
    pub updated_at: DateTime<Utc>,
    /// Snapshot of the goal's parameters at evaluation time, for audit.
    pub metadata: Value,
}

/// Seed for the catch-up loop: where the last fully-elapsed evaluation of a
/// goal left off.
#[derive(Debug, Clone, PartialEq)]
pub struct LastFullRun {
    pub period_end: NaiveDate,
    pub period_index: i64,
}

// ==================== Store Traits ====================

/// Read access to goals.
#[async_trait]
pub trait GoalStore: Send + Sync {
    async fn create_goal(&self, goal: &Goal) -> anyhow::Result<()>;

    /// All active goals for a user, any frequency unit.
    async fn list_active_goals(&self, user_id: &str) -> anyhow::Result<Vec<Goal>>;

    /// Meta documents of the user's active goals, for the extraction prompt.
    /// Goals without a meta document are omitted.
    async fn list_active_goal_meta(&self, user_id: &str) -> anyhow::Result<Vec<Value>>;
}

/// Append and range-query activity logs.
#[async_trait]
pub trait LogStore: Send + Sync {
    async fn insert_log(&self, entry: &NewLogEntry) -> anyhow::Result<LogEntry>;

    /// Activity values for one tracker in the half-open window `[start, end)`.
    async fn query_by_range(
        &self,
        user_id: &str,
        tracker_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<ActivityRecord>>;
}

/// Idempotent persistence of period results.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// The most recent full-run result for a goal (highest `period_end` with
    /// `is_full_run` set), or `None` if the goal has never closed a period.
    async fn find_last_full_run(&self, goal_id: &str) -> anyhow::Result<Option<LastFullRun>>;

    /// Insert-or-replace on the natural key. Replace-on-conflict is what
    /// makes concurrent same-period evaluations safe without locking.
    async fn upsert_period_result(&self, result: &PeriodResult) -> anyhow::Result<()>;
}

/// Facade trait so the engine can take one store handle.
///
/// Call sites use `&dyn EvaluationStore`; implementations only need the
/// focused traits.
pub trait EvaluationStore: GoalStore + LogStore + ResultStore {}

impl<T> EvaluationStore for T where T: GoalStore + LogStore + ResultStore {}

// ==================== Completion Service ====================

/// One blocking call to a language-model completion service.
///
/// Implementations must return non-empty content or an error; no retries.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(
        &self,
        system_prompt: &str,
        user_text: &str,
        current_time: &str,
    ) -> anyhow::Result<String>;
}
