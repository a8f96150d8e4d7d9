//! The period reconstruction engine — the catch-up loop.
//!
//! For each weekly goal the engine resumes from the last recorded full-run
//! result (or the goal's start), walks week windows up to "now", evaluates
//! attainment for each, and upserts one result row per period. A partial
//! (still-ongoing) period is always the last one produced in an invocation.

use chrono::{DateTime, NaiveTime, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::evaluator::evaluate_records;
use crate::period::week_period;
use crate::traits::{EvaluationStore, Goal, PeriodResult};

/// Response-facing summary of one evaluated period.
///
/// All temporal fields are rendered as calendar-date strings; native date
/// types never cross the response boundary.
#[derive(Debug, Clone, Serialize)]
pub struct PeriodRow {
    pub period_start: String,
    pub period_end: String,
    pub run_day: String,
    pub is_full_run: bool,
    pub goal_reached: i64,
    pub actual_success_count: i64,
    pub status: String,
}

/// Evaluation outcome for one goal.
#[derive(Debug, Clone, Serialize)]
pub struct GoalEvaluation {
    pub goal_id: String,
    pub description: Option<String>,
    pub rows: Vec<PeriodRow>,
}

/// Per-user evaluation report.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub user_id: String,
    pub goal_count: usize,
    pub evaluated_goals: Vec<GoalEvaluation>,
}

/// Knobs for a multi-goal evaluation run.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvaluateOptions {
    /// When set, a failing goal is logged and skipped instead of aborting the
    /// whole per-user run. Off by default: the first failure aborts the
    /// request.
    pub continue_on_error: bool,
}

/// Reconstruct and persist every week period elapsed since the goal's last
/// recorded full run.
///
/// Produces 0..N response rows. Idempotent: re-invoking with the same `now`
/// on the same day overwrites identical rows in place; a later `now` never
/// alters a previously closed full-run row.
pub async fn evaluate_goal_weekly(
    store: &dyn EvaluationStore,
    user_id: &str,
    goal: &Goal,
    now: DateTime<Utc>,
) -> anyhow::Result<Vec<PeriodRow>> {
    let frequency = goal.frequency;

    // Never evaluate before the goal existed; a missing or future start
    // clamps to now, which yields zero rows on this invocation.
    let goal_start = goal.goal_start_date.unwrap_or(now).min(now);

    let (mut next_start, mut period_index) = match store.find_last_full_run(&goal.id).await? {
        Some(last) => (
            last.period_end.and_time(NaiveTime::MIN).and_utc(),
            last.period_index + 1,
        ),
        None => (goal_start, 1),
    };

    let run_day = now.date_naive();
    let mut rows = Vec::new();

    while next_start < now {
        let (period_start, period_end) = week_period(next_start);

        let is_full_run = now >= period_end;
        let measure_end = if is_full_run { period_end } else { now };

        let records = store
            .query_by_range(user_id, &goal.tracker_id, period_start, measure_end)
            .await?;
        let (hits, aggregate) = evaluate_records(&records, goal.threshold_min, goal.threshold_max);

        // A zero or unset frequency can never be reached.
        let goal_reached = hits >= frequency && frequency > 0;
        let status = if goal_reached { "met" } else { "not_met" };

        let result = PeriodResult {
            user_id: user_id.to_string(),
            goal_id: goal.id.clone(),
            period_type: "week".to_string(),
            period_index,
            period_start: period_start.date_naive(),
            period_end: period_end.date_naive(),
            next_period_start: period_end.date_naive(),
            target_success_count: frequency,
            actual_success_count: hits,
            target_value: goal.target_value,
            actual_value_agg: aggregate,
            status: status.to_string(),
            is_full_run,
            goal_reached: goal_reached as i64,
            run_date: now,
            run_day,
            updated_at: now,
            metadata: json!({
                "description": goal.description,
                "tracker_id": goal.tracker_id,
                "frequency": goal.frequency,
                "frequency_unit": goal.frequency_unit,
                "threshold_min": goal.threshold_min,
                "threshold_max": goal.threshold_max,
                "threshold_unit": goal.threshold_unit,
                "conditions": goal.conditions,
            }),
        };

        store.upsert_period_result(&result).await?;
        debug!(
            goal_id = %goal.id,
            period_index,
            is_full_run,
            hits,
            status,
            "recorded period result"
        );

        rows.push(PeriodRow {
            period_start: result.period_start.to_string(),
            period_end: result.period_end.to_string(),
            run_day: run_day.to_string(),
            is_full_run,
            goal_reached: result.goal_reached,
            actual_success_count: hits,
            status: result.status,
        });

        if !is_full_run {
            // A partial period is always the last one produced.
            break;
        }

        next_start = period_end;
        period_index += 1;
    }

    Ok(rows)
}

/// Evaluate all of a user's active weekly goals.
///
/// Goals whose frequency unit is not "week" (case-insensitive) are silently
/// skipped. By default the first failing goal aborts the whole run; see
/// [`EvaluateOptions::continue_on_error`].
pub async fn evaluate_goals_for_user(
    store: &dyn EvaluationStore,
    user_id: &str,
    now: DateTime<Utc>,
    opts: EvaluateOptions,
) -> anyhow::Result<EvaluationReport> {
    let goals = store.list_active_goals(user_id).await?;

    let mut evaluated = Vec::new();
    for goal in &goals {
        let is_weekly = goal
            .frequency_unit
            .as_deref()
            .map(|unit| unit.eq_ignore_ascii_case("week"))
            .unwrap_or(false);
        if !is_weekly {
            debug!(goal_id = %goal.id, unit = ?goal.frequency_unit, "skipping non-weekly goal");
            continue;
        }

        match evaluate_goal_weekly(store, user_id, goal, now).await {
            Ok(rows) => evaluated.push(GoalEvaluation {
                goal_id: goal.id.clone(),
                description: goal.description.clone(),
                rows,
            }),
            Err(e) if opts.continue_on_error => {
                warn!(goal_id = %goal.id, "goal evaluation failed, continuing: {:#}", e);
            }
            Err(e) => return Err(e),
        }
    }

    Ok(EvaluationReport {
        user_id: user_id.to_string(),
        goal_count: evaluated.len(),
        evaluated_goals: evaluated,
    })
}
