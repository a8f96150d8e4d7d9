//! End-to-end tests: the reconstruction engine over a real SQLite store.

use chrono::{DateTime, Utc};
use sqlx::Row;

use crate::engine::{self, EvaluateOptions};
use crate::state::SqliteStateStore;
use crate::traits::{Goal, GoalStore, LogStore, NewLogEntry, ResultStore};

async fn setup_store() -> (SqliteStateStore, tempfile::NamedTempFile) {
    let db_file = tempfile::NamedTempFile::new().unwrap();
    let store = SqliteStateStore::new(db_file.path().to_str().unwrap())
        .await
        .unwrap();
    (store, db_file)
}

fn utc(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

async fn insert_number_log(store: &SqliteStateStore, tracker_id: &str, value: f64, ts: &str) {
    store
        .insert_log(&NewLogEntry {
            user_id: "user-1".to_string(),
            tracker_id: tracker_id.to_string(),
            value_number: Some(value),
            timestamp: Some(utc(ts)),
            ..Default::default()
        })
        .await
        .unwrap();
}

async fn result_row_count(store: &SqliteStateStore) -> i64 {
    sqlx::query("SELECT COUNT(*) AS n FROM goal_period_results")
        .fetch_one(store.pool())
        .await
        .unwrap()
        .get("n")
}

#[tokio::test]
async fn test_catch_up_idempotence_and_supersession() {
    let (store, _db) = setup_store().await;

    let mut goal = Goal::new_weekly("user-1", "hydration", "drink water", 2);
    goal.goal_start_date = Some(utc("2024-01-01T00:00:00Z"));
    goal.threshold_min = Some(10.0);
    store.create_goal(&goal).await.unwrap();

    // Week 1: two hits, one below threshold, one text-only row.
    insert_number_log(&store, "hydration", 12.0, "2024-01-02T08:00:00Z").await;
    insert_number_log(&store, "hydration", 15.0, "2024-01-05T08:00:00Z").await;
    insert_number_log(&store, "hydration", 9.0, "2024-01-06T08:00:00Z").await;
    store
        .insert_log(&NewLogEntry {
            user_id: "user-1".to_string(),
            tracker_id: "hydration".to_string(),
            value_text: Some("felt thirsty".to_string()),
            timestamp: Some(utc("2024-01-03T08:00:00Z")),
            ..Default::default()
        })
        .await
        .unwrap();

    let day1 = utc("2024-01-10T12:00:00Z");
    let report = engine::evaluate_goals_for_user(&store, "user-1", day1, EvaluateOptions::default())
        .await
        .unwrap();

    assert_eq!(report.goal_count, 1);
    let rows = &report.evaluated_goals[0].rows;
    assert_eq!(rows.len(), 2);
    assert!(rows[0].is_full_run);
    assert_eq!(rows[0].actual_success_count, 2);
    assert_eq!(rows[0].status, "met");
    assert!(!rows[1].is_full_run);
    assert_eq!(rows[1].status, "not_met");
    assert_eq!(result_row_count(&store).await, 2);

    // Same day, same logs: rows are overwritten, not duplicated.
    engine::evaluate_goals_for_user(&store, "user-1", day1, EvaluateOptions::default())
        .await
        .unwrap();
    assert_eq!(result_row_count(&store).await, 2);

    // Six days later week 2 has closed: its partial row is superseded by a
    // full row (both coexist under different keys) and week 3 gets a partial.
    let day2 = utc("2024-01-16T09:00:00Z");
    let report = engine::evaluate_goals_for_user(&store, "user-1", day2, EvaluateOptions::default())
        .await
        .unwrap();

    let rows = &report.evaluated_goals[0].rows;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].period_start, "2024-01-08");
    assert!(rows[0].is_full_run);
    assert_eq!(rows[1].period_start, "2024-01-15");
    assert!(!rows[1].is_full_run);
    assert_eq!(result_row_count(&store).await, 4);

    let last = store.find_last_full_run(&goal.id).await.unwrap().unwrap();
    assert_eq!(last.period_end.to_string(), "2024-01-15");
    assert_eq!(last.period_index, 2);

    // The closed week-1 row kept its original run_day.
    let week1_run_day: String = sqlx::query(
        "SELECT run_day FROM goal_period_results
         WHERE period_start = '2024-01-01' AND is_full_run = 1",
    )
    .fetch_one(store.pool())
    .await
    .unwrap()
    .get("run_day");
    assert_eq!(week1_run_day, "2024-01-10");
}

#[tokio::test]
async fn test_non_weekly_goals_are_skipped_end_to_end() {
    let (store, _db) = setup_store().await;

    let mut weekly = Goal::new_weekly("user-1", "steps", "walk", 1);
    weekly.goal_start_date = Some(utc("2024-01-01T00:00:00Z"));
    store.create_goal(&weekly).await.unwrap();

    let mut daily = Goal::new_weekly("user-1", "sleep", "sleep early", 1);
    daily.frequency_unit = Some("day".to_string());
    daily.goal_start_date = Some(utc("2024-01-01T00:00:00Z"));
    store.create_goal(&daily).await.unwrap();

    let report = engine::evaluate_goals_for_user(
        &store,
        "user-1",
        utc("2024-01-10T12:00:00Z"),
        EvaluateOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(report.goal_count, 1);
    assert_eq!(report.evaluated_goals[0].goal_id, weekly.id);

    // Nothing was persisted for the skipped goal.
    let daily_rows: i64 = sqlx::query("SELECT COUNT(*) AS n FROM goal_period_results WHERE goal_id = ?")
        .bind(&daily.id)
        .fetch_one(store.pool())
        .await
        .unwrap()
        .get("n");
    assert_eq!(daily_rows, 0);
}

#[tokio::test]
async fn test_unbounded_goal_counts_every_numeric_log() {
    let (store, _db) = setup_store().await;

    // No thresholds at all: every numeric value is a hit.
    let mut goal = Goal::new_weekly("user-1", "meditation", "meditate", 3);
    goal.goal_start_date = Some(utc("2024-01-01T00:00:00Z"));
    store.create_goal(&goal).await.unwrap();

    insert_number_log(&store, "meditation", 5.0, "2024-01-01T07:00:00Z").await;
    insert_number_log(&store, "meditation", 0.0, "2024-01-03T07:00:00Z").await;
    insert_number_log(&store, "meditation", 30.0, "2024-01-07T07:00:00Z").await;

    let report = engine::evaluate_goals_for_user(
        &store,
        "user-1",
        utc("2024-01-08T00:00:00Z"),
        EvaluateOptions::default(),
    )
    .await
    .unwrap();

    let rows = &report.evaluated_goals[0].rows;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].actual_success_count, 3);
    assert_eq!(rows[0].status, "met");

    let agg: f64 = sqlx::query("SELECT actual_value_agg FROM goal_period_results WHERE goal_id = ?")
        .bind(&goal.id)
        .fetch_one(store.pool())
        .await
        .unwrap()
        .get("actual_value_agg");
    assert_eq!(agg, 35.0);
}
