//! Free-text → structured goal-match extraction.
//!
//! Builds the strict JSON-extraction instructions from the user's active goal
//! documents and drives one completion call. The model's response is passed
//! through as-is; its shape is not validated here beyond the provider's
//! non-empty-content requirement.

use serde_json::Value;

use crate::traits::{CompletionProvider, GoalStore};

/// System instructions for the extraction call. The allowed matches are
/// exactly the user's goal documents, serialized inline.
pub fn build_extraction_system_prompt(user_goals: &[Value]) -> String {
    let goals_json =
        serde_json::to_string(user_goals).unwrap_or_else(|_| "[]".to_string());

    [
        "You are a strict JSON extraction engine for user goal logging.",
        "",
        "USER GOALS (ONLY THESE ARE ALLOWED MATCHES):",
        goals_json.as_str(),
        "",
        "NON-NEGOTIABLE RULES:",
        "1) The user may describe ONE OR MORE activities in USER_TEXT. You MUST extract all clearly performed activities.",
        "2) For EACH extracted activity, output ONE item in items[].",
        "3) You MUST match ONLY against USER GOALS listed above. Never invent goals.",
        "4) If an activity matches a goal:",
        "   - set status = \"matched\"",
        "   - copy goal.id EXACTLY from USER GOALS (verbatim UUID)",
        "   - copy goal.name EXACTLY from USER GOALS",
        "   - copy goal.domain EXACTLY from USER GOALS",
        "5) If an activity does NOT match any goal:",
        "   - set status = \"goal_not_found\"",
        "   - set goal = null",
        "   - set activity_text to the activity phrase exactly as written by the user",
        "6) Spelling tolerance:",
        "   - Minor spelling mistakes and tense changes are allowed if intent is obvious",
        "   - If intent is not obvious, treat as goal_not_found",
        "7) Only log activities the user clearly DID.",
        "   - Do NOT log future plans, wishes, hypotheticals, or negations",
        "8) Value/unit extraction:",
        "   - If value and unit are present, extract them",
        "   - If missing, set value_number = null and unit = null",
        "",
        "9) Timestamp rule:",
        "   - CURRENT_TIME will be provided in the user message",
        "   - occurred_at is REQUIRED but MAY be null",
        "   - If an explicit time is present, convert it to ISO-8601",
        "   - If NO explicit time is present, occurred_at = null",
        "   - If only \"today\" is mentioned, occurred_at = null",
        "",
        "10) Output JSON only. No prose. No markdown.",
        "",
        "OUTPUT FORMAT (MUST MATCH EXACTLY):",
        "{",
        "  \"items\": [",
        "    {",
        "      \"status\": \"matched\" | \"goal_not_found\",",
        "      \"activity_text\": \"<string>\",",
        "      \"goal\": {",
        "        \"id\": \"<uuid>\",",
        "        \"name\": \"<string>\",",
        "        \"domain\": \"<string>\"",
        "      } | null,",
        "      \"value_number\": <number|null>,",
        "      \"unit\": <string|null>,",
        "      \"occurred_at\": <\"ISO-8601 timestamp\" | null>,",
        "      \"confidence\": <number 0..1>",
        "    }",
        "  ]",
        "}",
    ]
    .join("\n")
}

/// Load the user's active goal documents, build the extraction prompt, and
/// run one completion call. Returns the raw model content.
pub async fn extract_activities(
    store: &dyn GoalStore,
    provider: &dyn CompletionProvider,
    user_id: &str,
    user_text: &str,
    current_time: &str,
) -> anyhow::Result<String> {
    let goals_meta = store.list_active_goal_meta(user_id).await?;
    let system_prompt = build_extraction_system_prompt(&goals_meta);
    provider.complete(&system_prompt, user_text, current_time).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_prompt_embeds_goal_documents() {
        let goals = vec![json!({"id": "abc-123", "name": "run", "domain": "fitness"})];
        let prompt = build_extraction_system_prompt(&goals);
        assert!(prompt.contains("\"id\":\"abc-123\""));
        assert!(prompt.contains("ONLY THESE ARE ALLOWED MATCHES"));
        assert!(prompt.contains("goal_not_found"));
        assert!(prompt.contains("Output JSON only"));
    }

    #[test]
    fn test_prompt_with_no_goals_embeds_empty_list() {
        let prompt = build_extraction_system_prompt(&[]);
        assert!(prompt.contains("USER GOALS (ONLY THESE ARE ALLOWED MATCHES):\n[]"));
    }
}
