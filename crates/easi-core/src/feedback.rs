//! Feedback left by the governance team or GRB reviewers on a request.
//!
//! Records are append-only: resubmitting a form never clears feedback, so the
//! "read feedback" link on a task-list row stays visible once it appears.
//!
//! IDs are sequential per intake: FB1, FB2, FB3, ...

use crate::types::{FeedbackTarget, FeedbackType, TaskStage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub id: String,
    pub target_form: FeedbackTarget,
    pub feedback_type: FeedbackType,
    pub feedback: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Append a record and return its ID.
pub fn add(
    records: &mut Vec<FeedbackRecord>,
    target_form: FeedbackTarget,
    feedback_type: FeedbackType,
    feedback: impl Into<String>,
    author: Option<String>,
) -> String {
    // Highest numeric suffix + 1 so IDs stay unique if records are ever imported out of order.
    let max = records
        .iter()
        .filter_map(|r| r.id.strip_prefix("FB")?.parse::<usize>().ok())
        .max()
        .unwrap_or(0);
    let id = format!("FB{}", max + 1);
    records.push(FeedbackRecord {
        id: id.clone(),
        target_form,
        feedback_type,
        feedback: feedback.into(),
        author,
        created_at: Utc::now(),
    });
    id
}

/// True if any record targets the given task-list row.
pub fn has_feedback_for(records: &[FeedbackRecord], stage: TaskStage) -> bool {
    records.iter().any(|r| r.target_form.stage() == stage)
}

/// Records shown behind a row's "read feedback" link: governance-team
/// feedback before reviewer feedback, newest first within each type.
pub fn feedback_for(records: &[FeedbackRecord], stage: TaskStage) -> Vec<&FeedbackRecord> {
    let mut matching: Vec<&FeedbackRecord> = records
        .iter()
        .filter(|r| r.target_form.stage() == stage)
        .collect();
    matching.sort_by(|a, b| {
        a.feedback_type
            .cmp(&b.feedback_type)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
    matching
}
