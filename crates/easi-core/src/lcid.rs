//! Life Cycle ID records.
//!
//! An LCID is issued by an admin decision and afterwards only changes through
//! admin actions (update, retire, unretire, expire). Whether it has expired is
//! derived from `expires_at` and the caller's notion of "today"; it is not
//! stored unless an admin expires it early.

use crate::types::{LcidStatus, TrbFollowUp};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LcidRecord {
    pub lcid: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retires_at: Option<NaiveDate>,
    pub scope: String,
    pub next_steps: String,
    pub trb_follow_up: TrbFollowUp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_baseline: Option<String>,
    #[serde(default)]
    pub expired_manually: bool,
}

impl LcidRecord {
    pub fn status(&self, today: NaiveDate) -> LcidStatus {
        if self.expired_manually || self.expires_at < today {
            return LcidStatus::Expired;
        }
        match self.retires_at {
            Some(retires_at) if retires_at <= today => LcidStatus::Retired,
            _ => LcidStatus::Issued,
        }
    }
}

/// Format the LCID for the `sequence`-th issuance on `date` (0-based):
/// two-digit year, three-digit day of year, then a sequence letter.
/// Past 26 issuances a day the letter is followed by a number (`A1`, `B1`, ...).
pub fn format_lcid(date: NaiveDate, sequence: usize) -> String {
    let letter = (b'A' + (sequence % 26) as u8) as char;
    let round = sequence / 26;
    let prefix = format!("{}{letter}", lcid_day_prefix(date));
    if round == 0 {
        prefix
    } else {
        format!("{prefix}{round}")
    }
}

/// Prefix shared by every LCID issued on `date`.
pub fn lcid_day_prefix(date: NaiveDate) -> String {
    format!("{:02}{:03}", date.year() % 100, date.ordinal())
}
