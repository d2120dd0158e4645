use alloc::{string::String, vec::Vec};
use chrono::{DateTime, Utc};
use core::num::NonZeroI64;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// A pool entry from the question bank. The engine only reads `answers`
/// and stamps `last_used_at` when the rotation selector picks the entry;
/// everything else is display metadata owned by the question bank.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: NonZeroI64,
    /// Question to be displayed to the class.
    pub text: String,
    /// Answer zones to drop students into (two to eight entries).
    pub answers: Vec<String>,
    pub category: String,
    pub difficulty: Difficulty,
    pub visual_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
}
