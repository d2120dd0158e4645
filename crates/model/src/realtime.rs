use crate::assignment::AssignmentRecord;
use alloc::string::String;
use chrono::{DateTime, NaiveDate, Utc};
use core::num::NonZeroI64;
use serde::{Deserialize, Serialize};

/// Frames exchanged on the realtime channel of one class-day view.
/// Unrecognized `type` values must still deserialize (to [`Unknown`])
/// so peers can introduce new message kinds without breaking older
/// viewers — they are ignored, not errors.
///
/// [`Unknown`]: Envelope::Unknown
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Envelope {
    #[serde(rename_all = "camelCase")]
    Assignment {
        class_id: NonZeroI64,
        date: NaiveDate,
        student_id: NonZeroI64,
        answer: String,
        updated_at: DateTime<Utc>,
    },
    #[serde(other)]
    Unknown,
}

impl Envelope {
    pub fn assignment(record: &AssignmentRecord) -> Self {
        Self::Assignment {
            class_id: record.class_id,
            date: record.date,
            student_id: record.student_id,
            answer: record.answer.clone(),
            updated_at: record.updated_at,
        }
    }
}
