use alloc::string::String;
use chrono::{DateTime, NaiveDate, Utc};
use core::num::NonZeroI64;
use serde::{Deserialize, Serialize};

/// Marker stored in the `status` column of the attendance endpoint. A
/// check-in *is* an attendance mark; absence is the lack of a record.
pub const STATUS_PRESENT: &str = "present";

/// The durable student-to-answer mapping for one class day. At most one
/// record exists per `(student_id, class_id, date)`; a later write with
/// the same key overwrites `answer` and `updated_at`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentRecord {
    pub student_id: NonZeroI64,
    pub class_id: NonZeroI64,
    pub date: NaiveDate,
    pub question_id: NonZeroI64,
    pub answer: String,
    pub updated_at: DateTime<Utc>,
}

/// Body of the idempotent `POST /attendance` upsert. The server assigns
/// `updatedAt` itself and echoes the stored record back.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceUpsert {
    pub student_id: NonZeroI64,
    pub class_id: NonZeroI64,
    pub date: NaiveDate,
    pub question_id: NonZeroI64,
    pub status: String,
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl AssignmentRecord {
    pub fn upsert(&self) -> AttendanceUpsert {
        AttendanceUpsert {
            student_id: self.student_id,
            class_id: self.class_id,
            date: self.date,
            question_id: self.question_id,
            status: String::from(STATUS_PRESENT),
            answer: self.answer.clone(),
            notes: None,
        }
    }
}
