use alloc::string::String;
use core::num::NonZeroI64;
use serde::{Deserialize, Serialize};

/// One roster entry. The roster service owns these; a view never mutates
/// them within a session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: NonZeroI64,
    pub class_id: NonZeroI64,
    pub name: String,
}
