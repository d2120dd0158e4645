#![cfg_attr(not(test), no_std)]

extern crate alloc;

mod assignment;
mod question;
mod realtime;
mod student;

pub use assignment::{AssignmentRecord, AttendanceUpsert, STATUS_PRESENT};
pub use question::{Difficulty, Question};
pub use realtime::Envelope;
pub use student::Student;
