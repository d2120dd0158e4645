use crate::{
    cache::{self, Cache},
    clock::Clock,
    error::Result,
    rotation,
};
use chrono::{Duration, NaiveDate};
use client::PersistClient;
use core::num::NonZeroI64;
use model::{AssignmentRecord, AttendanceUpsert, Question, Student};
use rand::Rng;
use std::sync::Arc;

/// Rosters and question pools barely move during a lesson.
const ROSTER_TTL_MINUTES: i64 = 5;
const QUESTIONS_TTL_MINUTES: i64 = 5;
/// Assignments churn constantly; the cache only absorbs hydrate storms.
const ATTENDANCE_TTL_SECONDS: i64 = 30;

/// Cached front door to the backend collaborators. Every read is memoized
/// under the shared key contract (`students:{classId}`,
/// `attendance:{classId}:{date}`, `questions:{teacherId}`) and every
/// successful mutation invalidates its prefix.
pub struct Directory {
    client: PersistClient,
    clock: Arc<dyn Clock>,
    students: Cache<Vec<Student>>,
    questions: Cache<Vec<Question>>,
    attendance: Cache<Vec<AssignmentRecord>>,
}

impl Directory {
    pub fn new(client: PersistClient, clock: Arc<dyn Clock>) -> Self {
        Self {
            client,
            students: Cache::new(Arc::clone(&clock)),
            questions: Cache::new(Arc::clone(&clock)),
            attendance: Cache::new(Arc::clone(&clock)),
            clock,
        }
    }

    pub async fn roster(&self, class_id: NonZeroI64) -> Result<Vec<Student>> {
        let key = cache::students_key(class_id);
        if let Some(roster) = self.students.get(&key) {
            return Ok(roster);
        }
        let roster = self.client.roster(class_id).await?;
        self.students.set(&key, roster.clone(), Duration::minutes(ROSTER_TTL_MINUTES));
        Ok(roster)
    }

    pub async fn question_pool(&self, teacher_id: NonZeroI64) -> Result<Vec<Question>> {
        let key = cache::questions_key(teacher_id);
        if let Some(pool) = self.questions.get(&key) {
            return Ok(pool);
        }
        let pool = self.client.questions(teacher_id).await?;
        self.questions.set(&key, pool.clone(), Duration::minutes(QUESTIONS_TTL_MINUTES));
        Ok(pool)
    }

    /// The hydrate read path for one class day.
    pub async fn assignments(&self, class_id: NonZeroI64, date: NaiveDate) -> Result<Vec<AssignmentRecord>> {
        let key = cache::attendance_key(class_id, date);
        if let Some(records) = self.attendance.get(&key) {
            return Ok(records);
        }
        let records = self.client.list(class_id, date).await?;
        self.attendance.set(&key, records.clone(), Duration::seconds(ATTENDANCE_TTL_SECONDS));
        Ok(records)
    }

    /// Drop the cached assignments for a class day so the next read hits
    /// the backend. Used before reconnect re-hydrates.
    pub fn refresh_assignments(&self, class_id: NonZeroI64, date: NaiveDate) {
        self.attendance.invalidate(&cache::attendance_key(class_id, date));
    }

    /// Persist one assignment write (with the client's bounded retry) and
    /// invalidate the day's cached read.
    pub async fn upsert(&self, body: &AttendanceUpsert) -> Result<AssignmentRecord> {
        let echo = self.client.upsert(body).await?;
        self.attendance.invalidate(&cache::attendance_key(body.class_id, body.date));
        Ok(echo)
    }

    /// Rotate to the next question for a class: pull the teacher's pool,
    /// pick outside the seven-day window, and report the selection to the
    /// question bank. Returns the chosen question and whether the window
    /// covered the whole pool (so the caller can warn about repeats).
    pub async fn pick_question<R: Rng>(
        &self,
        teacher_id: NonZeroI64,
        rng: &mut R,
    ) -> Result<(Question, bool)> {
        let mut pool = self.question_pool(teacher_id).await?;
        let now = self.clock.now();
        let selection = rotation::pick(&mut pool, now, rng)?;
        self.client.touch_question(selection.question_id, now).await?;
        self.questions.invalidate(&cache::questions_key(teacher_id));
        let chosen = pool.swap_remove(selection.index);
        Ok((chosen, selection.exhausted))
    }
}
