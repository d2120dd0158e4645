mod backend;
pub mod error;

pub use backend::{Backend, HttpBackend};
pub use error::{Error, Result};
pub use hyper::StatusCode;

use chrono::{DateTime, NaiveDate, Utc};
use core::{num::NonZeroI64, time::Duration};
use model::{AssignmentRecord, AttendanceUpsert, Question, Student};
use std::sync::Arc;
use tokio::time;

/// How many times a single upsert is attempted before giving up.
const MAX_ATTEMPTS: u32 = 3;
/// Delay before the first retry; doubles on each subsequent one.
const FIRST_RETRY: Duration = Duration::from_millis(250);

/// Turns local mutations into idempotent upsert calls against the backend
/// and retries the transient failures. Reads pass straight through; their
/// caller decides whether a failed fetch is worth repeating.
pub struct PersistClient {
    backend: Arc<dyn Backend>,
}

impl From<Arc<dyn Backend>> for PersistClient {
    fn from(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }
}

impl PersistClient {
    pub async fn upsert(&self, body: &AttendanceUpsert) -> Result<AssignmentRecord> {
        let mut delay = FIRST_RETRY;
        let mut attempt = 1;
        loop {
            let err = match self.backend.upsert(body).await {
                Ok(echo) => return Ok(echo),
                Err(err) => err,
            };
            if !err.is_transient() || attempt >= MAX_ATTEMPTS {
                return Err(err);
            }
            log::warn!(
                "upsert for student {} failed on attempt {attempt}: {err}; retrying in {delay:?}",
                body.student_id
            );
            time::sleep(delay).await;
            delay *= 2;
            attempt += 1;
        }
    }

    pub async fn list(&self, class_id: NonZeroI64, date: NaiveDate) -> Result<Vec<AssignmentRecord>> {
        self.backend.list(class_id, date).await
    }

    pub async fn roster(&self, class_id: NonZeroI64) -> Result<Vec<Student>> {
        self.backend.roster(class_id).await
    }

    pub async fn questions(&self, teacher_id: NonZeroI64) -> Result<Vec<Question>> {
        self.backend.questions(teacher_id).await
    }

    pub async fn touch_question(&self, question_id: NonZeroI64, at: DateTime<Utc>) -> Result<()> {
        self.backend.touch_question(question_id, at).await
    }
}

#[cfg(test)]
mod tests {
    use super::{Backend, Error, PersistClient, Result, MAX_ATTEMPTS};
    use async_trait::async_trait;
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};
    use core::num::NonZeroI64;
    use hyper::StatusCode;
    use model::{AssignmentRecord, AttendanceUpsert, Question, Student};
    use std::{
        collections::HashMap,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc, Mutex,
        },
    };

    type Key = (NonZeroI64, NonZeroI64, NaiveDate);

    /// Backend that fails the first `failures` upserts, then stores records
    /// keyed the way the real endpoint does.
    struct ScriptedBackend {
        calls: AtomicUsize,
        failures: usize,
        transient: bool,
        stored: Mutex<HashMap<Key, AssignmentRecord>>,
    }

    impl ScriptedBackend {
        fn new(failures: usize, transient: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                failures,
                transient,
                stored: Mutex::new(HashMap::new()),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Backend for ScriptedBackend {
        async fn upsert(&self, body: &AttendanceUpsert) -> Result<AssignmentRecord> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(if self.transient {
                    Error::Unavailable(StatusCode::BAD_GATEWAY)
                } else {
                    Error::Rejected(StatusCode::BAD_REQUEST)
                });
            }
            let record = AssignmentRecord {
                student_id: body.student_id,
                class_id: body.class_id,
                date: body.date,
                question_id: body.question_id,
                answer: body.answer.clone(),
                updated_at: Utc.with_ymd_and_hms(2026, 3, 9, 14, 5, 0).unwrap(),
            };
            let key = (body.student_id, body.class_id, body.date);
            self.stored.lock().unwrap().insert(key, record.clone());
            Ok(record)
        }

        async fn list(&self, _: NonZeroI64, _: NaiveDate) -> Result<Vec<AssignmentRecord>> {
            Ok(Vec::new())
        }

        async fn roster(&self, _: NonZeroI64) -> Result<Vec<Student>> {
            Ok(Vec::new())
        }

        async fn questions(&self, _: NonZeroI64) -> Result<Vec<Question>> {
            Ok(Vec::new())
        }

        async fn touch_question(&self, _: NonZeroI64, _: DateTime<Utc>) -> Result<()> {
            Ok(())
        }
    }

    fn body() -> AttendanceUpsert {
        AttendanceUpsert {
            student_id: NonZeroI64::new(7).unwrap(),
            class_id: NonZeroI64::new(3).unwrap(),
            date: NaiveDate::from_ymd_opt(2026, 3, 9).unwrap(),
            question_id: NonZeroI64::new(41).unwrap(),
            status: String::from("present"),
            answer: String::from("Red"),
            notes: None,
        }
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn transient_failures_are_retried() {
        let backend = Arc::new(ScriptedBackend::new(2, true));
        let client = PersistClient::from(Arc::clone(&backend) as Arc<dyn Backend>);
        let echo = client.upsert(&body()).await.unwrap();
        assert_eq!(echo.answer, "Red");
        assert_eq!(backend.calls(), 3);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn retries_are_bounded() {
        let backend = Arc::new(ScriptedBackend::new(usize::MAX, true));
        let client = PersistClient::from(Arc::clone(&backend) as Arc<dyn Backend>);
        let err = client.upsert(&body()).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(backend.calls(), MAX_ATTEMPTS as usize);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn rejections_are_not_retried() {
        let backend = Arc::new(ScriptedBackend::new(usize::MAX, false));
        let client = PersistClient::from(Arc::clone(&backend) as Arc<dyn Backend>);
        let err = client.upsert(&body()).await.unwrap_err();
        assert!(!err.is_transient());
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn repeated_upserts_keep_one_logical_record() {
        let backend = Arc::new(ScriptedBackend::new(0, true));
        let client = PersistClient::from(Arc::clone(&backend) as Arc<dyn Backend>);
        client.upsert(&body()).await.unwrap();
        client.upsert(&body()).await.unwrap();
        assert_eq!(backend.stored.lock().unwrap().len(), 1);
    }
}
