use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use core::num::NonZeroI64;
use http_body_util::{BodyExt, Full};
use hyper::{body::Bytes, header, Method, Request, Uri};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use model::{AssignmentRecord, AttendanceUpsert, Question, Student};
use serde::de::DeserializeOwned;
use serde_json::json;

/// The authoritative store behind the engine, injected as a trait so that
/// retry logic and sessions are testable without sockets.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Idempotent upsert keyed by `(studentId, classId, date)`. The echo
    /// carries the server-assigned `updatedAt`.
    async fn upsert(&self, body: &AttendanceUpsert) -> Result<AssignmentRecord>;
    /// Every record for one class day; the hydrate read path.
    async fn list(&self, class_id: NonZeroI64, date: NaiveDate) -> Result<Vec<AssignmentRecord>>;
    async fn roster(&self, class_id: NonZeroI64) -> Result<Vec<Student>>;
    async fn questions(&self, teacher_id: NonZeroI64) -> Result<Vec<Question>>;
    /// Stamp `lastUsedAt` on a selected question. The question bank owns
    /// the persisted value; the engine only reports the selection.
    async fn touch_question(&self, question_id: NonZeroI64, at: DateTime<Utc>) -> Result<()>;
}

/// [`Backend`] over the REST endpoints of the class backend.
pub struct HttpBackend {
    base: Box<str>,
    client: Client<HttpConnector, Full<Bytes>>,
}

impl HttpBackend {
    pub fn new(base: &str) -> Result<Self> {
        let trimmed = base.trim_end_matches('/');
        let _: Uri = trimmed.parse()?;
        let client = Client::builder(TokioExecutor::new()).build_http();
        Ok(Self { base: trimmed.into(), client })
    }

    async fn send(&self, method: Method, path_and_query: &str, body: Option<Vec<u8>>) -> Result<Bytes> {
        let uri: Uri = [self.base.as_ref(), path_and_query].concat().parse()?;
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(bytes) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Full::new(Bytes::from(bytes)))?,
            None => builder.body(Full::default())?,
        };

        let response = self.client.request(request).await?;
        let status = response.status();
        if status.is_server_error() {
            return Err(Error::Unavailable(status));
        }
        if !status.is_success() {
            return Err(Error::Rejected(status));
        }
        Ok(response.into_body().collect().await?.to_bytes())
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        method: Method,
        path_and_query: &str,
        body: Option<Vec<u8>>,
    ) -> Result<T> {
        let bytes = self.send(method, path_and_query, body).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn upsert(&self, body: &AttendanceUpsert) -> Result<AssignmentRecord> {
        let payload = serde_json::to_vec(body)?;
        self.fetch(Method::POST, "/attendance", Some(payload)).await
    }

    async fn list(&self, class_id: NonZeroI64, date: NaiveDate) -> Result<Vec<AssignmentRecord>> {
        let query = format!("/attendance?classId={class_id}&date={date}");
        self.fetch(Method::GET, &query, None).await
    }

    async fn roster(&self, class_id: NonZeroI64) -> Result<Vec<Student>> {
        let query = format!("/students?classId={class_id}");
        self.fetch(Method::GET, &query, None).await
    }

    async fn questions(&self, teacher_id: NonZeroI64) -> Result<Vec<Question>> {
        let query = format!("/questions?teacherId={teacher_id}");
        self.fetch(Method::GET, &query, None).await
    }

    async fn touch_question(&self, question_id: NonZeroI64, at: DateTime<Utc>) -> Result<()> {
        let payload = serde_json::to_vec(&json!({ "lastUsedAt": at }))?;
        let path = format!("/questions/{question_id}");
        self.send(Method::PATCH, &path, Some(payload)).await?;
        Ok(())
    }
}
