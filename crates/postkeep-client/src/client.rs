//! API client for the Postkeep server

use crate::error::{ClientError, Result};
use postkeep_types::{Record, RecordPatch};
use reqwest::{Client as ReqwestClient, Response, StatusCode};
use std::time::Duration;
use tracing::{debug, info, warn};

/// How often and how patiently a failed submission is retried
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per record, including the first
    pub max_attempts: u32,
    /// Delay before the first retry; doubled on every further retry
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

/// Outcome of [`PostsClient::submit_all`]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SubmitReport {
    pub stored: usize,
    /// Ids the server already had
    pub duplicates: Vec<String>,
    /// Ids given up on after errors
    pub skipped: Vec<String>,
}

pub struct PostsClient {
    http: ReqwestClient,
    base_url: String,
    retry: RetryPolicy,
}

impl PostsClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: ReqwestClient::new(),
            base_url,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn posts_url(&self) -> String {
        format!("{}/posts/", self.base_url)
    }

    fn post_url(&self, id: &str) -> String {
        format!("{}/posts/{}/", self.base_url, id)
    }

    pub async fn list(&self) -> Result<Vec<Record>> {
        let response = self.http.get(self.posts_url()).send().await?;
        Ok(check(response).await?.json().await?)
    }

    /// Fetch one record; `None` when the server does not know the id.
    pub async fn get(&self, id: &str) -> Result<Option<Record>> {
        let response = self.http.get(self.post_url(id)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(check(response).await?.json().await?))
    }

    /// Store a record and return the sequence number the server assigned.
    pub async fn create(&self, record: &Record) -> Result<u64> {
        let response = self.http.post(self.posts_url()).json(record).send().await?;
        let body: serde_json::Value = check(response).await?.json().await?;
        body.get(&record.unique_id)
            .and_then(|seq| seq.as_u64())
            .ok_or_else(|| ClientError::UnexpectedResponse(body.to_string()))
    }

    /// Merge `patch` into the stored record and return the result.
    pub async fn update(&self, id: &str, patch: &RecordPatch) -> Result<Record> {
        let response = self.http.put(self.post_url(id)).json(patch).send().await?;
        Ok(check(response).await?.json().await?)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let response = self.http.delete(self.post_url(id)).send().await?;
        check(response).await?;
        Ok(())
    }

    /// POST every record, retrying server and transport failures.
    ///
    /// A record the server already holds counts as a duplicate; a record
    /// still failing after the last attempt, or rejected as invalid, is
    /// skipped with a warning.
    pub async fn submit_all(&self, records: &[Record]) -> SubmitReport {
        let mut report = SubmitReport::default();

        for record in records {
            let id = record.unique_id.clone();
            let mut attempt = 1;
            loop {
                match self.create(record).await {
                    Ok(seq) => {
                        debug!("Stored {} as #{}", id, seq);
                        report.stored += 1;
                        break;
                    }
                    Err(e) if e.status() == Some(StatusCode::CONFLICT.as_u16()) => {
                        info!("Post {} already stored", id);
                        report.duplicates.push(id);
                        break;
                    }
                    Err(e) if e.is_retryable() && attempt < self.retry.max_attempts => {
                        let delay = self.retry.base_delay * 2u32.saturating_pow(attempt - 1);
                        warn!(
                            "Attempt {}/{} for {} failed, retrying in {:?}: {}",
                            attempt, self.retry.max_attempts, id, delay, e
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    Err(e) => {
                        warn!("Skipping post {}: {}", id, e);
                        report.skipped.push(id);
                        break;
                    }
                }
            }
        }

        report
    }
}

async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v["error"].as_str().map(str::to_string))
        .unwrap_or(body);
    Err(ClientError::Status {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::{Path, State},
        http::StatusCode as AxumStatus,
        response::IntoResponse,
        routing::{get, post},
        Json, Router,
    };
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    const ID: &str = "11111111-1111-1111-1111-111111111111";
    const DUPLICATE: &str = "22222222-2222-2222-2222-222222222222";
    const INVALID: &str = "33333333-3333-3333-3333-333333333333";

    #[derive(Clone)]
    struct Mock {
        /// Number of POSTs answered with 500 before succeeding
        failures: u32,
        posts: Arc<AtomicU32>,
    }

    async fn create(State(mock): State<Mock>, Json(record): Json<Record>) -> impl IntoResponse {
        let n = mock.posts.fetch_add(1, Ordering::SeqCst);
        match record.unique_id.as_str() {
            DUPLICATE => (AxumStatus::CONFLICT, Json(json!({ "error": "exists" }))),
            INVALID => (AxumStatus::BAD_REQUEST, Json(json!({ "error": "bad" }))),
            _ if n < mock.failures => (
                AxumStatus::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "boom" })),
            ),
            id => (AxumStatus::CREATED, Json(json!({ id: 7 }))),
        }
    }

    async fn fetch(Path(id): Path<String>) -> impl IntoResponse {
        if id == ID {
            Json(record(ID)).into_response()
        } else {
            (AxumStatus::NOT_FOUND, Json(json!({ "error": "missing" }))).into_response()
        }
    }

    async fn replace(Path(id): Path<String>, Json(patch): Json<RecordPatch>) -> impl IntoResponse {
        if id != ID {
            return (AxumStatus::NOT_FOUND, Json(json!({ "error": "missing" }))).into_response();
        }
        let mut stored = record(ID);
        patch.apply_to(&mut stored);
        Json(stored).into_response()
    }

    async fn remove(Path(id): Path<String>) -> impl IntoResponse {
        if id == ID {
            AxumStatus::OK.into_response()
        } else {
            (AxumStatus::NOT_FOUND, Json(json!({ "error": "missing" }))).into_response()
        }
    }

    async fn spawn_mock(failures: u32) -> (String, Arc<AtomicU32>) {
        let posts = Arc::new(AtomicU32::new(0));
        let mock = Mock {
            failures,
            posts: posts.clone(),
        };
        let app = Router::new()
            .route("/posts/", post(create).get(|| async { Json(vec![record(ID)]) }))
            .route("/posts/:id/", get(fetch).put(replace).delete(remove))
            .with_state(mock);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}/", addr), posts)
    }

    fn record(id: &str) -> Record {
        Record {
            unique_id: id.to_string(),
            url: "https://x".to_string(),
            ..Default::default()
        }
    }

    fn fast_retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_create_returns_sequence() {
        let (url, _) = spawn_mock(0).await;
        let client = PostsClient::new(url);
        assert_eq!(client.create(&record(ID)).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_get_and_list() {
        let (url, _) = spawn_mock(0).await;
        let client = PostsClient::new(url);

        assert_eq!(client.get(ID).await.unwrap(), Some(record(ID)));
        assert_eq!(client.get(DUPLICATE).await.unwrap(), None);
        assert_eq!(client.list().await.unwrap(), vec![record(ID)]);
    }

    #[tokio::test]
    async fn test_update_returns_merged_record() {
        let (url, _) = spawn_mock(0).await;
        let client = PostsClient::new(url);
        let patch = RecordPatch {
            vote_count: Some("99".to_string()),
            ..Default::default()
        };

        let updated = client.update(ID, &patch).await.unwrap();
        assert_eq!(updated.vote_count, "99");
        assert_eq!(updated.url, "https://x");

        let err = client.update(DUPLICATE, &patch).await.unwrap_err();
        assert_eq!(err.status(), Some(404));
    }

    #[tokio::test]
    async fn test_delete() {
        let (url, _) = spawn_mock(0).await;
        let client = PostsClient::new(url);

        client.delete(ID).await.unwrap();
        let err = client.delete(DUPLICATE).await.unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert!(err.to_string().contains("missing"));
    }

    #[tokio::test]
    async fn test_error_message_comes_from_body() {
        let (url, _) = spawn_mock(0).await;
        let client = PostsClient::new(url);

        let err = client.create(&record(INVALID)).await.unwrap_err();
        assert_eq!(err.status(), Some(400));
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("bad"));
    }

    #[tokio::test]
    async fn test_submit_retries_server_errors() {
        let (url, posts) = spawn_mock(2).await;
        let client = PostsClient::new(url).with_retry(fast_retry(3));

        let report = client.submit_all(&[record(ID)]).await;
        assert_eq!(report.stored, 1);
        assert!(report.skipped.is_empty());
        assert_eq!(posts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_submit_gives_up_after_max_attempts() {
        let (url, posts) = spawn_mock(10).await;
        let client = PostsClient::new(url).with_retry(fast_retry(2));

        let report = client.submit_all(&[record(ID)]).await;
        assert_eq!(report.stored, 0);
        assert_eq!(report.skipped, vec![ID.to_string()]);
        assert_eq!(posts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_submit_does_not_retry_client_errors() {
        let (url, posts) = spawn_mock(0).await;
        let client = PostsClient::new(url).with_retry(fast_retry(5));

        let report = client
            .submit_all(&[record(DUPLICATE), record(INVALID), record(ID)])
            .await;
        assert_eq!(
            report,
            SubmitReport {
                stored: 1,
                duplicates: vec![DUPLICATE.to_string()],
                skipped: vec![INVALID.to_string()],
            }
        );
        assert_eq!(posts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_skipped() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = PostsClient::new(format!("http://{}", addr)).with_retry(fast_retry(2));
        let report = client.submit_all(&[record(ID)]).await;
        assert_eq!(report.skipped, vec![ID.to_string()]);
    }
}
