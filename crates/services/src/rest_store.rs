use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};

use academy_core::model::{LearnerId, LessonCompletion, LessonId};
use storage::repository::{ProgressRepository, StorageError};

use crate::config::RestStoreConfig;

const PROGRESS_TABLE: &str = "user_progress";

/// `ProgressRepository` backed by a hosted PostgREST endpoint.
///
/// Rows live in `user_progress`, unique on `(user_id, lesson_id)`; writes are
/// upserts so repeat completions refresh `last_watched_at` in place.
///
/// The bearer is the configured session token when there is one, otherwise
/// the project key. The token is fixed at construction; a session that
/// changes later needs a new store.
#[derive(Clone)]
pub struct RestProgressStore {
    client: Client,
    config: RestStoreConfig,
}

impl RestProgressStore {
    #[must_use]
    pub fn new(config: RestStoreConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{PROGRESS_TABLE}", self.config.base_url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let bearer = self
            .config
            .access_token
            .as_deref()
            .unwrap_or(&self.config.api_key);
        request
            .header("apikey", &self.config.api_key)
            .bearer_auth(bearer)
    }

    async fn send(request: RequestBuilder) -> Result<Response, StorageError> {
        let response = request
            .send()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        check_status(response.status())?;
        Ok(response)
    }
}

/// Map a non-success HTTP status to the storage error the tracker classifies.
pub(crate) fn check_status(status: StatusCode) -> Result<(), StorageError> {
    if status.is_success() {
        return Ok(());
    }
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(StorageError::Unauthorized),
        other => Err(StorageError::Connection(format!("unexpected status {other}"))),
    }
}

#[derive(Debug, Deserialize)]
struct ProgressRow {
    lesson_id: String,
}

#[derive(Debug, Serialize)]
struct UpsertRow<'a> {
    user_id: &'a str,
    lesson_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    course_id: Option<&'a str>,
    completed: bool,
    last_watched_at: DateTime<Utc>,
}

#[async_trait]
impl ProgressRepository for RestProgressStore {
    async fn fetch_completions(&self, learner_id: &LearnerId) -> Result<Vec<LessonId>, StorageError> {
        let request = self.authorized(self.client.get(self.table_url())).query(&[
            ("select", "lesson_id".to_owned()),
            ("user_id", format!("eq.{learner_id}")),
            ("completed", "eq.true".to_owned()),
            ("order", "last_watched_at.asc".to_owned()),
        ]);
        let body = Self::send(request)
            .await?
            .text()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let rows: Vec<ProgressRow> =
            serde_json::from_str(&body).map_err(|e| StorageError::Serialization(e.to_string()))?;
        let ids = rows
            .into_iter()
            .map(|row| LessonId::new(row.lesson_id))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        tracing::debug!(learner = %learner_id, count = ids.len(), "fetched remote completions");
        Ok(ids)
    }

    async fn upsert_completion(&self, completion: &LessonCompletion) -> Result<(), StorageError> {
        let row = UpsertRow {
            user_id: completion.learner_id.as_str(),
            lesson_id: completion.lesson_id.as_str(),
            course_id: completion.course_id.as_ref().map(|c| c.as_str()),
            completed: true,
            last_watched_at: completion.completed_at,
        };
        let request = self
            .authorized(self.client.post(self.table_url()))
            .query(&[("on_conflict", "user_id,lesson_id")])
            .header("Prefer", "resolution=merge-duplicates")
            .json(&row);
        Self::send(request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use academy_core::time::fixed_now;
    use academy_core::model::CourseId;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Accept one connection, answer with `status` and `body`, and return the raw request.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0_u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                raw.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&raw).to_string();
                if let Some(end) = text.find("\r\n\r\n") {
                    let content_length = text[..end]
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if raw.len() >= end + 4 + content_length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&raw).to_string()
        });
        (format!("http://{addr}"), handle)
    }

    fn store(base_url: &str) -> RestProgressStore {
        RestProgressStore::new(RestStoreConfig::new(base_url, "anon-key").unwrap())
    }

    #[test]
    fn auth_statuses_map_to_unauthorized() {
        assert!(check_status(StatusCode::CREATED).is_ok());
        assert!(matches!(
            check_status(StatusCode::UNAUTHORIZED),
            Err(StorageError::Unauthorized)
        ));
        assert!(matches!(
            check_status(StatusCode::FORBIDDEN),
            Err(StorageError::Unauthorized)
        ));
        assert!(matches!(
            check_status(StatusCode::SERVICE_UNAVAILABLE),
            Err(StorageError::Connection(_))
        ));
    }

    #[tokio::test]
    async fn fetch_reads_lesson_ids_in_server_order() {
        let (url, server) =
            serve_once("200 OK", r#"[{"lesson_id":"L3"},{"lesson_id":"L1"}]"#).await;

        let ids = store(&url)
            .fetch_completions(&LearnerId::new("u1").unwrap())
            .await
            .unwrap();
        assert_eq!(ids, vec![LessonId::new("L3").unwrap(), LessonId::new("L1").unwrap()]);

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /rest/v1/user_progress?"));
        assert!(request.contains("user_id=eq.u1"));
        assert!(request.contains("completed=eq.true"));
        assert!(request.contains("order=last_watched_at.asc"));
        assert!(request.to_ascii_lowercase().contains("apikey: anon-key"));
        assert!(request.contains("Bearer anon-key"));
    }

    #[tokio::test]
    async fn session_token_is_sent_as_bearer() {
        let (url, server) = serve_once("200 OK", "[]").await;
        let config = RestStoreConfig::new(&url, "anon-key")
            .unwrap()
            .with_access_token("learner-jwt");

        let ids = RestProgressStore::new(config)
            .fetch_completions(&LearnerId::new("u1").unwrap())
            .await
            .unwrap();
        assert!(ids.is_empty());

        let request = server.await.unwrap();
        assert!(request.to_ascii_lowercase().contains("apikey: anon-key"));
        assert!(request.contains("Bearer learner-jwt"));
        assert!(!request.contains("Bearer anon-key"));
    }

    #[tokio::test]
    async fn fetch_with_expired_session_is_unauthorized() {
        let (url, server) = serve_once("401 Unauthorized", r#"{"message":"JWT expired"}"#).await;

        let err = store(&url)
            .fetch_completions(&LearnerId::new("u1").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Unauthorized));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn fetch_with_unexpected_shape_is_serialization_error() {
        let (url, server) = serve_once("200 OK", r#"{"rows":[]}"#).await;

        let err = store(&url)
            .fetch_completions(&LearnerId::new("u1").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Serialization(_)));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn upsert_posts_merge_duplicates_row() {
        let (url, server) = serve_once("201 Created", "").await;
        let completion = LessonCompletion::new(
            LearnerId::new("u1").unwrap(),
            LessonId::new("L9").unwrap(),
            Some(CourseId::new("C1").unwrap()),
            fixed_now(),
        );

        store(&url).upsert_completion(&completion).await.unwrap();

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /rest/v1/user_progress?on_conflict=user_id%2Clesson_id"));
        assert!(request.contains("resolution=merge-duplicates"));
        assert!(request.contains(r#""lesson_id":"L9""#));
        assert!(request.contains(r#""course_id":"C1""#));
        assert!(request.contains(r#""completed":true"#));
    }

    #[tokio::test]
    async fn unreachable_store_is_connection_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = store(&format!("http://{addr}"))
            .fetch_completions(&LearnerId::new("u1").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Connection(_)));
    }
}
