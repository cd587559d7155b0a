use lambda_http::http::Error as HttpError;
use lambda_http::{Body, Response};
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

use crate::error::RecordError;
use crate::executor::Executor;
use crate::record::Record;
use crate::response::{error_response, json_response};

/// Inserts a new record with a server-generated id and timestamp.
pub async fn create_record(executor: &dyn Executor) -> Result<Response<Body>, HttpError> {
    let record = Record::new();
    info!(id = %record.id, created_at = %record.created_at_string(), "inserting record");

    match executor.insert(&record).await {
        Ok(()) => json_response(200, &json!({ "inserted_id": record.id_string() })),
        Err(e) => {
            error!(error = %e, "insert failed");
            error_response(&e)
        }
    }
}

/// Looks up one record by id.
pub async fn read_record(
    executor: &dyn Executor,
    id: Option<&str>,
) -> Result<Response<Body>, HttpError> {
    match fetch(executor, id).await {
        Ok(record) => json_response(
            200,
            &json!({
                "id": record.id_string(),
                "created_at": record.created_at_string(),
            }),
        ),
        Err(e) => {
            if e.status_code() >= 500 {
                error!(error = %e, "fetch failed");
            }
            error_response(&e)
        }
    }
}

async fn fetch(executor: &dyn Executor, id: Option<&str>) -> Result<Record, RecordError> {
    let id = id
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or(RecordError::ClientInput("Missing ?id="))?;

    // Only handler-generated UUIDs are ever stored.
    let Ok(id) = Uuid::parse_str(id) else {
        return Err(RecordError::NotFound);
    };

    executor.fetch(&id).await?.ok_or(RecordError::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::testing::{CountingCredentials, MemoryConnector};
    use crate::connection::ConnectionManager;
    use crate::executor::ReusableExecutor;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use serde_json::Value;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Counts calls and answers from a fixed record.
    #[derive(Default)]
    struct StubExecutor {
        calls: AtomicUsize,
        stored: Option<Record>,
        fail: bool,
    }

    #[async_trait]
    impl Executor for StubExecutor {
        async fn insert(&self, _record: &Record) -> Result<(), RecordError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(RecordError::Connectivity("token expired".into()));
            }
            Ok(())
        }

        async fn fetch(&self, id: &Uuid) -> Result<Option<Record>, RecordError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(RecordError::Execution(
                    "relation \"records\" does not exist".into(),
                ));
            }
            Ok(self.stored.clone().filter(|r| &r.id == id))
        }
    }

    fn memory_executor() -> ReusableExecutor<MemoryConnector> {
        ReusableExecutor::new(ConnectionManager::new(
            MemoryConnector::default(),
            Arc::new(CountingCredentials::default()),
        ))
    }

    fn status(response: &Response<Body>) -> u16 {
        response.status().as_u16()
    }

    fn body(response: &Response<Body>) -> Value {
        serde_json::from_slice(response.body()).unwrap()
    }

    #[tokio::test]
    async fn create_then_read_returns_same_record() {
        let executor = memory_executor();

        let created = create_record(&executor).await.unwrap();
        assert_eq!(status(&created), 200);
        let id = body(&created)["inserted_id"].as_str().unwrap().to_string();
        assert!(Uuid::parse_str(&id).is_ok());

        let read = read_record(&executor, Some(id.as_str())).await.unwrap();
        assert_eq!(status(&read), 200);
        let read_body = body(&read);
        assert_eq!(read_body["id"], id.as_str());

        let stored = executor
            .fetch(&Uuid::parse_str(&id).unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(read_body["created_at"], stored.created_at_string().as_str());
    }

    #[tokio::test]
    async fn repeated_creates_return_unique_ids() {
        let executor = memory_executor();
        let mut ids = HashSet::new();
        for _ in 0..50 {
            let response = create_record(&executor).await.unwrap();
            ids.insert(body(&response)["inserted_id"].as_str().unwrap().to_string());
        }
        assert_eq!(ids.len(), 50);
    }

    #[tokio::test]
    async fn missing_id_is_rejected_without_store_access() {
        let executor = StubExecutor::default();

        for id in [None, Some(""), Some("   ")] {
            let response = read_record(&executor, id).await.unwrap();
            assert_eq!(status(&response), 400);
            assert_eq!(body(&response), json!({ "error": "Missing ?id=" }));
        }
        assert_eq!(executor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let executor = memory_executor();

        let response = read_record(&executor, Some("doesnotexist")).await.unwrap();
        assert_eq!(status(&response), 404);
        assert_eq!(body(&response), json!({ "error": "Not found" }));

        let never_inserted = Uuid::new_v4().to_string();
        let response = read_record(&executor, Some(never_inserted.as_str()))
            .await
            .unwrap();
        assert_eq!(status(&response), 404);
    }

    #[tokio::test]
    async fn read_renders_stored_row() {
        let id = Uuid::parse_str("3fae1a2b-0c4d-4e5f-8a9b-0c1d2e3f4a5b").unwrap();
        let executor = StubExecutor {
            stored: Some(Record {
                id,
                created_at: NaiveDate::from_ymd_opt(2024, 1, 1)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap(),
            }),
            ..Default::default()
        };

        let response = read_record(&executor, Some("3FAE1A2B-0C4D-4E5F-8A9B-0C1D2E3F4A5B"))
            .await
            .unwrap();
        assert_eq!(status(&response), 200);
        assert_eq!(
            body(&response),
            json!({
                "id": "3fae1a2b-0c4d-4e5f-8a9b-0c1d2e3f4a5b",
                "created_at": "2024-01-01T00:00:00",
            })
        );
    }

    #[tokio::test]
    async fn store_failures_become_generic_500s() {
        let executor = StubExecutor {
            fail: true,
            ..Default::default()
        };

        let created = create_record(&executor).await.unwrap();
        assert_eq!(status(&created), 500);
        assert_eq!(body(&created), json!({ "error": "Internal server error" }));

        let unknown = Uuid::new_v4().to_string();
        let read = read_record(&executor, Some(unknown.as_str())).await.unwrap();
        assert_eq!(status(&read), 500);
        assert!(!String::from_utf8_lossy(read.body()).contains("records"));
    }
}
