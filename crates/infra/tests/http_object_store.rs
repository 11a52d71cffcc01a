use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value as JsonValue};

use jobrelay_core::NotificationRecord;
use jobrelay_infra::notifications::{DeliveryOutcome, Forwarder, HttpForwarder, NotificationPipeline};
use jobrelay_infra::object_store::{
    HttpStoreClient, InMemoryStoreClient, Query, StoreClient, StoreError, StoreOperation,
};
use jobrelay_infra::reconciliation::ReconciliationSweep;
use jobrelay_infra::transport::build_http_client;

/// Object store speaking the JSON/HTTP protocol, backed by in-memory
/// collections, plus a pair of forward recipients.
#[derive(Default)]
struct FakeOsm {
    buckets: Mutex<HashMap<String, Arc<InMemoryStoreClient>>>,
    received: Mutex<Vec<String>>,
}

impl FakeOsm {
    fn bucket(&self, name: &str) -> Arc<InMemoryStoreClient> {
        let mut buckets = self.buckets.lock().unwrap();
        buckets
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(InMemoryStoreClient::new(name)))
            .clone()
    }

    fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }
}

fn store_failure(err: StoreError) -> Response {
    let status = match err {
        StoreError::Status { status, .. } => {
            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string()).into_response()
}

async fn save(
    State(osm): State<Arc<FakeOsm>>,
    Path(bucket): Path<String>,
    body: String,
) -> Response {
    if bucket == "slow" {
        tokio::time::sleep(Duration::from_secs(5)).await;
    }
    let Ok(record) = serde_json::from_str::<JsonValue>(&body) else {
        return (StatusCode::BAD_REQUEST, "malformed record").into_response();
    };
    match osm.bucket(&bucket).save(&record).await {
        Ok(id) => (StatusCode::OK, id).into_response(),
        Err(e) => store_failure(e),
    }
}

async fn query_or_update(
    State(osm): State<Arc<FakeOsm>>,
    Path((bucket, second)): Path<(String, String)>,
    body: String,
) -> Response {
    let store = osm.bucket(&bucket);
    let Ok(doc) = serde_json::from_str::<JsonValue>(&body) else {
        return (StatusCode::BAD_REQUEST, "malformed body").into_response();
    };

    if second == "query" {
        let Ok(query) = Query::from_json(&doc) else {
            return (StatusCode::BAD_REQUEST, "malformed filter").into_response();
        };
        return match store.search(&query).await {
            Ok(objects) => Json(json!({ "objects": objects })).into_response(),
            Err(e) => store_failure(e),
        };
    }

    let result = match doc.get("$set").and_then(JsonValue::as_object) {
        Some(set) => {
            let mut result = Ok(());
            for (key, value) in set {
                let field = key.strip_prefix("state.").unwrap_or(key);
                result = store.update_field(&second, field, value.clone()).await;
                if result.is_err() {
                    break;
                }
            }
            result
        }
        None => store.update(&second, &doc).await,
    };
    match result {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => store_failure(e),
    }
}

async fn hook(State(osm): State<Arc<FakeOsm>>, body: String) -> StatusCode {
    osm.received.lock().unwrap().push(body);
    StatusCode::OK
}

async fn reject() -> StatusCode {
    StatusCode::SERVICE_UNAVAILABLE
}

struct TestServer {
    base_url: String,
    osm: Arc<FakeOsm>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let osm = Arc::new(FakeOsm::default());
        let app = Router::new()
            .route("/hooks/accept", post(hook))
            .route("/hooks/reject", post(reject))
            .route("/:bucket", post(save))
            .route("/:bucket/:second", post(query_or_update))
            .with_state(osm.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            osm,
            handle,
        }
    }

    fn client(&self, bucket: &str) -> HttpStoreClient {
        HttpStoreClient::new(
            build_http_client(Duration::from_secs(5)).unwrap(),
            &self.base_url,
            bucket,
        )
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn job(uuid: &str, status: &str) -> JsonValue {
    json!({
        "uuid": uuid,
        "status": status,
        "previous_status": "Running",
        "user": "ipctest",
        "name": "wc",
        "output_dir": "/iplant/home/ipctest/wc",
        "output_manifest": [],
        "workspace_id": "4",
    })
}

#[tokio::test]
async fn save_query_and_update_over_http() {
    let server = TestServer::spawn().await;
    let jobs = server.client("jobs");

    let id = jobs.save(&job("abc-1", "Running")).await.unwrap();
    jobs.save(&job("abc-2", "Running")).await.unwrap();

    let hits = jobs.search(&Query::new().eq("uuid", "abc-1")).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, id);

    jobs.update(&id, &job("abc-1", "Completed")).await.unwrap();
    jobs.update_field(&id, "output_folder_id", json!("f-1")).await.unwrap();

    let state = server.osm.bucket("jobs").get(&id).unwrap();
    assert_eq!(state["status"], "Completed");
    assert_eq!(state["output_folder_id"], "f-1");

    let both = jobs
        .search(&Query::new().one_of("uuid", ["abc-1", "abc-2", "abc-9"]))
        .await
        .unwrap();
    assert_eq!(both.len(), 2);
}

#[tokio::test]
async fn non_ok_status_carries_request_body() {
    let server = TestServer::spawn().await;
    let jobs = server.client("jobs");

    let record = job("abc-1", "Running");
    let err = jobs.update("missing", &record).await.unwrap_err();

    match &err {
        StoreError::Status {
            operation, status, ..
        } => {
            assert_eq!(*operation, StoreOperation::Update);
            assert_eq!(*status, 404);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.request_body(), record.to_string());
}

#[tokio::test]
async fn unreachable_store_is_a_connection_failure() {
    let client = HttpStoreClient::new(
        build_http_client(Duration::from_secs(2)).unwrap(),
        "http://127.0.0.1:9",
        "jobs",
    );
    let err = client.save(&json!({"uuid": "x"})).await.unwrap_err();
    assert!(matches!(err, StoreError::Connection { .. }));
    assert_eq!(err.request_body(), r#"{"uuid":"x"}"#);
}

#[tokio::test]
async fn stalled_store_times_out() {
    let server = TestServer::spawn().await;
    let client = HttpStoreClient::new(
        build_http_client(Duration::from_millis(200)).unwrap(),
        &server.base_url,
        "slow",
    );

    let err = client.save(&json!({"uuid": "x"})).await.unwrap_err();
    assert!(matches!(err, StoreError::Timeout { .. }), "got {err:?}");
}

#[tokio::test]
async fn forwarder_reports_each_recipient() {
    let server = TestServer::spawn().await;
    let forwarder = HttpForwarder::new(
        build_http_client(Duration::from_secs(5)).unwrap(),
        vec![
            format!("{}/hooks/accept", server.base_url),
            format!("{}/hooks/reject", server.base_url),
        ],
    );

    let deliveries = forwarder.forward(r#"{"n":1}"#).await;

    assert_eq!(deliveries.len(), 2);
    assert_eq!(deliveries[0].outcome, DeliveryOutcome::Delivered);
    assert_eq!(deliveries[1].outcome, DeliveryOutcome::Rejected(503));
    assert_eq!(server.osm.received(), vec![r#"{"n":1}"#.to_string()]);
}

#[tokio::test]
async fn pipeline_forwards_stored_notifications_with_their_ids() {
    let server = TestServer::spawn().await;
    let forwarder = HttpForwarder::new(
        build_http_client(Duration::from_secs(5)).unwrap(),
        vec![format!("{}/hooks/accept", server.base_url)],
    );
    let pipeline = NotificationPipeline::new(server.client("notifications"), forwarder);

    let record: jobrelay_core::JobRecord = serde_json::from_value(job("abc-1", "Completed")).unwrap();
    let report = pipeline
        .submit(vec![NotificationRecord::from_job(&record, chrono::Utc::now())])
        .await
        .unwrap();

    let received = server.osm.received();
    assert_eq!(received.len(), 1);
    let forwarded: JsonValue = serde_json::from_str(&received[0]).unwrap();
    assert_eq!(forwarded["message"]["id"], report.persisted[0].id.as_str());
    assert!(forwarded["message"]["timestamp"].is_i64());
    assert!(report.persisted[0].deliveries[0].is_delivered());
}

#[tokio::test]
async fn sweep_repairs_notifications_over_http() {
    let server = TestServer::spawn().await;
    let jobs = server.client("jobs");
    let notifications = server.client("notifications");

    jobs.save(&job("abc-1", "Failed")).await.unwrap();
    let stale = notifications
        .save(&json!({
            "type": "analysis",
            "user": "ipctest",
            "deleted": false,
            "seen": false,
            "message": { "id": "", "timestamp": "", "text": "job wc running" },
            "payload": { "id": "abc-1", "status": "Running" },
        }))
        .await
        .unwrap();

    let report = ReconciliationSweep::new(jobs, notifications, 500).run().await.unwrap();

    assert_eq!(report.corrected, 1);
    let fixed = server.osm.bucket("notifications").get(&stale).unwrap();
    assert_eq!(fixed["payload"]["status"], "Failed");
    assert_eq!(server.osm.bucket("jobs").calls().updates, 0);
}
