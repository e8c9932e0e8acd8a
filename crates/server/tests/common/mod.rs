#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{HeaderMap, Request, StatusCode},
    Router,
};
use lada_core::memory::InMemoryStore;
use lada_server::{create_app, AppState, ServiceConfig};
use lada_server_jobs::RegistryConfig;
use serde_json::Value;
use tower::ServiceExt;

pub struct TestApp {
    pub app: Router,
    pub store: Arc<InMemoryStore>,
    pub state: Arc<AppState>,
    _dir: tempfile::TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(InMemoryStore::demo());
        let state = AppState::in_memory(
            store.clone(),
            RegistryConfig {
                worker_pool_size: 2,
                result_dir: dir.path().join("results"),
                ..Default::default()
            },
            ServiceConfig::default(),
        );
        Self {
            app: create_app(Arc::clone(&state)),
            store,
            state,
            _dir: dir,
        }
    }

    /// Helper to make a request to the app.
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        headers: &[(&str, &str)],
        body: Option<Value>,
    ) -> (StatusCode, HeaderMap, Vec<u8>) {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_string(&json).unwrap())
        } else {
            Body::empty()
        };

        let response = self
            .app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, headers, bytes.to_vec())
    }

    /// Send a prebuilt request, for bodies that are not valid JSON.
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, bytes.to_vec())
    }

    pub async fn get_json(&self, uri: &str, user: &str) -> (StatusCode, Value) {
        let (status, _, body) = self.request("GET", uri, &[("X-SHIB-user", user)], None).await;
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }

    /// Submit a job and return its reference id.
    pub async fn submit(&self, uri: &str, headers: &[(&str, &str)], body: Value) -> String {
        let (status, _, bytes) = self.request("POST", uri, headers, Some(body)).await;
        assert_eq!(status, StatusCode::OK, "{}", String::from_utf8_lossy(&bytes));
        let json: Value = serde_json::from_slice(&bytes).unwrap();
        json["refId"].as_str().unwrap().to_string()
    }

    /// Poll `status_uri` until the job is done and return the last snapshot.
    pub async fn wait_done(&self, status_uri: &str, user: &str) -> Value {
        for _ in 0..1000 {
            let (status, json) = self.get_json(status_uri, user).await;
            assert_eq!(status, StatusCode::OK);
            if json["done"] == true {
                return json;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("job at {status_uri} did not finish");
    }
}

pub fn body_text(bytes: &[u8]) -> String {
    String::from_utf8(bytes.to_vec()).unwrap()
}
