//! Shared helpers for the designvote integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use designvote_api::AppState;
use designvote_api::blob::{BlobStore, LocalBlobStore};
use designvote_db::Database;
use designvote_gateway::Gateway;
use designvote_server::{build_state, router};

pub const SECRET: &str = "integration-secret";
pub const BOUNDARY: &str = "designvote-test-boundary";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub gateway: Gateway,
    pub upload_dir: TempDir,
}

pub async fn test_app() -> TestApp {
    let upload_dir = tempfile::tempdir().expect("tempdir");
    let blobs = Arc::new(
        LocalBlobStore::new(upload_dir.path().to_path_buf(), "http://test.local/uploads")
            .await
            .expect("blob store"),
    );
    app_with_blobs(upload_dir, blobs)
}

/// Same app, but uploads go to `blobs` instead of the temp directory.
pub async fn test_app_with_blobs(blobs: Arc<dyn BlobStore>) -> TestApp {
    app_with_blobs(tempfile::tempdir().expect("tempdir"), blobs)
}

fn app_with_blobs(upload_dir: TempDir, blobs: Arc<dyn BlobStore>) -> TestApp {
    let db = Arc::new(Database::open_in_memory().expect("in-memory db"));
    let (state, gateway) = build_state(db, SECRET, blobs);
    let router = router(state.clone(), gateway.clone(), Some(upload_dir.path()));

    TestApp {
        router,
        state,
        gateway,
        upload_dir,
    }
}

impl TestApp {
    /// Send a request and return status plus body (`Value::Null` when the
    /// body is empty or not JSON).
    pub async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(req).await.expect("router error");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut req = Request::builder().method("GET").uri(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        self.send(req.body(Body::empty()).unwrap()).await
    }

    pub async fn post_json(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        let mut req = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        self.send(req.body(Body::from(body.to_string())).unwrap()).await
    }

    /// Provision an anonymous user and return its access token.
    pub async fn temp_user_token(&self) -> String {
        let (status, body) = self.get("/api/v1/reg_temp_user", None).await;
        assert_eq!(status, StatusCode::OK, "reg_temp_user failed: {body}");
        body["access_token"].as_str().expect("access_token").to_string()
    }

    pub async fn upload_design(
        &self,
        token: &str,
        filename: &str,
        content_type: &str,
        data: &[u8],
        email: Option<&str>,
    ) -> (StatusCode, Value) {
        let req = Request::builder()
            .method("POST")
            .uri("/api/v1/designs")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(multipart_body(filename, content_type, data, email)))
            .unwrap();
        self.send(req).await
    }

    /// Upload a tiny PNG and return the new design id.
    pub async fn create_design(&self, token: &str) -> String {
        let (status, body) = self
            .upload_design(token, "logo.png", "image/png", b"\x89PNG\r\n\x1a\nfake", None)
            .await;
        assert_eq!(status, StatusCode::OK, "upload failed: {body}");
        body["id"].as_str().expect("id").to_string()
    }
}

pub fn multipart_body(filename: &str, content_type: &str, data: &[u8], email: Option<&str>) -> Vec<u8> {
    let mut body = Vec::new();
    if let Some(email) = email {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"email\"\r\n\r\n{email}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}
