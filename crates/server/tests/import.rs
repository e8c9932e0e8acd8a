mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use base64::{engine::general_purpose::STANDARD, Engine};
use common::{body_text, TestApp};
use lada_core::memory::CallCounters;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

const ALICE: &[(&str, &str)] = &[("X-SHIB-user", "alice"), ("X-LADA-MST", "06010")];

const ONE_SAMPLE: &str = "%PROBE%\nHAUPTPROBENNUMMER \"120510003\"\n%ENDE%\n";

async fn import_result(app: &TestApp, id: &str) -> Value {
    let (status, _, body) = app
        .request("GET", &format!("/api/import/result/{id}"), ALICE, None)
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body_text(&body));
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn one_undecodable_file_does_not_fail_the_job() {
    let app = TestApp::new();
    let id = app
        .submit(
            "/api/import/laf/list",
            ALICE,
            json!({
                "encoding": "utf-8",
                "files": {
                    "a.laf": STANDARD.encode(ONE_SAMPLE),
                    "b.laf": "%%% definitely not base64 %%%"
                }
            }),
        )
        .await;

    let snap = app
        .wait_done(&format!("/api/import/status/{id}"), "alice")
        .await;
    assert_eq!(snap["status"], "finished", "{snap}");
    assert_eq!(snap["errors"], true);

    let result = import_result(&app, &id).await;
    assert_eq!(result["a.laf"]["success"], true);
    assert_eq!(result["a.laf"]["probeIds"], json!([10000]));
    assert_eq!(result["a.laf"]["tag"], "IMP_06_0001");
    assert!(result["a.laf"].get("errors").is_none());

    assert_eq!(result["b.laf"]["success"], false);
    assert_eq!(result["b.laf"]["probeIds"], json!([]));
    assert_eq!(
        result["b.laf"]["errors"]["b.laf"][0]["value"],
        "File content not in valid Base64 scheme"
    );
    assert_eq!(CallCounters::get(&app.store.calls.import), 1);

    let tags = app.store.tags();
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].1, vec![10000]);
}

#[tokio::test]
async fn charset_mismatch_is_reported_per_file() {
    let app = TestApp::new();
    let mut latin1 = b"%PROBE%\nORT \"M".to_vec();
    latin1.push(0xFC);
    latin1.extend_from_slice(b"nchen\"\n%ENDE%");
    let id = app
        .submit(
            "/api/import/laf/list",
            ALICE,
            json!({
                "encoding": "utf-8",
                "files": {
                    "ok.laf": STANDARD.encode(ONE_SAMPLE),
                    "latin.laf": STANDARD.encode(&latin1)
                }
            }),
        )
        .await;

    app.wait_done(&format!("/api/import/status/{id}"), "alice")
        .await;
    let result = import_result(&app, &id).await;
    assert_eq!(result["ok.laf"]["success"], true);
    assert_eq!(
        result["latin.laf"]["errors"]["latin.laf"][0]["value"],
        "File content not in valid UTF-8"
    );
}

#[tokio::test]
async fn parser_errors_mark_file_failed() {
    let app = TestApp::new();
    let id = app
        .submit(
            "/api/import/laf/list",
            ALICE,
            json!({
                "encoding": "iso-8859-15",
                "files": {"empty.laf": STANDARD.encode("no samples here")}
            }),
        )
        .await;

    let snap = app
        .wait_done(&format!("/api/import/status/{id}"), "alice")
        .await;
    assert_eq!(snap["status"], "finished");
    assert_eq!(snap["errors"], true);

    let result = import_result(&app, &id).await;
    assert_eq!(result["empty.laf"]["success"], false);
    assert!(result["empty.laf"].get("tag").is_none());
    assert!(app.store.tags().is_empty());
}

#[tokio::test]
async fn importer_failure_reports_generic_message() {
    let app = TestApp::new();
    app.store.fail_imports(true);
    let id = app
        .submit(
            "/api/import/laf/list",
            ALICE,
            json!({"encoding": "utf-8", "files": {"a.laf": STANDARD.encode(ONE_SAMPLE)}}),
        )
        .await;

    let snap = app
        .wait_done(&format!("/api/import/status/{id}"), "alice")
        .await;
    assert_eq!(snap["status"], "finished");
    assert_eq!(snap["errors"], true);

    let result = import_result(&app, &id).await;
    assert_eq!(result["a.laf"]["success"], false);
    let item = &result["a.laf"]["errors"]["a.laf"][0];
    assert_eq!(item["key"], "Parser");
    assert_eq!(item["value"], "Import failed");
    assert!(!result.to_string().contains("deadlock"));
}

#[tokio::test]
async fn invalid_encoding_fails_the_job() {
    let app = TestApp::new();
    let id = app
        .submit(
            "/api/import/laf/list",
            ALICE,
            json!({"encoding": "klingon", "files": {"a.laf": STANDARD.encode(ONE_SAMPLE)}}),
        )
        .await;

    let snap = app
        .wait_done(&format!("/api/import/status/{id}"), "alice")
        .await;
    assert_eq!(snap["status"], "error");
    assert_eq!(snap["message"], "No valid encoding name given");
    assert_eq!(CallCounters::get(&app.store.calls.import), 0);
}

#[tokio::test]
async fn no_decodable_file_fails_the_job() {
    let app = TestApp::new();
    let id = app
        .submit(
            "/api/import/laf/list",
            ALICE,
            json!({"encoding": "utf-8", "files": {"a.laf": "***"}}),
        )
        .await;

    let snap = app
        .wait_done(&format!("/api/import/status/{id}"), "alice")
        .await;
    assert_eq!(snap["status"], "error");
    assert_eq!(snap["message"], "No valid file given");
    assert_eq!(snap["errors"], true);
}

#[tokio::test]
async fn tagging_failure_keeps_import_and_warns() {
    let app = TestApp::new();
    app.store.fail_tagging(true);
    let id = app
        .submit(
            "/api/import/laf/list",
            ALICE,
            json!({"encoding": "utf-8", "files": {"a.laf": STANDARD.encode(ONE_SAMPLE)}}),
        )
        .await;

    let snap = app
        .wait_done(&format!("/api/import/status/{id}"), "alice")
        .await;
    assert_eq!(snap["status"], "finished");
    assert_eq!(snap["warnings"], true);
    assert!(snap["message"]
        .as_str()
        .unwrap()
        .starts_with("Tagging of imported records failed"));

    let result = import_result(&app, &id).await;
    assert_eq!(result["a.laf"]["success"], true);
    assert!(result["a.laf"].get("tag").is_none());
    // One transaction for the job, one for the failed tagging.
    assert_eq!(CallCounters::get(&app.store.calls.begin), 2);
    assert_eq!(CallCounters::get(&app.store.calls.rollback), 1);
    assert_eq!(CallCounters::get(&app.store.calls.commit), 1);
}

#[tokio::test]
async fn facility_header_is_required_and_checked() {
    let app = TestApp::new();
    let body = json!({"encoding": "utf-8", "files": {"a.laf": STANDARD.encode(ONE_SAMPLE)}});

    let (status, _, text) = app
        .request(
            "POST",
            "/api/import/laf/list",
            &[("X-SHIB-user", "alice")],
            Some(body.clone()),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body_text(&text).contains("Missing header for messtelle."));

    let (status, _, _) = app
        .request(
            "POST",
            "/api/import/laf/list",
            &[("X-SHIB-user", "alice"), ("X-LADA-MST", "99999")],
            Some(body),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _, _) = app
        .request(
            "POST",
            "/api/import/laf/list",
            ALICE,
            Some(json!({"encoding": "utf-8"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(app.state.registry.is_empty());
}

fn malformed_import(facility: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/import/laf/list")
        .header("content-type", "application/json")
        .header("X-SHIB-user", "alice");
    if let Some(facility) = facility {
        builder = builder.header("X-LADA-MST", facility);
    }
    builder.body(Body::from("{\"files\": [not json")).unwrap()
}

#[tokio::test]
async fn facility_header_is_checked_before_the_body() {
    let app = TestApp::new();

    let (status, body) = app.send(malformed_import(None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body_text(&body).contains("Missing header for messtelle."));

    let (status, _) = app.send(malformed_import(Some("99999"))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.send(malformed_import(Some("06010"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(app.state.registry.is_empty());
}

#[tokio::test]
async fn import_ids_are_separate_from_export_ids() {
    let app = TestApp::new();
    let id = app
        .submit(
            "/api/import/laf/list",
            ALICE,
            json!({"encoding": "utf-8", "files": {"a.laf": STANDARD.encode(ONE_SAMPLE)}}),
        )
        .await;
    app.wait_done(&format!("/api/import/status/{id}"), "alice")
        .await;

    let (status, _) = app
        .get_json(&format!("/api/asyncexport/status/{id}"), "alice")
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app
        .get_json(&format!("/api/import/status/{id}"), "bob")
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    import_result(&app, &id).await;
    let (status, _, _) = app
        .request("GET", &format!("/api/import/result/{id}"), ALICE, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
