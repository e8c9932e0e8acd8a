mod common;

use std::time::Duration;

use axum::http::{header, StatusCode};
use common::{body_text, TestApp};
use lada_core::memory::CallCounters;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

const ALICE: &[(&str, &str)] = &[("X-SHIB-user", "alice"), ("X-FILE-ENCODING", "utf-8")];

fn probe_columns() -> Value {
    json!([
        {"dataIndex": "probeId", "export": true},
        {"dataIndex": "hauptproben_nr", "name": "hauptprobenNr", "export": true},
        {"dataIndex": "umw_id", "export": false}
    ])
}

fn with_sub_data() -> Value {
    json!({
        "columns": probe_columns(),
        "idField": "probeId",
        "exportSubData": true,
        "subDataColumns": ["extId"],
        "subDataColumnNames": {"extId": "Messung"}
    })
}

async fn finished_download(app: &TestApp, id: &str) -> (axum::http::HeaderMap, String) {
    let snap = app
        .wait_done(&format!("/api/asyncexport/status/{id}"), "alice")
        .await;
    assert_eq!(snap["status"], "finished", "{snap}");
    let (status, headers, body) = app
        .request("GET", &format!("/api/asyncexport/download/{id}"), ALICE, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    (headers, body_text(&body))
}

#[tokio::test]
async fn csv_export_without_sub_data_has_one_row_per_record() {
    let app = TestApp::new();
    let id = app
        .submit(
            "/api/asyncexport/csv",
            ALICE,
            json!({"columns": probe_columns(), "idField": "probeId"}),
        )
        .await;

    let (headers, csv) = finished_download(&app, &id).await;
    assert_eq!(csv, "probeId,hauptprobenNr\r\n1000,120510002\r\n1001,120510001\r\n");
    assert_eq!(headers[header::CONTENT_TYPE], "text/csv; charset=UTF-8");
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"export.csv\""
    );
}

#[tokio::test]
async fn csv_export_pads_parent_without_children() {
    let app = TestApp::new();
    let id = app.submit("/api/asyncexport/csv", ALICE, with_sub_data()).await;

    let (_, csv) = finished_download(&app, &id).await;
    assert_eq!(
        csv,
        "probeId,hauptprobenNr,Messung\r\n\
         1000,120510002,453\r\n\
         1000,120510002,454\r\n\
         1001,120510001,\r\n"
    );
}

#[tokio::test]
async fn csv_export_honours_options_and_filename() {
    let app = TestApp::new();
    let id = app
        .submit(
            "/api/asyncexport/csv",
            &[("X-SHIB-user", "alice")],
            json!({
                "columns": probe_columns(),
                "idField": "probeId",
                "idFilter": [1001],
                "csvOptions": {"fieldSeparator": "semicolon", "rowDelimiter": "linux"},
                "filename": "proben.csv"
            }),
        )
        .await;

    let (headers, csv) = finished_download(&app, &id).await;
    assert_eq!(csv, "probeId;hauptprobenNr\n1001;120510001\n");
    assert_eq!(headers[header::CONTENT_TYPE], "text/csv; charset=ISO-8859-15");
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"proben.csv\""
    );
}

#[tokio::test]
async fn json_export_nests_children_under_parent() {
    let app = TestApp::new();
    let id = app.submit("/api/asyncexport/json", ALICE, with_sub_data()).await;

    let (headers, body) = finished_download(&app, &id).await;
    let document: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(
        document,
        json!({
            "1000": {
                "probeId": 1000,
                "hauptproben_nr": "120510002",
                "Messungen": [{"extId": 453}, {"extId": 454}]
            },
            "1001": {"probeId": 1001, "hauptproben_nr": "120510001"}
        })
    );
    assert!(document["1001"].get("Messungen").is_none());
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"export.json\""
    );
}

fn with_measurement_values() -> Value {
    json!({
        "queryId": 2,
        "columns": [
            {"dataIndex": "messungId", "export": true},
            {"dataIndex": "extId", "export": true}
        ],
        "idField": "messungId",
        "exportSubData": true,
        "subDataColumns": ["measUnitId"]
    })
}

#[tokio::test]
async fn csv_export_of_measurements_lists_their_values() {
    let app = TestApp::new();
    let id = app
        .submit("/api/asyncexport/csv", ALICE, with_measurement_values())
        .await;

    let (_, csv) = finished_download(&app, &id).await;
    assert_eq!(
        csv,
        "messungId,extId,measUnitId\r\n\
         1200,453,Sv\r\n\
         1200,453,Sv\r\n\
         1201,454,\r\n"
    );
}

#[tokio::test]
async fn json_export_of_measurements_nests_messwerte() {
    let app = TestApp::new();
    let id = app
        .submit("/api/asyncexport/json", ALICE, with_measurement_values())
        .await;

    let (_, body) = finished_download(&app, &id).await;
    let document: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(
        document,
        json!({
            "1200": {
                "messungId": 1200,
                "extId": 453,
                "messwerte": [{"measUnitId": "Sv"}, {"measUnitId": "Sv"}]
            },
            "1201": {"messungId": 1201, "extId": 454}
        })
    );
}

#[tokio::test]
async fn measurement_export_carries_value_count() {
    let app = TestApp::new();
    let mut request = with_sub_data();
    request["subDataColumns"] = json!(["extId", "messwerteCount"]);
    let id = app.submit("/api/asyncexport/csv", ALICE, request).await;

    let (_, csv) = finished_download(&app, &id).await;
    assert_eq!(
        csv,
        "probeId,hauptprobenNr,Messung,messwerteCount\r\n\
         1000,120510002,453,2\r\n\
         1000,120510002,454,0\r\n\
         1001,120510001,,\r\n"
    );
}

#[tokio::test]
async fn laf_export_renders_requested_samples() {
    let app = TestApp::new();
    let id = app
        .submit("/api/asyncexport/laf", ALICE, json!({"proben": [1000]}))
        .await;

    let (headers, laf) = finished_download(&app, &id).await;
    assert!(laf.starts_with("%PROBE%\n"));
    assert!(laf.contains("120510002"));
    assert!(laf.ends_with("%ENDE%"));
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"export.laf\""
    );
}

#[tokio::test]
async fn laf_export_without_record_lists_is_not_found() {
    let app = TestApp::new();
    let (status, _, _) = app
        .request("POST", "/api/asyncexport/laf", ALICE, Some(json!({"filename": "x.laf"})))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(app.state.registry.is_empty());
}

#[tokio::test]
async fn unknown_export_encoding_is_rejected() {
    let app = TestApp::new();
    let (status, _, body) = app
        .request(
            "POST",
            "/api/asyncexport/csv",
            &[("X-SHIB-user", "alice"), ("X-FILE-ENCODING", "klingon")],
            Some(json!({"columns": probe_columns(), "idField": "probeId"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body_text(&body).contains("Invalid or unknown encoding requested"));
    assert!(app.state.registry.is_empty());
}

#[tokio::test]
async fn other_user_is_forbidden() {
    let app = TestApp::new();
    let id = app
        .submit(
            "/api/asyncexport/csv",
            ALICE,
            json!({"columns": probe_columns(), "idField": "probeId"}),
        )
        .await;

    let (status, _) = app
        .get_json(&format!("/api/asyncexport/status/{id}"), "bob")
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    app.wait_done(&format!("/api/asyncexport/status/{id}"), "alice")
        .await;
    let (status, _, _) = app
        .request(
            "GET",
            &format!("/api/asyncexport/download/{id}"),
            &[("X-SHIB-user", "bob")],
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // The owner can still download after the rejected attempt.
    let (status, _, _) = app
        .request("GET", &format!("/api/asyncexport/download/{id}"), ALICE, None)
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn unknown_and_downloaded_ids_are_not_found() {
    let app = TestApp::new();
    let (status, _) = app
        .get_json("/api/asyncexport/status/does-not-exist", "alice")
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let id = app
        .submit(
            "/api/asyncexport/json",
            ALICE,
            json!({"columns": probe_columns(), "idField": "probeId"}),
        )
        .await;
    finished_download(&app, &id).await;

    let (status, _, _) = app
        .request("GET", &format!("/api/asyncexport/download/{id}"), ALICE, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app
        .get_json(&format!("/api/asyncexport/status/{id}"), "alice")
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn download_before_finish_conflicts() {
    let app = TestApp::new();
    app.store.set_delay(Some(Duration::from_millis(300)));
    let id = app
        .submit(
            "/api/asyncexport/csv",
            ALICE,
            json!({"columns": probe_columns(), "idField": "probeId"}),
        )
        .await;

    let (status, _, _) = app
        .request("GET", &format!("/api/asyncexport/download/{id}"), ALICE, None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let snap = app
        .wait_done(&format!("/api/asyncexport/status/{id}"), "alice")
        .await;
    assert_eq!(snap["status"], "finished");
}

#[tokio::test]
async fn missing_id_field_fails_without_querying() {
    let app = TestApp::new();
    let id = app
        .submit(
            "/api/asyncexport/csv",
            ALICE,
            json!({
                "columns": [{"dataIndex": "hauptproben_nr", "export": true}],
                "idField": "probeId"
            }),
        )
        .await;

    let snap = app
        .wait_done(&format!("/api/asyncexport/status/{id}"), "alice")
        .await;
    assert_eq!(snap["status"], "error");
    assert!(snap["message"].as_str().unwrap().contains("probeId"));
    assert_eq!(CallCounters::get(&app.store.calls.fetch), 0);

    let (status, _, _) = app
        .request("GET", &format!("/api/asyncexport/download/{id}"), ALICE, None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn failing_query_reports_readable_message() {
    let app = TestApp::new();
    app.store.fail_queries(true);
    let id = app
        .submit(
            "/api/asyncexport/json",
            ALICE,
            json!({"columns": probe_columns(), "idField": "probeId"}),
        )
        .await;

    let snap = app
        .wait_done(&format!("/api/asyncexport/status/{id}"), "alice")
        .await;
    assert_eq!(
        snap,
        json!({"done": true, "status": "error", "message": "Failed loading query result"})
    );
}

#[tokio::test]
async fn submit_without_identity_is_unauthorized() {
    let app = TestApp::new();
    let (status, _, _) = app
        .request(
            "POST",
            "/api/asyncexport/csv",
            &[],
            Some(json!({"columns": probe_columns(), "idField": "probeId"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
