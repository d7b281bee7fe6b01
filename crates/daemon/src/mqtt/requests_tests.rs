use std::time::Duration;

use super::*;
use crate::lifecycle::{startup, App};

const DOCUMENT: &str = r#"{
  "sectionInterface": { "pins": [4, 17] },
  "sections": [
    { "id": 0, "name": "Front lawn", "interfaceId": 0 },
    { "id": 1, "name": "Back lawn", "interfaceId": 1 }
  ],
  "programs": [
    {
      "name": "Morning",
      "sequence": [ { "section": 0, "duration": 0.05 } ],
      "schedule": { "times": [], "weekdays": [0, 1, 2, 3, 4, 5, 6] },
      "enabled": false
    }
  ]
}"#;

fn fixture() -> (tempfile::TempDir, App) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, DOCUMENT).unwrap();
    let app = startup(path).unwrap();
    (dir, app)
}

async fn request(app: &App, payload: &str) -> Value {
    handle_request(app, payload.as_bytes()).await
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

#[tokio::test(start_paused = true)]
async fn run_section_queues_a_run() {
    let (_dir, app) = fixture();

    let response = request(
        &app,
        r#"{"rid": 1, "type": "runSection", "sectionID": 1, "duration": 2.5}"#,
    )
    .await;

    assert_eq!(response["result"], "success");
    assert_eq!(response["rid"], 1);
    assert_eq!(response["type"], "runSection");
    assert_eq!(response["runId"], 0);
    assert_eq!(response["message"], "running section 'Back lawn' for 2.5s");

    settle().await;
    let state = app.runner.state();
    assert_eq!(state.current.as_ref().unwrap().section, 1);
    assert!(app.interface.get(1));
}

#[tokio::test(start_paused = true)]
async fn run_section_requires_duration() {
    let (_dir, app) = fixture();

    let response = request(&app, r#"{"rid": 2, "type": "runSection", "sectionID": 0}"#).await;

    assert_eq!(response["result"], "error");
    assert_eq!(response["code"], 101);
    assert_eq!(response["message"], "duration not specified");
    assert_eq!(response["rid"], 2);
}

#[tokio::test(start_paused = true)]
async fn run_section_rejects_out_of_range_id() {
    let (_dir, app) = fixture();

    let response = request(
        &app,
        r#"{"rid": 3, "type": "runSection", "sectionID": 7, "duration": 1}"#,
    )
    .await;

    assert_eq!(response["result"], "error");
    assert_eq!(response["code"], 103);
    assert!(response["message"]
        .as_str()
        .unwrap()
        .contains("section ID out of range"));
}

#[tokio::test(start_paused = true)]
async fn unknown_request_type_is_not_implemented() {
    let (_dir, app) = fixture();

    let response = request(&app, r#"{"rid": 4, "type": "selfDestruct"}"#).await;

    assert_eq!(response["result"], "error");
    assert_eq!(response["code"], 108);
    assert_eq!(response["name"], "notImplemented");
}

#[tokio::test(start_paused = true)]
async fn missing_type_is_not_specified() {
    let (_dir, app) = fixture();

    let response = request(&app, r#"{"rid": 5}"#).await;

    assert_eq!(response["result"], "error");
    assert_eq!(response["code"], 101);
    assert_eq!(response["rid"], 5);
}

#[tokio::test(start_paused = true)]
async fn malformed_payload_is_a_parse_error_with_offset() {
    let (_dir, app) = fixture();

    let response = request(&app, r#"{"rid": 6,"#).await;

    assert_eq!(response["result"], "error");
    assert_eq!(response["code"], 102);
    assert!(response["offset"].is_number());
    assert!(response.get("rid").is_none());
}

#[tokio::test(start_paused = true)]
async fn pause_and_unpause_round_trip() {
    let (_dir, app) = fixture();

    let response = request(&app, r#"{"rid": 7, "type": "pauseSectionRunner", "paused": true}"#).await;
    assert_eq!(response["result"], "success");
    assert_eq!(response["paused"], true);
    assert_eq!(response["message"], "paused section runner");
    settle().await;
    assert!(app.runner.state().paused);

    let response =
        request(&app, r#"{"rid": 8, "type": "pauseSectionRunner", "paused": false}"#).await;
    assert_eq!(response["paused"], false);
    settle().await;
    assert!(!app.runner.state().paused);
}

#[tokio::test(start_paused = true)]
async fn cancel_all_drains_the_runner() {
    let (_dir, app) = fixture();

    request(&app, r#"{"type": "runSection", "sectionID": 0, "duration": 60}"#).await;
    request(&app, r#"{"type": "runSection", "sectionID": 1, "duration": 60}"#).await;
    settle().await;
    assert!(app.runner.state().current.is_some());

    let response = request(&app, r#"{"rid": 9, "type": "cancelAllSectionRuns"}"#).await;
    assert_eq!(response["result"], "success");
    settle().await;
    let state = app.runner.state();
    assert!(state.current.is_none());
    assert!(state.queue.is_empty());
    assert_eq!(app.interface.get(0), false);
}

#[tokio::test(start_paused = true)]
async fn cancel_section_run_id_is_noop_for_unknown_id() {
    let (_dir, app) = fixture();

    let response =
        request(&app, r#"{"rid": 10, "type": "cancelSectionRunId", "runID": 42}"#).await;
    assert_eq!(response["result"], "success");
    assert_eq!(response["message"], "cancelled section run with id 42");
}

#[tokio::test(start_paused = true)]
async fn run_program_starts_the_program() {
    let (_dir, app) = fixture();

    let response = request(&app, r#"{"rid": 11, "type": "runProgram", "programID": 0}"#).await;
    assert_eq!(response["result"], "success");
    assert_eq!(response["message"], "running program 'Morning'");

    settle().await;
    assert!(app.programs[0].running());
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(!app.programs[0].running());
}

#[tokio::test(start_paused = true)]
async fn cancel_program_stops_the_run() {
    let (_dir, app) = fixture();

    request(&app, r#"{"type": "runProgram", "programID": 0}"#).await;
    settle().await;
    let response = request(&app, r#"{"rid": 12, "type": "cancelProgram", "programID": 0}"#).await;
    assert_eq!(response["result"], "success");
    settle().await;
    assert!(!app.programs[0].running());
}

#[tokio::test(start_paused = true)]
async fn update_program_applies_and_echoes_data() {
    let (_dir, app) = fixture();

    let response = request(
        &app,
        r#"{
          "rid": 13,
          "type": "updateProgram",
          "programID": 0,
          "data": { "name": "Evening", "enabled": true }
        }"#,
    )
    .await;

    assert_eq!(response["result"], "success");
    assert_eq!(response["message"], "updated program 'Evening'");
    assert_eq!(response["data"]["name"], "Evening");
    assert_eq!(response["data"]["enabled"], true);
    assert_eq!(response["data"]["id"], 0);
    assert_eq!(app.programs[0].name(), "Evening");
}

#[tokio::test(start_paused = true)]
async fn update_program_rejects_bad_sequence() {
    let (_dir, app) = fixture();

    let response = request(
        &app,
        r#"{
          "rid": 14,
          "type": "updateProgram",
          "programID": 0,
          "data": { "sequence": [ { "section": 9, "duration": 1 } ] }
        }"#,
    )
    .await;

    assert_eq!(response["result"], "error");
    assert_eq!(response["code"], 104);
    assert!(response["cause"]
        .as_str()
        .unwrap()
        .contains("unknown section id 9"));
    // The program is untouched.
    assert_eq!(app.programs[0].name(), "Morning");
}
