// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request dispatch for the control channel
//!
//! Requests arrive as JSON envelopes `{ "rid": int, "type": str, ... }` and
//! every outcome, success or failure, is answered with a structured
//! response echoing `rid` and `type`. Handler faults never escape: they are
//! folded into the error taxonomy at this boundary.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Map, Value};
use sprinkler_core::error::{check_index, RequestError};
use sprinkler_core::program::{Program, ProgramUpdate};
use sprinkler_core::runner::RunId;
use tracing::info;

use crate::lifecycle::App;

#[derive(Debug, Default, Deserialize)]
struct Envelope {
    rid: Option<i64>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

/// Handle one request payload, producing the response envelope
pub async fn handle_request(app: &App, payload: &[u8]) -> Value {
    let mut response = Map::new();

    let envelope: Envelope = match serde_json::from_slice(payload) {
        Ok(envelope) => envelope,
        Err(error) => {
            let offset = error.column().saturating_sub(1);
            return error_response(
                response,
                RequestError::parse("api request", error).with_offset(offset),
            );
        }
    };
    if let Some(rid) = envelope.rid {
        response.insert("rid".into(), json!(rid));
    }
    if let Some(kind) = &envelope.kind {
        response.insert("type".into(), json!(kind));
    }

    match dispatch(app, &envelope, payload, &mut response).await {
        Ok(()) => {
            response.insert("result".into(), json!("success"));
            Value::Object(response)
        }
        Err(error) => error_response(response, error),
    }
}

fn error_response(mut response: Map<String, Value>, error: RequestError) -> Value {
    info!(code = u16::from(error.code), message = %error, "error processing request");
    response.insert("result".into(), json!("error"));
    response.insert("code".into(), json!(u16::from(error.code)));
    response.insert("name".into(), json!(error.name));
    response.insert("message".into(), json!(error.to_string()));
    if let Some(cause) = &error.cause {
        response.insert("cause".into(), json!(cause));
    }
    if let Some(offset) = error.offset {
        response.insert("offset".into(), json!(offset));
    }
    Value::Object(response)
}

async fn dispatch(
    app: &App,
    envelope: &Envelope,
    payload: &[u8],
    response: &mut Map<String, Value>,
) -> Result<(), RequestError> {
    let kind = envelope
        .kind
        .as_deref()
        .ok_or_else(|| RequestError::not_specified("type"))?;

    match kind {
        "runProgram" => run_program(app, payload, response),
        "cancelProgram" => cancel_program(app, payload, response),
        "updateProgram" => update_program(app, payload, response).await,
        "runSection" => run_section(app, payload, response),
        "cancelSection" => cancel_section(app, payload, response),
        "cancelSectionRunId" => cancel_section_run_id(app, payload, response),
        "cancelAllSectionRuns" => cancel_all_section_runs(app, response),
        "pauseSectionRunner" => pause_section_runner(app, payload, response),
        other => Err(RequestError::not_implemented(other)),
    }
}

fn decode<'a, T: Deserialize<'a>>(what: &str, payload: &'a [u8]) -> Result<T, RequestError> {
    serde_json::from_slice(payload).map_err(|error| RequestError::parse(what, error))
}

fn get_program<'a>(app: &'a App, id: Option<i64>) -> Result<&'a Arc<Program>, RequestError> {
    let index = check_index(id, "program ID", app.programs.len())?;
    Ok(&app.programs[index])
}

#[derive(Debug, Deserialize)]
struct ProgramRequest {
    #[serde(rename = "programID")]
    program_id: Option<i64>,
}

fn run_program(
    app: &App,
    payload: &[u8],
    response: &mut Map<String, Value>,
) -> Result<(), RequestError> {
    let request: ProgramRequest = decode("runProgram request", payload)?;
    let program = get_program(app, request.program_id)?;
    program.run_now();
    response.insert(
        "message".into(),
        json!(format!("running program '{}'", program.name())),
    );
    Ok(())
}

fn cancel_program(
    app: &App,
    payload: &[u8],
    response: &mut Map<String, Value>,
) -> Result<(), RequestError> {
    let request: ProgramRequest = decode("cancelProgram request", payload)?;
    let program = get_program(app, request.program_id)?;
    program.cancel();
    response.insert(
        "message".into(),
        json!(format!("cancelled program '{}'", program.name())),
    );
    Ok(())
}

#[derive(Debug, Deserialize)]
struct UpdateProgramRequest {
    #[serde(rename = "programID")]
    program_id: Option<i64>,
    data: Option<ProgramUpdate>,
}

async fn update_program(
    app: &App,
    payload: &[u8],
    response: &mut Map<String, Value>,
) -> Result<(), RequestError> {
    let request: UpdateProgramRequest = decode("updateProgram request", payload)?;
    let program = get_program(app, request.program_id)?;
    let update = request
        .data
        .ok_or_else(|| RequestError::not_specified("data"))?;

    let data = program.update(update, app.registry.len()).await?;
    let config = sprinkler_core::config::ProgramConfig {
        id: program.id(),
        name: data.name,
        sequence: data.sequence,
        schedule: data.schedule,
        enabled: data.enabled,
    };

    response.insert(
        "message".into(),
        json!(format!("updated program '{}'", config.name)),
    );
    response.insert(
        "data".into(),
        serde_json::to_value(&config).map_err(RequestError::internal)?,
    );
    Ok(())
}

#[derive(Debug, Deserialize)]
struct RunSectionRequest {
    #[serde(rename = "sectionID")]
    section_id: Option<i64>,
    duration: Option<f64>,
}

fn run_section(
    app: &App,
    payload: &[u8],
    response: &mut Map<String, Value>,
) -> Result<(), RequestError> {
    let request: RunSectionRequest = decode("runSection request", payload)?;
    let section = check_index(request.section_id, "section ID", app.registry.len())?;
    let seconds = request
        .duration
        .ok_or_else(|| RequestError::not_specified("duration"))?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(RequestError::parse(
            "duration",
            format!("duration out of range: {seconds}"),
        ));
    }
    let duration = Duration::from_secs_f64(seconds);

    let run_id = app.runner.queue(section, duration);
    let name = app
        .registry
        .name(section)
        .map_err(RequestError::internal)?;
    response.insert(
        "message".into(),
        json!(format!("running section '{name}' for {seconds}s")),
    );
    response.insert("runId".into(), json!(run_id.0));
    Ok(())
}

#[derive(Debug, Deserialize)]
struct SectionRequest {
    #[serde(rename = "sectionID")]
    section_id: Option<i64>,
}

fn cancel_section(
    app: &App,
    payload: &[u8],
    response: &mut Map<String, Value>,
) -> Result<(), RequestError> {
    let request: SectionRequest = decode("cancelSection request", payload)?;
    let section = check_index(request.section_id, "section ID", app.registry.len())?;
    app.runner.cancel_section(section);
    let name = app
        .registry
        .name(section)
        .map_err(RequestError::internal)?;
    response.insert(
        "message".into(),
        json!(format!("cancelled section '{name}'")),
    );
    Ok(())
}

#[derive(Debug, Deserialize)]
struct RunIdRequest {
    #[serde(rename = "runID")]
    run_id: Option<u32>,
}

fn cancel_section_run_id(
    app: &App,
    payload: &[u8],
    response: &mut Map<String, Value>,
) -> Result<(), RequestError> {
    let request: RunIdRequest = decode("cancelSectionRunId request", payload)?;
    let run_id = request
        .run_id
        .ok_or_else(|| RequestError::not_specified("runID"))?;
    app.runner.cancel_run(RunId(run_id));
    response.insert(
        "message".into(),
        json!(format!("cancelled section run with id {run_id}")),
    );
    Ok(())
}

fn cancel_all_section_runs(
    app: &App,
    response: &mut Map<String, Value>,
) -> Result<(), RequestError> {
    app.runner.cancel_all();
    response.insert("message".into(), json!("cancelled all section runs"));
    Ok(())
}

#[derive(Debug, Deserialize)]
struct PauseRequest {
    paused: Option<bool>,
}

fn pause_section_runner(
    app: &App,
    payload: &[u8],
    response: &mut Map<String, Value>,
) -> Result<(), RequestError> {
    let request: PauseRequest = decode("pauseSectionRunner request", payload)?;
    let paused = request
        .paused
        .ok_or_else(|| RequestError::not_specified("paused"))?;
    if paused {
        app.runner.pause();
        response.insert("message".into(), json!("paused section runner"));
    } else {
        app.runner.unpause();
        response.insert("message".into(), json!("unpaused section runner"));
    }
    response.insert("paused".into(), json!(paused));
    Ok(())
}

#[cfg(test)]
#[path = "requests_tests.rs"]
mod tests;
