// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! sprinklerctl - operator CLI for sprinklerd
//!
//! Talks to the daemon over the same MQTT broker (configured through
//! `MQTT_BROKER`): state reads come from the retained topics, actions go
//! through the request/response channel.

use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value};
use sprinkler_core::sched::parser::parse_schedule;
use sprinkler_daemon::mqtt::BrokerConfig;

mod client;

use client::ControllerClient;

#[derive(Parser)]
#[command(name = "sprinklerctl")]
#[command(about = "Control a sprinklerd irrigation controller")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show controller connection and runner state
    Status,
    /// List sections and their current state
    Sections,
    /// List programs
    Programs,
    /// Run one section for a duration (in seconds)
    RunSection { section: usize, duration: f64 },
    /// Cancel all runs for a section
    CancelSection { section: usize },
    /// Cancel one run by id
    CancelRun { run_id: u32 },
    /// Cancel every queued and running section run
    CancelAll,
    /// Pause the section runner
    Pause,
    /// Unpause the section runner
    Unpause,
    /// Run a program now
    RunProgram { program: usize },
    /// Cancel a running program
    CancelProgram { program: usize },
    /// Edit a program
    UpdateProgram {
        program: usize,
        /// New display name
        #[arg(long)]
        name: Option<String>,
        /// Enable or disable the schedule
        #[arg(long)]
        enabled: Option<bool>,
        /// New schedule, e.g. "at 8:30 am on mon, wed from 5/15 to 10/1"
        #[arg(long)]
        schedule: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let broker = BrokerConfig::from_env()?;
    let mut client = ControllerClient::connect(&broker);

    match cli.command {
        Commands::Status => status(&mut client).await,
        Commands::Sections => sections(&mut client).await,
        Commands::Programs => programs(&mut client).await,
        Commands::RunSection { section, duration } => {
            let response = client
                .request(
                    "runSection",
                    object(json!({ "sectionID": section, "duration": duration })),
                )
                .await?;
            println!("{} (run id {})", message(&response), response["runId"]);
            Ok(())
        }
        Commands::CancelSection { section } => {
            simple(&mut client, "cancelSection", json!({ "sectionID": section })).await
        }
        Commands::CancelRun { run_id } => {
            simple(&mut client, "cancelSectionRunId", json!({ "runID": run_id })).await
        }
        Commands::CancelAll => simple(&mut client, "cancelAllSectionRuns", json!({})).await,
        Commands::Pause => {
            simple(&mut client, "pauseSectionRunner", json!({ "paused": true })).await
        }
        Commands::Unpause => {
            simple(&mut client, "pauseSectionRunner", json!({ "paused": false })).await
        }
        Commands::RunProgram { program } => {
            simple(&mut client, "runProgram", json!({ "programID": program })).await
        }
        Commands::CancelProgram { program } => {
            simple(&mut client, "cancelProgram", json!({ "programID": program })).await
        }
        Commands::UpdateProgram {
            program,
            name,
            enabled,
            schedule,
        } => {
            let mut data = Map::new();
            if let Some(name) = name {
                data.insert("name".into(), json!(name));
            }
            if let Some(enabled) = enabled {
                data.insert("enabled".into(), json!(enabled));
            }
            if let Some(schedule) = schedule {
                let parsed = parse_schedule(&schedule)
                    .map_err(|error| anyhow::anyhow!("invalid schedule: {error}"))?;
                data.insert("schedule".into(), serde_json::to_value(parsed)?);
            }
            let response = client
                .request(
                    "updateProgram",
                    object(json!({ "programID": program, "data": data })),
                )
                .await?;
            println!("{}", message(&response));
            Ok(())
        }
    }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn message(response: &Value) -> &str {
    response["message"].as_str().unwrap_or("ok")
}

async fn simple(client: &mut ControllerClient, kind: &str, payload: Value) -> anyhow::Result<()> {
    let response = client.request(kind, object(payload)).await?;
    println!("{}", message(&response));
    Ok(())
}

async fn status(client: &mut ControllerClient) -> anyhow::Result<()> {
    let state = client.gather_state().await?;
    let connected = text(&state, "connected") == "true";
    println!("connected: {connected}");

    if let Some(runner) = state.get("section_runner") {
        let runner: Value = serde_json::from_slice(runner)?;
        println!("paused: {}", runner["paused"]);
        match runner.get("current").filter(|current| !current.is_null()) {
            Some(current) => println!(
                "current: section {} ({}s of {}s left)",
                current["section"], current["duration"], current["totalDuration"]
            ),
            None => println!("current: none"),
        }
        let queued = runner["queue"].as_array().map(Vec::len).unwrap_or(0);
        println!("queued runs: {queued}");
    }
    Ok(())
}

async fn sections(client: &mut ControllerClient) -> anyhow::Result<()> {
    let state = client.gather_state().await?;
    let count: usize = text(&state, "sections").parse().unwrap_or(0);
    for id in 0..count {
        let data: Value = serde_json::from_slice(
            state
                .get(&format!("sections/{id}"))
                .map(Vec::as_slice)
                .unwrap_or(b"{}"),
        )?;
        let on = text(&state, &format!("sections/{id}/state")) == "true";
        println!(
            "{id}: {} [{}]",
            data["name"].as_str().unwrap_or("?"),
            if on { "on" } else { "off" }
        );
    }
    Ok(())
}

async fn programs(client: &mut ControllerClient) -> anyhow::Result<()> {
    let state = client.gather_state().await?;
    let count: usize = text(&state, "programs").parse().unwrap_or(0);
    for id in 0..count {
        let data: Value = serde_json::from_slice(
            state
                .get(&format!("programs/{id}"))
                .map(Vec::as_slice)
                .unwrap_or(b"{}"),
        )?;
        let running = text(&state, &format!("programs/{id}/running")) == "true";
        let steps = data["sequence"].as_array().map(Vec::len).unwrap_or(0);
        println!(
            "{id}: {} ({} steps, {}){}",
            data["name"].as_str().unwrap_or("?"),
            steps,
            if data["enabled"].as_bool().unwrap_or(false) {
                "enabled"
            } else {
                "disabled"
            },
            if running { " [running]" } else { "" }
        );
    }
    Ok(())
}

fn text(state: &std::collections::BTreeMap<String, Vec<u8>>, topic: &str) -> String {
    state
        .get(topic)
        .map(|payload| String::from_utf8_lossy(payload).to_string())
        .unwrap_or_default()
}
