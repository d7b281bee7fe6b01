// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end flow across the core: config document -> registry, runner,
//! and program supervisors -> hardware actuation -> captured document.

use std::sync::Arc;
use std::time::Duration;

use sprinkler_core::bus::UpdateBus;
use sprinkler_core::config::ConfigDocument;
use sprinkler_core::hardware::{MockSectionInterface, SectionInterface};
use sprinkler_core::program::{Program, ProgramUpdate};
use sprinkler_core::{FakeClock, SectionRegistry, SectionRunner};

const DOCUMENT: &str = r#"{
  "sectionInterface": { "pins": [4, 17, 27] },
  "sections": [
    { "id": 0, "name": "Front lawn", "interfaceId": 0 },
    { "id": 0, "name": "Back lawn", "interfaceId": 1 },
    { "id": 0, "name": "Drip line", "interfaceId": 2 }
  ],
  "programs": [
    {
      "name": "Morning",
      "sequence": [
        { "section": 0, "duration": 0.02 },
        { "section": 2, "duration": 0.02 }
      ],
      "schedule": { "times": [ { "hour": 8, "minute": 30 } ], "weekdays": [1, 2, 3, 4, 5] },
      "enabled": true
    }
  ]
}"#;

struct Controller {
    document: ConfigDocument,
    registry: Arc<SectionRegistry>,
    interface: Arc<MockSectionInterface>,
    runner: SectionRunner,
    programs: Vec<Arc<Program>>,
}

fn start() -> (tempfile::TempDir, Controller) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, DOCUMENT).unwrap();
    let document = ConfigDocument::load(&path).unwrap();

    let interface = Arc::new(MockSectionInterface::new(
        document.section_interface.pins.len(),
    ));
    let dyn_interface: Arc<dyn SectionInterface> = interface.clone();
    let registry = Arc::new(SectionRegistry::new(document.sections.clone()));
    // Friday 2024-06-07, 08:00 local
    let clock = FakeClock::at(2024, 6, 7, 8, 0);
    let runner = SectionRunner::spawn(Arc::clone(&registry), dyn_interface, clock.clone());
    let bus = Arc::new(UpdateBus::new());
    let programs = document
        .programs
        .iter()
        .cloned()
        .map(|config| {
            Program::spawn(
                config.id,
                config.into_data(),
                runner.clone(),
                Arc::clone(&bus),
                clock.clone(),
            )
        })
        .collect();

    (
        dir,
        Controller {
            document,
            registry,
            interface,
            runner,
            programs,
        },
    )
}

#[tokio::test(start_paused = true)]
async fn program_run_drives_hardware_in_sequence() {
    let (_dir, controller) = start();
    let program = &controller.programs[0];

    program.run_now();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(!program.running());
    assert_eq!(
        controller.interface.operations(),
        vec![(0, true), (0, false), (2, true), (2, false)]
    );
    assert_eq!(controller.interface.on_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn scheduled_fire_runs_at_the_configured_time() {
    let (_dir, controller) = start();

    // 08:30 is 30 minutes after the pinned clock.
    tokio::time::sleep(Duration::from_secs(31 * 60)).await;
    assert_eq!(
        controller.interface.operations(),
        vec![(0, true), (0, false), (2, true), (2, false)]
    );
}

#[tokio::test(start_paused = true)]
async fn edits_survive_a_capture_round_trip() {
    let (dir, controller) = start();

    controller.registry.rename(1, "Rose beds").await.unwrap();
    controller.programs[0]
        .update(
            ProgramUpdate {
                name: Some("Dawn".into()),
                enabled: Some(false),
                ..ProgramUpdate::default()
            },
            controller.registry.len(),
        )
        .await
        .unwrap();

    let captured = ConfigDocument::capture(
        &controller.document.section_interface.pins,
        &controller.registry,
        &controller.programs,
    );
    let path = dir.path().join("config.json");
    captured.save(&path).unwrap();

    let reloaded = ConfigDocument::load(&path).unwrap();
    assert_eq!(reloaded.sections[1].name, "Rose beds");
    assert_eq!(reloaded.programs[0].name, "Dawn");
    assert!(!reloaded.programs[0].enabled);
    assert_eq!(reloaded.programs[0].sequence.len(), 2);
    assert_eq!(
        reloaded.section_interface.pins,
        controller.document.section_interface.pins
    );
}

#[tokio::test(start_paused = true)]
async fn adhoc_runs_and_programs_share_one_serialized_queue() {
    let (_dir, controller) = start();

    // An ad-hoc run is in flight when the program fires its steps; the
    // program's steps queue behind it.
    controller.runner.queue(1, Duration::from_millis(30));
    controller.programs[0].run_now();
    tokio::time::sleep(Duration::from_millis(5)).await;

    assert!(controller.interface.get(1));
    assert_eq!(controller.runner.state().queue.len(), 2);

    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(
        controller.interface.operations(),
        vec![
            (1, true),
            (1, false),
            (0, true),
            (0, false),
            (2, true),
            (2, false),
        ]
    );
}
