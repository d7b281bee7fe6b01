use std::time::Duration;

use super::*;
use crate::program::ProgItem;
use crate::sched::{TimeOfDay, Weekday};

const DOCUMENT: &str = r#"{
  "sectionInterface": { "pins": [11, 12, 13] },
  "sections": [
    { "id": 99, "name": "Front lawn", "interfaceId": 11 },
    { "id": 99, "name": "Back lawn", "interfaceId": 2 }
  ],
  "programs": [
    {
      "name": "Morning",
      "sequence": [
        { "section": 0, "duration": 120.5 },
        { "section": 1, "duration": 60 }
      ],
      "schedule": {
        "times": [ { "hour": 6, "minute": 30 } ],
        "weekdays": [1, 3, 5],
        "from": null,
        "to": null
      },
      "enabled": true
    }
  ]
}"#;

fn write_temp(contents: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, contents).unwrap();
    (dir, path)
}

#[test]
fn load_assigns_positional_ids() {
    let (_dir, path) = write_temp(DOCUMENT);

    let document = ConfigDocument::load(&path).unwrap();
    // The ids in the file are ignored in favor of position.
    assert_eq!(document.sections[0].id, 0);
    assert_eq!(document.sections[1].id, 1);
    assert_eq!(document.programs[0].id, 0);

    assert_eq!(document.section_interface.pins, vec![11, 12, 13]);
    assert_eq!(document.sections[1].interface_id, 2);

    let program = &document.programs[0];
    assert!(program.enabled);
    assert_eq!(
        program.sequence[0],
        ProgItem {
            section: 0,
            duration: Duration::from_millis(120_500),
        }
    );
    assert_eq!(program.schedule.times, vec![TimeOfDay::new(6, 30)]);
    assert_eq!(
        program.schedule.weekdays,
        vec![Weekday::Monday, Weekday::Wednesday, Weekday::Friday]
    );
}

#[test]
fn load_rejects_out_of_range_interface_id() {
    // interfaceId 11 is an index into pins, and only 2 pins exist.
    let (_dir, path) = write_temp(
        r#"{
          "sectionInterface": { "pins": [11, 12] },
          "sections": [ { "id": 0, "name": "A", "interfaceId": 11 } ],
          "programs": []
        }"#,
    );
    let err = ConfigDocument::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
    assert!(err.to_string().contains("interface id 11"));
}

#[test]
fn load_rejects_unknown_sequence_section() {
    let (_dir, path) = write_temp(
        r#"{
          "sectionInterface": { "pins": [1, 2] },
          "sections": [ { "id": 0, "name": "A", "interfaceId": 0 } ],
          "programs": [
            { "name": "P", "sequence": [ { "section": 3, "duration": 5 } ] }
          ]
        }"#,
    );
    let err = ConfigDocument::load(&path).unwrap_err();
    assert!(err.to_string().contains("unknown section id 3"));
}

#[test]
fn load_reports_parse_errors_with_path() {
    let (_dir, path) = write_temp("{ not json");
    let err = ConfigDocument::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert!(err.to_string().contains("config.json"));
}

#[test]
fn save_round_trips() {
    let (_dir, path) = write_temp(DOCUMENT);
    let document = ConfigDocument::load(&path).unwrap();

    let out = path.with_file_name("out.json");
    document.save(&out).unwrap();
    let reloaded = ConfigDocument::load(&out).unwrap();

    assert_eq!(reloaded, document);
}

#[test]
fn save_replaces_existing_file_atomically() {
    let (_dir, path) = write_temp(DOCUMENT);
    let document = ConfigDocument::load(&path).unwrap();

    let mut edited = document.clone();
    edited.programs[0].enabled = false;
    edited.save(&path).unwrap();

    let reloaded = ConfigDocument::load(&path).unwrap();
    assert!(!reloaded.programs[0].enabled);
    // No temp file is left behind.
    assert!(!path.with_extension("json.tmp").exists());
    assert_eq!(
        fs::read_dir(path.parent().unwrap()).unwrap().count(),
        1
    );
}

#[test]
fn defaulted_program_fields_are_unarmed() {
    let (_dir, path) = write_temp(
        r#"{
          "sectionInterface": { "pins": [1] },
          "sections": [ { "id": 0, "name": "A", "interfaceId": 0 } ],
          "programs": [ { "name": "Bare" } ]
        }"#,
    );
    let document = ConfigDocument::load(&path).unwrap();
    let program = &document.programs[0];

    assert!(!program.enabled);
    assert!(program.sequence.is_empty());
    assert!(!program.schedule.is_armed());
    // Defaulted weekdays cover the whole week.
    assert_eq!(program.schedule.weekdays.len(), 7);
}
