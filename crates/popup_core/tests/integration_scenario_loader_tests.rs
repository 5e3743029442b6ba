//! Scenario directory loading and validation against real files on disk.

mod support;

use std::fs;
use std::path::Path;

use popup_core::scenario::{load_scenario, validate, ScenarioError};
use popup_core::tracks::{SelectionStrategy, TrackRole};

fn write(dir: &Path, name: &str, contents: &str) {
    fs::write(dir.join(name), contents).expect("fixture write");
}

/// Lay down a complete, valid scenario directory.
fn write_valid_scenario(dir: &Path) {
    write(
        dir,
        "scenario.json",
        r#"{
            "scenario_id": "loader-test",
            "start_date": "2030-01-01T00:00:00",
            "end_date": "2030-01-02T00:00:00",
            "track_selection_strategy": "LEAST_OCCUPIED",
            "retrofit_selection_strategy": "FIRST_AVAILABLE",
            "loco_delivery_strategy": "RETURN_TO_PARKING",
            "seed": 7,
            "references": {
                "trains": "trains.csv",
                "tracks": "tracks.json",
                "workshops": "workshops.json",
                "locomotives": "locomotives.json",
                "routes": "routes.json",
                "topology": "topology.json",
                "process_times": "process_times.json"
            }
        }"#,
    );
    write(
        dir,
        "tracks.json",
        r#"[
            { "id": "C1", "role": "COLLECTION", "length": 300 },
            { "id": "R1", "role": "RETROFIT", "length": 200, "fill_factor": 1.0 },
            { "id": "WS1", "role": "WORKSHOP", "length": 150 },
            { "id": "P1", "role": "PARKING", "length": 500 }
        ]"#,
    );
    write(
        dir,
        "workshops.json",
        r#"[ { "workshop_id": "w1", "track_id": "WS1", "retrofit_stations": 2, "name": "Hall" } ]"#,
    );
    write(
        dir,
        "locomotives.json",
        r#"[ { "locomotive_id": "L1" }, { "locomotive_id": "L2", "track_id": "P1" } ]"#,
    );
    write(
        dir,
        "routes.json",
        r#"[
            { "from": "C1", "to": "R1", "time": 4 },
            { "from": "R1", "to": "WS1", "time": 2, "reverse_time": 3 }
        ]"#,
    );
    write(
        dir,
        "topology.json",
        r#"[
            { "track_id": "C1", "connects_to": ["R1", "P1"] },
            { "track_id": "R1", "connects_to": ["C1", "WS1"] },
            { "track_id": "WS1", "connects_to": ["R1", "P1"] },
            { "track_id": "P1", "connects_to": ["WS1", "C1"] }
        ]"#,
    );
    write(
        dir,
        "process_times.json",
        r#"{
            "coupling_time": 2,
            "decoupling_time": 1.5,
            "retrofit_time_per_wagon": 40,
            "train_preparation_time": 5
        }"#,
    );
    write(
        dir,
        "trains.csv",
        "train_id,arrival_time,wagon_id,length,needs_retrofit\n\
         T1,2030-01-01T01:00:00,W1,18,true\n\
         T1,2030-01-01T01:00:00,W2,22,false\n\
         T2,90,W3,20,true\n",
    );
}

#[test]
fn valid_directory_loads_and_validates() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_valid_scenario(dir.path());

    let params = load_scenario(dir.path()).expect("scenario loads");
    assert_eq!(params.scenario_id, "loader-test");
    assert_eq!(params.seed, 7);
    assert_eq!(params.duration_ms, 24 * 60 * 60 * 1000);
    assert_eq!(
        params.track_selection_strategy,
        SelectionStrategy::LeastOccupied
    );
    assert_eq!(params.tracks.len(), 4);
    // Default fill factor applies where the file omits it.
    assert_eq!(params.tracks[0].fill_factor, 0.75);
    assert_eq!(params.tracks[1].fill_factor, 1.0);

    // Two trains: ISO arrival converted to an offset, minutes kept as-is.
    assert_eq!(params.trains.len(), 2);
    assert_eq!(params.trains[0].id, "T1");
    assert_eq!(params.trains[0].arrival_ms, 60 * 60 * 1000);
    assert_eq!(params.trains[0].wagons.len(), 2);
    assert!(!params.trains[0].wagons[1].needs_retrofit);
    assert_eq!(params.trains[1].arrival_ms, 90 * 60 * 1000);

    // Explicit route edges keep their times; the untimed P1 adjacencies get
    // the default track-change time.
    let c1_r1 = params
        .edges
        .iter()
        .find(|e| e.from == "C1" && e.to == "R1")
        .expect("explicit edge");
    assert_eq!(c1_r1.time_ms, 4 * 60 * 1000);
    let asymmetric = params
        .edges
        .iter()
        .find(|e| e.from == "R1" && e.to == "WS1")
        .expect("asymmetric edge");
    assert_eq!(asymmetric.reverse_time_ms, Some(3 * 60 * 1000));

    let report = validate(&params);
    assert!(!report.has_errors(), "unexpected errors: {report}");
}

#[test]
fn missing_directory_is_an_io_error() {
    let err = load_scenario(Path::new("/nonexistent/scenario-dir")).unwrap_err();
    assert!(matches!(err, ScenarioError::Io { .. }));
}

#[test]
fn malformed_json_is_a_parse_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_valid_scenario(dir.path());
    write(dir.path(), "tracks.json", "[ { not json ]");

    let err = load_scenario(dir.path()).unwrap_err();
    assert!(matches!(err, ScenarioError::Parse { .. }));
}

#[test]
fn end_before_start_is_a_parse_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_valid_scenario(dir.path());
    let scenario = fs::read_to_string(dir.path().join("scenario.json")).unwrap();
    write(
        dir.path(),
        "scenario.json",
        &scenario.replace("2030-01-02T00:00:00", "2029-12-31T00:00:00"),
    );

    let err = load_scenario(dir.path()).unwrap_err();
    match err {
        ScenarioError::Parse { message, .. } => {
            assert!(message.contains("end_date"), "message: {message}")
        }
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[test]
fn loaded_scenario_with_missing_retrofit_track_fails_validation() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_valid_scenario(dir.path());
    write(
        dir.path(),
        "tracks.json",
        r#"[
            { "id": "C1", "role": "COLLECTION", "length": 300 },
            { "id": "WS1", "role": "WORKSHOP", "length": 150 },
            { "id": "P1", "role": "PARKING", "length": 500 }
        ]"#,
    );

    let params = load_scenario(dir.path()).expect("loads fine; validation catches it");
    let report = validate(&params);
    assert!(report.has_errors());
    assert!(report
        .errors
        .iter()
        .any(|e| e.message.contains("RETROFIT")));
}

#[test]
fn roles_cover_all_yard_functions() {
    // Exhaustive role parse check against the wire spelling.
    let raw = r#"["COLLECTION","RETROFIT","WORKSHOP","PARKING","FEEDER","EXIT","HEAD"]"#;
    let roles: Vec<TrackRole> = serde_json::from_str(raw).expect("all roles parse");
    assert_eq!(roles.len(), 7);
}
