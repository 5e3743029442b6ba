//! Workshop selection and batch distribution: least-busy choice, round-robin
//! spreading across free stations, and FIFO station queueing.

mod support;

use popup_core::recorder::EventCategory;
use popup_core::scenario::{LocoDeliveryStrategy, LocomotiveSpec, ScenarioParams, WorkshopSpec};
use popup_core::tracks::{SelectionStrategy, TrackRole};

use support::run::{all_of_kind, run_scenario};
use support::scenarios::{edge, track, train, unit_process_times, wagon, DAY_MS};

/// One retrofit track feeding two single-station workshops on their own
/// tracks.
fn twin_workshop_scenario(wagon_count: usize) -> ScenarioParams {
    let wagons = (0..wagon_count)
        .map(|i| wagon(&format!("W{i}"), 20.0))
        .collect();
    ScenarioParams {
        scenario_id: "twin-workshops".into(),
        epoch_ms: 0,
        duration_ms: DAY_MS,
        seed: 0,
        track_selection_strategy: SelectionStrategy::FirstAvailable,
        retrofit_selection_strategy: SelectionStrategy::FirstAvailable,
        loco_delivery_strategy: LocoDeliveryStrategy::StayAtWorkshop,
        tracks: vec![
            track("C1", TrackRole::Collection, 400.0),
            track("R1", TrackRole::Retrofit, 400.0),
            track("WS1", TrackRole::Workshop, 200.0),
            track("WS2", TrackRole::Workshop, 200.0),
            track("P1", TrackRole::Parking, 600.0),
        ],
        workshops: vec![
            WorkshopSpec {
                id: "w1".into(),
                name: None,
                track_id: "WS1".into(),
                retrofit_stations: 1,
            },
            WorkshopSpec {
                id: "w2".into(),
                name: None,
                track_id: "WS2".into(),
                retrofit_stations: 1,
            },
        ],
        locomotives: vec![
            LocomotiveSpec {
                id: "L1".into(),
                track_id: None,
            },
            LocomotiveSpec {
                id: "L2".into(),
                track_id: None,
            },
        ],
        trains: vec![train("T1", 0, wagons)],
        edges: vec![
            edge("P1", "C1"),
            edge("C1", "R1"),
            edge("R1", "WS1"),
            edge("R1", "WS2"),
            edge("WS1", "P1"),
            edge("WS2", "P1"),
        ],
        process_times: unit_process_times(),
    }
}

#[test]
fn batch_spreads_round_robin_across_workshops() {
    // Two wagons, one free station each: one wagon per workshop.
    let world = run_scenario(&twin_workshop_scenario(2));

    let acquired = all_of_kind(&world, EventCategory::Workshop, "station_acquired");
    let hosts: Vec<&str> = acquired.iter().map(|e| e.subject_id.as_str()).collect();
    assert!(hosts.contains(&"w1"), "w1 idle: {hosts:?}");
    assert!(hosts.contains(&"w2"), "w2 idle: {hosts:?}");
}

#[test]
fn surplus_wagons_wait_for_free_stations() {
    // Four wagons into two single-station workshops: two retrofit rounds.
    let world = run_scenario(&twin_workshop_scenario(4));

    let finished = all_of_kind(&world, EventCategory::Wagon, "retrofit_finished");
    assert_eq!(finished.len(), 4);
    let first_round = finished[0].time_ms;
    let last_round = finished[finished.len() - 1].time_ms;
    assert!(
        last_round >= first_round + 30 * 60 * 1000,
        "four wagons through two stations need at least two retrofit rounds"
    );
    assert_eq!(all_of_kind(&world, EventCategory::Wagon, "parked").len(), 4);
}

#[test]
fn group_leaves_only_after_all_wagons_finish() {
    let world = run_scenario(&twin_workshop_scenario(2));

    let finished = all_of_kind(&world, EventCategory::Wagon, "retrofit_finished");
    let first_finished = finished.first().expect("retrofits happened").time_ms;
    let exit_trips: Vec<u64> = all_of_kind(&world, EventCategory::Locomotive, "acquired")
        .iter()
        .filter(|e| e.payload["purpose"].as_str() == Some("parking_delivery"))
        .map(|e| e.time_ms)
        .collect();
    assert!(!exit_trips.is_empty());
    // No outbound trip may start before any wagon has finished its retrofit.
    assert!(exit_trips.iter().all(|t| *t >= first_finished));
}
