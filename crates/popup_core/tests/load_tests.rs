//! Larger-volume runs, ignored by default. Run with:
//! `cargo test -p popup_core --test load_tests -- --ignored`

mod support;

use popup_core::ecs::{Wagon, WagonStatus};
use popup_core::profiling::EventMetrics;
use popup_core::scenario::{LocomotiveSpec, ScenarioParams, TrainSpec, WorkshopSpec};
use popup_core::tracks::{SelectionStrategy, TrackRole};

use support::run::run_scenario;
use support::scenarios::{edge, track, unit_process_times, wagon};

/// A week of arrivals through a three-workshop site.
fn week_scenario() -> ScenarioParams {
    let trains = (0..7 * 12)
        .map(|n| TrainSpec {
            id: format!("T{n:03}"),
            arrival_ms: n * 2 * 60 * 60 * 1000,
            wagons: (0..15)
                .map(|i| wagon(&format!("W{n:03}-{i:02}"), 18.0))
                .collect(),
        })
        .collect();

    ScenarioParams {
        scenario_id: "week-load".into(),
        epoch_ms: 0,
        duration_ms: 8 * 24 * 60 * 60 * 1000,
        seed: 1234,
        track_selection_strategy: SelectionStrategy::LeastOccupied,
        retrofit_selection_strategy: SelectionStrategy::RoundRobin,
        loco_delivery_strategy: popup_core::scenario::LocoDeliveryStrategy::StayAtWorkshop,
        tracks: vec![
            track("C1", TrackRole::Collection, 600.0),
            track("C2", TrackRole::Collection, 600.0),
            track("R1", TrackRole::Retrofit, 500.0),
            track("R2", TrackRole::Retrofit, 500.0),
            track("WS1", TrackRole::Workshop, 300.0),
            track("WS2", TrackRole::Workshop, 300.0),
            track("WS3", TrackRole::Workshop, 300.0),
            track("E1", TrackRole::Exit, 500.0),
            // Room to park the whole week's throughput.
            track("P1", TrackRole::Parking, 30_000.0),
        ],
        workshops: vec![
            WorkshopSpec {
                id: "w1".into(),
                name: None,
                track_id: "WS1".into(),
                retrofit_stations: 5,
            },
            WorkshopSpec {
                id: "w2".into(),
                name: None,
                track_id: "WS2".into(),
                retrofit_stations: 5,
            },
            WorkshopSpec {
                id: "w3".into(),
                name: None,
                track_id: "WS3".into(),
                retrofit_stations: 4,
            },
        ],
        locomotives: (1..=4)
            .map(|i| LocomotiveSpec {
                id: format!("L{i}"),
                track_id: None,
            })
            .collect(),
        trains,
        edges: vec![
            edge("P1", "C1"),
            edge("P1", "C2"),
            edge("C1", "R1"),
            edge("C1", "R2"),
            edge("C2", "R1"),
            edge("C2", "R2"),
            edge("R1", "WS1"),
            edge("R1", "WS2"),
            edge("R1", "WS3"),
            edge("R2", "WS1"),
            edge("R2", "WS2"),
            edge("R2", "WS3"),
            edge("WS1", "E1"),
            edge("WS2", "E1"),
            edge("WS3", "E1"),
            edge("E1", "P1"),
        ],
        process_times: unit_process_times(),
    }
}

#[test]
#[ignore]
fn week_of_arrivals_drains_without_leaks() {
    let params = week_scenario();
    let mut world = run_scenario(&params);

    let mut terminal = 0;
    let mut in_flight = 0;
    for wagon in world.query::<&Wagon>().iter(&world) {
        match wagon.status {
            WagonStatus::Parked | WagonStatus::Rejected => terminal += 1,
            _ => in_flight += 1,
        }
    }
    assert_eq!(terminal, params.wagon_count());
    assert_eq!(in_flight, 0);

    let metrics = world.resource::<EventMetrics>();
    assert!(metrics.total() > 10_000, "suspiciously few events processed");
}
