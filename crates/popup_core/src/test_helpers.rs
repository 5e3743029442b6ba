//! Shared fixtures for unit tests.

use crate::scenario::{
    EdgeSpec, LocoDeliveryStrategy, LocomotiveSpec, ProcessTimesSpec, ScenarioParams, TrackSpec,
    TrainSpec, WagonSpec, WorkshopSpec,
};
use crate::tracks::{SelectionStrategy, TrackRole};

/// A four-track yard (collection, retrofit, workshop, parking) with one
/// workshop, one locomotive, and a single one-wagon train at t=0.
pub fn minimal_scenario() -> ScenarioParams {
    let track = |id: &str, role: TrackRole| TrackSpec {
        id: id.into(),
        role,
        length_m: 100.0,
        fill_factor: 1.0,
    };
    ScenarioParams {
        scenario_id: "fixture".into(),
        epoch_ms: 0,
        duration_ms: 24 * 60 * 60 * 1000,
        seed: 0,
        track_selection_strategy: SelectionStrategy::FirstAvailable,
        retrofit_selection_strategy: SelectionStrategy::FirstAvailable,
        loco_delivery_strategy: LocoDeliveryStrategy::StayAtWorkshop,
        tracks: vec![
            track("C1", TrackRole::Collection),
            track("R1", TrackRole::Retrofit),
            track("WS1", TrackRole::Workshop),
            track("P1", TrackRole::Parking),
        ],
        workshops: vec![WorkshopSpec {
            id: "w1".into(),
            name: None,
            track_id: "WS1".into(),
            retrofit_stations: 1,
        }],
        locomotives: vec![LocomotiveSpec {
            id: "L1".into(),
            track_id: None,
        }],
        trains: vec![TrainSpec {
            id: "T1".into(),
            arrival_ms: 0,
            wagons: vec![WagonSpec {
                id: "W1".into(),
                length_m: 20.0,
                needs_retrofit: true,
            }],
        }],
        edges: vec![
            edge("C1", "R1"),
            edge("R1", "WS1"),
            edge("WS1", "P1"),
            edge("P1", "C1"),
        ],
        process_times: ProcessTimesSpec {
            coupling_time: 1.0,
            decoupling_time: 1.0,
            retrofit_time_per_wagon: 30.0,
            train_preparation_time: 0.0,
            track_change_time: 2.0,
        },
    }
}

/// Two-minute symmetric edge.
pub fn edge(from: &str, to: &str) -> EdgeSpec {
    EdgeSpec {
        from: from.into(),
        to: to.into(),
        time_ms: 120_000,
        reverse_time_ms: None,
    }
}
