//! Scenario fixtures for integration tests.

use popup_core::scenario::{
    EdgeSpec, LocoDeliveryStrategy, LocomotiveSpec, ProcessTimesSpec, ScenarioParams, TrackSpec,
    TrainSpec, WagonSpec, WorkshopSpec,
};
use popup_core::tracks::{SelectionStrategy, TrackRole};

pub const DAY_MS: u64 = 24 * 60 * 60 * 1000;

/// Symmetric edge with a 2-minute traversal time.
pub fn edge(from: &str, to: &str) -> EdgeSpec {
    EdgeSpec {
        from: from.into(),
        to: to.into(),
        time_ms: 120_000,
        reverse_time_ms: None,
    }
}

pub fn track(id: &str, role: TrackRole, length_m: f64) -> TrackSpec {
    TrackSpec {
        id: id.into(),
        role,
        length_m,
        fill_factor: 1.0,
    }
}

pub fn wagon(id: &str, length_m: f64) -> WagonSpec {
    WagonSpec {
        id: id.into(),
        length_m,
        needs_retrofit: true,
    }
}

pub fn train(id: &str, arrival_ms: u64, wagons: Vec<WagonSpec>) -> TrainSpec {
    TrainSpec {
        id: id.into(),
        arrival_ms,
        wagons,
    }
}

/// Process times used across the literal end-to-end scenarios: couple and
/// decouple 1 minute, retrofit 30 minutes, no train preparation, adjacent
/// moves 2 minutes.
pub fn unit_process_times() -> ProcessTimesSpec {
    ProcessTimesSpec {
        coupling_time: 1.0,
        decoupling_time: 1.0,
        retrofit_time_per_wagon: 30.0,
        train_preparation_time: 0.0,
        track_change_time: 2.0,
    }
}

/// The minimal direct-flow yard: one collection, one retrofit track that the
/// single-station workshop works directly, one parking track, one
/// locomotive. All tracks adjacent in a ring, 2 minutes per hop.
pub fn single_wagon_scenario() -> ScenarioParams {
    ScenarioParams {
        scenario_id: "single-wagon".into(),
        epoch_ms: 0,
        duration_ms: DAY_MS,
        seed: 0,
        track_selection_strategy: SelectionStrategy::FirstAvailable,
        retrofit_selection_strategy: SelectionStrategy::FirstAvailable,
        loco_delivery_strategy: LocoDeliveryStrategy::StayAtWorkshop,
        tracks: vec![
            track("C1", TrackRole::Collection, 40.0),
            track("R1", TrackRole::Retrofit, 40.0),
            track("P1", TrackRole::Parking, 200.0),
        ],
        workshops: vec![WorkshopSpec {
            id: "w1".into(),
            name: None,
            track_id: "R1".into(),
            retrofit_stations: 1,
        }],
        locomotives: vec![LocomotiveSpec {
            id: "L1".into(),
            track_id: None,
        }],
        trains: vec![train("T1", 0, vec![wagon("W1", 20.0)])],
        edges: vec![edge("P1", "C1"), edge("C1", "R1"), edge("R1", "P1")],
        process_times: unit_process_times(),
    }
}

/// A yard with a separate workshop track, used by the contention and
/// batching scenarios.
pub fn four_stage_scenario() -> ScenarioParams {
    ScenarioParams {
        scenario_id: "four-stage".into(),
        epoch_ms: 0,
        duration_ms: DAY_MS,
        seed: 0,
        track_selection_strategy: SelectionStrategy::FirstAvailable,
        retrofit_selection_strategy: SelectionStrategy::FirstAvailable,
        loco_delivery_strategy: LocoDeliveryStrategy::StayAtWorkshop,
        tracks: vec![
            track("C1", TrackRole::Collection, 200.0),
            track("R1", TrackRole::Retrofit, 200.0),
            track("WS1", TrackRole::Workshop, 200.0),
            track("P1", TrackRole::Parking, 400.0),
        ],
        workshops: vec![WorkshopSpec {
            id: "w1".into(),
            name: None,
            track_id: "WS1".into(),
            retrofit_stations: 2,
        }],
        locomotives: vec![LocomotiveSpec {
            id: "L1".into(),
            track_id: None,
        }],
        trains: vec![train("T1", 0, vec![wagon("W1", 20.0), wagon("W2", 20.0)])],
        edges: vec![
            edge("P1", "C1"),
            edge("C1", "R1"),
            edge("R1", "WS1"),
            edge("WS1", "P1"),
        ],
        process_times: unit_process_times(),
    }
}

/// Two equal collection tracks for the fairness and round-robin scenarios.
pub fn two_collection_scenario(
    strategy: SelectionStrategy,
    wagon_count: usize,
) -> ScenarioParams {
    let wagons = (0..wagon_count)
        .map(|i| wagon(&format!("W{i}"), 20.0))
        .collect();
    ScenarioParams {
        scenario_id: "two-collections".into(),
        epoch_ms: 0,
        duration_ms: DAY_MS,
        seed: 7,
        track_selection_strategy: strategy,
        retrofit_selection_strategy: SelectionStrategy::FirstAvailable,
        loco_delivery_strategy: LocoDeliveryStrategy::StayAtWorkshop,
        tracks: vec![
            track("C1", TrackRole::Collection, 400.0),
            track("C2", TrackRole::Collection, 400.0),
            track("R1", TrackRole::Retrofit, 400.0),
            track("P1", TrackRole::Parking, 400.0),
        ],
        workshops: vec![WorkshopSpec {
            id: "w1".into(),
            name: None,
            track_id: "R1".into(),
            retrofit_stations: 4,
        }],
        locomotives: vec![LocomotiveSpec {
            id: "L1".into(),
            track_id: None,
        }],
        trains: vec![train("T1", 0, wagons)],
        edges: vec![
            edge("P1", "C1"),
            edge("P1", "C2"),
            edge("C1", "R1"),
            edge("C2", "R1"),
            edge("R1", "P1"),
        ],
        process_times: unit_process_times(),
    }
}
