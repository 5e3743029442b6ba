//! Literal end-to-end pipeline scenarios: direct flow timing, one-trip
//! batching, the full four-stage yard, and locomotive contention.

mod support;

use popup_core::ecs::{CouplerType, Wagon, WagonStatus};
use popup_core::recorder::EventCategory;
use popup_core::scenario::{LocoDeliveryStrategy, WorkshopSpec};
use popup_core::tracks::{SelectionStrategy, TrackRole};

use support::run::{all_of_kind, events_of, run_scenario};
use support::scenarios::{
    four_stage_scenario, single_wagon_scenario, train, two_collection_scenario, wagon,
};

/// Single wagon, direct flow: approach 2 + couple 1 + haul 2 + decouple 1,
/// retrofit 30 in place, then couple 1 + haul 2 + decouple 1 to parking.
#[test]
fn single_wagon_flows_through_in_forty_minutes() {
    let params = single_wagon_scenario();
    let mut world = run_scenario(&params);

    let wagon: Vec<&Wagon> = world.query::<&Wagon>().iter(&world).collect();
    assert_eq!(wagon.len(), 1);
    assert_eq!(wagon[0].status, WagonStatus::Parked);
    assert_eq!(wagon[0].coupler, CouplerType::Dac);

    let completed = all_of_kind(&world, EventCategory::Wagon, "completed");
    assert_eq!(completed.len(), 1);
    let flow = completed[0].payload["flow_time_minutes"]
        .as_f64()
        .expect("flow time in payload");
    assert!((flow - 40.0).abs() < 1e-9, "flow time was {flow} minutes");

    // The workshop works the retrofit track directly: no waiting.
    let placed = events_of(&world, EventCategory::Wagon, "W1", "placed");
    let on_retrofit = placed
        .iter()
        .find(|e| e.payload["role"].as_str() == Some("RETROFIT"))
        .expect("wagon placed on retrofit track");
    let started = events_of(&world, EventCategory::Wagon, "W1", "retrofit_started");
    assert_eq!(started.len(), 1);
    assert_eq!(started[0].time_ms, on_retrofit.time_ms);
}

/// Two wagons on the same collection track bound for the same retrofit track
/// share one locomotive trip: one acquire/release cycle for the pickup.
#[test]
fn queue_head_wagons_batch_into_one_trip() {
    let params = four_stage_scenario();
    let world = run_scenario(&params);

    let acquired = all_of_kind(&world, EventCategory::Locomotive, "acquired");
    let pickups: Vec<_> = acquired
        .iter()
        .filter(|e| e.payload["purpose"].as_str() == Some("collection_pickup"))
        .collect();
    assert_eq!(pickups.len(), 1, "both wagons should share one pickup trip");
    assert_eq!(pickups[0].payload["wagons"].as_u64(), Some(2));

    // One coupling on the collection track covers the whole rake.
    let couplings = all_of_kind(&world, EventCategory::Locomotive, "coupling");
    assert_eq!(couplings[0].payload["wagons"].as_u64(), Some(2));
}

/// The four-stage yard moves every wagon to parking through a separate
/// workshop track.
#[test]
fn four_stage_yard_parks_all_wagons() {
    let params = four_stage_scenario();
    let mut world = run_scenario(&params);

    for wagon in world.query::<&Wagon>().iter(&world) {
        assert_eq!(wagon.status, WagonStatus::Parked, "wagon {}", wagon.id);
    }
    assert_eq!(all_of_kind(&world, EventCategory::Wagon, "parked").len(), 2);
    assert_eq!(
        all_of_kind(&world, EventCategory::Wagon, "retrofit_finished").len(),
        2
    );
}

/// With a single locomotive, the second pickup's acquire resumes exactly at
/// the first trip's release instant — FIFO, no busy-spin.
#[test]
fn contended_locomotive_is_granted_in_request_order() {
    // One wagon per collection track forces two separate pickup trips.
    let params = two_collection_scenario(SelectionStrategy::LeastOccupied, 2);
    let world = run_scenario(&params);

    let acquired = all_of_kind(&world, EventCategory::Locomotive, "acquired");
    let released = all_of_kind(&world, EventCategory::Locomotive, "released");
    assert!(acquired.len() >= 2);
    assert_eq!(
        acquired[1].time_ms, released[0].time_ms,
        "second trip must start at the first release instant"
    );
    assert_eq!(
        acquired[1].payload["purpose"].as_str(),
        Some("collection_pickup")
    );
}

/// Locomotives returning to parking rejoin the pool only on arrival there.
#[test]
fn return_to_parking_delays_release_until_arrival() {
    let mut params = single_wagon_scenario();
    params.loco_delivery_strategy = LocoDeliveryStrategy::ReturnToParking;
    let world = run_scenario(&params);

    let released = all_of_kind(&world, EventCategory::Locomotive, "released");
    for event in &released {
        assert_eq!(
            event.payload["track"].as_str(),
            Some("P1"),
            "release must happen on the parking track"
        );
    }
}

/// A retrofitted wagon no parking track can ever hold is rejected on the
/// outbound leg instead of stalling its group.
#[test]
fn oversized_for_parking_wagon_is_rejected_after_retrofit() {
    let mut params = single_wagon_scenario();
    params.tracks[2].length_m = 15.0; // P1 can never take the 20m wagon
    params.workshops[0].retrofit_stations = 2;
    params.trains = vec![train(
        "T1",
        0,
        vec![wagon("W-big", 20.0), wagon("W-small", 10.0)],
    )];
    let mut world = run_scenario(&params);

    for w in world.query::<&Wagon>().iter(&world) {
        match w.id.as_str() {
            "W-big" => {
                assert_eq!(w.status, WagonStatus::Rejected);
                // The retrofit itself still happened before the dead end.
                assert_eq!(w.coupler, CouplerType::Dac);
            }
            "W-small" => assert_eq!(w.status, WagonStatus::Parked),
            other => panic!("unexpected wagon {other}"),
        }
    }

    let rejected = all_of_kind(&world, EventCategory::Wagon, "rejected");
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].subject_id, "W-big");
    assert_eq!(
        rejected[0].payload["reason"].as_str(),
        Some("no_capacity_any_track")
    );
    assert_eq!(all_of_kind(&world, EventCategory::Wagon, "parked").len(), 1);
}

/// Same dead end reached through an exit track: the stranded wagon must not
/// head-block the rake queued behind it.
#[test]
fn oversized_wagon_on_exit_track_does_not_block_parking() {
    let mut params = single_wagon_scenario();
    params.tracks[2].length_m = 15.0;
    params
        .tracks
        .push(support::scenarios::track("E1", TrackRole::Exit, 100.0));
    params.edges.push(support::scenarios::edge("R1", "E1"));
    params.edges.push(support::scenarios::edge("E1", "P1"));
    params.workshops[0].retrofit_stations = 2;
    params.trains = vec![train(
        "T1",
        0,
        vec![wagon("W-big", 20.0), wagon("W-small", 10.0)],
    )];
    let mut world = run_scenario(&params);

    for w in world.query::<&Wagon>().iter(&world) {
        match w.id.as_str() {
            "W-big" => assert_eq!(w.status, WagonStatus::Rejected),
            "W-small" => assert_eq!(w.status, WagonStatus::Parked),
            other => panic!("unexpected wagon {other}"),
        }
    }

    let rejected = all_of_kind(&world, EventCategory::Wagon, "rejected");
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].payload["stage"].as_str(), Some("parking"));
}

/// A workshop bound to its own WORKSHOP-role track still serves groups from
/// several retrofit tracks.
#[test]
fn workshop_serves_multiple_retrofit_tracks() {
    let mut params = four_stage_scenario();
    params.retrofit_selection_strategy = SelectionStrategy::RoundRobin;
    params.tracks.insert(
        2,
        support::scenarios::track("R2", popup_core::tracks::TrackRole::Retrofit, 200.0),
    );
    params.edges.push(support::scenarios::edge("C1", "R2"));
    params.edges.push(support::scenarios::edge("R2", "WS1"));
    params.workshops = vec![WorkshopSpec {
        id: "w1".into(),
        name: None,
        track_id: "WS1".into(),
        retrofit_stations: 2,
    }];
    params.trains = vec![train(
        "T1",
        0,
        vec![wagon("W1", 20.0), wagon("W2", 20.0), wagon("W3", 20.0)],
    )];
    let mut world = run_scenario(&params);

    for wagon in world.query::<&Wagon>().iter(&world) {
        assert_eq!(wagon.status, WagonStatus::Parked, "wagon {}", wagon.id);
    }
}
