//! Universal invariants, checked after every single event: track occupancy
//! stays within effective capacity, workshop stations never oversubscribe,
//! and locomotive statuses remain coherent with pool membership.

mod support;

use bevy_ecs::prelude::World;

use popup_core::ecs::Locomotive;
use popup_core::locos::LocomotivePool;
use popup_core::runner::{initialize_simulation, run_until_empty_with_hook, simulation_schedule};
use popup_core::scenario::build_scenario;
use popup_core::tracks::{SelectionStrategy, TrackRegistry};
use popup_core::workshops::WorkshopRegistry;

use support::scenarios::two_collection_scenario;

fn assert_world_invariants(world: &World) {
    let tracks = world.resource::<TrackRegistry>();
    for (_, track) in tracks.iter() {
        assert!(
            track.occupied_m >= -f64::EPSILON,
            "track {} has negative occupancy",
            track.id
        );
        assert!(
            track.occupied_m <= track.capacity_m() + f64::EPSILON,
            "track {} over capacity: {:.1}m of {:.1}m",
            track.id,
            track.occupied_m,
            track.capacity_m()
        );
        assert_eq!(
            track.wagons.len(),
            track.wagons.iter().collect::<std::collections::HashSet<_>>().len(),
            "track {} lists a wagon twice",
            track.id
        );
    }

    let workshops = world.resource::<WorkshopRegistry>();
    for (_, ws) in workshops.iter() {
        assert!(
            ws.active <= ws.stations,
            "workshop {} oversubscribed: {}/{}",
            ws.id,
            ws.active,
            ws.stations
        );
    }

    let pool = world.resource::<LocomotivePool>();
    assert!(pool.free_count() <= pool.capacity());
}

#[test]
fn invariants_hold_at_every_event() {
    for strategy in [
        SelectionStrategy::LeastOccupied,
        SelectionStrategy::RoundRobin,
        SelectionStrategy::FirstAvailable,
        SelectionStrategy::Random,
    ] {
        let params = two_collection_scenario(strategy, 8);
        let mut world = World::new();
        build_scenario(&mut world, &params);
        initialize_simulation(&mut world);
        let mut schedule = simulation_schedule();

        run_until_empty_with_hook(&mut world, &mut schedule, 1_000_000, |world, _event| {
            assert_world_invariants(world);
        });
    }
}

#[test]
fn locomotive_count_is_conserved() {
    let params = two_collection_scenario(SelectionStrategy::LeastOccupied, 6);
    let mut world = World::new();
    build_scenario(&mut world, &params);
    initialize_simulation(&mut world);
    let mut schedule = simulation_schedule();
    run_until_empty_with_hook(&mut world, &mut schedule, 1_000_000, |_, _| {});

    {
        let pool = world.resource::<LocomotivePool>();
        assert_eq!(pool.capacity(), params.locomotives.len());
        assert_eq!(
            pool.free_count(),
            pool.capacity(),
            "a drained run must return every locomotive to the pool"
        );
    }
    let loco_count = world.query::<&Locomotive>().iter(&world).count();
    assert_eq!(loco_count, params.locomotives.len());
}
