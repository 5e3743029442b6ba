//! World assembly: turn a validated [`ScenarioParams`] into an ECS world
//! ready for the runner.
//!
//! Inserts the clock, RNG, registries, pools, queues, and recorder, spawns
//! train/wagon/locomotive entities, and wires the topology into the router.
//! Call [`crate::runner::initialize_simulation`] afterwards to schedule the
//! start event.

use bevy_ecs::prelude::World;

use crate::clock::SimulationClock;
use crate::ecs::{CouplerType, LocoStatus, Locomotive, Train, Wagon, WagonStatus};
use crate::locos::LocomotivePool;
use crate::profiling::EventMetrics;
use crate::queues::{PipelineQueues, RetrofitGroups};
use crate::recorder::EventRecorder;
use crate::rng::KernelRng;
use crate::scenario::{
    ProcessTimes, ScenarioParams, SelectionPolicies, SimulationEndTimeMs,
};
use crate::topology::{Router, Topology};
use crate::tracks::{TrackRegistry, TrackRole};
use crate::workshops::WorkshopRegistry;

/// Populate `world` from a validated scenario.
///
/// Precondition: [`validate`](crate::scenario::validate::validate) reported
/// no errors. Name lookups here unwrap on that basis.
pub fn build_scenario(world: &mut World, params: &ScenarioParams) {
    let mut clock = SimulationClock::default();
    clock.set_epoch_ms(params.epoch_ms);
    world.insert_resource(clock);
    world.insert_resource(SimulationEndTimeMs(params.duration_ms));
    world.insert_resource(KernelRng::seeded(params.seed));
    world.insert_resource(EventRecorder::default());
    world.insert_resource(EventMetrics::default());
    world.insert_resource(PipelineQueues::default());
    world.insert_resource(RetrofitGroups::default());
    world.insert_resource(ProcessTimes::from(params.process_times));
    world.insert_resource(SelectionPolicies {
        collection: params.track_selection_strategy,
        retrofit: params.retrofit_selection_strategy,
        loco_delivery: params.loco_delivery_strategy,
    });

    let mut tracks = TrackRegistry::default();
    for spec in &params.tracks {
        tracks.add(spec.id.clone(), spec.role, spec.length_m, spec.fill_factor);
    }

    let mut workshops = WorkshopRegistry::default();
    for spec in &params.workshops {
        let track = tracks
            .resolve(&spec.track_id)
            .expect("validated workshop track");
        workshops.add(spec.id.clone(), spec.name.clone(), track, spec.retrofit_stations);
    }

    let mut topology = Topology::default();
    for edge in &params.edges {
        let from = tracks.resolve(&edge.from).expect("validated edge endpoint");
        let to = tracks.resolve(&edge.to).expect("validated edge endpoint");
        match edge.reverse_time_ms {
            None => topology.add_edge(from, to, edge.time_ms),
            Some(reverse) => {
                topology.add_directed_edge(from, to, edge.time_ms);
                topology.add_directed_edge(to, from, reverse);
            }
        }
    }

    let mut pool = LocomotivePool::default();
    let default_parking = tracks.first_of_role(TrackRole::Parking);
    for spec in &params.locomotives {
        let start_track = spec
            .track_id
            .as_deref()
            .map(|name| tracks.resolve(name).expect("validated locomotive track"))
            .or(default_parking)
            .expect("validated parking track present");
        let loco = world
            .spawn(Locomotive {
                id: spec.id.clone(),
                status: LocoStatus::Parking,
                current_track: start_track,
            })
            .id();
        pool.register(loco);
    }

    for train_spec in &params.trains {
        let wagons: Vec<_> = train_spec
            .wagons
            .iter()
            .map(|w| {
                world
                    .spawn(Wagon {
                        id: w.id.clone(),
                        train_id: train_spec.id.clone(),
                        length_m: w.length_m,
                        // The inbound fleet still runs screw couplers; the DAC
                        // head is what the workshop fits.
                        coupler: CouplerType::Screw,
                        needs_retrofit: w.needs_retrofit,
                        status: WagonStatus::Arriving,
                        track: None,
                        arrived_ms: train_spec.arrival_ms,
                        rejection: None,
                    })
                    .id()
            })
            .collect();
        world.spawn(Train {
            id: train_spec.id.clone(),
            arrival_ms: train_spec.arrival_ms,
            wagons,
        });
    }

    world.insert_resource(tracks);
    world.insert_resource(workshops);
    world.insert_resource(pool);
    world.insert_resource(Router::new(topology));
}
