//! Simulation runner: advances the clock and routes events into the ECS.
//!
//! Clock progression lives here, outside systems: every step pops one event,
//! publishes it as [`CurrentEvent`], and runs the schedule so the matching
//! coordinator reacts. A [`SimulationEndTimeMs`] resource bounds the run —
//! an event at or past the end never executes, so wake-ups beyond the window
//! are simply abandoned and the domain is left observable mid-flight.

use bevy_ecs::prelude::Res;
use bevy_ecs::prelude::{Schedule, World};
use bevy_ecs::schedule::{apply_deferred, IntoSystemConfigs};

use crate::clock::{CurrentEvent, Event, EventKind, SimulationClock};
use crate::profiling::EventMetrics;
use crate::scenario::SimulationEndTimeMs;
use crate::systems::{
    collection_pickup::collection_pickup_system,
    exit_haul::exit_haul_system,
    parking_dispatch::parking_dispatch_system,
    retrofit_finished::retrofit_finished_system,
    simulation_started::simulation_started_system,
    train_arrival::train_arrival_system,
    transfer::transfer_system,
    workshop_dispatch::workshop_dispatch_system,
};

// Condition functions for each event kind
fn is_simulation_started(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind == EventKind::SimulationStarted)
        .unwrap_or(false)
}

fn is_train_event(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| matches!(e.0.kind, EventKind::TrainArrival | EventKind::TrainReady))
        .unwrap_or(false)
}

fn is_collection_pickup(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind == EventKind::CollectionPickup)
        .unwrap_or(false)
}

fn is_transfer_event(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| {
            matches!(
                e.0.kind,
                EventKind::TransferDispatch
                    | EventKind::TransferStep
                    | EventKind::CouplingFinished
                    | EventKind::DecouplingFinished
            )
        })
        .unwrap_or(false)
}

fn is_workshop_dispatch(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind == EventKind::WorkshopDispatch)
        .unwrap_or(false)
}

fn is_retrofit_finished(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind == EventKind::RetrofitFinished)
        .unwrap_or(false)
}

fn is_exit_haul(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind == EventKind::ExitHaul)
        .unwrap_or(false)
}

fn is_parking_dispatch(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind == EventKind::ParkingDispatch)
        .unwrap_or(false)
}

/// Pop the next event, unless the run window is exhausted.
fn pop_within_window(world: &mut World) -> Option<Event> {
    let end_ms = world.get_resource::<SimulationEndTimeMs>().map(|end| end.0);
    let mut clock = world.get_resource_mut::<SimulationClock>()?;
    match (end_ms, clock.next_event_time()) {
        (Some(end), Some(upcoming)) if upcoming >= end => None,
        _ => clock.pop_next(),
    }
}

/// Process one event through the schedule.
///
/// Returns the event that ran, or `None` once the queue is empty or the next
/// event would fall at or past [`SimulationEndTimeMs`].
pub fn run_next_event(world: &mut World, schedule: &mut Schedule) -> Option<Event> {
    let event = pop_within_window(world)?;
    world.insert_resource(CurrentEvent(event));
    if let Some(mut metrics) = world.get_resource_mut::<EventMetrics>() {
        metrics.record_event(event.kind);
    }
    schedule.run(world);
    Some(event)
}

/// Drain the event queue, processing at most `max_steps` events. Returns how
/// many ran.
pub fn run_until_empty(world: &mut World, schedule: &mut Schedule, max_steps: usize) -> usize {
    run_until_empty_with_hook(world, schedule, max_steps, |_, _| {})
}

/// Like [`run_until_empty`], calling `observe` after each processed event —
/// progress reporting and invariant checks hang off this.
pub fn run_until_empty_with_hook<F>(
    world: &mut World,
    schedule: &mut Schedule,
    max_steps: usize,
    mut observe: F,
) -> usize
where
    F: FnMut(&World, &Event),
{
    let mut processed = 0;
    while processed < max_steps {
        let Some(event) = run_next_event(world, schedule) else {
            break;
        };
        observe(world, &event);
        processed += 1;
    }
    processed
}

/// Builds the default simulation schedule: every coordinator gated on its
/// event kind, plus [`apply_deferred`] so entities spawned by one event
/// (e.g. transfers) exist before the next one runs.
pub fn simulation_schedule() -> Schedule {
    let mut schedule = Schedule::default();

    schedule.add_systems((
        simulation_started_system.run_if(is_simulation_started),
        train_arrival_system.run_if(is_train_event),
        collection_pickup_system.run_if(is_collection_pickup),
        transfer_system.run_if(is_transfer_event),
        workshop_dispatch_system.run_if(is_workshop_dispatch),
        retrofit_finished_system.run_if(is_retrofit_finished),
        exit_haul_system.run_if(is_exit_haul),
        parking_dispatch_system.run_if(is_parking_dispatch),
        apply_deferred,
    ));

    schedule
}

/// Seed the clock with the start event. Call after building the scenario,
/// before the first [`run_next_event`].
pub fn initialize_simulation(world: &mut World) {
    world
        .resource_mut::<SimulationClock>()
        .schedule_at(0, EventKind::SimulationStarted, None);
}
