//! The locomotive trip engine, shared by every coordinator.
//!
//! A [`Transfer`] walks through: acquire a locomotive (or wait in the pool's
//! FIFO), run to the pickup track leg by leg, couple, haul, decouple, deliver
//! per purpose, then release the locomotive per the delivery strategy. The
//! locomotive's position updates at every node of the route; hauled wagons
//! share its location and stand on no track until decoupled.

use bevy_ecs::prelude::{Commands, Entity, Mut, Query, Res, ResMut};
use serde_json::json;
use tracing::trace;

use crate::clock::{ms_to_minutes, CurrentEvent, EventKind, EventSubject, SimulationClock};
use crate::ecs::{LocoStatus, Locomotive, Transfer, TransferPhase, TransferPurpose, Wagon, WagonStatus};
use crate::locos::LocomotivePool;
use crate::queues::PipelineQueues;
use crate::recorder::{EventCategory, EventRecorder};
use crate::scenario::{LocoDeliveryStrategy, ProcessTimes, SelectionPolicies};
use crate::topology::Router;
use crate::tracks::{TrackId, TrackRegistry, TrackRole};
use crate::workshops::WorkshopRegistry;

#[allow(clippy::too_many_arguments)]
pub fn transfer_system(
    mut commands: Commands,
    mut clock: ResMut<SimulationClock>,
    event: Res<CurrentEvent>,
    policies: Res<SelectionPolicies>,
    process_times: Res<ProcessTimes>,
    mut tracks: ResMut<TrackRegistry>,
    mut workshops: ResMut<WorkshopRegistry>,
    mut pool: ResMut<LocomotivePool>,
    mut queues: ResMut<PipelineQueues>,
    mut recorder: ResMut<EventRecorder>,
    mut router: ResMut<Router>,
    mut transfers: Query<&mut Transfer>,
    mut wagons: Query<&mut Wagon>,
    mut locos: Query<&mut Locomotive>,
) {
    if !matches!(
        event.0.kind,
        EventKind::TransferDispatch
            | EventKind::TransferStep
            | EventKind::CouplingFinished
            | EventKind::DecouplingFinished
    ) {
        return;
    }
    let Some(EventSubject::Transfer(entity)) = event.0.subject else {
        return;
    };
    let subject = Some(EventSubject::Transfer(entity));
    let now = clock.now();

    match event.0.kind {
        EventKind::TransferDispatch => {
            let mut transfer = transfers.get_mut(entity).expect("dispatched transfer exists");
            assert_eq!(
                transfer.phase,
                TransferPhase::AwaitingLoco,
                "dispatch on a transfer already underway (now={now}ms)"
            );
            let Some(loco_entity) = pool.try_acquire(now, transfer.purpose.as_str()) else {
                // First request goes to the back of the line; a woken waiter
                // that lost a same-instant race keeps its place at the front.
                if transfer.loco_requested {
                    pool.enqueue_waiter_front(EventKind::TransferDispatch, subject);
                } else {
                    transfer.loco_requested = true;
                    pool.enqueue_waiter(EventKind::TransferDispatch, subject);
                }
                return;
            };
            transfer.loco = Some(loco_entity);
            let mut loco = locos.get_mut(loco_entity).expect("pool locomotive exists");
            recorder.record(
                EventCategory::Locomotive,
                now,
                "acquired",
                loco.id.clone(),
                json!({
                    "purpose": transfer.purpose.as_str(),
                    "wagons": transfer.wagons.len(),
                }),
            );
            let route = router.route_or_panic(loco.current_track, transfer.pickup_track, now);
            if route.legs.is_empty() {
                begin_coupling(
                    &mut transfer, &mut loco, &tracks, &mut clock, &mut recorder,
                    &process_times, now, subject,
                );
            } else {
                transfer.phase = TransferPhase::ToPickup;
                transfer.route = route.legs;
                loco.status = LocoStatus::Moving;
                recorder.record(
                    EventCategory::Locomotive,
                    now,
                    "departed",
                    loco.id.clone(),
                    json!({
                        "from": tracks.get(loco.current_track).id,
                        "to": tracks.get(transfer.pickup_track).id,
                    }),
                );
                let first_leg_ms = transfer.route[0].1;
                clock.schedule_in(first_leg_ms, EventKind::TransferStep, subject);
            }
        }

        EventKind::TransferStep => {
            let mut transfer = transfers.get_mut(entity).expect("stepping transfer exists");
            let (node, _) = transfer.route.remove(0);
            let loco_entity = transfer.loco.expect("moving transfer holds a locomotive");
            let mut loco = locos.get_mut(loco_entity).expect("pool locomotive exists");
            loco.current_track = node;
            trace!(loco = %loco.id, track = %tracks.get(node).id, "locomotive at node");
            recorder.record(
                EventCategory::Locomotive,
                now,
                "at_track",
                loco.id.clone(),
                json!({ "track": tracks.get(node).id }),
            );

            if !transfer.route.is_empty() {
                let next_leg_ms = transfer.route[0].1;
                clock.schedule_in(next_leg_ms, EventKind::TransferStep, subject);
                return;
            }

            match transfer.phase {
                TransferPhase::ToPickup => begin_coupling(
                    &mut transfer, &mut loco, &tracks, &mut clock, &mut recorder,
                    &process_times, now, subject,
                ),
                TransferPhase::Hauling => begin_decoupling(
                    &mut transfer, &mut loco, &tracks, &mut clock, &mut recorder,
                    &process_times, now, subject,
                ),
                TransferPhase::Returning => {
                    loco.status = LocoStatus::Parking;
                    recorder.record(
                        EventCategory::Locomotive,
                        now,
                        "released",
                        loco.id.clone(),
                        json!({ "track": tracks.get(node).id }),
                    );
                    if let Some(waiter) = pool.release(loco_entity, now) {
                        clock.schedule_at(now, waiter.kind, waiter.subject);
                    }
                    commands.entity(entity).despawn();
                }
                phase => panic!("transfer step in phase {phase:?} (now={now}ms)"),
            }
        }

        EventKind::CouplingFinished => {
            let (wagon_list, pickup, dropoff, loco_entity) = {
                let transfer = transfers.get(entity).expect("coupling transfer exists");
                (
                    transfer.wagons.clone(),
                    transfer.pickup_track,
                    transfer.dropoff_track,
                    transfer.loco.expect("coupling transfer holds a locomotive"),
                )
            };
            let loco_id = locos.get(loco_entity).expect("pool locomotive exists").id.clone();

            for wagon_entity in &wagon_list {
                let mut wagon = wagons.get_mut(*wagon_entity).expect("rake wagon exists");
                tracks.remove(pickup, *wagon_entity, wagon.length_m, now);
                wagon.track = None;
                wagon.transition_to(WagonStatus::Moving, now);
                recorder.record(
                    EventCategory::Wagon,
                    now,
                    "coupled",
                    wagon.id.clone(),
                    json!({ "loco": loco_id, "from": tracks.get(pickup).id }),
                );
                let track_state = tracks.get(pickup);
                recorder.record(
                    EventCategory::Track,
                    now,
                    "removed",
                    track_state.id.clone(),
                    json!({
                        "wagon": wagon.id,
                        "occupied_m": track_state.occupied_m,
                        "capacity_m": track_state.capacity_m(),
                    }),
                );
            }

            // Freed capacity may unblock a stage waiting on this track's role.
            match tracks.get(pickup).role {
                TrackRole::Retrofit => clock.schedule_in(0, EventKind::CollectionPickup, None),
                TrackRole::Workshop => {
                    if let Some(track) = queues.first_pending_retrofit() {
                        clock.schedule_in(
                            0,
                            EventKind::WorkshopDispatch,
                            Some(EventSubject::Track(track)),
                        );
                    }
                }
                TrackRole::Exit => {
                    if let Some(ws) = queues.first_ready_for_exit() {
                        clock.schedule_in(0, EventKind::ExitHaul, Some(EventSubject::Workshop(ws)));
                    }
                }
                _ => {}
            }

            let mut transfer = transfers.get_mut(entity).expect("coupling transfer exists");
            let mut loco = locos.get_mut(loco_entity).expect("pool locomotive exists");
            let route = router.route_or_panic(pickup, dropoff, now);
            if route.legs.is_empty() {
                begin_decoupling(
                    &mut transfer, &mut loco, &tracks, &mut clock, &mut recorder,
                    &process_times, now, subject,
                );
            } else {
                transfer.phase = TransferPhase::Hauling;
                transfer.route = route.legs;
                loco.status = LocoStatus::Moving;
                recorder.record(
                    EventCategory::Locomotive,
                    now,
                    "departed",
                    loco.id.clone(),
                    json!({ "from": tracks.get(pickup).id, "to": tracks.get(dropoff).id }),
                );
                let first_leg_ms = transfer.route[0].1;
                clock.schedule_in(first_leg_ms, EventKind::TransferStep, subject);
            }
        }

        EventKind::DecouplingFinished => handle_decoupling(
            entity, subject, now, &mut commands, &mut clock, &policies, &process_times,
            &mut tracks, &mut workshops, &mut pool, &mut queues, &mut recorder,
            &mut router, &mut transfers, &mut wagons, &mut locos,
        ),

        _ => unreachable!("kind checked above"),
    }
}

#[allow(clippy::too_many_arguments)]
fn begin_coupling(
    transfer: &mut Transfer,
    loco: &mut Locomotive,
    tracks: &TrackRegistry,
    clock: &mut SimulationClock,
    recorder: &mut EventRecorder,
    process_times: &ProcessTimes,
    now: u64,
    subject: Option<EventSubject>,
) {
    transfer.phase = TransferPhase::Coupling;
    transfer.route.clear();
    loco.status = LocoStatus::Coupling;
    recorder.record(
        EventCategory::Locomotive,
        now,
        "coupling",
        loco.id.clone(),
        json!({ "track": tracks.get(transfer.pickup_track).id, "wagons": transfer.wagons.len() }),
    );
    clock.schedule_in(process_times.coupling_ms, EventKind::CouplingFinished, subject);
}

#[allow(clippy::too_many_arguments)]
fn begin_decoupling(
    transfer: &mut Transfer,
    loco: &mut Locomotive,
    tracks: &TrackRegistry,
    clock: &mut SimulationClock,
    recorder: &mut EventRecorder,
    process_times: &ProcessTimes,
    now: u64,
    subject: Option<EventSubject>,
) {
    transfer.phase = TransferPhase::Decoupling;
    transfer.route.clear();
    loco.status = LocoStatus::Decoupling;
    recorder.record(
        EventCategory::Locomotive,
        now,
        "decoupling",
        loco.id.clone(),
        json!({ "track": tracks.get(transfer.dropoff_track).id }),
    );
    clock.schedule_in(
        process_times.decoupling_ms,
        EventKind::DecouplingFinished,
        subject,
    );
}

/// Delivery bookkeeping per purpose, then locomotive release per strategy.
#[allow(clippy::too_many_arguments)]
fn handle_decoupling(
    entity: Entity,
    subject: Option<EventSubject>,
    now: u64,
    commands: &mut Commands,
    clock: &mut SimulationClock,
    policies: &SelectionPolicies,
    process_times: &ProcessTimes,
    tracks: &mut TrackRegistry,
    workshops: &mut WorkshopRegistry,
    pool: &mut LocomotivePool,
    queues: &mut PipelineQueues,
    recorder: &mut EventRecorder,
    router: &mut Router,
    transfers: &mut Query<&mut Transfer>,
    wagons: &mut Query<&mut Wagon>,
    locos: &mut Query<&mut Locomotive>,
) {
    let (purpose, wagon_list, dropoff, decoupled, workshop) = {
        let transfer = transfers.get(entity).expect("decoupling transfer exists");
        (
            transfer.purpose,
            transfer.wagons.clone(),
            transfer.dropoff_track,
            transfer.decoupled,
            transfer.workshop,
        )
    };

    match purpose {
        TransferPurpose::CollectionToRetrofit => {
            for wagon_entity in &wagon_list {
                let mut wagon = wagons.get_mut(*wagon_entity).expect("rake wagon exists");
                place_wagon(tracks, recorder, &mut wagon, *wagon_entity, dropoff, now);
                wagon.transition_to(WagonStatus::OnRetrofitTrack, now);
            }
            queues
                .on_retrofit
                .entry(dropoff)
                .or_default()
                .extend(wagon_list.iter().copied());
            clock.schedule_in(
                0,
                EventKind::WorkshopDispatch,
                Some(EventSubject::Track(dropoff)),
            );
            finish_delivery(
                entity, now, commands, clock, policies, tracks, pool, recorder, router,
                transfers, locos,
            );
        }

        TransferPurpose::RetrofitToWorkshop => {
            let wagon_entity = wagon_list[decoupled];
            let workshop_id = workshop.expect("workshop delivery has a workshop");
            {
                let mut wagon = wagons.get_mut(wagon_entity).expect("rake wagon exists");
                place_wagon(tracks, recorder, &mut wagon, wagon_entity, dropoff, now);
                if workshops.acquire_station(workshop_id, wagon_entity, now) {
                    wagon.transition_to(WagonStatus::Retrofitting, now);
                    let ws = workshops.get(workshop_id);
                    recorder.record(
                        EventCategory::Workshop,
                        now,
                        "station_acquired",
                        ws.id.clone(),
                        json!({ "wagon": wagon.id, "active": ws.active, "stations": ws.stations }),
                    );
                    recorder.record(
                        EventCategory::Wagon,
                        now,
                        "retrofit_started",
                        wagon.id.clone(),
                        json!({ "workshop": ws.id }),
                    );
                    clock.schedule_in(
                        process_times.retrofit_ms,
                        EventKind::RetrofitFinished,
                        Some(EventSubject::Wagon(wagon_entity)),
                    );
                } else {
                    // All stations busy: the wagon queues FIFO at the
                    // workshop and starts when a station frees.
                    let ws = workshops.get(workshop_id);
                    recorder.record(
                        EventCategory::Workshop,
                        now,
                        "station_queued",
                        ws.id.clone(),
                        json!({ "wagon": wagon.id }),
                    );
                }
            }
            let remaining = {
                let mut transfer = transfers.get_mut(entity).expect("decoupling transfer exists");
                transfer.decoupled += 1;
                transfer.decoupled < wagon_list.len()
            };
            if remaining {
                clock.schedule_in(
                    process_times.decoupling_ms,
                    EventKind::DecouplingFinished,
                    subject,
                );
            } else {
                finish_delivery(
                    entity, now, commands, clock, policies, tracks, pool, recorder, router,
                    transfers, locos,
                );
            }
        }

        TransferPurpose::WorkshopToExit => {
            for wagon_entity in &wagon_list {
                let mut wagon = wagons.get_mut(*wagon_entity).expect("rake wagon exists");
                place_wagon(tracks, recorder, &mut wagon, *wagon_entity, dropoff, now);
                wagon.transition_to(WagonStatus::Retrofitted, now);
            }
            queues
                .exit
                .entry(dropoff)
                .or_default()
                .extend(wagon_list.iter().copied());
            clock.schedule_in(
                0,
                EventKind::ParkingDispatch,
                Some(EventSubject::Track(dropoff)),
            );
            finish_delivery(
                entity, now, commands, clock, policies, tracks, pool, recorder, router,
                transfers, locos,
            );
        }

        TransferPurpose::ToParking => {
            for wagon_entity in &wagon_list {
                let mut wagon = wagons.get_mut(*wagon_entity).expect("rake wagon exists");
                place_wagon(tracks, recorder, &mut wagon, *wagon_entity, dropoff, now);
                wagon.transition_to(WagonStatus::Parked, now);
                recorder.record(
                    EventCategory::Wagon,
                    now,
                    "parked",
                    wagon.id.clone(),
                    json!({ "track": tracks.get(dropoff).id }),
                );
                recorder.record(
                    EventCategory::Wagon,
                    now,
                    "completed",
                    wagon.id.clone(),
                    json!({ "flow_time_minutes": ms_to_minutes(now - wagon.arrived_ms) }),
                );
            }
            finish_delivery(
                entity, now, commands, clock, policies, tracks, pool, recorder, router,
                transfers, locos,
            );
        }
    }
}

/// Consume the reservation and stand the wagon on the track.
fn place_wagon(
    tracks: &mut TrackRegistry,
    recorder: &mut EventRecorder,
    wagon: &mut Mut<Wagon>,
    wagon_entity: Entity,
    track: TrackId,
    now: u64,
) {
    tracks.place_reserved(track, wagon_entity, wagon.length_m, now);
    wagon.track = Some(track);
    let track_state = tracks.get(track);
    recorder.record(
        EventCategory::Wagon,
        now,
        "placed",
        wagon.id.clone(),
        json!({ "track": track_state.id, "role": track_state.role.as_str() }),
    );
    recorder.record(
        EventCategory::Track,
        now,
        "placed",
        track_state.id.clone(),
        json!({
            "wagon": wagon.id,
            "occupied_m": track_state.occupied_m,
            "capacity_m": track_state.capacity_m(),
        }),
    );
}

/// Release the locomotive per the delivery strategy and retire the transfer.
#[allow(clippy::too_many_arguments)]
fn finish_delivery(
    entity: Entity,
    now: u64,
    commands: &mut Commands,
    clock: &mut SimulationClock,
    policies: &SelectionPolicies,
    tracks: &TrackRegistry,
    pool: &mut LocomotivePool,
    recorder: &mut EventRecorder,
    router: &mut Router,
    transfers: &mut Query<&mut Transfer>,
    locos: &mut Query<&mut Locomotive>,
) {
    let loco_entity = {
        let transfer = transfers.get(entity).expect("finishing transfer exists");
        transfer.loco.expect("finishing transfer holds a locomotive")
    };
    let mut loco = locos.get_mut(loco_entity).expect("pool locomotive exists");

    let release_in_place = match policies.loco_delivery {
        LocoDeliveryStrategy::StayAtWorkshop => true,
        LocoDeliveryStrategy::ReturnToParking => {
            let parking = tracks
                .first_of_role(TrackRole::Parking)
                .expect("validated scenario has a parking track");
            loco.current_track == parking
        }
    };

    if release_in_place {
        loco.status = LocoStatus::Parking;
        recorder.record(
            EventCategory::Locomotive,
            now,
            "released",
            loco.id.clone(),
            json!({ "track": tracks.get(loco.current_track).id }),
        );
        if let Some(waiter) = pool.release(loco_entity, now) {
            clock.schedule_at(now, waiter.kind, waiter.subject);
        }
        commands.entity(entity).despawn();
        return;
    }

    // Light-engine run back to parking; the pool gets the locomotive when it
    // arrives there.
    let parking = tracks
        .first_of_role(TrackRole::Parking)
        .expect("validated scenario has a parking track");
    let route = router.route_or_panic(loco.current_track, parking, now);
    let mut transfer = transfers.get_mut(entity).expect("finishing transfer exists");
    transfer.phase = TransferPhase::Returning;
    transfer.wagons.clear();
    transfer.route = route.legs;
    loco.status = LocoStatus::Moving;
    recorder.record(
        EventCategory::Locomotive,
        now,
        "departed",
        loco.id.clone(),
        json!({ "from": tracks.get(loco.current_track).id, "to": tracks.get(parking).id }),
    );
    let first_leg_ms = transfer.route[0].1;
    clock.schedule_in(
        first_leg_ms,
        EventKind::TransferStep,
        Some(EventSubject::Transfer(entity)),
    );
}
