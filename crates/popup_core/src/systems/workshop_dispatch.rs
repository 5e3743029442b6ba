//! Station assignment dispatch: move retrofit-track groups to workshops.
//!
//! The group standing on a retrofit track is assigned wagon by wagon: the
//! first wagon goes to the least-busy workshop, subsequent wagons rotate
//! round-robin across workshops that still have free stations and track
//! capacity. Workshops bound to the retrofit track itself take their wagons
//! in place — no locomotive trip; every other workshop gets one transfer per
//! dispatch. Assignment stops at the first wagon that fits nowhere, so
//! delivery order never overtakes queue order.

use bevy_ecs::prelude::{Commands, Entity, Query, Res, ResMut};
use serde_json::json;
use tracing::debug;

use crate::clock::{CurrentEvent, EventKind, EventSubject, SimulationClock};
use crate::ecs::{Transfer, TransferPurpose, Wagon, WagonStatus};
use crate::queues::{PipelineQueues, RetrofitGroups};
use crate::recorder::{EventCategory, EventRecorder};
use crate::scenario::ProcessTimes;
use crate::tracks::TrackRegistry;
use crate::workshops::{WorkshopId, WorkshopRegistry};

#[allow(clippy::too_many_arguments)]
pub fn workshop_dispatch_system(
    mut commands: Commands,
    mut clock: ResMut<SimulationClock>,
    event: Res<CurrentEvent>,
    process_times: Res<ProcessTimes>,
    mut tracks: ResMut<TrackRegistry>,
    mut workshops: ResMut<WorkshopRegistry>,
    mut queues: ResMut<PipelineQueues>,
    mut groups: ResMut<RetrofitGroups>,
    mut recorder: ResMut<EventRecorder>,
    mut wagons: Query<&mut Wagon>,
) {
    if event.0.kind != EventKind::WorkshopDispatch {
        return;
    }
    let Some(EventSubject::Track(retrofit_track)) = event.0.subject else {
        return;
    };
    let pending = queues
        .on_retrofit
        .get(&retrofit_track)
        .map(Vec::len)
        .unwrap_or(0);
    if pending == 0 {
        return;
    }
    let now = clock.now();

    // Free stations minus what this dispatch has already promised.
    let mut promised: Vec<usize> = workshops.iter().map(|(_, w)| w.free_stations()).collect();
    let mut assignments: Vec<(WorkshopId, Vec<Entity>)> = Vec::new();
    let mut assigned_count = 0;

    let first_length = {
        let group = &queues.on_retrofit[&retrofit_track];
        wagons.get(group[0]).expect("queued wagon exists").length_m
    };
    let Some(first_choice) = workshops.select_least_busy(first_length, &tracks) else {
        return;
    };
    let mut cursor = first_choice.index();

    {
        let group = queues
            .on_retrofit
            .get_mut(&retrofit_track)
            .expect("pending group checked above");
        for wagon_entity in group.iter() {
            let length = wagons.get(*wagon_entity).expect("queued wagon exists").length_m;
            let mut placed = false;
            for offset in 0..workshops.len() {
                let idx = (cursor + offset) % workshops.len();
                let candidate = WorkshopId(idx as u16);
                if promised[idx] == 0 {
                    continue;
                }
                let candidate_track = workshops.get(candidate).track;
                // In-place wagons already occupy the track; only a real move
                // needs destination capacity.
                if candidate_track != retrofit_track && !tracks.reserve(candidate_track, length) {
                    continue;
                }
                promised[idx] -= 1;
                match assignments.iter_mut().find(|(ws, _)| *ws == candidate) {
                    Some((_, list)) => list.push(*wagon_entity),
                    None => assignments.push((candidate, vec![*wagon_entity])),
                }
                cursor = (idx + 1) % workshops.len();
                placed = true;
                break;
            }
            if !placed {
                break;
            }
            assigned_count += 1;
        }
        if assigned_count == 0 {
            return;
        }
        group.drain(..assigned_count);
    }

    for (workshop, batch) in assignments {
        debug!(
            workshop = %workshops.get(workshop).id,
            wagons = batch.len(),
            "workshop delivery dispatched"
        );
        groups.register(workshop, batch.clone());

        if workshops.get(workshop).track == retrofit_track {
            // The workshop works this very track: assign stations in place.
            for wagon_entity in batch {
                let mut wagon = wagons.get_mut(wagon_entity).expect("queued wagon exists");
                if workshops.acquire_station(workshop, wagon_entity, now) {
                    wagon.transition_to(WagonStatus::Retrofitting, now);
                    let ws = workshops.get(workshop);
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
                    let ws = workshops.get(workshop);
                    recorder.record(
                        EventCategory::Workshop,
                        now,
                        "station_queued",
                        ws.id.clone(),
                        json!({ "wagon": wagon.id }),
                    );
                }
            }
            continue;
        }

        let transfer = commands
            .spawn(Transfer::new(
                TransferPurpose::RetrofitToWorkshop,
                batch,
                retrofit_track,
                workshops.get(workshop).track,
                Some(workshop),
            ))
            .id();
        clock.schedule_in(
            0,
            EventKind::TransferDispatch,
            Some(EventSubject::Transfer(transfer)),
        );
    }
}
