//! Retrofit completion: release the station, hand it to the next waiting
//! wagon, and stage finished groups for the outbound haul.
//!
//! Completions are independent events, so a group's wagons may finish out of
//! delivery order; the outbound rake forms in completion order.

use bevy_ecs::prelude::{Query, Res, ResMut};
use serde_json::json;
use tracing::debug;

use crate::clock::{CurrentEvent, EventKind, EventSubject, SimulationClock};
use crate::ecs::{CouplerType, Wagon, WagonStatus};
use crate::queues::{PipelineQueues, RetrofitGroups};
use crate::recorder::{EventCategory, EventRecorder};
use crate::scenario::ProcessTimes;
use crate::workshops::WorkshopRegistry;

#[allow(clippy::too_many_arguments)]
pub fn retrofit_finished_system(
    mut clock: ResMut<SimulationClock>,
    event: Res<CurrentEvent>,
    process_times: Res<ProcessTimes>,
    mut workshops: ResMut<WorkshopRegistry>,
    mut queues: ResMut<PipelineQueues>,
    mut groups: ResMut<RetrofitGroups>,
    mut recorder: ResMut<EventRecorder>,
    mut wagons: Query<&mut Wagon>,
) {
    if event.0.kind != EventKind::RetrofitFinished {
        return;
    }
    let Some(EventSubject::Wagon(wagon_entity)) = event.0.subject else {
        return;
    };
    let now = clock.now();

    let workshop_id = groups
        .workshop_of(wagon_entity)
        .expect("retrofitting wagon belongs to a delivery group");

    {
        let mut wagon = wagons.get_mut(wagon_entity).expect("retrofitting wagon exists");
        wagon.transition_to(WagonStatus::Retrofitted, now);
        // The screw coupler came off in the bay; the wagon leaves with a DAC.
        wagon.coupler = CouplerType::Dac;
        recorder.record(
            EventCategory::Wagon,
            now,
            "retrofit_finished",
            wagon.id.clone(),
            json!({ "workshop": workshops.get(workshop_id).id }),
        );
    }

    // Release the station; a queued wagon takes it over immediately.
    let handover = workshops.release_station(workshop_id, now);
    {
        let ws = workshops.get(workshop_id);
        recorder.record(
            EventCategory::Workshop,
            now,
            "station_released",
            ws.id.clone(),
            json!({ "active": ws.active, "stations": ws.stations }),
        );
    }
    match handover {
        Some(next_entity) => {
            let mut next = wagons.get_mut(next_entity).expect("queued wagon exists");
            next.transition_to(WagonStatus::Retrofitting, now);
            let next_workshop = groups
                .workshop_of(next_entity)
                .expect("queued wagon belongs to a delivery group");
            let ws = workshops.get(next_workshop);
            recorder.record(
                EventCategory::Workshop,
                now,
                "station_acquired",
                ws.id.clone(),
                json!({ "wagon": next.id, "active": ws.active, "stations": ws.stations }),
            );
            recorder.record(
                EventCategory::Wagon,
                now,
                "retrofit_started",
                next.id.clone(),
                json!({ "workshop": ws.id }),
            );
            clock.schedule_in(
                process_times.retrofit_ms,
                EventKind::RetrofitFinished,
                Some(EventSubject::Wagon(next_entity)),
            );
        }
        None => {
            // A station sits idle; a waiting retrofit-track group may now be
            // dispatchable.
            if let Some(track) = queues.first_pending_retrofit() {
                clock.schedule_in(
                    0,
                    EventKind::WorkshopDispatch,
                    Some(EventSubject::Track(track)),
                );
            }
        }
    }

    if let Some((workshop, completed)) = groups.mark_completed(wagon_entity) {
        debug!(
            workshop = %workshops.get(workshop).id,
            wagons = completed.len(),
            "delivery group retrofitted"
        );
        queues
            .ready_for_exit
            .entry(workshop)
            .or_default()
            .extend(completed);
        clock.schedule_in(0, EventKind::ExitHaul, Some(EventSubject::Workshop(workshop)));
    }
}
