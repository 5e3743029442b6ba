//! Outbound haul: move a fully retrofitted group off its workshop track.
//!
//! With exit tracks in the scenario the rake stages there for the parking
//! coordinator; yards laid out without a dedicated exit track get the rake
//! hauled straight to parking instead. A wagon the outbound tracks can never
//! hold is rejected in place rather than stalling its group.

use bevy_ecs::prelude::{Commands, Query, Res, ResMut};
use serde_json::json;
use tracing::debug;

use crate::clock::{CurrentEvent, EventKind, EventSubject, SimulationClock};
use crate::ecs::{RejectionReason, Transfer, TransferPurpose, Wagon, WagonStatus};
use crate::queues::PipelineQueues;
use crate::recorder::{EventCategory, EventRecorder};
use crate::rng::KernelRng;
use crate::scenario::SelectionPolicies;
use crate::tracks::{SelectionStrategy, TrackRegistry, TrackRole};
use crate::workshops::WorkshopRegistry;

#[allow(clippy::too_many_arguments)]
pub fn exit_haul_system(
    mut commands: Commands,
    mut clock: ResMut<SimulationClock>,
    event: Res<CurrentEvent>,
    policies: Res<SelectionPolicies>,
    mut tracks: ResMut<TrackRegistry>,
    workshops: Res<WorkshopRegistry>,
    mut queues: ResMut<PipelineQueues>,
    mut recorder: ResMut<EventRecorder>,
    mut rng: ResMut<KernelRng>,
    mut wagons: Query<&mut Wagon>,
) {
    if event.0.kind != EventKind::ExitHaul {
        return;
    }
    let Some(EventSubject::Workshop(workshop)) = event.0.subject else {
        return;
    };
    let Some(mut group) = queues.ready_for_exit.remove(&workshop) else {
        return;
    };
    let now = clock.now();
    let has_exit_tracks = tracks.first_of_role(TrackRole::Exit).is_some();

    // Whatever leg comes next, a wagon that can never fit any track of that
    // role is terminal: it stays standing where it is and leaves the
    // pipeline, so the rest of the group can move.
    let gate_role = if has_exit_tracks {
        TrackRole::Exit
    } else {
        TrackRole::Parking
    };
    group.retain(|&wagon_entity| {
        let mut wagon = wagons.get_mut(wagon_entity).expect("staged wagon exists");
        if !tracks.never_fits(gate_role, wagon.length_m) {
            return true;
        }
        wagon.transition_to(WagonStatus::Rejected, now);
        wagon.rejection = Some(RejectionReason::NoCapacityAnyTrack);
        recorder.record(
            EventCategory::Wagon,
            now,
            "rejected",
            wagon.id.clone(),
            json!({
                "reason": RejectionReason::NoCapacityAnyTrack.as_str(),
                "stage": "outbound",
            }),
        );
        false
    });
    if group.is_empty() {
        return;
    }

    let total_length: f64 = group
        .iter()
        .map(|w| wagons.get(*w).expect("staged wagon exists").length_m)
        .sum();

    let (dest, purpose) = if has_exit_tracks {
        // Exit staging is a plain buffer; first track with room wins.
        let Some(dest) = tracks.select(
            TrackRole::Exit,
            total_length,
            SelectionStrategy::FirstAvailable,
            &mut rng,
        ) else {
            // No exit capacity right now; re-stage and retry when one clears.
            queues.ready_for_exit.insert(workshop, group);
            return;
        };
        (dest, TransferPurpose::WorkshopToExit)
    } else {
        let Some(dest) = tracks.select(
            TrackRole::Parking,
            total_length,
            policies.collection,
            &mut rng,
        ) else {
            queues.ready_for_exit.insert(workshop, group);
            return;
        };
        (dest, TransferPurpose::ToParking)
    };

    assert!(
        tracks.reserve(dest, total_length),
        "selected outbound track lost its capacity within the same step"
    );

    debug!(wagons = group.len(), "outbound haul dispatched");
    let pickup = workshops.get(workshop).track;
    let transfer = commands
        .spawn(Transfer::new(purpose, group, pickup, dest, None))
        .id();
    clock.schedule_in(
        0,
        EventKind::TransferDispatch,
        Some(EventSubject::Transfer(transfer)),
    );
}
