//! Pickup of retrofitted rakes: exit track to parking.
//!
//! Wagons staged on an exit track are assigned parking destinations in queue
//! order with the configured track-selection strategy; consecutive wagons
//! bound for the same parking track share one locomotive trip. A wagon no
//! parking track can ever hold is rejected on the spot — parking capacity
//! only ever fills, so leaving it queued would head-block the rake behind it
//! forever.

use bevy_ecs::prelude::{Commands, Entity, Query, Res, ResMut};
use serde_json::json;
use tracing::debug;

use crate::clock::{CurrentEvent, EventKind, EventSubject, SimulationClock};
use crate::ecs::{RejectionReason, Transfer, TransferPurpose, Wagon, WagonStatus};
use crate::queues::PipelineQueues;
use crate::recorder::{EventCategory, EventRecorder};
use crate::rng::KernelRng;
use crate::scenario::SelectionPolicies;
use crate::tracks::{TrackId, TrackRegistry, TrackRole};

#[allow(clippy::too_many_arguments)]
pub fn parking_dispatch_system(
    mut commands: Commands,
    mut clock: ResMut<SimulationClock>,
    event: Res<CurrentEvent>,
    policies: Res<SelectionPolicies>,
    mut tracks: ResMut<TrackRegistry>,
    mut queues: ResMut<PipelineQueues>,
    mut recorder: ResMut<EventRecorder>,
    mut rng: ResMut<KernelRng>,
    mut wagons: Query<&mut Wagon>,
) {
    if event.0.kind != EventKind::ParkingDispatch {
        return;
    }
    let Some(EventSubject::Track(exit_track)) = event.0.subject else {
        return;
    };
    let now = clock.now();

    // Assign destinations from the queue head; stop at the first wagon that
    // merely has to wait for capacity, so the exit rake never reorders.
    let mut batches: Vec<(TrackId, Vec<Entity>)> = Vec::new();
    loop {
        let Some(&head) = queues.exit.get(&exit_track).and_then(|group| group.first()) else {
            break;
        };
        let length = wagons.get(head).expect("staged wagon exists").length_m;

        if tracks.never_fits(TrackRole::Parking, length) {
            // Terminal: the wagon stays standing on the exit track but leaves
            // the pipeline, unblocking everything queued behind it.
            queues
                .exit
                .get_mut(&exit_track)
                .expect("head checked above")
                .remove(0);
            let mut wagon = wagons.get_mut(head).expect("staged wagon exists");
            wagon.transition_to(WagonStatus::Rejected, now);
            wagon.rejection = Some(RejectionReason::NoCapacityAnyTrack);
            recorder.record(
                EventCategory::Wagon,
                now,
                "rejected",
                wagon.id.clone(),
                json!({
                    "reason": RejectionReason::NoCapacityAnyTrack.as_str(),
                    "stage": "parking",
                }),
            );
            continue;
        }

        let Some(dest) = tracks.select(TrackRole::Parking, length, policies.collection, &mut rng)
        else {
            break;
        };
        assert!(
            tracks.reserve(dest, length),
            "selected parking track lost its capacity within the same step"
        );
        queues
            .exit
            .get_mut(&exit_track)
            .expect("head checked above")
            .remove(0);
        match batches.last_mut() {
            Some((last_dest, list)) if *last_dest == dest => list.push(head),
            _ => batches.push((dest, vec![head])),
        }
    }

    for (dest, batch) in batches {
        debug!(wagons = batch.len(), "parking delivery dispatched");
        let transfer = commands
            .spawn(Transfer::new(
                TransferPurpose::ToParking,
                batch,
                exit_track,
                dest,
                None,
            ))
            .id();
        clock.schedule_in(
            0,
            EventKind::TransferDispatch,
            Some(EventSubject::Transfer(transfer)),
        );
    }
}
