//! Pickup-to-retrofit dispatch: the second coordinator.
//!
//! Pops the head of the collection queue, picks a retrofit destination per
//! the configured strategy, and extends the trip with consecutive queue-head
//! wagons that share the same source track and fit the destination — stable
//! batching, one locomotive trip per batch. Destination capacity is reserved
//! up front so a batch never arrives at a full track.

use bevy_ecs::prelude::{Commands, Query, Res, ResMut};
use tracing::debug;

use crate::clock::{CurrentEvent, EventKind, EventSubject, SimulationClock};
use crate::ecs::{Transfer, TransferPurpose, Wagon};
use crate::queues::PipelineQueues;
use crate::rng::KernelRng;
use crate::scenario::SelectionPolicies;
use crate::tracks::{TrackRegistry, TrackRole};

#[allow(clippy::too_many_arguments)]
pub fn collection_pickup_system(
    mut commands: Commands,
    mut clock: ResMut<SimulationClock>,
    event: Res<CurrentEvent>,
    policies: Res<SelectionPolicies>,
    mut tracks: ResMut<TrackRegistry>,
    mut queues: ResMut<PipelineQueues>,
    mut rng: ResMut<KernelRng>,
    wagons: Query<&Wagon>,
) {
    if event.0.kind != EventKind::CollectionPickup {
        return;
    }

    let Some(&head) = queues.collected.front() else {
        return;
    };
    let head_wagon = wagons.get(head).expect("queued wagon exists");
    let source = head_wagon
        .track
        .expect("queued wagon stands on a collection track");

    // Destination per the retrofit strategy; when every retrofit track is
    // full the queue simply waits — a later removal re-fires this event.
    let Some(dest) = tracks.select(
        TrackRole::Retrofit,
        head_wagon.length_m,
        policies.retrofit,
        &mut rng,
    ) else {
        return;
    };
    assert!(
        tracks.reserve(dest, head_wagon.length_m),
        "selected retrofit track lost its capacity within the same step"
    );

    let mut batch = vec![queues.collected.pop_front().expect("head present")];
    while let Some(&next) = queues.collected.front() {
        let next_wagon = wagons.get(next).expect("queued wagon exists");
        if next_wagon.track != Some(source) || !tracks.reserve(dest, next_wagon.length_m) {
            break;
        }
        batch.push(queues.collected.pop_front().expect("head present"));
    }

    debug!(batch = batch.len(), "collection pickup dispatched");
    let transfer = commands
        .spawn(Transfer::new(
            TransferPurpose::CollectionToRetrofit,
            batch,
            source,
            dest,
            None,
        ))
        .id();
    clock.schedule_in(0, EventKind::TransferDispatch, Some(EventSubject::Transfer(transfer)));

    // More wagons may be waiting behind a different source track.
    if !queues.collected.is_empty() {
        clock.schedule_in(0, EventKind::CollectionPickup, None);
    }
}
