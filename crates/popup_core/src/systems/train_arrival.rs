//! Arrivals & selection: the first coordinator of the pipeline.
//!
//! `TrainArrival` registers the rake and starts train preparation;
//! `TrainReady` walks the wagons in order, decides the retrofit requirement,
//! and either places each wagon on a collection track (per the configured
//! strategy) or rejects it. Rejections are outcomes, not errors — the
//! schedule is never back-pressured.

use bevy_ecs::prelude::{Commands, Query, Res, ResMut};
use serde_json::json;
use tracing::debug;

use crate::clock::{CurrentEvent, EventKind, EventSubject, SimulationClock};
use crate::ecs::{CouplerType, RejectionReason, Train, Wagon, WagonStatus};
use crate::queues::PipelineQueues;
use crate::recorder::{EventCategory, EventRecorder};
use crate::rng::KernelRng;
use crate::scenario::{ProcessTimes, SelectionPolicies};
use crate::tracks::{TrackRegistry, TrackRole};

#[allow(clippy::too_many_arguments)]
pub fn train_arrival_system(
    mut commands: Commands,
    mut clock: ResMut<SimulationClock>,
    event: Res<CurrentEvent>,
    policies: Res<SelectionPolicies>,
    process_times: Res<ProcessTimes>,
    mut tracks: ResMut<TrackRegistry>,
    mut queues: ResMut<PipelineQueues>,
    mut recorder: ResMut<EventRecorder>,
    mut rng: ResMut<KernelRng>,
    trains: Query<&Train>,
    mut wagons: Query<&mut Wagon>,
) {
    let Some(EventSubject::Train(train_entity)) = event.0.subject else {
        return;
    };
    let Ok(train) = trains.get(train_entity) else {
        return;
    };
    let now = clock.now();

    match event.0.kind {
        EventKind::TrainArrival => {
            debug!(train = %train.id, wagons = train.wagons.len(), "train arrived");
            for wagon_entity in &train.wagons {
                let wagon = wagons.get(*wagon_entity).expect("train wagon exists");
                recorder.record(
                    EventCategory::Wagon,
                    now,
                    "arrived",
                    wagon.id.clone(),
                    json!({ "train": train.id }),
                );
            }
            clock.schedule_in(
                process_times.train_preparation_ms,
                EventKind::TrainReady,
                Some(EventSubject::Train(train_entity)),
            );
        }
        EventKind::TrainReady => {
            let mut any_selected = false;
            for wagon_entity in train.wagons.clone() {
                let mut wagon = wagons.get_mut(wagon_entity).expect("train wagon exists");
                wagon.transition_to(WagonStatus::Selecting, now);

                let needs_work = wagon.needs_retrofit && wagon.coupler == CouplerType::Screw;
                if !needs_work {
                    reject(&mut wagon, RejectionReason::RetrofitNotRequired, now, &mut recorder);
                    continue;
                }

                if tracks.never_fits(TrackRole::Collection, wagon.length_m) {
                    reject(&mut wagon, RejectionReason::NoCapacityAnyTrack, now, &mut recorder);
                    continue;
                }

                let Some(track) = tracks.select(
                    TrackRole::Collection,
                    wagon.length_m,
                    policies.collection,
                    &mut rng,
                ) else {
                    reject(&mut wagon, RejectionReason::NoCapacity, now, &mut recorder);
                    continue;
                };

                tracks.place(track, wagon_entity, wagon.length_m, now);
                wagon.track = Some(track);
                wagon.transition_to(WagonStatus::Selected, now);
                queues.collected.push_back(wagon_entity);
                any_selected = true;

                let track_state = tracks.get(track);
                recorder.record(
                    EventCategory::Wagon,
                    now,
                    "selected",
                    wagon.id.clone(),
                    json!({ "track": track_state.id, "queue_len": queues.collected.len() }),
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

            // The train dissolves once every wagon is placed or rejected.
            commands.entity(train_entity).despawn();
            if any_selected {
                clock.schedule_in(0, EventKind::CollectionPickup, None);
            }
        }
        _ => {}
    }
}

fn reject(
    wagon: &mut Wagon,
    reason: RejectionReason,
    now: u64,
    recorder: &mut EventRecorder,
) {
    wagon.transition_to(WagonStatus::Rejected, now);
    wagon.rejection = Some(reason);
    recorder.record(
        EventCategory::Wagon,
        now,
        "rejected",
        wagon.id.clone(),
        json!({ "reason": reason.as_str() }),
    );
}
