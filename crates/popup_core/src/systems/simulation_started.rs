//! Start-of-run bootstrap: schedule every train's arrival event.

use bevy_ecs::prelude::{Entity, Query, Res, ResMut};
use tracing::info;

use crate::clock::{CurrentEvent, EventKind, EventSubject, SimulationClock};
use crate::ecs::Train;

pub fn simulation_started_system(
    event: Res<CurrentEvent>,
    mut clock: ResMut<SimulationClock>,
    trains: Query<(Entity, &Train)>,
) {
    if event.0.kind != EventKind::SimulationStarted {
        return;
    }

    // Entity iteration order is not defined; sort by (arrival, id) so the
    // arrival event sequence is a pure function of the scenario.
    let mut schedule: Vec<(Entity, u64, &str)> = trains
        .iter()
        .map(|(entity, train)| (entity, train.arrival_ms, train.id.as_str()))
        .collect();
    schedule.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.2.cmp(b.2)));

    info!(trains = schedule.len(), "simulation started");
    for (entity, arrival_ms, _) in schedule {
        clock.schedule_at(arrival_ms, EventKind::TrainArrival, Some(EventSubject::Train(entity)));
    }
}
