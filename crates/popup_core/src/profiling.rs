//! Lightweight run diagnostics: counts of processed events per kind.
//!
//! Optional resource; the runner records into it when present. Used by the
//! CLI to log a post-run breakdown and by load tests to sanity-check event
//! volumes.

use std::collections::HashMap;

use bevy_ecs::prelude::Resource;

use crate::clock::EventKind;

#[derive(Debug, Default, Resource)]
pub struct EventMetrics {
    counts: HashMap<&'static str, u64>,
    total: u64,
}

fn kind_name(kind: EventKind) -> &'static str {
    match kind {
        EventKind::SimulationStarted => "simulation_started",
        EventKind::TrainArrival => "train_arrival",
        EventKind::TrainReady => "train_ready",
        EventKind::CollectionPickup => "collection_pickup",
        EventKind::TransferDispatch => "transfer_dispatch",
        EventKind::TransferStep => "transfer_step",
        EventKind::CouplingFinished => "coupling_finished",
        EventKind::DecouplingFinished => "decoupling_finished",
        EventKind::WorkshopDispatch => "workshop_dispatch",
        EventKind::RetrofitFinished => "retrofit_finished",
        EventKind::ExitHaul => "exit_haul",
        EventKind::ParkingDispatch => "parking_dispatch",
    }
}

impl EventMetrics {
    pub fn record_event(&mut self, kind: EventKind) {
        *self.counts.entry(kind_name(kind)).or_insert(0) += 1;
        self.total += 1;
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn count(&self, kind: EventKind) -> u64 {
        self.counts.get(kind_name(kind)).copied().unwrap_or(0)
    }

    /// `(kind, count)` pairs sorted by kind name for stable logging.
    pub fn sorted_counts(&self) -> Vec<(&'static str, u64)> {
        let mut counts: Vec<_> = self.counts.iter().map(|(k, v)| (*k, *v)).collect();
        counts.sort_by_key(|(k, _)| *k);
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_accumulate_per_kind() {
        let mut metrics = EventMetrics::default();
        metrics.record_event(EventKind::TransferStep);
        metrics.record_event(EventKind::TransferStep);
        metrics.record_event(EventKind::TrainArrival);
        assert_eq!(metrics.total(), 3);
        assert_eq!(metrics.count(EventKind::TransferStep), 2);
        assert_eq!(metrics.count(EventKind::ExitHaul), 0);
    }
}
