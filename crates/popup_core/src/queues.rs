//! Queues linking the coordinator stages.
//!
//! Unbounded FIFO between stages; the retrofit and exit legs are keyed by
//! track so deliveries batch per track. Coordinators only touch their own
//! ends of a queue — hand-offs are the sole way wagons change owners.

use std::collections::{BTreeMap, HashMap, VecDeque};

use bevy_ecs::prelude::{Entity, Resource};

use crate::tracks::TrackId;
use crate::workshops::WorkshopId;

#[derive(Debug, Default, Resource)]
pub struct PipelineQueues {
    /// Wagons placed on collection tracks, awaiting pickup (Coord1 → Coord2).
    pub collected: VecDeque<Entity>,
    /// Wagons standing on a retrofit track, grouped per track (Coord2 → Coord3).
    pub on_retrofit: BTreeMap<TrackId, Vec<Entity>>,
    /// Retrofitted groups ready to leave their workshop (Coord3 internal).
    pub ready_for_exit: BTreeMap<WorkshopId, Vec<Entity>>,
    /// Wagons standing on an exit track, grouped per track (Coord3 → Coord4).
    pub exit: BTreeMap<TrackId, Vec<Entity>>,
}

impl PipelineQueues {
    /// Current length of the collection queue (bottleneck reporting).
    pub fn collected_len(&self) -> usize {
        self.collected.len()
    }

    /// First retrofit track with a pending group, in track order.
    pub fn first_pending_retrofit(&self) -> Option<TrackId> {
        self.on_retrofit
            .iter()
            .find(|(_, group)| !group.is_empty())
            .map(|(track, _)| *track)
    }

    /// First workshop with a group ready to leave, in workshop order.
    pub fn first_ready_for_exit(&self) -> Option<WorkshopId> {
        self.ready_for_exit
            .iter()
            .find(|(_, group)| !group.is_empty())
            .map(|(ws, _)| *ws)
    }
}

/// One workshop delivery batch, tracked until every wagon is retrofitted.
#[derive(Debug)]
pub struct RetrofitGroup {
    pub workshop: WorkshopId,
    pub wagons: Vec<Entity>,
    /// Wagons done so far, in completion order — retrofits finish
    /// independently, so this may differ from the delivery order. The
    /// outbound rake is formed in this order.
    pub completed: Vec<Entity>,
}

/// Registry of in-flight workshop delivery batches.
#[derive(Debug, Default, Resource)]
pub struct RetrofitGroups {
    groups: Vec<RetrofitGroup>,
    by_wagon: HashMap<Entity, usize>,
}

impl RetrofitGroups {
    pub fn register(&mut self, workshop: WorkshopId, wagons: Vec<Entity>) {
        let idx = self.groups.len();
        for wagon in &wagons {
            self.by_wagon.insert(*wagon, idx);
        }
        self.groups.push(RetrofitGroup {
            workshop,
            wagons,
            completed: Vec::new(),
        });
    }

    pub fn workshop_of(&self, wagon: Entity) -> Option<WorkshopId> {
        self.by_wagon
            .get(&wagon)
            .map(|idx| self.groups[*idx].workshop)
    }

    /// Mark a wagon retrofitted. When its whole group is done, the group's
    /// wagons are returned in completion order and dropped from the registry.
    pub fn mark_completed(&mut self, wagon: Entity) -> Option<(WorkshopId, Vec<Entity>)> {
        let idx = *self.by_wagon.get(&wagon).unwrap_or_else(|| {
            panic!("retrofit completion for wagon {wagon:?} outside any delivery group")
        });
        let group = &mut self.groups[idx];
        group.completed.push(wagon);
        if group.completed.len() < group.wagons.len() {
            return None;
        }
        for w in &group.wagons {
            self.by_wagon.remove(w);
        }
        Some((group.workshop, std::mem::take(&mut group.completed)))
    }
}
