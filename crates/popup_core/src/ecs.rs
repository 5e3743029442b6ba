//! Entity Component System: components and state enums for wagons, trains,
//! locomotives, and transfer trips.
//!
//! Components are attached to entities in the ECS world and mutated by the
//! coordinator systems reacting to events. State enums represent lifecycle
//! stages; transitions outside the legal table are programming errors and
//! abort the run with a diagnostic.

use bevy_ecs::prelude::{Component, Entity};

use crate::tracks::TrackId;
use crate::workshops::WorkshopId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CouplerType {
    Screw,
    Dac,
}

/// Wagon lifecycle. `OnRetrofitTrack`/`OnExitTrack` are the "parked between
/// trips" stages; `Parked` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WagonStatus {
    Arriving,
    Selecting,
    Selected,
    Rejected,
    Moving,
    OnRetrofitTrack,
    Retrofitting,
    Retrofitted,
    Parked,
}

impl WagonStatus {
    /// Legal transition table. Anything else is a bug in a coordinator.
    fn can_transition_to(self, to: WagonStatus) -> bool {
        use WagonStatus::*;
        matches!(
            (self, to),
            (Arriving, Selecting)
                | (Selecting, Selected)
                | (Selecting, Rejected)
                | (Selected, Moving)
                | (Moving, OnRetrofitTrack)
                | (OnRetrofitTrack, Moving)
                | (OnRetrofitTrack, Retrofitting) // workshop bound to the retrofit track
                | (Moving, Retrofitting)
                | (Retrofitting, Retrofitted)
                | (Retrofitted, Moving)
                | (Moving, Retrofitted) // decoupled on an exit track, still retrofitted
                | (Retrofitted, Rejected) // no outbound track can ever hold the wagon
                | (Moving, Parked)
        )
    }
}

/// Why a wagon left the pipeline at selection time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    /// Wagon already carries a DAC or is not flagged for retrofit.
    RetrofitNotRequired,
    /// No collection track currently has free capacity for this wagon.
    NoCapacity,
    /// Wagon is longer than the effective capacity of every collection track.
    NoCapacityAnyTrack,
}

impl RejectionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionReason::RetrofitNotRequired => "retrofit_not_required",
            RejectionReason::NoCapacity => "no_capacity",
            RejectionReason::NoCapacityAnyTrack => "no_capacity_any_track",
        }
    }
}

#[derive(Debug, Clone, Component)]
pub struct Wagon {
    pub id: String,
    pub train_id: String,
    /// Length over buffers in metres; always > 0 after validation.
    pub length_m: f64,
    pub coupler: CouplerType,
    pub needs_retrofit: bool,
    pub status: WagonStatus,
    /// Track the wagon currently occupies; `None` while hauled or rejected.
    pub track: Option<TrackId>,
    /// Simulation ms at which the owning train arrived.
    pub arrived_ms: u64,
    pub rejection: Option<RejectionReason>,
}

impl Wagon {
    /// Apply a checked status transition.
    ///
    /// Panics with a diagnostic when the transition is not in the legal
    /// table; coordinators own wagons exclusively, so this firing means a
    /// coordinator bug, not a recoverable condition.
    pub fn transition_to(&mut self, to: WagonStatus, now_ms: u64) {
        assert!(
            self.status.can_transition_to(to),
            "illegal wagon transition {:?} -> {:?} (wagon={}, now={}ms)",
            self.status,
            to,
            self.id,
            now_ms,
        );
        self.status = to;
    }
}

/// An arriving train: an ordered rake of wagon entities. Dissolved once every
/// wagon has been placed on collection or rejected.
#[derive(Debug, Clone, Component)]
pub struct Train {
    pub id: String,
    pub arrival_ms: u64,
    pub wagons: Vec<Entity>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocoStatus {
    Parking,
    Moving,
    Coupling,
    Decoupling,
}

#[derive(Debug, Clone, Component)]
pub struct Locomotive {
    pub id: String,
    pub status: LocoStatus,
    pub current_track: TrackId,
}

/// What a locomotive trip is for; doubles as the allocation purpose tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferPurpose {
    CollectionToRetrofit,
    RetrofitToWorkshop,
    WorkshopToExit,
    ToParking,
}

impl TransferPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferPurpose::CollectionToRetrofit => "collection_pickup",
            TransferPurpose::RetrofitToWorkshop => "workshop_delivery",
            TransferPurpose::WorkshopToExit => "exit_haul",
            TransferPurpose::ToParking => "parking_delivery",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferPhase {
    /// Waiting for a locomotive from the pool.
    AwaitingLoco,
    /// Locomotive underway to the pickup track.
    ToPickup,
    Coupling,
    /// Hauling the rake to the dropoff track.
    Hauling,
    Decoupling,
    /// Light-engine return to the parking track after delivery.
    Returning,
}

/// One locomotive trip: approach, couple, haul, decouple, deliver.
///
/// The route cursor holds the legs still ahead of the current movement; the
/// transfer system pops one leg per `TransferStep` event and updates the
/// locomotive (and, while hauling, wagon) positions at each node.
#[derive(Debug, Clone, Component)]
pub struct Transfer {
    pub purpose: TransferPurpose,
    pub loco: Option<Entity>,
    /// Wagons in stable selection order. Empty only for light-engine returns.
    pub wagons: Vec<Entity>,
    pub pickup_track: TrackId,
    pub dropoff_track: TrackId,
    pub phase: TransferPhase,
    /// Remaining legs `(next_node, leg_time_ms)` of the current movement.
    pub route: Vec<(TrackId, u64)>,
    /// Wagons decoupled so far (workshop deliveries decouple one at a time).
    pub decoupled: usize,
    /// Destination workshop for `RetrofitToWorkshop` trips.
    pub workshop: Option<WorkshopId>,
    /// Set once this transfer has joined the locomotive pool's waiter queue;
    /// a woken waiter that loses a same-instant race re-queues at the front.
    pub loco_requested: bool,
}

impl Transfer {
    /// A fresh trip awaiting a locomotive.
    pub fn new(
        purpose: TransferPurpose,
        wagons: Vec<Entity>,
        pickup_track: TrackId,
        dropoff_track: TrackId,
        workshop: Option<WorkshopId>,
    ) -> Self {
        Self {
            purpose,
            loco: None,
            wagons,
            pickup_track,
            dropoff_track,
            phase: TransferPhase::AwaitingLoco,
            route: Vec::new(),
            decoupled: 0,
            workshop,
            loco_requested: false,
        }
    }

    /// Total length of the hauled rake in metres.
    pub fn rake_length_m(&self, length_of: impl Fn(Entity) -> f64) -> f64 {
        self.wagons.iter().map(|w| length_of(*w)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wagon(status: WagonStatus) -> Wagon {
        Wagon {
            id: "W1".into(),
            train_id: "T1".into(),
            length_m: 20.0,
            coupler: CouplerType::Screw,
            needs_retrofit: true,
            status,
            track: None,
            arrived_ms: 0,
            rejection: None,
        }
    }

    #[test]
    fn legal_path_through_lifecycle() {
        let mut w = wagon(WagonStatus::Arriving);
        for to in [
            WagonStatus::Selecting,
            WagonStatus::Selected,
            WagonStatus::Moving,
            WagonStatus::OnRetrofitTrack,
            WagonStatus::Moving,
            WagonStatus::Retrofitting,
            WagonStatus::Retrofitted,
            WagonStatus::Moving,
            WagonStatus::Parked,
        ] {
            w.transition_to(to, 0);
        }
        assert_eq!(w.status, WagonStatus::Parked);
    }

    #[test]
    #[should_panic(expected = "illegal wagon transition")]
    fn rejected_wagon_cannot_resume() {
        let mut w = wagon(WagonStatus::Selecting);
        w.transition_to(WagonStatus::Rejected, 0);
        w.transition_to(WagonStatus::Moving, 0);
    }

    #[test]
    #[should_panic(expected = "illegal wagon transition")]
    fn parked_is_terminal() {
        let mut w = wagon(WagonStatus::Moving);
        w.transition_to(WagonStatus::Parked, 0);
        w.transition_to(WagonStatus::Moving, 0);
    }
}
