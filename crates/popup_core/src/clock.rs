//! Simulation time: millisecond-scale timeline with a real-world epoch.
//!
//! All timestamps and `clock.now()` are in **simulation milliseconds**. Time 0
//! is mapped to the scenario start datetime via `epoch_ms`. The timeline
//! advances by popping the next scheduled event; events that share a timestamp
//! pop in insertion order, so a run replays identically for a given scenario
//! and seed.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use bevy_ecs::prelude::{Entity, Resource};

use crate::tracks::TrackId;
use crate::workshops::WorkshopId;

/// One second in simulation milliseconds.
pub const ONE_SEC_MS: u64 = 1000;
/// One minute in simulation milliseconds.
pub const ONE_MIN_MS: u64 = 60 * ONE_SEC_MS;
/// One hour in simulation milliseconds.
pub const ONE_HOUR_MS: u64 = 60 * ONE_MIN_MS;

/// Convert simulation milliseconds to fractional minutes (for reports).
pub fn ms_to_minutes(ms: u64) -> f64 {
    ms as f64 / ONE_MIN_MS as f64
}

/// Convert fractional minutes (scenario process times) to milliseconds.
pub fn minutes_to_ms(minutes: f64) -> u64 {
    (minutes * ONE_MIN_MS as f64).round().max(0.0) as u64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    SimulationStarted,
    TrainArrival,
    TrainReady,
    CollectionPickup,
    TransferDispatch,
    TransferStep,
    CouplingFinished,
    DecouplingFinished,
    WorkshopDispatch,
    RetrofitFinished,
    ExitHaul,
    ParkingDispatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSubject {
    Train(Entity),
    Wagon(Entity),
    Transfer(Entity),
    Track(TrackId),
    Workshop(WorkshopId),
}

/// Simulation event. `timestamp` is in **milliseconds** (simulation time).
/// `seq` is the insertion counter used to keep same-time events FIFO.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub timestamp: u64,
    pub seq: u64,
    pub kind: EventKind,
    pub subject: Option<EventSubject>,
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap by timestamp; same timestamp ordered by insertion seq.
        other
            .timestamp
            .cmp(&self.timestamp)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, Copy, Resource)]
pub struct CurrentEvent(pub Event);

/// Simulation clock: time in **milliseconds**, advances to the next scheduled
/// event. Time 0 maps to the scenario start datetime via `epoch_ms`.
#[derive(Debug, Clone, Resource)]
pub struct SimulationClock {
    /// Current simulation time in ms (updated when an event is popped).
    now: u64,
    /// Real-world ms corresponding to simulation time 0.
    epoch_ms: i64,
    /// Insertion counter; ties on `timestamp` resolve in `seq` order.
    next_seq: u64,
    events: BinaryHeap<Event>,
}

impl Default for SimulationClock {
    fn default() -> Self {
        Self {
            now: 0,
            epoch_ms: 0,
            next_seq: 0,
            events: BinaryHeap::new(),
        }
    }
}

impl SimulationClock {
    /// Clock with time 0 mapped to the given real-world ms.
    pub fn with_epoch(epoch_ms: i64) -> Self {
        Self {
            epoch_ms,
            ..Default::default()
        }
    }

    /// Current simulation time in milliseconds.
    pub fn now(&self) -> u64 {
        self.now
    }

    /// Current simulation time in fractional minutes.
    pub fn now_minutes(&self) -> f64 {
        ms_to_minutes(self.now)
    }

    /// Real-world ms that corresponds to simulation time 0.
    pub fn epoch_ms(&self) -> i64 {
        self.epoch_ms
    }

    pub fn set_epoch_ms(&mut self, epoch_ms: i64) {
        self.epoch_ms = epoch_ms;
    }

    /// Schedule an event at a specific simulation timestamp (ms).
    pub fn schedule_at(&mut self, at_ms: u64, kind: EventKind, subject: Option<EventSubject>) {
        debug_assert!(at_ms >= self.now, "event timestamp must be >= current time");
        let seq = self.next_seq;
        self.next_seq += 1;
        self.events.push(Event {
            timestamp: at_ms,
            seq,
            kind,
            subject,
        });
    }

    /// Schedule an event at `now + delta_ms` (relative, in ms).
    pub fn schedule_in(&mut self, delta_ms: u64, kind: EventKind, subject: Option<EventSubject>) {
        self.schedule_at(self.now.saturating_add(delta_ms), kind, subject);
    }

    /// Schedule an event in **delta_mins** minutes from now.
    pub fn schedule_in_mins(
        &mut self,
        delta_mins: u64,
        kind: EventKind,
        subject: Option<EventSubject>,
    ) {
        self.schedule_in(delta_mins.saturating_mul(ONE_MIN_MS), kind, subject);
    }

    /// Pop the next event (earliest timestamp, FIFO within a timestamp) and
    /// advance `now` to it.
    pub fn pop_next(&mut self) -> Option<Event> {
        let event = self.events.pop()?;
        self.now = event.timestamp;
        Some(event)
    }

    /// Timestamp of the next scheduled event without popping it.
    pub fn next_event_time(&self) -> Option<u64> {
        self.events.peek().map(|event| event.timestamp)
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of events still in the queue (for tests and diagnostics).
    pub fn pending_event_count(&self) -> usize {
        self.events.len()
    }
}
