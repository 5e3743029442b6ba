//! Shared locomotive pool: FIFO acquisition with waiter wake-up.
//!
//! Coordinators never hold locomotives in shared state; they acquire from the
//! pool, drive the trip, and release. A blocked acquire enqueues a waiter
//! event that the release handler re-schedules, so contention resolves in
//! strict request order with no priorities.

use std::collections::{HashMap, VecDeque};

use bevy_ecs::prelude::{Entity, Resource};

use crate::clock::{EventKind, EventSubject};

/// An event to re-schedule when a locomotive becomes free.
#[derive(Debug, Clone, Copy)]
pub struct PoolWaiter {
    pub kind: EventKind,
    pub subject: Option<EventSubject>,
}

/// One acquire/release interval, kept for utilisation reporting.
#[derive(Debug, Clone)]
pub struct AllocationRecord {
    pub loco: Entity,
    pub purpose: &'static str,
    pub acquired_ms: u64,
    pub released_ms: Option<u64>,
}

#[derive(Debug, Default, Resource)]
pub struct LocomotivePool {
    all: Vec<Entity>,
    free: VecDeque<Entity>,
    waiters: VecDeque<PoolWaiter>,
    allocations: Vec<AllocationRecord>,
    /// Index into `allocations` of the open interval per held locomotive.
    open: HashMap<Entity, usize>,
}

impl LocomotivePool {
    pub fn register(&mut self, loco: Entity) {
        self.all.push(loco);
        self.free.push_back(loco);
    }

    pub fn capacity(&self) -> usize {
        self.all.len()
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    pub fn waiter_count(&self) -> usize {
        self.waiters.len()
    }

    /// Locomotives in registration order (the stable reporting order).
    pub fn all(&self) -> &[Entity] {
        &self.all
    }

    /// Take the oldest free locomotive, or `None` when all are held.
    pub fn try_acquire(&mut self, now_ms: u64, purpose: &'static str) -> Option<Entity> {
        let loco = self.free.pop_front()?;
        self.open.insert(loco, self.allocations.len());
        self.allocations.push(AllocationRecord {
            loco,
            purpose,
            acquired_ms: now_ms,
            released_ms: None,
        });
        Some(loco)
    }

    /// Queue an event to fire once a locomotive frees up.
    pub fn enqueue_waiter(&mut self, kind: EventKind, subject: Option<EventSubject>) {
        self.waiters.push_back(PoolWaiter { kind, subject });
    }

    /// Re-queue a waiter at the head (a woken waiter that lost a same-instant
    /// race keeps its place in line).
    pub fn enqueue_waiter_front(&mut self, kind: EventKind, subject: Option<EventSubject>) {
        self.waiters.push_front(PoolWaiter { kind, subject });
    }

    /// Return a locomotive. Closes its allocation interval and hands back the
    /// oldest waiter, which the caller must schedule at the release instant.
    pub fn release(&mut self, loco: Entity, now_ms: u64) -> Option<PoolWaiter> {
        let idx = self
            .open
            .remove(&loco)
            .unwrap_or_else(|| panic!("release of unheld locomotive {loco:?} (now={now_ms}ms)"));
        self.allocations[idx].released_ms = Some(now_ms);
        self.free.push_back(loco);
        self.waiters.pop_front()
    }

    /// All allocation intervals in acquisition order.
    pub fn allocations(&self) -> &[AllocationRecord] {
        &self.allocations
    }

    /// Total held time per locomotive, with open intervals truncated at
    /// `end_ms`.
    pub fn busy_ms_per_loco(&self, end_ms: u64) -> HashMap<Entity, u64> {
        let mut busy: HashMap<Entity, u64> = self.all.iter().map(|l| (*l, 0)).collect();
        for rec in &self.allocations {
            let released = rec.released_ms.unwrap_or(end_ms).min(end_ms);
            let held = released.saturating_sub(rec.acquired_ms);
            *busy.entry(rec.loco).or_insert(0) += held;
        }
        busy
    }
}
