//! Track capacity accounting and policy-driven track selection.
//!
//! Each physical track has an effective capacity `length * fill_factor`.
//! Placement and removal go exclusively through [`TrackRegistry`]; violating
//! the occupancy invariant means a coordinator handed out capacity it did not
//! reserve, which is a bug and aborts the run.
//!
//! Selection policies are a closed set ([`SelectionStrategy`]); `Random`
//! draws from the kernel RNG so runs stay reproducible.

use std::collections::HashMap;

use bevy_ecs::prelude::{Entity, Resource};
use serde::{Deserialize, Serialize};

use crate::rng::KernelRng;

/// Stable index of a track in scenario file order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TrackId(pub u16);

impl TrackId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackRole {
    Collection,
    Retrofit,
    Workshop,
    Parking,
    Feeder,
    Exit,
    Head,
}

impl TrackRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackRole::Collection => "COLLECTION",
            TrackRole::Retrofit => "RETROFIT",
            TrackRole::Workshop => "WORKSHOP",
            TrackRole::Parking => "PARKING",
            TrackRole::Feeder => "FEEDER",
            TrackRole::Exit => "EXIT",
            TrackRole::Head => "HEAD",
        }
    }
}

/// How to pick among candidate tracks of a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SelectionStrategy {
    LeastOccupied,
    RoundRobin,
    FirstAvailable,
    Random,
}

/// Default usable fraction of a track's physical length.
pub const DEFAULT_FILL_FACTOR: f64 = 0.75;

#[derive(Debug, Clone)]
pub struct TrackState {
    pub id: String,
    pub role: TrackRole,
    pub length_m: f64,
    pub fill_factor: f64,
    pub occupied_m: f64,
    /// Length promised to in-flight transfers but not yet placed.
    pub reserved_m: f64,
    /// Wagons currently standing on the track, in placement order.
    pub wagons: Vec<Entity>,
}

impl TrackState {
    /// Effective capacity `length * fill_factor`.
    pub fn capacity_m(&self) -> f64 {
        self.length_m * self.fill_factor
    }

    pub fn free_m(&self) -> f64 {
        self.capacity_m() - self.occupied_m - self.reserved_m
    }

    pub fn occupancy_ratio(&self) -> f64 {
        if self.capacity_m() <= 0.0 {
            0.0
        } else {
            self.occupied_m / self.capacity_m()
        }
    }
}

/// All tracks of the site, in scenario file order (the stable order every
/// tie-break refers to).
#[derive(Debug, Default, Resource)]
pub struct TrackRegistry {
    tracks: Vec<TrackState>,
    by_name: HashMap<String, TrackId>,
    /// Per-role rolling index for `RoundRobin`, advanced on each successful
    /// selection.
    round_robin: HashMap<TrackRole, usize>,
}

impl TrackRegistry {
    pub fn add(&mut self, id: String, role: TrackRole, length_m: f64, fill_factor: f64) -> TrackId {
        let track_id = TrackId(self.tracks.len() as u16);
        self.by_name.insert(id.clone(), track_id);
        self.tracks.push(TrackState {
            id,
            role,
            length_m,
            fill_factor,
            occupied_m: 0.0,
            reserved_m: 0.0,
            wagons: Vec::new(),
        });
        track_id
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn get(&self, id: TrackId) -> &TrackState {
        &self.tracks[id.index()]
    }

    pub fn resolve(&self, name: &str) -> Option<TrackId> {
        self.by_name.get(name).copied()
    }

    /// Tracks of a role in stable order.
    pub fn of_role(&self, role: TrackRole) -> impl Iterator<Item = TrackId> + '_ {
        self.tracks
            .iter()
            .enumerate()
            .filter(move |(_, t)| t.role == role)
            .map(|(i, _)| TrackId(i as u16))
    }

    /// First track of a role in stable order, if any.
    pub fn first_of_role(&self, role: TrackRole) -> Option<TrackId> {
        self.of_role(role).next()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TrackId, &TrackState)> {
        self.tracks
            .iter()
            .enumerate()
            .map(|(i, t)| (TrackId(i as u16), t))
    }

    pub fn can_place(&self, id: TrackId, length_m: f64) -> bool {
        self.get(id).free_m() >= length_m - f64::EPSILON
    }

    /// Hold `length_m` of capacity for an in-flight delivery.
    ///
    /// Returns false without touching the track when the capacity is not
    /// there; the caller decides whether to wait or pick elsewhere.
    pub fn reserve(&mut self, id: TrackId, length_m: f64) -> bool {
        if !self.can_place(id, length_m) {
            return false;
        }
        self.tracks[id.index()].reserved_m += length_m;
        true
    }

    pub fn release_reservation(&mut self, id: TrackId, length_m: f64) {
        let track = &mut self.tracks[id.index()];
        track.reserved_m = (track.reserved_m - length_m).max(0.0);
    }

    /// Place a wagon, consuming a prior reservation of its length.
    pub fn place_reserved(&mut self, id: TrackId, wagon: Entity, length_m: f64, now_ms: u64) {
        self.release_reservation(id, length_m);
        self.place(id, wagon, length_m, now_ms);
    }

    /// Place a wagon directly (no prior reservation).
    ///
    /// Panics when the occupancy invariant would be violated: callers must
    /// check or reserve capacity first.
    pub fn place(&mut self, id: TrackId, wagon: Entity, length_m: f64, now_ms: u64) {
        let track = &mut self.tracks[id.index()];
        assert!(
            track.occupied_m + track.reserved_m + length_m <= track.capacity_m() + f64::EPSILON,
            "track {} over capacity: occupied {:.1}m + reserved {:.1}m + {:.1}m > {:.1}m (now={}ms)",
            track.id,
            track.occupied_m,
            track.reserved_m,
            length_m,
            track.capacity_m(),
            now_ms,
        );
        track.occupied_m += length_m;
        track.wagons.push(wagon);
    }

    /// Remove a wagon, freeing its length.
    ///
    /// Panics when the wagon is not on the track; ownership transfers are
    /// atomic within a scheduler step, so a miss is a coordinator bug.
    pub fn remove(&mut self, id: TrackId, wagon: Entity, length_m: f64, now_ms: u64) {
        let track = &mut self.tracks[id.index()];
        let pos = track
            .wagons
            .iter()
            .position(|w| *w == wagon)
            .unwrap_or_else(|| {
                panic!(
                    "wagon {:?} not on track {} (now={}ms)",
                    wagon, track.id, now_ms
                )
            });
        track.wagons.remove(pos);
        track.occupied_m = (track.occupied_m - length_m).max(0.0);
    }

    /// Pick a track of `role` with room for `length_m`, per `strategy`.
    ///
    /// `Random` draws from the kernel RNG exactly once whenever at least one
    /// candidate exists, keeping the RNG stream deterministic.
    pub fn select(
        &mut self,
        role: TrackRole,
        length_m: f64,
        strategy: SelectionStrategy,
        rng: &mut KernelRng,
    ) -> Option<TrackId> {
        let candidates: Vec<TrackId> = self
            .of_role(role)
            .filter(|id| self.can_place(*id, length_m))
            .collect();
        if candidates.is_empty() {
            return None;
        }

        let chosen = match strategy {
            SelectionStrategy::FirstAvailable => candidates[0],
            SelectionStrategy::LeastOccupied => {
                // Strict `<` keeps the first of equally occupied tracks, so
                // ties resolve in stable order.
                let mut best = candidates[0];
                for &candidate in &candidates[1..] {
                    if self.get(candidate).occupancy_ratio() < self.get(best).occupancy_ratio() {
                        best = candidate;
                    }
                }
                best
            }
            SelectionStrategy::RoundRobin => {
                let all: Vec<TrackId> = self.of_role(role).collect();
                let cursor = self.round_robin.entry(role).or_insert(0);
                // Walk the full role list from the cursor; skip full tracks.
                let mut chosen = None;
                for offset in 0..all.len() {
                    let idx = (*cursor + offset) % all.len();
                    if candidates.contains(&all[idx]) {
                        chosen = Some((idx, all[idx]));
                        break;
                    }
                }
                let (idx, id) = chosen.expect("candidates checked non-empty");
                *cursor = (idx + 1) % all.len();
                id
            }
            SelectionStrategy::Random => candidates[rng.pick_index(candidates.len())],
        };
        Some(chosen)
    }

    /// True when `length_m` exceeds the effective capacity of every track of
    /// the role, i.e. the wagon could never fit regardless of occupancy.
    pub fn never_fits(&self, role: TrackRole, length_m: f64) -> bool {
        self.of_role(role)
            .all(|id| self.get(id).capacity_m() < length_m - f64::EPSILON)
    }
}
