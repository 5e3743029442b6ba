//! Workshop station pools: one retrofit bay per wagon at a time.
//!
//! Each workshop is bound to a workshop track and owns a fixed number of
//! stations. Station acquisition is FIFO per workshop; the occupancy history
//! feeds the time-weighted utilisation report.

use std::collections::VecDeque;

use bevy_ecs::prelude::{Entity, Resource};

use crate::tracks::{TrackId, TrackRegistry};

/// Stable index of a workshop in scenario file order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorkshopId(pub u16);

impl WorkshopId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
pub struct WorkshopState {
    pub id: String,
    pub name: Option<String>,
    pub track: TrackId,
    pub stations: usize,
    pub active: usize,
    /// Wagons decoupled at the workshop and waiting for a free station.
    pub waiters: VecDeque<Entity>,
    /// `(time_ms, active)` after every station acquire/release.
    pub history: Vec<(u64, usize)>,
}

impl WorkshopState {
    pub fn busy_ratio(&self) -> f64 {
        if self.stations == 0 {
            1.0
        } else {
            self.active as f64 / self.stations as f64
        }
    }

    pub fn free_stations(&self) -> usize {
        self.stations.saturating_sub(self.active)
    }
}

#[derive(Debug, Default, Resource)]
pub struct WorkshopRegistry {
    workshops: Vec<WorkshopState>,
}

impl WorkshopRegistry {
    pub fn add(
        &mut self,
        id: String,
        name: Option<String>,
        track: TrackId,
        stations: usize,
    ) -> WorkshopId {
        let wid = WorkshopId(self.workshops.len() as u16);
        self.workshops.push(WorkshopState {
            id,
            name,
            track,
            stations,
            active: 0,
            waiters: VecDeque::new(),
            history: vec![(0, 0)],
        });
        wid
    }

    pub fn len(&self) -> usize {
        self.workshops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workshops.is_empty()
    }

    pub fn get(&self, id: WorkshopId) -> &WorkshopState {
        &self.workshops[id.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (WorkshopId, &WorkshopState)> {
        self.workshops
            .iter()
            .enumerate()
            .map(|(i, w)| (WorkshopId(i as u16), w))
    }

    /// Workshop with the lowest `active/stations` ratio whose bound track can
    /// take `batch_length_m` more metres; ties go to file order.
    pub fn select_least_busy(
        &self,
        batch_length_m: f64,
        tracks: &TrackRegistry,
    ) -> Option<WorkshopId> {
        // Strict `<` keeps the first of equally busy workshops, so ties
        // resolve in file order.
        let mut best: Option<(WorkshopId, f64)> = None;
        for (id, w) in self.iter() {
            if w.free_stations() == 0 || !tracks.can_place(w.track, batch_length_m) {
                continue;
            }
            let ratio = w.busy_ratio();
            if best.map_or(true, |(_, best_ratio)| ratio < best_ratio) {
                best = Some((id, ratio));
            }
        }
        best.map(|(id, _)| id)
    }

    /// Claim a station for `wagon`, or queue it when all stations are busy.
    /// Returns true when the station was granted immediately.
    pub fn acquire_station(&mut self, id: WorkshopId, wagon: Entity, now_ms: u64) -> bool {
        let w = &mut self.workshops[id.index()];
        if w.active < w.stations {
            w.active += 1;
            w.history.push((now_ms, w.active));
            true
        } else {
            w.waiters.push_back(wagon);
            false
        }
    }

    /// Free a station. When a wagon is waiting it takes the station over
    /// without the count ever dropping; the caller starts its retrofit.
    pub fn release_station(&mut self, id: WorkshopId, now_ms: u64) -> Option<Entity> {
        let w = &mut self.workshops[id.index()];
        assert!(
            w.active > 0,
            "station release on idle workshop {} (now={}ms)",
            w.id,
            now_ms,
        );
        match w.waiters.pop_front() {
            Some(next) => {
                // Hand-over: occupancy stays constant, record the instant anyway.
                w.history.push((now_ms, w.active));
                Some(next)
            }
            None => {
                w.active -= 1;
                w.history.push((now_ms, w.active));
                None
            }
        }
    }

    /// Time-weighted mean of `active/stations` over `[0, end_ms]`.
    pub fn utilisation(&self, id: WorkshopId, end_ms: u64) -> f64 {
        let w = self.get(id);
        if w.stations == 0 || end_ms == 0 {
            return 0.0;
        }
        let mut weighted = 0.0;
        for pair in w.history.windows(2) {
            let (t0, active) = pair[0];
            let (t1, _) = pair[1];
            weighted += (t1.min(end_ms).saturating_sub(t0)) as f64 * active as f64;
        }
        if let Some(&(t_last, active)) = w.history.last() {
            weighted += end_ms.saturating_sub(t_last) as f64 * active as f64;
        }
        weighted / (end_ms as f64 * w.stations as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracks::TrackRole;
    use bevy_ecs::prelude::World;

    fn setup() -> (WorkshopRegistry, TrackRegistry) {
        let mut tracks = TrackRegistry::default();
        let wt1 = tracks.add("WS1".into(), TrackRole::Workshop, 100.0, 1.0);
        let wt2 = tracks.add("WS2".into(), TrackRole::Workshop, 100.0, 1.0);
        let mut reg = WorkshopRegistry::default();
        reg.add("w1".into(), None, wt1, 2);
        reg.add("w2".into(), None, wt2, 2);
        (reg, tracks)
    }

    #[test]
    fn least_busy_breaks_ties_by_stable_order() {
        let (reg, tracks) = setup();
        assert_eq!(reg.select_least_busy(10.0, &tracks), Some(WorkshopId(0)));
    }

    #[test]
    fn least_busy_prefers_lower_ratio() {
        let (mut reg, tracks) = setup();
        let mut world = World::new();
        let w = world.spawn_empty().id();
        assert!(reg.acquire_station(WorkshopId(0), w, 0));
        assert_eq!(reg.select_least_busy(10.0, &tracks), Some(WorkshopId(1)));
    }

    #[test]
    fn station_waiters_are_fifo() {
        let (mut reg, _) = setup();
        let mut world = World::new();
        let a = world.spawn_empty().id();
        let b = world.spawn_empty().id();
        let c = world.spawn_empty().id();
        let d = world.spawn_empty().id();
        let id = WorkshopId(0);

        assert!(reg.acquire_station(id, a, 0));
        assert!(reg.acquire_station(id, b, 0));
        assert!(!reg.acquire_station(id, c, 1));
        assert!(!reg.acquire_station(id, d, 1));
        assert_eq!(reg.get(id).active, 2);

        assert_eq!(reg.release_station(id, 10), Some(c));
        assert_eq!(reg.get(id).active, 2);
        assert_eq!(reg.release_station(id, 20), Some(d));
        assert_eq!(reg.release_station(id, 30), None);
        assert_eq!(reg.get(id).active, 1);
    }

    #[test]
    fn utilisation_is_time_weighted() {
        let (mut reg, _) = setup();
        let mut world = World::new();
        let a = world.spawn_empty().id();
        let id = WorkshopId(0);
        // One of two stations busy from t=0 to t=50 out of 100ms.
        assert!(reg.acquire_station(id, a, 0));
        assert_eq!(reg.release_station(id, 50), None);
        let util = reg.utilisation(id, 100);
        assert!((util - 0.25).abs() < 1e-9);
    }
}
