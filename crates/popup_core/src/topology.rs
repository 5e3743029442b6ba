//! Site topology and locomotive routing.
//!
//! The yard is an undirected graph of tracks with per-edge traversal times.
//! `Router::route` returns the shortest-time path between two tracks and
//! caches results; the cache key is `(from, to)` and the graph never changes
//! during a run, so cached entries stay valid for the whole simulation.

use std::collections::BTreeMap;
use std::num::NonZeroUsize;

use bevy_ecs::prelude::Resource;
use lru::LruCache;
use pathfinding::prelude::dijkstra;

use crate::tracks::TrackId;

/// Route cache capacity; yards have at most a few dozen tracks, so this is
/// effectively "cache everything".
const ROUTE_CACHE_CAPACITY: usize = 4096;

/// A resolved path between two tracks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Legs `(next_track, leg_time_ms)` from origin to destination,
    /// excluding the origin itself. Empty when origin == destination.
    pub legs: Vec<(TrackId, u64)>,
    pub total_time_ms: u64,
}

/// Adjacency with traversal times. Edges are symmetric unless the routes
/// file overrides one direction explicitly.
#[derive(Debug, Default, Clone)]
pub struct Topology {
    edges: BTreeMap<TrackId, BTreeMap<TrackId, u64>>,
}

impl Topology {
    /// Insert an edge in both directions, keeping an explicit time if one
    /// was already set for a direction.
    pub fn add_edge(&mut self, a: TrackId, b: TrackId, time_ms: u64) {
        self.edges.entry(a).or_default().entry(b).or_insert(time_ms);
        self.edges.entry(b).or_default().entry(a).or_insert(time_ms);
    }

    /// Insert or overwrite a single direction (asymmetric traversal time).
    pub fn add_directed_edge(&mut self, from: TrackId, to: TrackId, time_ms: u64) {
        self.edges.entry(from).or_default().insert(to, time_ms);
        self.edges.entry(to).or_default().entry(from).or_insert(time_ms);
    }

    pub fn neighbours(&self, from: TrackId) -> impl Iterator<Item = (TrackId, u64)> + '_ {
        self.edges
            .get(&from)
            .into_iter()
            .flat_map(|m| m.iter().map(|(t, ms)| (*t, *ms)))
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(|m| m.len()).sum::<usize>() / 2
    }
}

/// Shortest-time router over the topology with an LRU result cache.
#[derive(Resource)]
pub struct Router {
    topology: Topology,
    cache: LruCache<(TrackId, TrackId), Option<Route>>,
}

impl Router {
    pub fn new(topology: Topology) -> Self {
        Self {
            topology,
            cache: LruCache::new(
                NonZeroUsize::new(ROUTE_CACHE_CAPACITY).expect("cache capacity must be > 0"),
            ),
        }
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Shortest-time route, or `None` when the tracks are not connected.
    pub fn route(&mut self, from: TrackId, to: TrackId) -> Option<Route> {
        if from == to {
            return Some(Route {
                legs: Vec::new(),
                total_time_ms: 0,
            });
        }
        if let Some(cached) = self.cache.get(&(from, to)) {
            return cached.clone();
        }

        let result = dijkstra(
            &from,
            |node| self.topology.neighbours(*node).collect::<Vec<_>>(),
            |node| *node == to,
        )
        .map(|(path, total_time_ms)| {
            let legs = path
                .windows(2)
                .map(|pair| {
                    let leg_ms = self
                        .topology
                        .edges
                        .get(&pair[0])
                        .and_then(|m| m.get(&pair[1]))
                        .copied()
                        .expect("dijkstra path follows existing edges");
                    (pair[1], leg_ms)
                })
                .collect();
            Route {
                legs,
                total_time_ms,
            }
        });

        self.cache.put((from, to), result.clone());
        result
    }

    /// Like [`Router::route`] but treats a missing path as the programming
    /// error it is at run time: validation already proved connectivity for
    /// every role pair the pipeline uses.
    pub fn route_or_panic(&mut self, from: TrackId, to: TrackId, now_ms: u64) -> Route {
        self.route(from, to).unwrap_or_else(|| {
            panic!("no route between track #{} and track #{} (now={}ms)", from.0, to.0, now_ms)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_topology() -> Topology {
        // 0 - 1 - 2 - 3 with 2-minute edges, plus a slow 0-3 shortcut.
        let mut topo = Topology::default();
        topo.add_edge(TrackId(0), TrackId(1), 120_000);
        topo.add_edge(TrackId(1), TrackId(2), 120_000);
        topo.add_edge(TrackId(2), TrackId(3), 120_000);
        topo.add_edge(TrackId(0), TrackId(3), 600_000);
        topo
    }

    #[test]
    fn shortest_time_path_wins_over_fewer_hops() {
        let mut router = Router::new(line_topology());
        let route = router.route(TrackId(0), TrackId(3)).expect("connected");
        assert_eq!(route.total_time_ms, 360_000);
        assert_eq!(
            route.legs,
            vec![
                (TrackId(1), 120_000),
                (TrackId(2), 120_000),
                (TrackId(3), 120_000),
            ]
        );
    }

    #[test]
    fn same_track_route_is_empty() {
        let mut router = Router::new(line_topology());
        let route = router.route(TrackId(1), TrackId(1)).expect("trivial");
        assert!(route.legs.is_empty());
        assert_eq!(route.total_time_ms, 0);
    }

    #[test]
    fn disconnected_tracks_have_no_route() {
        let mut topo = line_topology();
        topo.add_edge(TrackId(8), TrackId(9), 1_000);
        let mut router = Router::new(topo);
        assert!(router.route(TrackId(0), TrackId(9)).is_none());
        // Cached miss stays a miss.
        assert!(router.route(TrackId(0), TrackId(9)).is_none());
    }

    #[test]
    fn cached_route_matches_fresh_route() {
        let mut router = Router::new(line_topology());
        let fresh = router.route(TrackId(0), TrackId(2));
        let cached = router.route(TrackId(0), TrackId(2));
        assert_eq!(fresh, cached);
    }

    #[test]
    fn directed_edge_overrides_one_direction() {
        let mut topo = Topology::default();
        topo.add_directed_edge(TrackId(0), TrackId(1), 60_000);
        topo.add_directed_edge(TrackId(1), TrackId(0), 180_000);
        let mut router = Router::new(topo);
        assert_eq!(router.route(TrackId(0), TrackId(1)).unwrap().total_time_ms, 60_000);
        assert_eq!(router.route(TrackId(1), TrackId(0)).unwrap().total_time_ms, 180_000);
    }
}
