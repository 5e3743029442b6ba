//! Metrics extraction from simulation results.
//!
//! Derives throughput, utilisation, flow and waiting times, per-track
//! occupancy statistics, and bottleneck findings from the recorded event
//! streams plus the final world state.

use std::collections::HashMap;

use bevy_ecs::prelude::World;
use serde::Serialize;

use popup_core::clock::{ms_to_minutes, ONE_HOUR_MS};
use popup_core::ecs::Locomotive;
use popup_core::locos::LocomotivePool;
use popup_core::recorder::{EventCategory, EventRecorder, RecordedEvent};
use popup_core::scenario::SimulationEndTimeMs;
use popup_core::tracks::{TrackRegistry, TrackRole};
use popup_core::workshops::WorkshopRegistry;

/// Occupancy level above which a track counts as congested.
const TRACK_CONGESTION_RATIO: f64 = 0.8;
/// A track congested for more than this share of the run is a bottleneck.
const TRACK_BOTTLENECK_TIME_SHARE: f64 = 0.85;
/// A workshop above this time-weighted utilisation is a bottleneck.
const WORKSHOP_BOTTLENECK_UTILISATION: f64 = 0.85;
/// A collection queue with a time-weighted mean length above this is a
/// bottleneck.
const QUEUE_BOTTLENECK_MEAN_LEN: f64 = 5.0;

#[derive(Debug, Clone, Serialize)]
pub struct LocoUtilisation {
    pub id: String,
    /// Held time / run duration, in [0, 1].
    pub busy_ratio: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkshopUtilisation {
    pub id: String,
    pub stations: usize,
    /// Time-weighted mean of active/stations over the run.
    pub utilisation: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrackOccupancy {
    pub id: String,
    pub role: String,
    /// Time-weighted mean of occupied/capacity over the run.
    pub mean_occupancy_ratio: f64,
    /// Share of the run spent above [`TRACK_CONGESTION_RATIO`].
    pub congested_time_share: f64,
    pub final_wagon_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Bottleneck {
    pub subject: String,
    pub kind: String,
    /// Exceedance over the threshold times the run duration in hours.
    pub severity: f64,
    pub detail: String,
}

/// Aggregated KPIs from a single simulation run.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationSummary {
    pub scenario_id: String,
    pub duration_hours: f64,
    pub total_wagons_processed: usize,
    pub retrofitted: usize,
    pub rejected: usize,
    pub parked: usize,
    pub throughput_per_hour: f64,
    pub throughput_per_day: f64,
    pub avg_flow_time_minutes: f64,
    pub avg_waiting_time_minutes: f64,
    pub locomotives: Vec<LocoUtilisation>,
    pub workshops: Vec<WorkshopUtilisation>,
    pub tracks: Vec<TrackOccupancy>,
    pub bottlenecks: Vec<Bottleneck>,
}

/// Extract KPIs from a completed simulation world.
pub fn extract_metrics(world: &mut World, scenario_id: &str) -> SimulationSummary {
    let duration_ms = world
        .get_resource::<SimulationEndTimeMs>()
        .map(|end| end.0)
        .unwrap_or(0);
    let duration_hours = duration_ms as f64 / ONE_HOUR_MS as f64;

    let loco_names: HashMap<bevy_ecs::prelude::Entity, String> = world
        .query::<(bevy_ecs::prelude::Entity, &Locomotive)>()
        .iter(world)
        .map(|(entity, loco)| (entity, loco.id.clone()))
        .collect();

    let recorder = world.resource::<EventRecorder>();
    let wagon_events = recorder.events(EventCategory::Wagon);

    let total_wagons_processed = count_subjects(wagon_events, "arrived");
    let retrofitted = count_subjects(wagon_events, "retrofit_finished");
    let rejected = count_subjects(wagon_events, "rejected");
    let parked = count_subjects(wagon_events, "parked");

    let avg_flow_time_minutes = mean(
        wagon_events
            .iter()
            .filter(|e| e.kind == "completed")
            .filter_map(|e| e.payload.get("flow_time_minutes").and_then(|v| v.as_f64())),
    );
    let avg_waiting_time_minutes = mean(waiting_times_minutes(wagon_events).into_iter());

    let throughput_per_hour = if duration_hours > 0.0 {
        retrofitted as f64 / duration_hours
    } else {
        0.0
    };

    let pool = world.resource::<LocomotivePool>();
    let busy = pool.busy_ms_per_loco(duration_ms);
    let mut locomotives: Vec<LocoUtilisation> = pool
        .all()
        .iter()
        .map(|entity| LocoUtilisation {
            id: loco_names.get(entity).cloned().unwrap_or_default(),
            busy_ratio: if duration_ms > 0 {
                busy.get(entity).copied().unwrap_or(0) as f64 / duration_ms as f64
            } else {
                0.0
            },
        })
        .collect();
    locomotives.sort_by(|a, b| a.id.cmp(&b.id));

    let workshop_registry = world.resource::<WorkshopRegistry>();
    let workshops: Vec<WorkshopUtilisation> = workshop_registry
        .iter()
        .map(|(id, ws)| WorkshopUtilisation {
            id: ws.id.clone(),
            stations: ws.stations,
            utilisation: workshop_registry.utilisation(id, duration_ms),
        })
        .collect();

    let track_registry = world.resource::<TrackRegistry>();
    let tracks = track_occupancy(
        recorder.events(EventCategory::Track),
        track_registry,
        duration_ms,
    );

    let mut bottlenecks = Vec::new();
    for track in &tracks {
        if track.congested_time_share > TRACK_BOTTLENECK_TIME_SHARE {
            bottlenecks.push(Bottleneck {
                subject: track.id.clone(),
                kind: "track".into(),
                severity: (track.congested_time_share - TRACK_BOTTLENECK_TIME_SHARE)
                    * duration_hours,
                detail: format!(
                    "above {:.0}% occupancy for {:.0}% of the run",
                    TRACK_CONGESTION_RATIO * 100.0,
                    track.congested_time_share * 100.0
                ),
            });
        }
    }
    for ws in &workshops {
        if ws.utilisation > WORKSHOP_BOTTLENECK_UTILISATION {
            bottlenecks.push(Bottleneck {
                subject: ws.id.clone(),
                kind: "workshop".into(),
                severity: (ws.utilisation - WORKSHOP_BOTTLENECK_UTILISATION) * duration_hours,
                detail: format!("{:.0}% station utilisation", ws.utilisation * 100.0),
            });
        }
    }
    let queue_mean = collection_queue_mean_len(wagon_events, duration_ms, track_registry);
    if queue_mean > QUEUE_BOTTLENECK_MEAN_LEN {
        bottlenecks.push(Bottleneck {
            subject: "collection_queue".into(),
            kind: "queue".into(),
            severity: (queue_mean - QUEUE_BOTTLENECK_MEAN_LEN) * duration_hours,
            detail: format!("time-weighted mean length {queue_mean:.1} wagons"),
        });
    }

    SimulationSummary {
        scenario_id: scenario_id.to_string(),
        duration_hours,
        total_wagons_processed,
        retrofitted,
        rejected,
        parked,
        throughput_per_hour,
        throughput_per_day: throughput_per_hour * 24.0,
        avg_flow_time_minutes,
        avg_waiting_time_minutes,
        locomotives,
        workshops,
        tracks,
        bottlenecks,
    }
}

/// Distinct subjects with at least one event of `kind`.
fn count_subjects(events: &[RecordedEvent], kind: &str) -> usize {
    let mut seen = std::collections::HashSet::new();
    for event in events.iter().filter(|e| e.kind == kind) {
        seen.insert(event.subject_id.as_str());
    }
    seen.len()
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for v in values {
        sum += v;
        count += 1;
    }
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Waiting time per retrofitted wagon: retrofit start minus the moment the
/// wagon was placed on a retrofit track.
fn waiting_times_minutes(wagon_events: &[RecordedEvent]) -> Vec<f64> {
    let mut placed_on_retrofit: HashMap<&str, u64> = HashMap::new();
    let mut waits = Vec::new();
    for event in wagon_events {
        match event.kind {
            "placed" => {
                let role = event.payload.get("role").and_then(|v| v.as_str());
                if role == Some("RETROFIT") {
                    placed_on_retrofit
                        .entry(event.subject_id.as_str())
                        .or_insert(event.time_ms);
                }
            }
            "retrofit_started" => {
                if let Some(placed) = placed_on_retrofit.get(event.subject_id.as_str()) {
                    waits.push(ms_to_minutes(event.time_ms.saturating_sub(*placed)));
                }
            }
            _ => {}
        }
    }
    waits
}

/// Reconstruct per-track occupancy statistics from the track event stream.
fn track_occupancy(
    track_events: &[RecordedEvent],
    registry: &TrackRegistry,
    duration_ms: u64,
) -> Vec<TrackOccupancy> {
    struct Cursor {
        last_ms: u64,
        ratio: f64,
        weighted_sum: f64,
        congested_ms: u64,
    }
    let mut cursors: HashMap<&str, Cursor> = HashMap::new();

    for event in track_events {
        let occupied = event
            .payload
            .get("occupied_m")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0);
        let capacity = event
            .payload
            .get("capacity_m")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0);
        let ratio = if capacity > 0.0 { occupied / capacity } else { 0.0 };
        let cursor = cursors.entry(event.subject_id.as_str()).or_insert(Cursor {
            last_ms: 0,
            ratio: 0.0,
            weighted_sum: 0.0,
            congested_ms: 0,
        });
        let elapsed = event.time_ms.saturating_sub(cursor.last_ms);
        cursor.weighted_sum += elapsed as f64 * cursor.ratio;
        if cursor.ratio > TRACK_CONGESTION_RATIO {
            cursor.congested_ms += elapsed;
        }
        cursor.last_ms = event.time_ms;
        cursor.ratio = ratio;
    }

    registry
        .iter()
        .map(|(_, track)| {
            let (mean_ratio, congested_share) = match cursors.get(track.id.as_str()) {
                None => (0.0, 0.0),
                Some(cursor) => {
                    let tail = duration_ms.saturating_sub(cursor.last_ms);
                    let weighted = cursor.weighted_sum + tail as f64 * cursor.ratio;
                    let congested = cursor.congested_ms
                        + if cursor.ratio > TRACK_CONGESTION_RATIO { tail } else { 0 };
                    if duration_ms > 0 {
                        (
                            weighted / duration_ms as f64,
                            congested as f64 / duration_ms as f64,
                        )
                    } else {
                        (0.0, 0.0)
                    }
                }
            };
            TrackOccupancy {
                id: track.id.clone(),
                role: track.role.as_str().to_string(),
                mean_occupancy_ratio: mean_ratio,
                congested_time_share: congested_share,
                final_wagon_count: track.wagons.len(),
            }
        })
        .collect()
}

/// Time-weighted mean length of the collection queue, reconstructed from
/// wagon events: +1 at `selected`, -1 at the first `coupled` off a
/// collection track.
fn collection_queue_mean_len(
    wagon_events: &[RecordedEvent],
    duration_ms: u64,
    registry: &TrackRegistry,
) -> f64 {
    if duration_ms == 0 {
        return 0.0;
    }
    let collection_tracks: std::collections::HashSet<&str> = registry
        .iter()
        .filter(|(_, t)| t.role == TrackRole::Collection)
        .map(|(_, t)| t.id.as_str())
        .collect();

    let mut len = 0i64;
    let mut last_ms = 0u64;
    let mut weighted = 0.0;
    for event in wagon_events {
        let delta = match event.kind {
            "selected" => 1,
            "coupled" => {
                let from = event.payload.get("from").and_then(|v| v.as_str());
                if from.is_some_and(|f| collection_tracks.contains(f)) {
                    -1
                } else {
                    0
                }
            }
            _ => 0,
        };
        if delta == 0 {
            continue;
        }
        weighted += (event.time_ms - last_ms) as f64 * len as f64;
        last_ms = event.time_ms;
        len += delta;
    }
    weighted += duration_ms.saturating_sub(last_ms) as f64 * len as f64;
    weighted / duration_ms as f64
}
