//! Scenario directory loading: `scenario.json` plus the files it references.
//!
//! File shapes mirror the exchange format: tracks, workshops, locomotives,
//! routes, and topology are JSON arrays; the train schedule is a CSV with one
//! row per wagon. Everything is parsed into [`ScenarioParams`] and handed to
//! validation — this module only reports I/O and syntax problems.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime};
use serde::Deserialize;

use crate::clock::minutes_to_ms;
use crate::scenario::{
    EdgeSpec, LocoDeliveryStrategy, LocomotiveSpec, ProcessTimesSpec, ScenarioError,
    ScenarioParams, TrackSpec, TrainSpec, WagonSpec, WorkshopSpec,
};
use crate::tracks::{SelectionStrategy, TrackRole, DEFAULT_FILL_FACTOR};

#[derive(Debug, Deserialize)]
struct ScenarioFile {
    scenario_id: String,
    start_date: String,
    end_date: String,
    track_selection_strategy: SelectionStrategy,
    retrofit_selection_strategy: SelectionStrategy,
    loco_delivery_strategy: LocoDeliveryStrategy,
    #[serde(default)]
    seed: u64,
    references: References,
}

#[derive(Debug, Deserialize)]
struct References {
    trains: String,
    tracks: String,
    workshops: String,
    locomotives: String,
    routes: String,
    topology: String,
    process_times: String,
}

#[derive(Debug, Deserialize)]
struct TrackEntry {
    id: String,
    role: TrackRole,
    length: f64,
    fill_factor: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WorkshopEntry {
    workshop_id: String,
    track_id: String,
    retrofit_stations: usize,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LocomotiveEntry {
    locomotive_id: String,
    #[serde(default)]
    #[allow(dead_code)]
    status: Option<String>,
    track_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RouteEdgeEntry {
    from: String,
    to: String,
    /// Traversal time in minutes.
    time: f64,
    /// Reverse-direction time in minutes when the edge is asymmetric.
    reverse_time: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct AdjacencyEntry {
    track_id: String,
    connects_to: Vec<String>,
}

fn read_to_string(path: &Path) -> Result<String, ScenarioError> {
    fs::read_to_string(path).map_err(|source| ScenarioError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn parse_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ScenarioError> {
    let raw = read_to_string(path)?;
    serde_json::from_str(&raw).map_err(|e| ScenarioError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Parse an ISO datetime, with or without a timezone offset, to real-world ms.
fn parse_datetime_ms(raw: &str, path: &Path, field: &str) -> Result<i64, ScenarioError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.timestamp_millis());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .map(|dt| dt.and_utc().timestamp_millis())
        .map_err(|_| ScenarioError::Parse {
            path: path.display().to_string(),
            message: format!("{field}: '{raw}' is not an ISO datetime"),
        })
}

/// Load a scenario directory into an in-memory [`ScenarioParams`].
///
/// The directory must contain `scenario.json`; referenced paths are resolved
/// relative to the directory. Semantic checks live in
/// [`validate`](crate::scenario::validate::validate), not here.
pub fn load_scenario(dir: &Path) -> Result<ScenarioParams, ScenarioError> {
    let root_path = dir.join("scenario.json");
    let root: ScenarioFile = parse_json(&root_path)?;

    let resolve = |rel: &str| -> PathBuf { dir.join(rel) };

    let epoch_ms = parse_datetime_ms(&root.start_date, &root_path, "start_date")?;
    let end_ms = parse_datetime_ms(&root.end_date, &root_path, "end_date")?;
    if end_ms <= epoch_ms {
        return Err(ScenarioError::Parse {
            path: root_path.display().to_string(),
            message: format!(
                "end_date {} must be after start_date {}",
                root.end_date, root.start_date
            ),
        });
    }

    let tracks: Vec<TrackEntry> = parse_json(&resolve(&root.references.tracks))?;
    let workshops: Vec<WorkshopEntry> = parse_json(&resolve(&root.references.workshops))?;
    let locomotives: Vec<LocomotiveEntry> = parse_json(&resolve(&root.references.locomotives))?;
    let routes: Vec<RouteEdgeEntry> = parse_json(&resolve(&root.references.routes))?;
    let adjacencies: Vec<AdjacencyEntry> = parse_json(&resolve(&root.references.topology))?;
    let process_times: ProcessTimesSpec = parse_json(&resolve(&root.references.process_times))?;

    let trains = load_trains(&resolve(&root.references.trains), epoch_ms)?;
    let edges = merge_edges(&routes, &adjacencies, process_times.track_change_time);

    Ok(ScenarioParams {
        scenario_id: root.scenario_id,
        epoch_ms,
        duration_ms: (end_ms - epoch_ms) as u64,
        seed: root.seed,
        track_selection_strategy: root.track_selection_strategy,
        retrofit_selection_strategy: root.retrofit_selection_strategy,
        loco_delivery_strategy: root.loco_delivery_strategy,
        tracks: tracks
            .into_iter()
            .map(|t| TrackSpec {
                id: t.id,
                role: t.role,
                length_m: t.length,
                fill_factor: t.fill_factor.unwrap_or(DEFAULT_FILL_FACTOR),
            })
            .collect(),
        workshops: workshops
            .into_iter()
            .map(|w| WorkshopSpec {
                id: w.workshop_id,
                name: w.name,
                track_id: w.track_id,
                retrofit_stations: w.retrofit_stations,
            })
            .collect(),
        locomotives: locomotives
            .into_iter()
            .map(|l| LocomotiveSpec {
                id: l.locomotive_id,
                track_id: l.track_id,
            })
            .collect(),
        trains,
        edges,
        process_times,
    })
}

/// Explicit route edges win; topology adjacencies without a route entry get
/// the default track-change time.
fn merge_edges(
    routes: &[RouteEdgeEntry],
    adjacencies: &[AdjacencyEntry],
    track_change_minutes: f64,
) -> Vec<EdgeSpec> {
    let mut edges: Vec<EdgeSpec> = routes
        .iter()
        .map(|r| EdgeSpec {
            from: r.from.clone(),
            to: r.to.clone(),
            time_ms: minutes_to_ms(r.time),
            reverse_time_ms: r.reverse_time.map(minutes_to_ms),
        })
        .collect();

    let timed: std::collections::HashSet<(String, String)> = routes
        .iter()
        .flat_map(|r| {
            [
                (r.from.clone(), r.to.clone()),
                (r.to.clone(), r.from.clone()),
            ]
        })
        .collect();

    for adj in adjacencies {
        for other in &adj.connects_to {
            if timed.contains(&(adj.track_id.clone(), other.clone())) {
                continue;
            }
            // Emit each untimed adjacency once (lexicographically smaller end
            // first) so the edge list is stable.
            if adj.track_id < *other
                || !adjacencies
                    .iter()
                    .any(|a| a.track_id == *other && a.connects_to.contains(&adj.track_id))
            {
                edges.push(EdgeSpec {
                    from: adj.track_id.clone(),
                    to: other.clone(),
                    time_ms: minutes_to_ms(track_change_minutes),
                    reverse_time_ms: None,
                });
            }
        }
    }
    edges
}

#[derive(Debug, Deserialize)]
struct TrainCsvRow {
    train_id: String,
    arrival_time: String,
    wagon_id: String,
    length: f64,
    needs_retrofit: bool,
}

/// Read the train CSV (one row per wagon, rows sharing `train_id` share an
/// arrival time). Trains keep their first-seen order; wagons keep row order.
fn load_trains(path: &Path, epoch_ms: i64) -> Result<Vec<TrainSpec>, ScenarioError> {
    let raw = read_to_string(path)?;
    let mut reader = csv::Reader::from_reader(raw.as_bytes());

    let mut order: Vec<String> = Vec::new();
    let mut by_train: BTreeMap<String, (u64, Vec<WagonSpec>)> = BTreeMap::new();

    for (line, row) in reader.deserialize::<TrainCsvRow>().enumerate() {
        let row = row.map_err(|e| ScenarioError::Parse {
            path: path.display().to_string(),
            message: format!("row {}: {}", line + 2, e),
        })?;
        let arrival_ms = parse_arrival(&row.arrival_time, epoch_ms, path, line + 2)?;
        let entry = by_train.entry(row.train_id.clone()).or_insert_with(|| {
            order.push(row.train_id.clone());
            (arrival_ms, Vec::new())
        });
        entry.1.push(WagonSpec {
            id: row.wagon_id,
            length_m: row.length,
            needs_retrofit: row.needs_retrofit,
        });
    }

    Ok(order
        .into_iter()
        .map(|id| {
            let (arrival_ms, wagons) = by_train.remove(&id).expect("train recorded on first row");
            TrainSpec {
                id,
                arrival_ms,
                wagons,
            }
        })
        .collect())
}

/// Arrival times are ISO datetimes (converted to an offset from the scenario
/// start) or plain fractional minutes.
fn parse_arrival(
    raw: &str,
    epoch_ms: i64,
    path: &Path,
    line: usize,
) -> Result<u64, ScenarioError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        let offset = dt.timestamp_millis() - epoch_ms;
        return check_non_negative(offset, raw, path, line);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        let offset = dt.and_utc().timestamp_millis() - epoch_ms;
        return check_non_negative(offset, raw, path, line);
    }
    raw.parse::<f64>()
        .map(minutes_to_ms)
        .map_err(|_| ScenarioError::Parse {
            path: path.display().to_string(),
            message: format!(
                "row {line}: arrival_time '{raw}' is neither an ISO datetime nor minutes"
            ),
        })
}

fn check_non_negative(
    offset_ms: i64,
    raw: &str,
    path: &Path,
    line: usize,
) -> Result<u64, ScenarioError> {
    u64::try_from(offset_ms).map_err(|_| ScenarioError::Parse {
        path: path.display().to_string(),
        message: format!("row {line}: arrival_time '{raw}' is before the scenario start"),
    })
}
