//! Semantic scenario validation, run once before the world is built.
//!
//! Every finding carries the offending field path and a suggested fix so the
//! operator can correct the files without reading source. Errors abort the
//! run; warnings are logged and the simulation proceeds.

use std::collections::HashSet;
use std::fmt;

use crate::clock::ms_to_minutes;
use crate::scenario::ScenarioParams;
use crate::topology::{Router, Topology};
use crate::tracks::{TrackId, TrackRole};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Dotted path into the scenario files, e.g. `workshops[0].track_id`.
    pub field: String,
    pub message: String,
    pub suggestion: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.field, self.message, self.suggestion)
    }
}

#[derive(Debug, Default, Clone)]
pub struct ValidationReport {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    fn error(&mut self, field: impl Into<String>, message: impl Into<String>, suggestion: impl Into<String>) {
        self.errors.push(ValidationIssue {
            field: field.into(),
            message: message.into(),
            suggestion: suggestion.into(),
        });
    }

    fn warn(&mut self, field: impl Into<String>, message: impl Into<String>, suggestion: impl Into<String>) {
        self.warnings.push(ValidationIssue {
            field: field.into(),
            message: message.into(),
            suggestion: suggestion.into(),
        });
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} validation error(s):", self.errors.len())?;
        for issue in &self.errors {
            writeln!(f, "  - {issue}")?;
        }
        if !self.warnings.is_empty() {
            writeln!(f, "{} warning(s):", self.warnings.len())?;
            for issue in &self.warnings {
                writeln!(f, "  - {issue}")?;
            }
        }
        Ok(())
    }
}

fn valid_scenario_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 50
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Check a loaded scenario for semantic problems.
pub fn validate(params: &ScenarioParams) -> ValidationReport {
    let mut report = ValidationReport::default();

    if !valid_scenario_id(&params.scenario_id) {
        report.error(
            "scenario.scenario_id",
            format!("'{}' is not a valid identifier", params.scenario_id),
            "use 1-50 characters from [A-Za-z0-9_-]",
        );
    }
    if params.duration_ms == 0 {
        report.error(
            "scenario.end_date",
            "simulation window is empty",
            "set end_date after start_date",
        );
    }

    check_tracks(params, &mut report);
    check_workshops(params, &mut report);
    check_locomotives(params, &mut report);
    check_trains(params, &mut report);
    check_process_times(params, &mut report);
    check_connectivity(params, &mut report);
    check_demand(params, &mut report);

    report
}

fn track_ids(params: &ScenarioParams) -> HashSet<&str> {
    params.tracks.iter().map(|t| t.id.as_str()).collect()
}

fn check_tracks(params: &ScenarioParams, report: &mut ValidationReport) {
    let mut seen = HashSet::new();
    for (i, track) in params.tracks.iter().enumerate() {
        if !seen.insert(track.id.as_str()) {
            report.error(
                format!("tracks[{i}].id"),
                format!("duplicate track id '{}'", track.id),
                "give every track a unique id",
            );
        }
        if track.length_m <= 0.0 {
            report.error(
                format!("tracks[{i}].length"),
                format!("track '{}' has non-positive length", track.id),
                "set a length in metres greater than 0",
            );
        }
        if !(0.0..=1.0).contains(&track.fill_factor) {
            report.error(
                format!("tracks[{i}].fill_factor"),
                format!("fill factor {} is outside [0, 1]", track.fill_factor),
                "use a fraction of usable track length, e.g. 0.75",
            );
        }
    }

    for (role, field) in [
        (TrackRole::Retrofit, "RETROFIT"),
        (TrackRole::Collection, "COLLECTION"),
        (TrackRole::Parking, "PARKING"),
    ] {
        if !params.tracks.iter().any(|t| t.role == role) {
            report.error(
                "tracks",
                format!("no track with role {field}"),
                format!("add at least one {field} track"),
            );
        }
    }
}

fn check_workshops(params: &ScenarioParams, report: &mut ValidationReport) {
    let ids = track_ids(params);
    if params.workshops.is_empty() {
        report.error(
            "workshops",
            "no workshops defined",
            "add at least one workshop bound to a track",
        );
    }
    for (i, ws) in params.workshops.iter().enumerate() {
        if !ids.contains(ws.track_id.as_str()) {
            report.error(
                format!("workshops[{i}].track_id"),
                format!("workshop '{}' references unknown track '{}'", ws.id, ws.track_id),
                "reference a track id from the tracks file",
            );
        }
        if ws.retrofit_stations == 0 {
            report.error(
                format!("workshops[{i}].retrofit_stations"),
                format!("workshop '{}' has zero stations", ws.id),
                "set retrofit_stations to at least 1",
            );
        }
    }
}

fn check_locomotives(params: &ScenarioParams, report: &mut ValidationReport) {
    let ids = track_ids(params);
    if params.locomotives.is_empty() {
        report.error(
            "locomotives",
            "no locomotives defined",
            "add at least one locomotive",
        );
    }
    for (i, loco) in params.locomotives.iter().enumerate() {
        if let Some(track) = &loco.track_id {
            if !ids.contains(track.as_str()) {
                report.error(
                    format!("locomotives[{i}].track_id"),
                    format!("locomotive '{}' starts on unknown track '{}'", loco.id, track),
                    "reference a track id from the tracks file",
                );
            }
        }
    }
}

fn check_trains(params: &ScenarioParams, report: &mut ValidationReport) {
    for (ti, train) in params.trains.iter().enumerate() {
        if train.wagons.is_empty() {
            report.error(
                format!("trains[{ti}]"),
                format!("train '{}' has no wagons", train.id),
                "every train needs at least one wagon row",
            );
        }
        if train.arrival_ms > params.duration_ms {
            report.warn(
                format!("trains[{ti}].arrival_time"),
                format!(
                    "train '{}' arrives at minute {:.0}, after the simulation window ends",
                    train.id,
                    ms_to_minutes(train.arrival_ms)
                ),
                "extend end_date or move the arrival earlier",
            );
        }
        for (wi, wagon) in train.wagons.iter().enumerate() {
            if wagon.length_m <= 0.0 {
                report.error(
                    format!("trains[{ti}].wagons[{wi}].length"),
                    format!("wagon '{}' has non-positive length", wagon.id),
                    "set a length in metres greater than 0",
                );
            }
        }
    }
}

fn check_process_times(params: &ScenarioParams, report: &mut ValidationReport) {
    let pt = &params.process_times;
    for (value, field) in [
        (pt.coupling_time, "coupling_time"),
        (pt.decoupling_time, "decoupling_time"),
        (pt.retrofit_time_per_wagon, "retrofit_time_per_wagon"),
        (pt.train_preparation_time, "train_preparation_time"),
        (pt.track_change_time, "track_change_time"),
    ] {
        if value < 0.0 {
            report.error(
                format!("process_times.{field}"),
                format!("{field} is negative"),
                "process times are durations in minutes, >= 0",
            );
        }
    }
}

/// Every pipeline leg must be routable: collection → retrofit → workshop →
/// parking (plus exit tracks when present).
fn check_connectivity(params: &ScenarioParams, report: &mut ValidationReport) {
    // Indices in file order; unknown edge endpoints are reported here too.
    let index_of = |name: &str| -> Option<TrackId> {
        params
            .tracks
            .iter()
            .position(|t| t.id == name)
            .map(|i| TrackId(i as u16))
    };

    let mut topology = Topology::default();
    for (i, edge) in params.edges.iter().enumerate() {
        let (Some(from), Some(to)) = (index_of(&edge.from), index_of(&edge.to)) else {
            report.error(
                format!("routes[{i}]"),
                format!("edge references unknown track '{}' or '{}'", edge.from, edge.to),
                "reference track ids from the tracks file",
            );
            continue;
        };
        match edge.reverse_time_ms {
            None => topology.add_edge(from, to, edge.time_ms),
            Some(reverse) => {
                topology.add_directed_edge(from, to, edge.time_ms);
                topology.add_directed_edge(to, from, reverse);
            }
        }
    }

    let mut router = Router::new(topology);
    let of_role = |role: TrackRole| -> Vec<(TrackId, &str)> {
        params
            .tracks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.role == role)
            .map(|(i, t)| (TrackId(i as u16), t.id.as_str()))
            .collect()
    };

    // The workshop legs run between each workshop's *bound* track and the
    // rest of the pipeline — a workshop may sit directly on a retrofit track.
    let workshop_tracks: Vec<(TrackId, &str)> = params
        .workshops
        .iter()
        .filter_map(|w| index_of(&w.track_id).map(|id| (id, w.track_id.as_str())))
        .collect();

    let mut require_pairs = |from: &[(TrackId, &str)], to: &[(TrackId, &str)], leg: &str| {
        for (from_id, from_name) in from {
            for (to_id, to_name) in to {
                if router.route(*from_id, *to_id).is_none() {
                    report.error(
                        "topology",
                        format!("no route from track '{from_name}' to track '{to_name}' ({leg})"),
                        "connect the tracks in the topology or routes file",
                    );
                }
            }
        }
    };

    let collection = of_role(TrackRole::Collection);
    let retrofit = of_role(TrackRole::Retrofit);
    let parking = of_role(TrackRole::Parking);
    let exits = of_role(TrackRole::Exit);

    require_pairs(&collection, &retrofit, "collection to retrofit");
    require_pairs(&retrofit, &workshop_tracks, "retrofit to workshop");
    require_pairs(&workshop_tracks, &parking, "workshop to parking");
    require_pairs(&parking, &collection, "parking to collection");
    if !exits.is_empty() {
        require_pairs(&workshop_tracks, &exits, "workshop to exit");
        require_pairs(&exits, &parking, "exit to parking");
    }
}

/// Soft check: inbound demand against collection capacity.
fn check_demand(params: &ScenarioParams, report: &mut ValidationReport) {
    let capacity: f64 = params
        .tracks
        .iter()
        .filter(|t| t.role == TrackRole::Collection)
        .map(|t| t.length_m * t.fill_factor)
        .sum();
    if capacity <= 0.0 {
        return;
    }
    let peak_train_length: f64 = params
        .trains
        .iter()
        .map(|t| t.wagons.iter().map(|w| w.length_m).sum::<f64>())
        .fold(0.0, f64::max);
    if peak_train_length > capacity * 0.8 {
        report.warn(
            "trains",
            format!(
                "longest train ({peak_train_length:.0}m) exceeds 80% of collection capacity ({capacity:.0}m)"
            ),
            "expect capacity rejections; add collection length or shorten trains",
        );
    }
}
