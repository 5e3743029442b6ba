//! Scenario model: the validated, immutable description of one simulation.
//!
//! A scenario is loaded once from a directory of JSON/CSV files
//! ([`files::load_scenario`]), checked by [`validate::validate`], and then
//! turned into a populated ECS world by [`build::build_scenario`]. After
//! that, nothing reads the files again — the world is the single source of
//! truth for the run.

use bevy_ecs::prelude::Resource;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clock::minutes_to_ms;
use crate::tracks::{SelectionStrategy, TrackRole};

pub mod build;
pub mod files;
pub mod validate;

pub use build::build_scenario;
pub use files::load_scenario;
pub use validate::{validate, ValidationIssue, ValidationReport};

/// What a locomotive does after delivering a rake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LocoDeliveryStrategy {
    /// Run back to the parking track; the pool gets the locomotive on arrival.
    ReturnToParking,
    /// Release in place at the delivery track.
    StayAtWorkshop,
}

/// Fallback traversal time for adjacencies the routes file leaves untimed.
pub const DEFAULT_TRACK_CHANGE_MINUTES: f64 = 2.0;

/// Process durations in fractional minutes, as loaded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProcessTimesSpec {
    pub coupling_time: f64,
    pub decoupling_time: f64,
    pub retrofit_time_per_wagon: f64,
    pub train_preparation_time: f64,
    /// Traversal time for topology adjacencies without an explicit route
    /// entry.
    #[serde(default = "default_track_change_time")]
    pub track_change_time: f64,
}

fn default_track_change_time() -> f64 {
    DEFAULT_TRACK_CHANGE_MINUTES
}

/// Process durations in simulation milliseconds (what the systems consume).
#[derive(Debug, Clone, Copy, Resource)]
pub struct ProcessTimes {
    pub coupling_ms: u64,
    pub decoupling_ms: u64,
    pub retrofit_ms: u64,
    pub train_preparation_ms: u64,
}

impl From<ProcessTimesSpec> for ProcessTimes {
    fn from(spec: ProcessTimesSpec) -> Self {
        Self {
            coupling_ms: minutes_to_ms(spec.coupling_time),
            decoupling_ms: minutes_to_ms(spec.decoupling_time),
            retrofit_ms: minutes_to_ms(spec.retrofit_time_per_wagon),
            train_preparation_ms: minutes_to_ms(spec.train_preparation_time),
        }
    }
}

/// The configured selection policies, inserted as one resource.
#[derive(Debug, Clone, Copy, Resource)]
pub struct SelectionPolicies {
    pub collection: SelectionStrategy,
    pub retrofit: SelectionStrategy,
    pub loco_delivery: LocoDeliveryStrategy,
}

/// Simulation end time in ms. The runner stops once the next event would be
/// at or past this timestamp.
#[derive(Debug, Clone, Copy, Resource)]
pub struct SimulationEndTimeMs(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub struct TrackSpec {
    pub id: String,
    pub role: TrackRole,
    pub length_m: f64,
    pub fill_factor: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkshopSpec {
    pub id: String,
    pub name: Option<String>,
    pub track_id: String,
    pub retrofit_stations: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocomotiveSpec {
    pub id: String,
    /// Starting track; defaults to the first parking track.
    pub track_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WagonSpec {
    pub id: String,
    pub length_m: f64,
    pub needs_retrofit: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainSpec {
    pub id: String,
    /// Arrival offset from scenario start, in ms.
    pub arrival_ms: u64,
    pub wagons: Vec<WagonSpec>,
}

/// One timed connection between two tracks.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeSpec {
    pub from: String,
    pub to: String,
    pub time_ms: u64,
    /// Explicit reverse-direction time when the routes file declares one.
    pub reverse_time_ms: Option<u64>,
}

/// The immutable root of a run. Mutation after validation is forbidden; the
/// simulation reads it only while building the world.
#[derive(Debug, Clone)]
pub struct ScenarioParams {
    pub scenario_id: String,
    /// Real-world ms of simulation time 0 (`start_date`).
    pub epoch_ms: i64,
    /// `end_date - start_date` in ms.
    pub duration_ms: u64,
    pub seed: u64,
    pub track_selection_strategy: SelectionStrategy,
    pub retrofit_selection_strategy: SelectionStrategy,
    pub loco_delivery_strategy: LocoDeliveryStrategy,
    pub tracks: Vec<TrackSpec>,
    pub workshops: Vec<WorkshopSpec>,
    pub locomotives: Vec<LocomotiveSpec>,
    pub trains: Vec<TrainSpec>,
    pub edges: Vec<EdgeSpec>,
    pub process_times: ProcessTimesSpec,
}

impl ScenarioParams {
    /// Total inbound wagon count across all trains.
    pub fn wagon_count(&self) -> usize {
        self.trains.iter().map(|t| t.wagons.len()).sum()
    }

    pub fn duration_hours(&self) -> f64 {
        self.duration_ms as f64 / (60.0 * 60.0 * 1000.0)
    }
}

/// Loading and validation failures, split so the CLI can map them to the
/// right exit codes.
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },
    #[error("{0}")]
    Validation(ValidationReport),
}
