//! # PopUpSim Core
//!
//! A discrete-event simulation engine for Pop-Up retrofit workshops: freight
//! wagons arrive by train, are collected, staged, fitted with digital
//! automatic couplers at workshop stations, and parked, moved throughout by a
//! shared locomotive fleet.
//!
//! ## Overview
//!
//! This crate provides the core simulation engine, including:
//!
//! - **Event Scheduling**: Millisecond-precision discrete event system
//! - **ECS Framework**: Entity Component System for wagon/locomotive state
//! - **Capacity Managers**: Length-based track occupancy and workshop stations
//! - **Routing**: Shortest-time paths over the yard topology, cached
//! - **Scenario Loading**: JSON/CSV scenario directories with validation
//! - **Event Recording**: Append-only per-category streams for KPI reports
//!
//! ## Key Concepts
//!
//! - **Discrete Events**: All simulation progress happens through scheduled
//!   events; same-time events run in insertion order
//! - **Targeted Events**: Events address specific entities (trains, wagons,
//!   transfers) or registry slots (tracks, workshops)
//! - **Deterministic**: Seeded RNG and FIFO resource pools ensure bit-identical
//!   event streams for identical inputs
//!
//! ## Example
//!
//! ```rust,no_run
//! use bevy_ecs::prelude::World;
//! use popup_core::scenario::{build_scenario, load_scenario, validate};
//! use popup_core::runner::{initialize_simulation, run_until_empty, simulation_schedule};
//!
//! let params = load_scenario(std::path::Path::new("scenario_dir")).unwrap();
//! let report = validate(&params);
//! assert!(!report.has_errors(), "{report}");
//!
//! let mut world = World::new();
//! build_scenario(&mut world, &params);
//! initialize_simulation(&mut world);
//!
//! let mut schedule = simulation_schedule();
//! let steps = run_until_empty(&mut world, &mut schedule, 1_000_000);
//! ```

pub mod clock;
pub mod ecs;
pub mod locos;
pub mod profiling;
pub mod queues;
pub mod recorder;
pub mod rng;
pub mod runner;
pub mod scenario;
pub mod systems;
pub mod topology;
pub mod tracks;
pub mod workshops;

#[cfg(test)]
pub mod test_helpers;
