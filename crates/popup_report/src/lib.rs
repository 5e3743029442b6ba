//! # PopUpSim Reporting
//!
//! KPI assembly and export for completed simulation runs: throughput,
//! utilisation, flow/waiting times, bottleneck heuristics, CSV event streams,
//! and optional SVG charts. Every figure is a deterministic function of the
//! recorded event streams and final world state.

pub mod charts;
pub mod export;
pub mod metrics;

pub use export::{write_outputs, ExportError, ExportOptions};
pub use metrics::{extract_metrics, Bottleneck, SimulationSummary};
