//! CSV export of event streams, the KPI summary, and per-subject metrics.
//!
//! Everything lands in the chosen output directory:
//! `wagon_events.csv`, `locomotive_events.csv`, `workshop_events.csv`,
//! `summary.csv`, `track_metrics.csv`, `workshop_metrics.csv`, and
//! (unless disabled) `charts/*.svg`.

use std::fs;
use std::path::Path;

use bevy_ecs::prelude::World;
use thiserror::Error;
use tracing::info;

use popup_core::clock::ms_to_minutes;
use popup_core::recorder::{EventCategory, EventRecorder};

use crate::charts;
use crate::metrics::SimulationSummary;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("output I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV write failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("chart rendering failed: {0}")]
    Chart(String),
}

#[derive(Debug, Clone, Copy)]
pub struct ExportOptions {
    /// Render the `charts/` directory. Disabled by `--no-charts`.
    pub charts: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self { charts: true }
    }
}

/// Write all run outputs into `output_dir` (created if missing).
pub fn write_outputs(
    world: &mut World,
    summary: &SimulationSummary,
    output_dir: &Path,
    options: ExportOptions,
) -> Result<(), ExportError> {
    fs::create_dir_all(output_dir)?;

    {
        let recorder = world.resource::<EventRecorder>();
        for (category, file_name) in [
            (EventCategory::Wagon, "wagon_events.csv"),
            (EventCategory::Locomotive, "locomotive_events.csv"),
            (EventCategory::Workshop, "workshop_events.csv"),
        ] {
            write_event_stream(recorder, category, &output_dir.join(file_name))?;
        }
    }

    write_summary(summary, &output_dir.join("summary.csv"))?;
    write_track_metrics(summary, &output_dir.join("track_metrics.csv"))?;
    write_workshop_metrics(summary, &output_dir.join("workshop_metrics.csv"))?;

    if options.charts {
        let charts_dir = output_dir.join("charts");
        fs::create_dir_all(&charts_dir)?;
        charts::render_all(world, summary, &charts_dir)
            .map_err(ExportError::Chart)?;
    }

    info!(path = %output_dir.display(), "run outputs written");
    Ok(())
}

fn write_event_stream(
    recorder: &EventRecorder,
    category: EventCategory,
    path: &Path,
) -> Result<(), ExportError> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(["time", "kind", "subject_id", "payload_json"])?;
    for event in recorder.events(category) {
        wtr.write_record([
            &format_minutes(event.time_ms),
            event.kind,
            &event.subject_id,
            &event.payload.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

fn write_summary(summary: &SimulationSummary, path: &Path) -> Result<(), ExportError> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(["key", "value"])?;
    let rows: Vec<(&str, String)> = vec![
        ("scenario_id", summary.scenario_id.clone()),
        ("duration_hours", format!("{:.3}", summary.duration_hours)),
        (
            "total_wagons_processed",
            summary.total_wagons_processed.to_string(),
        ),
        ("retrofitted", summary.retrofitted.to_string()),
        ("rejected", summary.rejected.to_string()),
        ("parked", summary.parked.to_string()),
        (
            "throughput_per_hour",
            format!("{:.4}", summary.throughput_per_hour),
        ),
        (
            "throughput_per_day",
            format!("{:.4}", summary.throughput_per_day),
        ),
        (
            "avg_flow_time_minutes",
            format!("{:.3}", summary.avg_flow_time_minutes),
        ),
        (
            "avg_waiting_time_minutes",
            format!("{:.3}", summary.avg_waiting_time_minutes),
        ),
        ("bottleneck_count", summary.bottlenecks.len().to_string()),
    ];
    for (key, value) in rows {
        wtr.write_record([key, &value])?;
    }
    for bottleneck in &summary.bottlenecks {
        wtr.write_record([
            &format!("bottleneck.{}.{}", bottleneck.kind, bottleneck.subject),
            &format!("severity {:.3}: {}", bottleneck.severity, bottleneck.detail),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

fn write_track_metrics(summary: &SimulationSummary, path: &Path) -> Result<(), ExportError> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record([
        "track_id",
        "role",
        "mean_occupancy_ratio",
        "congested_time_share",
        "final_wagon_count",
    ])?;
    for track in &summary.tracks {
        wtr.write_record([
            &track.id,
            &track.role,
            &format!("{:.4}", track.mean_occupancy_ratio),
            &format!("{:.4}", track.congested_time_share),
            &track.final_wagon_count.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

fn write_workshop_metrics(summary: &SimulationSummary, path: &Path) -> Result<(), ExportError> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(["workshop_id", "stations", "utilisation"])?;
    for ws in &summary.workshops {
        wtr.write_record([
            &ws.id,
            &ws.stations.to_string(),
            &format!("{:.4}", ws.utilisation),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Event times are reported in fractional minutes.
fn format_minutes(time_ms: u64) -> String {
    format!("{:.3}", ms_to_minutes(time_ms))
}
