//! SVG chart rendering for run reports.
//!
//! Three charts: cumulative retrofit throughput over time, per-resource
//! utilisation bars, and per-wagon waiting times. Rendering failures are
//! reported as strings; charts are presentation only and never affect KPIs.

use std::path::Path;

use bevy_ecs::prelude::World;
use plotlib::page::Page;
use plotlib::repr::{BarChart, Plot};
use plotlib::style::{BoxStyle, LineStyle, PointMarker, PointStyle};
use plotlib::view::{CategoricalView, ContinuousView};

use popup_core::clock::ms_to_minutes;
use popup_core::recorder::{EventCategory, EventRecorder};

use crate::metrics::SimulationSummary;

const LINE_COLOUR: &str = "#3355DD";
const BAR_COLOUR: &str = "#33AA77";
const POINT_COLOUR: &str = "#DD5533";

/// Render all charts into `charts_dir`.
pub fn render_all(
    world: &mut World,
    summary: &SimulationSummary,
    charts_dir: &Path,
) -> Result<(), String> {
    let recorder = world.resource::<EventRecorder>();
    render_throughput(recorder, &charts_dir.join("throughput.svg"))?;
    render_utilisation(summary, &charts_dir.join("utilisation.svg"))?;
    render_waiting_times(recorder, &charts_dir.join("waiting_time.svg"))?;
    Ok(())
}

/// Cumulative retrofitted wagons over simulation time (minutes).
fn render_throughput(recorder: &EventRecorder, path: &Path) -> Result<(), String> {
    let mut points: Vec<(f64, f64)> = vec![(0.0, 0.0)];
    let mut count = 0.0;
    for event in recorder.events(EventCategory::Wagon) {
        if event.kind == "retrofit_finished" {
            count += 1.0;
            points.push((ms_to_minutes(event.time_ms), count));
        }
    }

    let x_max = points.last().map(|(x, _)| *x).unwrap_or(0.0).max(1.0);
    let y_max = count.max(1.0);
    let plot = Plot::new(points).line_style(LineStyle::new().colour(LINE_COLOUR).width(2.0));
    let view = ContinuousView::new()
        .add(plot)
        .x_range(0.0, x_max)
        .y_range(0.0, y_max)
        .x_label("simulation time (minutes)")
        .y_label("wagons retrofitted");
    Page::single(&view)
        .save(path)
        .map_err(|e| e.to_string())
}

/// Locomotive and workshop utilisation side by side.
fn render_utilisation(summary: &SimulationSummary, path: &Path) -> Result<(), String> {
    let mut view = CategoricalView::new()
        .x_label("resource")
        .y_label("utilisation");
    for loco in &summary.locomotives {
        let bar = BarChart::new(loco.busy_ratio)
            .label(format!("loco {}", loco.id))
            .style(&BoxStyle::new().fill(BAR_COLOUR));
        view = view.add(bar);
    }
    for ws in &summary.workshops {
        let bar = BarChart::new(ws.utilisation)
            .label(format!("ws {}", ws.id))
            .style(&BoxStyle::new().fill(LINE_COLOUR));
        view = view.add(bar);
    }
    Page::single(&view)
        .save(path)
        .map_err(|e| e.to_string())
}

/// Per-wagon waiting time (minutes from retrofit-track placement to retrofit
/// start), in completion order.
fn render_waiting_times(recorder: &EventRecorder, path: &Path) -> Result<(), String> {
    let mut placed: std::collections::HashMap<&str, u64> = std::collections::HashMap::new();
    let mut points: Vec<(f64, f64)> = Vec::new();
    for event in recorder.events(EventCategory::Wagon) {
        match event.kind {
            "placed" => {
                if event.payload.get("role").and_then(|v| v.as_str()) == Some("RETROFIT") {
                    placed.entry(event.subject_id.as_str()).or_insert(event.time_ms);
                }
            }
            "retrofit_started" => {
                if let Some(at) = placed.get(event.subject_id.as_str()) {
                    let wait = ms_to_minutes(event.time_ms.saturating_sub(*at));
                    points.push((points.len() as f64 + 1.0, wait));
                }
            }
            _ => {}
        }
    }

    let x_max = (points.len() as f64 + 1.0).max(2.0);
    let y_max = points
        .iter()
        .map(|(_, y)| *y)
        .fold(0.0f64, f64::max)
        .max(1.0);
    let plot = Plot::new(points).point_style(
        PointStyle::new()
            .marker(PointMarker::Circle)
            .colour(POINT_COLOUR),
    );
    let view = ContinuousView::new()
        .add(plot)
        .x_range(0.0, x_max)
        .y_range(0.0, y_max)
        .x_label("wagon (retrofit order)")
        .y_label("waiting time (minutes)");
    Page::single(&view)
        .save(path)
        .map_err(|e| e.to_string())
}
