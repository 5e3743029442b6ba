//! `popupsim` — run a Pop-Up workshop scenario end to end.
//!
//! Loads and validates a scenario directory, runs the simulation to
//! completion (or the end of the window), and writes KPI reports, event
//! streams, and charts to the output directory.
//!
//! Exit codes: 0 success, 1 validation failure, 2 I/O failure, 3 runtime
//! assertion.

use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::process::ExitCode;

use bevy_ecs::prelude::World;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use popup_core::clock::{ms_to_minutes, SimulationClock, ONE_MIN_MS};
use popup_core::profiling::EventMetrics;
use popup_core::runner::{initialize_simulation, run_until_empty_with_hook, simulation_schedule};
use popup_core::scenario::{build_scenario, load_scenario, validate, ScenarioError};
use popup_report::{extract_metrics, write_outputs, ExportOptions};

/// Hard cap on event count; a pipeline bug looping at one instant would
/// otherwise never terminate.
const MAX_STEPS: usize = 50_000_000;

const EXIT_VALIDATION: u8 = 1;
const EXIT_IO: u8 = 2;
const EXIT_RUNTIME: u8 = 3;

#[derive(Parser)]
#[command(
    name = "popupsim",
    about = "Discrete-event simulator for Pop-Up DAC retrofit workshops",
    long_about = "Simulates the flow of freight wagons through a Pop-Up retrofit\n\
                  workshop: collection, retrofit staging, workshop stations, and\n\
                  parking, with a shared locomotive fleet moving every rake."
)]
struct Cli {
    /// Directory containing scenario.json and the files it references
    #[arg(long)]
    scenario_path: PathBuf,
    /// Directory for CSV reports and charts (created if missing)
    #[arg(long)]
    output_path: PathBuf,
    /// Log filter, e.g. "info" or "popup_core=debug"
    #[arg(long, default_value = "info")]
    log_level: String,
    /// Skip rendering the charts/ directory
    #[arg(long)]
    no_charts: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let params = match load_scenario(&cli.scenario_path) {
        Ok(params) => params,
        Err(err @ ScenarioError::Io { .. }) => {
            error!("{err}");
            return ExitCode::from(EXIT_IO);
        }
        Err(err) => {
            error!("{err}");
            return ExitCode::from(EXIT_VALIDATION);
        }
    };

    let report = validate(&params);
    for warning in &report.warnings {
        warn!("{warning}");
    }
    if report.has_errors() {
        error!("scenario '{}' failed validation:\n{report}", params.scenario_id);
        return ExitCode::from(EXIT_VALIDATION);
    }

    info!(
        scenario = %params.scenario_id,
        trains = params.trains.len(),
        wagons = params.wagon_count(),
        locomotives = params.locomotives.len(),
        "scenario loaded"
    );

    let mut world = World::new();
    build_scenario(&mut world, &params);
    initialize_simulation(&mut world);
    let mut schedule = simulation_schedule();

    let progress = ProgressBar::new(params.duration_ms / ONE_MIN_MS);
    progress.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} sim minutes ({elapsed})")
            .expect("static template is valid"),
    );

    let run_result = panic::catch_unwind(AssertUnwindSafe(|| {
        run_until_empty_with_hook(&mut world, &mut schedule, MAX_STEPS, |world, _event| {
            if let Some(clock) = world.get_resource::<SimulationClock>() {
                progress.set_position(clock.now() / ONE_MIN_MS);
            }
        })
    }));
    progress.finish_and_clear();

    let steps = match run_result {
        Ok(steps) => steps,
        Err(_) => {
            // The panic hook already printed the invariant diagnostic.
            error!("simulation aborted on a runtime invariant violation");
            return ExitCode::from(EXIT_RUNTIME);
        }
    };

    let final_minutes = world
        .get_resource::<SimulationClock>()
        .map(|c| c.now())
        .map(ms_to_minutes)
        .unwrap_or(0.0);
    info!(steps, final_minutes, "simulation finished");
    if let Some(metrics) = world.get_resource::<EventMetrics>() {
        for (kind, count) in metrics.sorted_counts() {
            info!(kind, count, "event volume");
        }
    }

    let summary = extract_metrics(&mut world, &params.scenario_id);
    info!(
        retrofitted = summary.retrofitted,
        rejected = summary.rejected,
        throughput_per_hour = format!("{:.3}", summary.throughput_per_hour),
        avg_flow_minutes = format!("{:.1}", summary.avg_flow_time_minutes),
        "run summary"
    );
    for bottleneck in &summary.bottlenecks {
        warn!(
            subject = %bottleneck.subject,
            kind = %bottleneck.kind,
            severity = format!("{:.3}", bottleneck.severity),
            "bottleneck: {}",
            bottleneck.detail
        );
    }

    let options = ExportOptions {
        charts: !cli.no_charts,
    };
    if let Err(err) = write_outputs(&mut world, &summary, &cli.output_path, options) {
        error!("{err}");
        return ExitCode::from(EXIT_IO);
    }

    ExitCode::SUCCESS
}
