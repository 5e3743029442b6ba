use std::process::{exit, Command, ExitStatus};

use clap::{Parser, Subcommand, ValueEnum};

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "xtask",
    about = "Task runner for the PopUpSim workspace",
    long_about = "A unified CLI for running the demo scenario and CI checks\n\
                  in the PopUpSim workspace."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the small demo scenario and write reports to target/demo-output
    Run {
        /// Scenario directory to simulate
        #[arg(long, default_value = "demos/small")]
        scenario: String,
        /// Output directory for reports
        #[arg(long, default_value = "target/demo-output")]
        output: String,
    },
    /// Run CI checks (fmt, clippy, tests)
    Ci {
        /// Job to run
        #[arg(value_enum, default_value_t = CiJob::Check)]
        job: CiJob,
    },
}

#[derive(Clone, ValueEnum)]
enum CiJob {
    /// Formatting, clippy, and tests
    Check,
    /// Tests only
    Test,
}

// ── Helpers ────────────────────────────────────────────────────────

fn run(program: &str, args: &[&str]) -> ExitStatus {
    println!("> {} {}", program, args.join(" "));
    Command::new(program)
        .args(args)
        .status()
        .unwrap_or_else(|e| panic!("failed to spawn {program}: {e}"))
}

fn check(status: ExitStatus) {
    if !status.success() {
        exit(status.code().unwrap_or(1));
    }
}

fn main() {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run { scenario, output } => {
            check(run(
                "cargo",
                &[
                    "run",
                    "--release",
                    "-p",
                    "popup_cli",
                    "--",
                    "--scenario-path",
                    &scenario,
                    "--output-path",
                    &output,
                ],
            ));
        }
        Commands::Ci { job } => match job {
            CiJob::Check => {
                check(run("cargo", &["fmt", "--all", "--check"]));
                check(run(
                    "cargo",
                    &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"],
                ));
                check(run("cargo", &["test", "--workspace"]));
            }
            CiJob::Test => {
                check(run("cargo", &["test", "--workspace"]));
            }
        },
    }
}
