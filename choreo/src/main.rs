//! Robot action choreography runner.
//!
//! Validates action documents and executes a named run against simulated
//! hardware, with the operator console standing in for the driver station.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};

use choreo::autonomous::{AutonomousRequest, run_autonomous};
use choreo::check::check_document;
use choreo::containment::Containment;
use choreo::core::types::{Alliance, Zone};
use choreo::exit_codes;
use choreo::io::classifier::FixedZone;
use choreo::io::control::ConsoleControl;
use choreo::io::hardware::SimulatedHardware;
use choreo::io::settings::{RunnerSettings, load_settings, write_settings};
use choreo::io::telemetry::ConsoleTelemetry;
use choreo::logging;

const DEFAULT_SETTINGS: &str = "settings.toml";

#[derive(Parser)]
#[command(
    name = "choreo",
    version,
    about = "Robot action choreography runner"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load one run from an action document and print its shape.
    Check {
        /// Run-selector (`OpMode` id) to load.
        #[arg(long)]
        run: String,
        /// Action document (defaults to the one named in settings).
        #[arg(long)]
        document: Option<PathBuf>,
        #[arg(long, default_value = DEFAULT_SETTINGS)]
        settings: PathBuf,
        /// Print the loaded configuration as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Execute one run against simulated hardware.
    ///
    /// Press Enter to continue past a breakpoint; type `stop` to end the run.
    Run {
        #[arg(long)]
        run: String,
        #[arg(long, value_enum)]
        alliance: AllianceArg,
        /// Zone the classifier reports at the branch step.
        #[arg(long, value_enum, default_value_t = ZoneArg::Center)]
        zone: ZoneArg,
        #[arg(long, default_value = DEFAULT_SETTINGS)]
        settings: PathBuf,
        #[arg(long)]
        document: Option<PathBuf>,
        /// Length of the run period; a stop is requested when it ends.
        #[arg(long, default_value_t = 30)]
        max_run_secs: u64,
    },
    /// Write default settings.
    InitSettings {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
        #[arg(long, default_value = DEFAULT_SETTINGS)]
        settings: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum AllianceArg {
    Red,
    Blue,
    Unknown,
}

impl From<AllianceArg> for Alliance {
    fn from(arg: AllianceArg) -> Self {
        match arg {
            AllianceArg::Red => Alliance::Red,
            AllianceArg::Blue => Alliance::Blue,
            AllianceArg::Unknown => Alliance::Unknown,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ZoneArg {
    Left,
    Center,
    Right,
}

impl From<ZoneArg> for Zone {
    fn from(arg: ZoneArg) -> Self {
        match arg {
            ZoneArg::Left => Zone::Left,
            ZoneArg::Center => Zone::Center,
            ZoneArg::Right => Zone::Right,
        }
    }
}

fn main() {
    logging::init();
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Check {
            run,
            document,
            settings,
            json,
        } => cmd_check(&run, document, &settings, json),
        Command::Run {
            run,
            alliance,
            zone,
            settings,
            document,
            max_run_secs,
        } => {
            let mut settings = load_settings(&settings)?;
            if let Some(document) = document {
                settings.document_path = document;
            }
            let request = AutonomousRequest {
                run_selector: run,
                alliance: alliance.into(),
                settings,
            };
            Ok(cmd_run(&request, zone.into(), Duration::from_secs(max_run_secs)))
        }
        Command::InitSettings { force, settings } => cmd_init_settings(&settings, force),
    }
}

fn cmd_check(run: &str, document: Option<PathBuf>, settings: &Path, json: bool) -> Result<i32> {
    let document = match document {
        Some(document) => document,
        None => load_settings(settings)?.document_path,
    };
    let outcome = match check_document(&document, run) {
        Ok(outcome) => outcome,
        Err(err) => {
            eprintln!("{run}: {err}");
            return Ok(exit_codes::INVALID);
        }
    };
    if json {
        let payload = serde_json::to_string_pretty(&outcome).context("serialize check outcome")?;
        println!("{payload}");
        return Ok(exit_codes::OK);
    }

    let summary = &outcome.summary;
    println!("run: {}", summary.run_selector);
    println!("actions: {}", summary.actions);
    match &summary.branches {
        Some(branches) => {
            for (zone, steps) in branches {
                println!("branch {zone}: {steps}");
            }
        }
        None => println!("branch: none"),
    }
    if !summary.unsupported.is_empty() {
        println!("unsupported: {}", summary.unsupported.join(", "));
    }
    for problem in &summary.invalid {
        println!("invalid: {problem}");
    }
    Ok(exit_codes::OK)
}

fn cmd_run(request: &AutonomousRequest, zone: Zone, period: Duration) -> i32 {
    let mut hardware = SimulatedHardware::new([request.settings.drive.channel.clone()]);
    let control = ConsoleControl::spawn(period);
    let mut telemetry = ConsoleTelemetry::stdout();
    let mut classifier = FixedZone(zone);

    match run_autonomous(request, &mut hardware, &control, &mut telemetry, &mut classifier) {
        Containment::Completed => exit_codes::OK,
        Containment::Cancelled => exit_codes::CANCELLED,
        Containment::Held { fault, cycles } => {
            eprintln!(
                "{}: held after fault ({cycles} refreshes): {}",
                request.run_selector,
                fault.message().unwrap_or_default()
            );
            exit_codes::HELD
        }
    }
}

fn cmd_init_settings(path: &Path, force: bool) -> Result<i32> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    write_settings(path, &RunnerSettings::default())?;
    println!("wrote {}", path.display());
    Ok(exit_codes::OK)
}
