//! Orchestration for one autonomous run.
//!
//! Order of operations: open the run log, check the alliance, load the run
//! configuration, apply its logging threshold, prepare the drive, wait for
//! start, then dispatch. The whole sequence runs inside [`FaultContainment`],
//! so this function never returns an error.

use anyhow::{Context, Result};
use tracing::{info, instrument, warn};

use crate::containment::{Containment, FaultContainment};
use crate::core::fault::TaggedFault;
use crate::core::types::Alliance;
use crate::dispatch::{DispatchContext, Dispatcher};
use crate::io::classifier::ZoneClassifier;
use crate::io::control::OpModeControl;
use crate::io::document::parse_document;
use crate::io::hardware::{Hardware, initialize_drive};
use crate::io::run_log::RunLog;
use crate::io::settings::RunnerSettings;
use crate::io::telemetry::Telemetry;

/// Tag for start-up failures outside parsing and dispatch.
pub const AUTONOMOUS_TAG: &str = "Autonomous";

#[derive(Debug, Clone)]
pub struct AutonomousRequest {
    /// Run-selector: the `id` of the `OpMode` block to execute.
    pub run_selector: String,
    pub alliance: Alliance,
    pub settings: RunnerSettings,
}

/// Run one autonomous sequence end to end.
#[instrument(skip_all, fields(run = %request.run_selector, alliance = %request.alliance))]
pub fn run_autonomous(
    request: &AutonomousRequest,
    hardware: &mut dyn Hardware,
    control: &dyn OpModeControl,
    telemetry: &mut dyn Telemetry,
    classifier: &mut dyn ZoneClassifier,
) -> Containment {
    let log = match RunLog::open(&request.settings.log_dir, &request.run_selector) {
        Ok(log) => log,
        Err(err) => {
            warn!(err = %err, "run log unavailable; logging to tracing only");
            RunLog::detached()
        }
    };

    let containment = FaultContainment::new(
        request.run_selector.as_str(),
        control,
        telemetry,
        log,
        request.settings.timing.hold_interval(),
    );
    let outcome = containment.guard(|telemetry, log| {
        run_guarded(request, hardware, control, telemetry, log, classifier)
    });
    info!(outcome = ?outcome, "autonomous run finished");
    outcome
}

fn run_guarded(
    request: &AutonomousRequest,
    hardware: &mut dyn Hardware,
    control: &dyn OpModeControl,
    telemetry: &mut dyn Telemetry,
    log: &mut RunLog,
    classifier: &mut dyn ZoneClassifier,
) -> Result<()> {
    log.info(AUTONOMOUS_TAG, "Initializing");
    if request.alliance == Alliance::Unknown {
        return Err(TaggedFault::new(AUTONOMOUS_TAG, "Alliance is UNKNOWN").into());
    }

    let document = &request.settings.document_path;
    let config = parse_document(document, &request.run_selector)
        .with_context(|| format!("load run '{}'", request.run_selector))?;
    log.set_threshold(config.logging_threshold);
    log.debug(
        AUTONOMOUS_TAG,
        &format!(
            "Loaded {} actions from {}",
            config.actions.len(),
            document.display()
        ),
    );

    let drive = initialize_drive(hardware, &request.settings.drive)?;

    telemetry.add_data(AUTONOMOUS_TAG, "Waiting for start ...");
    telemetry.update()?;
    log.info(AUTONOMOUS_TAG, "Waiting for start ...");
    control.wait_for_start()?;

    telemetry.add_data(AUTONOMOUS_TAG, "Running ...");
    telemetry.update()?;
    log.info(AUTONOMOUS_TAG, "Running ...");

    let mut dispatcher = Dispatcher::new(DispatchContext {
        tag: request.run_selector.clone(),
        alliance: request.alliance,
        control,
        hardware,
        drive,
        telemetry,
        log,
        drive_settings: request.settings.drive.clone(),
        timing: request.settings.timing.clone(),
    });
    let report = dispatcher.run(&config, classifier)?;
    info!(
        state = ?report.state,
        steps = report.steps_executed,
        zone = ?report.zone,
        "dispatch finished"
    );
    Ok(())
}
