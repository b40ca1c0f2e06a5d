//! Command dispatcher: executes a run configuration step by step.
//!
//! The run is a small state machine:
//! `NotStarted -> Running -> {Completed, Aborted, Faulted}`.
//! Liveness is polled before every step (top-level and branch) and inside
//! timed drives. `SLEEP` and `BREAKPOINT` deliberately ignore liveness while
//! they block.

mod power_guard;

pub use power_guard::PowerGuard;

use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, instrument, warn};

use crate::core::action::{ActionStep, BRANCH_MARKER, Command, Direction};
use crate::core::errors::{Interrupted, RunError};
use crate::core::fault::DISPATCH_TAG;
use crate::core::run_config::RunConfiguration;
use crate::core::types::{Alliance, Zone};
use crate::io::classifier::ZoneClassifier;
use crate::io::control::OpModeControl;
use crate::io::hardware::{DriveChannels, Hardware};
use crate::io::run_log::RunLog;
use crate::io::settings::{DriveSettings, TimingSettings};
use crate::io::telemetry::Telemetry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    NotStarted,
    Running,
    Completed,
    /// Liveness was lost or the host interrupted the run. Not a fault.
    Aborted,
    Faulted,
}

/// Summary of a dispatcher run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub state: RunState,
    /// Commands that ran to completion, branch steps included.
    pub steps_executed: usize,
    /// Zone reported by the classifier, if the branch step was reached.
    pub zone: Option<Zone>,
}

/// Per-run state and handles owned by the dispatcher for the run's duration.
pub struct DispatchContext<'a> {
    /// Display tag for this run (the run-selector).
    pub tag: String,
    pub alliance: Alliance,
    pub control: &'a dyn OpModeControl,
    pub hardware: &'a mut dyn Hardware,
    pub drive: DriveChannels,
    pub telemetry: &'a mut dyn Telemetry,
    pub log: &'a mut RunLog,
    pub drive_settings: DriveSettings,
    pub timing: TimingSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stopped,
}

pub struct Dispatcher<'a> {
    ctx: DispatchContext<'a>,
    state: RunState,
    steps_executed: usize,
    zone: Option<Zone>,
}

impl<'a> Dispatcher<'a> {
    pub fn new(ctx: DispatchContext<'a>) -> Self {
        Self {
            ctx,
            state: RunState::NotStarted,
            steps_executed: 0,
            zone: None,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Execute `config.actions` in order, splicing in the classified branch
    /// at the branch step.
    #[instrument(skip_all, fields(run = %self.ctx.tag, alliance = %self.ctx.alliance))]
    pub fn run(
        &mut self,
        config: &RunConfiguration,
        classifier: &mut dyn ZoneClassifier,
    ) -> Result<RunReport, RunError> {
        self.ctx.log.info(DISPATCH_TAG, "At start");
        let banner = format!("OpMode: {}, Alliance: {}", self.ctx.tag, self.ctx.alliance);
        self.ctx.log.info(DISPATCH_TAG, &banner);

        if !self.ctx.control.is_active() {
            self.ctx.log.info(DISPATCH_TAG, "OpMode inactive at start; aborting run");
            self.state = RunState::Aborted;
            return Ok(self.report());
        }

        self.state = RunState::Running;
        let outcome = self.run_sequence(&config.actions, config, classifier);
        self.ctx.log.info(DISPATCH_TAG, "Exiting dispatcher");

        match outcome {
            Ok(Flow::Continue) => {
                self.state = RunState::Completed;
                self.ctx.telemetry.add_data(&self.ctx.tag, "COMPLETE");
                if let Err(err) = self.ctx.telemetry.update() {
                    warn!(err = %err, "failed to show completion marker");
                }
                Ok(self.report())
            }
            Ok(Flow::Stopped) => {
                self.state = RunState::Aborted;
                Ok(self.report())
            }
            Err(err @ RunError::Interrupted(_)) => {
                debug!("run interrupted; propagating");
                self.state = RunState::Aborted;
                Err(err)
            }
            Err(err) => {
                self.state = RunState::Faulted;
                Err(err)
            }
        }
    }

    fn report(&self) -> RunReport {
        RunReport {
            state: self.state,
            steps_executed: self.steps_executed,
            zone: self.zone,
        }
    }

    fn run_sequence(
        &mut self,
        steps: &[ActionStep],
        config: &RunConfiguration,
        classifier: &mut dyn ZoneClassifier,
    ) -> Result<Flow, RunError> {
        for step in steps {
            if !self.ctx.control.is_active() {
                debug!(step = %step.name, "liveness lost before step");
                return Ok(Flow::Stopped);
            }
            let command = Command::resolve(step)?;
            self.ctx.log.debug(
                DISPATCH_TAG,
                &format!("Executing command {}", step.name.to_ascii_uppercase()),
            );
            match command {
                Command::DriveByTime {
                    direction,
                    duration,
                } => {
                    let duration = match duration {
                        Some(duration) => duration,
                        None => self.default_drive_duration(step)?,
                    };
                    self.drive_by_time(direction, duration)?;
                }
                Command::Sleep(duration) => self.sleep(duration),
                Command::Breakpoint => self.wait_for_operator(),
                Command::ZoneChoice => {
                    self.steps_executed += 1;
                    if self.run_branch(config, classifier)? == Flow::Stopped {
                        return Ok(Flow::Stopped);
                    }
                    continue;
                }
            }
            self.steps_executed += 1;
        }
        Ok(Flow::Continue)
    }

    fn run_branch(
        &mut self,
        config: &RunConfiguration,
        classifier: &mut dyn ZoneClassifier,
    ) -> Result<Flow, RunError> {
        let table = config
            .branch_table
            .as_ref()
            .ok_or_else(|| RunError::MissingBranchTable(BRANCH_MARKER.to_string()))?;
        let zone = classifier.current_zone().map_err(|err| {
            if err.chain().any(|cause| cause.is::<Interrupted>()) {
                RunError::Interrupted(Interrupted)
            } else {
                RunError::ClassificationFailed(err)
            }
        })?;
        self.zone = Some(zone);
        let branch = table.get(zone);
        self.ctx.log.info(
            DISPATCH_TAG,
            &format!("Target zone {zone}: {} branch actions", branch.len()),
        );
        self.run_sequence(branch, config, classifier)
    }

    fn drive_by_time(&mut self, direction: Direction, duration: Duration) -> Result<(), RunError> {
        let ctx = &mut self.ctx;
        let power = direction.sign() * ctx.drive_settings.power;
        let poll = ctx.drive_settings.poll_interval();
        let label = match direction {
            Direction::Forward => "Left front forward",
            Direction::Reverse => "Left front in reverse",
        };

        ctx.telemetry.clear();
        let motor = PowerGuard::engage(&mut *ctx.hardware, ctx.drive.left_front, power)
            .map_err(RunError::from_device)?;
        let started = Instant::now();
        while ctx.control.is_active() && started.elapsed() < duration {
            let position = motor.read().map_err(RunError::from_device)?;
            ctx.telemetry.add_data("Driving", label);
            ctx.telemetry.add_data("Position", &format!("{position:.0}"));
            ctx.telemetry.update().map_err(RunError::from_device)?;
            ctx.telemetry.clear();
            if !poll.is_zero() {
                thread::sleep(poll);
            }
        }
        motor.release().map_err(RunError::from_device)
    }

    fn default_drive_duration(&self, step: &ActionStep) -> Result<Duration, RunError> {
        let drive = &self.ctx.drive_settings;
        drive.default_duration().map_err(|_| RunError::InvalidValue {
            command: step.name.to_ascii_uppercase(),
            attribute: "default_duration_secs".to_string(),
            value: drive.default_duration_secs.to_string(),
        })
    }

    fn sleep(&mut self, duration: Duration) {
        self.ctx.log.debug(
            DISPATCH_TAG,
            &format!("Pause by {} milliseconds", duration.as_millis()),
        );
        // Not cancellable: liveness is checked again only after the pause.
        thread::sleep(duration);
    }

    fn wait_for_operator(&mut self) {
        self.ctx.log.info(DISPATCH_TAG, "Breakpoint: waiting for operator");
        let poll = self.ctx.timing.breakpoint_poll();
        while !self.ctx.control.operator_signal() {
            thread::sleep(poll);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::hardware::{SimulatedHardware, initialize_drive};
    use crate::test_support::{
        FailingTelemetry, RecordingTelemetry, ScriptedClassifier, ScriptedControl, branch_config,
        sleep_step,
    };
    use anyhow::anyhow;
    use std::panic::{AssertUnwindSafe, catch_unwind};

    struct Rig {
        hardware: SimulatedHardware,
        drive: DriveChannels,
        log: RunLog,
    }

    impl Rig {
        fn new() -> Self {
            let mut hardware = SimulatedHardware::new(["lf"]);
            let drive = initialize_drive(&mut hardware, &DriveSettings::default()).expect("init");
            Self {
                hardware,
                drive,
                log: RunLog::detached(),
            }
        }

        fn dispatcher<'a>(
            &'a mut self,
            control: &'a dyn OpModeControl,
            telemetry: &'a mut dyn Telemetry,
        ) -> Dispatcher<'a> {
            Dispatcher::new(DispatchContext {
                tag: "TEST".to_string(),
                alliance: Alliance::Red,
                control,
                hardware: &mut self.hardware,
                drive: self.drive,
                telemetry,
                log: &mut self.log,
                drive_settings: DriveSettings {
                    poll_interval_ms: 1,
                    ..DriveSettings::default()
                },
                timing: TimingSettings::default(),
            })
        }

        fn power(&self) -> f64 {
            self.hardware.power(self.drive.left_front)
        }
    }

    fn drive_step(name: &str, seconds: &str) -> ActionStep {
        ActionStep::new(name).with_attribute("seconds", seconds)
    }

    #[test]
    fn inactive_at_start_aborts_without_error() {
        let mut rig = Rig::new();
        let control = ScriptedControl::active_for(0);
        let mut telemetry = RecordingTelemetry::default();
        let config = RunConfiguration::with_actions(vec![drive_step("FORWARD_BY_TIME", "1")]);

        let mut dispatcher = rig.dispatcher(&control, &mut telemetry);
        let report = dispatcher
            .run(&config, &mut ScriptedClassifier::zone(Zone::Left))
            .expect("run");
        assert_eq!(report.state, RunState::Aborted);
        assert_eq!(report.steps_executed, 0);
        drop(dispatcher);
        assert_eq!(rig.hardware.power_log().len(), 1, "only the init zeroing");
    }

    #[test]
    fn liveness_loss_before_step_k_runs_exactly_k_steps() {
        let steps: Vec<ActionStep> = (0..5).map(|_| sleep_step(0)).collect();
        let config = RunConfiguration::with_actions(steps);
        for k in 0..5 {
            let mut rig = Rig::new();
            // One poll before the run plus one before each step.
            let control = ScriptedControl::active_for(k + 1);
            let mut telemetry = RecordingTelemetry::default();
            let mut dispatcher = rig.dispatcher(&control, &mut telemetry);
            let report = dispatcher
                .run(&config, &mut ScriptedClassifier::zone(Zone::Left))
                .expect("run");
            assert_eq!(report.steps_executed, k, "k = {k}");
            assert_eq!(report.state, RunState::Aborted, "k = {k}");
            assert_eq!(control.active_polls(), k + 2, "k = {k}");
        }
    }

    #[test]
    fn completed_run_shows_complete_marker() {
        let mut rig = Rig::new();
        let control = ScriptedControl::always_active();
        let mut telemetry = RecordingTelemetry::default();
        let config = RunConfiguration::with_actions(vec![sleep_step(0), sleep_step(0)]);

        let report = rig
            .dispatcher(&control, &mut telemetry)
            .run(&config, &mut ScriptedClassifier::zone(Zone::Left))
            .expect("run");
        assert_eq!(report.state, RunState::Completed);
        assert_eq!(report.steps_executed, 2);
        assert!(telemetry.has_item("TEST", "COMPLETE"));
    }

    #[test]
    fn timed_drive_zeroes_power_after_completion() {
        let mut rig = Rig::new();
        let control = ScriptedControl::always_active();
        let mut telemetry = RecordingTelemetry::default();
        let config =
            RunConfiguration::with_actions(vec![drive_step("REVERSE_BY_TIME", "0.02")]);

        let report = rig
            .dispatcher(&control, &mut telemetry)
            .run(&config, &mut ScriptedClassifier::zone(Zone::Left))
            .expect("run");
        assert_eq!(report.state, RunState::Completed);
        assert_eq!(rig.power(), 0.0);
        let lf = rig.drive.left_front;
        assert!(rig.hardware.power_log().contains(&(lf, -0.5)));
        assert!(telemetry.has_item("Driving", "Left front in reverse"));
    }

    #[test]
    fn timed_drive_zeroes_power_when_liveness_is_lost() {
        let mut rig = Rig::new();
        // start check, step check, three loop iterations
        let control = ScriptedControl::active_for(5);
        let mut telemetry = RecordingTelemetry::default();
        let config = RunConfiguration::with_actions(vec![
            drive_step("FORWARD_BY_TIME", "30"),
            sleep_step(0),
        ]);

        let started = Instant::now();
        let report = rig
            .dispatcher(&control, &mut telemetry)
            .run(&config, &mut ScriptedClassifier::zone(Zone::Left))
            .expect("run");
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(report.state, RunState::Aborted);
        assert_eq!(rig.power(), 0.0);
        assert_eq!(telemetry.updates(), 3);
    }

    #[test]
    fn timed_drive_zeroes_power_when_loop_fails() {
        let mut rig = Rig::new();
        let control = ScriptedControl::always_active();
        let mut telemetry = FailingTelemetry::after_updates(2);
        let config = RunConfiguration::with_actions(vec![drive_step("FORWARD_BY_TIME", "30")]);

        let mut dispatcher = rig.dispatcher(&control, &mut telemetry);
        let err = dispatcher
            .run(&config, &mut ScriptedClassifier::zone(Zone::Left))
            .unwrap_err();
        assert!(matches!(err, RunError::Device(_)));
        assert_eq!(dispatcher.state(), RunState::Faulted);
        drop(dispatcher);
        assert_eq!(rig.power(), 0.0);
    }

    #[test]
    fn timed_drive_zeroes_power_when_loop_panics() {
        let mut rig = Rig::new();
        let control = ScriptedControl::always_active();
        let mut telemetry = FailingTelemetry::panicking();
        let config = RunConfiguration::with_actions(vec![drive_step("FORWARD_BY_TIME", "30")]);

        let result = catch_unwind(AssertUnwindSafe(|| {
            rig.dispatcher(&control, &mut telemetry)
                .run(&config, &mut ScriptedClassifier::zone(Zone::Left))
        }));
        assert!(result.is_err());
        assert_eq!(rig.power(), 0.0);
    }

    #[test]
    fn center_zone_with_empty_branch_runs_no_branch_commands() {
        let mut rig = Rig::new();
        let control = ScriptedControl::always_active();
        let mut telemetry = RecordingTelemetry::default();
        let config = branch_config(
            vec![sleep_step(100)],
            vec![],
            vec![sleep_step(200)],
            vec![sleep_step(0)],
        );
        let mut classifier = ScriptedClassifier::zone(Zone::Center);

        let started = Instant::now();
        let report = rig
            .dispatcher(&control, &mut telemetry)
            .run(&config, &mut classifier)
            .expect("run");
        assert!(started.elapsed() < Duration::from_millis(100));
        assert_eq!(report.state, RunState::Completed);
        assert_eq!(report.zone, Some(Zone::Center));
        // branch marker + trailing sleep
        assert_eq!(report.steps_executed, 2);
        assert_eq!(classifier.calls(), 1);
    }

    #[test]
    fn selected_branch_runs_before_remaining_actions() {
        let mut rig = Rig::new();
        let control = ScriptedControl::always_active();
        let mut telemetry = RecordingTelemetry::default();
        let config = branch_config(
            vec![ActionStep::new("JUMP")],
            vec![],
            vec![sleep_step(0), sleep_step(0)],
            vec![sleep_step(0)],
        );

        let report = rig
            .dispatcher(&control, &mut telemetry)
            .run(&config, &mut ScriptedClassifier::zone(Zone::Right))
            .expect("run");
        assert_eq!(report.steps_executed, 4);
    }

    #[test]
    fn unsupported_command_faults_the_run() {
        let mut rig = Rig::new();
        let control = ScriptedControl::always_active();
        let mut telemetry = RecordingTelemetry::default();
        let config = RunConfiguration::with_actions(vec![
            sleep_step(0),
            ActionStep::new("UNKNOWN_CMD"),
            sleep_step(0),
        ]);

        let mut dispatcher = rig.dispatcher(&control, &mut telemetry);
        let err = dispatcher
            .run(&config, &mut ScriptedClassifier::zone(Zone::Left))
            .unwrap_err();
        assert!(matches!(err, RunError::UnsupportedCommand(ref name) if name == "UNKNOWN_CMD"));
        assert_eq!(dispatcher.state(), RunState::Faulted);
        drop(dispatcher);
        assert!(!telemetry.has_item("TEST", "COMPLETE"));
    }

    #[test]
    fn classifier_failure_faults_the_run() {
        let mut rig = Rig::new();
        let control = ScriptedControl::always_active();
        let mut telemetry = RecordingTelemetry::default();
        let config = branch_config(vec![], vec![], vec![], vec![]);

        let mut dispatcher = rig.dispatcher(&control, &mut telemetry);
        let err = dispatcher
            .run(
                &config,
                &mut ScriptedClassifier::failing(anyhow!("camera not ready")),
            )
            .unwrap_err();
        assert!(matches!(err, RunError::ClassificationFailed(_)));
        assert_eq!(dispatcher.state(), RunState::Faulted);
    }

    #[test]
    fn interrupted_classifier_aborts_instead_of_faulting() {
        let mut rig = Rig::new();
        let control = ScriptedControl::always_active();
        let mut telemetry = RecordingTelemetry::default();
        let config = branch_config(vec![], vec![], vec![], vec![]);

        let mut dispatcher = rig.dispatcher(&control, &mut telemetry);
        let err = dispatcher
            .run(
                &config,
                &mut ScriptedClassifier::failing(anyhow::Error::new(Interrupted)),
            )
            .unwrap_err();
        assert!(matches!(err, RunError::Interrupted(_)));
        assert_eq!(dispatcher.state(), RunState::Aborted);
    }

    #[test]
    fn branch_marker_without_table_is_an_error() {
        let mut rig = Rig::new();
        let control = ScriptedControl::always_active();
        let mut telemetry = RecordingTelemetry::default();
        let config = RunConfiguration::with_actions(vec![ActionStep::new(BRANCH_MARKER)]);

        let err = rig
            .dispatcher(&control, &mut telemetry)
            .run(&config, &mut ScriptedClassifier::zone(Zone::Left))
            .unwrap_err();
        assert!(matches!(err, RunError::MissingBranchTable(_)));
    }

    /// Known limitation: a SLEEP already in progress is not cut short when
    /// liveness drops; the run stops at the next step boundary.
    #[test]
    fn sleep_is_not_cancelled_mid_wait() {
        let mut rig = Rig::new();
        let control = ScriptedControl::active_for(2);
        let mut telemetry = RecordingTelemetry::default();
        let config = RunConfiguration::with_actions(vec![sleep_step(30), sleep_step(0)]);

        let started = Instant::now();
        let report = rig
            .dispatcher(&control, &mut telemetry)
            .run(&config, &mut ScriptedClassifier::zone(Zone::Left))
            .expect("run");
        assert!(started.elapsed() >= Duration::from_millis(30));
        assert_eq!(report.steps_executed, 1);
        assert_eq!(report.state, RunState::Aborted);
    }

    /// Known limitation: BREAKPOINT waits for the operator even after
    /// liveness is lost.
    #[test]
    fn breakpoint_waits_for_operator_signal_regardless_of_liveness() {
        let mut rig = Rig::new();
        let control = ScriptedControl::active_for(2).with_signal_after(3);
        let mut telemetry = RecordingTelemetry::default();
        let config = RunConfiguration::with_actions(vec![ActionStep::new("breakpoint")]);

        let report = rig
            .dispatcher(&control, &mut telemetry)
            .run(&config, &mut ScriptedClassifier::zone(Zone::Left))
            .expect("run");
        assert_eq!(control.signal_polls(), 4);
        assert_eq!(report.steps_executed, 1);
        assert_eq!(report.state, RunState::Completed);
    }

    #[test]
    fn unrepresentable_default_drive_duration_faults_instead_of_panicking() {
        let mut rig = Rig::new();
        let control = ScriptedControl::always_active();
        let mut telemetry = RecordingTelemetry::default();
        let config = RunConfiguration::with_actions(vec![ActionStep::new("FORWARD_BY_TIME")]);

        let mut dispatcher = Dispatcher::new(DispatchContext {
            tag: "TEST".to_string(),
            alliance: Alliance::Red,
            control: &control,
            hardware: &mut rig.hardware,
            drive: rig.drive,
            telemetry: &mut telemetry,
            log: &mut rig.log,
            drive_settings: DriveSettings {
                default_duration_secs: 1e30,
                ..DriveSettings::default()
            },
            timing: TimingSettings::default(),
        });
        let err = dispatcher
            .run(&config, &mut ScriptedClassifier::zone(Zone::Left))
            .unwrap_err();
        assert!(matches!(
            err,
            RunError::InvalidValue { ref attribute, .. } if attribute == "default_duration_secs"
        ));
        assert_eq!(dispatcher.state(), RunState::Faulted);
        drop(dispatcher);
        assert_eq!(rig.power(), 0.0);
    }

    #[test]
    fn invalid_sleep_value_faults_the_run() {
        let mut rig = Rig::new();
        let control = ScriptedControl::always_active();
        let mut telemetry = RecordingTelemetry::default();
        let config = RunConfiguration::with_actions(vec![
            ActionStep::new("SLEEP").with_attribute("ms", "a while"),
        ]);

        let err = rig
            .dispatcher(&control, &mut telemetry)
            .run(&config, &mut ScriptedClassifier::zone(Zone::Left))
            .unwrap_err();
        assert!(matches!(err, RunError::InvalidValue { .. }));
    }
}
