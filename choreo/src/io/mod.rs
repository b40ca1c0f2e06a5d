//! I/O seams for the choreography engine.

pub mod classifier;
pub mod control;
pub mod document;
pub mod hardware;
pub mod roi;
pub mod run_log;
pub mod settings;
pub mod telemetry;
