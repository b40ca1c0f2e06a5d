//! Deterministic, pure logic shared by the choreography engine.
//!
//! Core modules must be free of I/O side effects. They define the document
//! vocabulary, the run configuration model, the command set and the error
//! taxonomy, all suitable for tests without hardware.

pub mod action;
pub mod errors;
pub mod fault;
pub mod run_config;
pub mod types;
