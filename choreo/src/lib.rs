//! Robot action choreography engine.
//!
//! Loads a named run from an XML action document, executes its commands
//! against a hardware abstraction, branches once on a classified target zone,
//! and contains every failure so the run never ends on a fault by itself.
//!
//! - **[`core`]**: Pure logic (data model, command resolution, fault
//!   classification). No I/O.
//! - **[`io`]**: Side-effecting seams (document loading, hardware, telemetry,
//!   operator control, run log, settings). Isolated behind traits so tests can
//!   substitute fakes.
//!
//! Orchestration modules ([`dispatch`], [`containment`], [`autonomous`],
//! [`check`]) combine the two to implement the CLI commands.

pub mod autonomous;
pub mod check;
pub mod containment;
pub mod core;
pub mod dispatch;
pub mod exit_codes;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
