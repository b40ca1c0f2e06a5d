//! Stable exit codes for choreo CLI commands.

/// Command succeeded, or the run completed.
pub const OK: i32 = 0;
/// Invalid document, settings or arguments, or another command error.
pub const INVALID: i32 = 1;
/// `choreo run` held a fault until the stop request.
pub const HELD: i32 = 2;
/// `choreo run` was cancelled by a stop request before completing.
pub const CANCELLED: i32 = 3;
