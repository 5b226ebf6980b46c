//! Stable exit codes for stepchat CLI commands.

/// Command succeeded or every step of the script was completed.
pub const OK: i32 = 0;
/// Command failed due to invalid config/script or other errors.
pub const INVALID: i32 = 1;
/// `stepchat run` ended because the model replied with the failure marker.
pub const FAILED: i32 = 2;
/// `stepchat run` ran out of user input before the script finished.
pub const INPUT_CLOSED: i32 = 3;
/// `stepchat compare --threshold` found a reply scoring below the threshold.
pub const DISSIMILAR: i32 = 4;
