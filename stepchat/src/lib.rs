//! Scripted conversation step walker.
//!
//! A script is an ordered list of steps, each with an intro line, a task and an
//! optional completion condition. The walker keeps a cursor into the steps and
//! a chat transcript; every model reply is classified as in progress, complete
//! (`(DONE)`) or failed (`FAIL`) and moves the cursor accordingly. The layout
//! keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (types, reply classification,
//!   transcript bookkeeping, script invariants). No I/O.
//! - **[`io`]**: Side-effecting operations (config and script files, prompt
//!   rendering, the HTTP provider, console input, transcript logs).
//!
//! [`walker`] coordinates core logic with the provider and a turn source to
//! implement `stepchat run`; [`compare`] replays a recorded transcript against
//! other models for `stepchat compare`.

pub mod compare;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod walker;
