//! Post-convergence hooks for steward
//!
//! After an artifact converges through an install, steward can run a
//! per-artifact hook: a script named after the artifact id in the hooks
//! directory, or a command configured for that id.
//!
//! # Overview
//!
//! Hooks run with a timeout and see the artifact id, its installed version and
//! the run id in their environment. A failing hook is reported to the caller;
//! it never undoes the convergence.

pub mod error;
pub mod runner;
pub mod types;

pub use error::{Error, Result};
pub use runner::{HookRunner, SCRIPT_EXTENSIONS};
pub use types::{HookCommand, HookContext, HookOutcome};
