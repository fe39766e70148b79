//! Core library for the grant opportunity qualification and triage service.
//!
//! The `workflows::grants` module carries the domain model, the deterministic
//! scoring policy, the reviewer-facing triage state machine, and the
//! application drafting lifecycle. `config`, `error`, and `telemetry` provide
//! the shared service scaffolding.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
