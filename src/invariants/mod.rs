//! Runtime invariant verification.
//!
//! The checker runs after every accepted mutation. Liveness diagnostics are
//! reported separately and never fail an operation.

mod checker;
mod liveness;

pub use checker::{Invariant, InvariantChecker, Violation};
pub use liveness::{liveness_warnings, LivenessPolicy, LivenessWarning};
