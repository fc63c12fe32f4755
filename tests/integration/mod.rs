//! Integration test suite for taskflow.
//!
//! These tests drive the public operation layer end to end against the
//! in-memory store and check the resulting state with the invariant engine.
//!
//! # Test Categories
//!
//! - `lifecycle`: transition table and the create/complete/delete flow
//! - `dependencies`: blocked status, cycles and the dependency sweep
//! - `ownership`: authentication, sessions and reassignment
//! - `concurrency`: parallel callers against one shared store
//! - `rollback`: failed postconditions leave the store untouched

mod fixtures;

mod concurrency;
mod dependencies;
mod lifecycle;
mod ownership;
mod rollback;
