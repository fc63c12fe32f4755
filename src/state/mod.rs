//! Shared state store for tasks, users and sessions.
//!
//! The store is an injectable instance owning one readers-writer lock over
//! the whole graph. There is no global state: callers create a store and
//! hand it to the operation layer.

mod memory;
mod repository;
mod snapshot;
mod unit_of_work;

pub use memory::{InMemoryStore, MemoryState};
pub use repository::{
    Repository, SessionRepository, Store, SystemStateRepository, TaskRepository, UserRepository,
};
pub use snapshot::SystemSnapshot;
pub use unit_of_work::UnitOfWork;
