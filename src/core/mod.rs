//! Core domain models for task management.
//!
//! Passive records (tasks, users, sessions) plus the pure rules that govern
//! them: the status state machine and the dependency graph.

pub mod dag;
pub mod task;
pub mod transitions;
pub mod user;

pub use dag::TaskMap;
pub use task::{Priority, Tag, Task, TaskId, TaskStatus};
pub use user::{Session, User, UserId};
