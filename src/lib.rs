pub mod config;
pub mod core;
pub mod error;
pub mod invariants;
pub mod log;
pub mod scenario;
pub mod service;
pub mod state;

pub use config::Config;
pub use error::{Error, ErrorClass, Result};
pub use service::{NewTask, TaskDetails, TaskService};
