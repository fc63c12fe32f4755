//! Scripted replays of operations against a fresh store.
//!
//! A scenario is a TOML file with `[[users]]` to register and `[[steps]]` to
//! run in order:
//!
//! ```toml
//! [[users]]
//! id = "alice"
//! name = "Alice"
//! email = "alice@example.com"
//!
//! [[steps]]
//! op = "authenticate"
//! user = "alice"
//!
//! [[steps]]
//! op = "create"
//! title = "Write docs"
//! description = "Document the API"
//! assignee = "alice"
//!
//! [[steps]]
//! op = "delete"
//! task = 1
//! expect_error = true
//! ```

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::{Priority, Tag, TaskId, TaskStatus, User, UserId};
use crate::error::Result;
use crate::service::{NewTask, TaskDetails, TaskService};
use crate::state::{Store, SystemSnapshot};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub users: Vec<ScenarioUser>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioUser {
    pub id: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    #[serde(flatten)]
    pub action: Action,
    /// The step is expected to be rejected.
    #[serde(default)]
    pub expect_error: bool,
}

/// One operation. Timestamps are RFC 3339 strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Action {
    Authenticate {
        user: UserId,
    },
    Logout {
        user: UserId,
    },
    Create {
        title: String,
        description: String,
        assignee: UserId,
        #[serde(default)]
        priority: Priority,
        #[serde(default)]
        due_date: Option<DateTime<Utc>>,
        #[serde(default)]
        tags: Vec<Tag>,
        #[serde(default)]
        dependencies: Vec<TaskId>,
    },
    Status {
        task: TaskId,
        status: TaskStatus,
    },
    Priority {
        task: TaskId,
        priority: Priority,
    },
    Reassign {
        task: TaskId,
        assignee: UserId,
    },
    Details {
        task: TaskId,
        title: String,
        description: String,
        #[serde(default)]
        due_date: Option<DateTime<Utc>>,
    },
    Delete {
        task: TaskId,
    },
    BulkStatus {
        tasks: Vec<TaskId>,
        status: TaskStatus,
    },
    CheckDependencies,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Authenticate { .. } => "authenticate",
            Action::Logout { .. } => "logout",
            Action::Create { .. } => "create",
            Action::Status { .. } => "status",
            Action::Priority { .. } => "priority",
            Action::Reassign { .. } => "reassign",
            Action::Details { .. } => "details",
            Action::Delete { .. } => "delete",
            Action::BulkStatus { .. } => "bulk_status",
            Action::CheckDependencies => "check_dependencies",
        }
    }
}

/// Result of one step.
#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    /// 1-based position in the scenario.
    pub step: usize,
    pub op: &'static str,
    pub expect_error: bool,
    /// Summary on success, error message on rejection.
    pub message: String,
    pub ok: bool,
}

impl StepOutcome {
    /// Whether the outcome agrees with `expect_error`.
    pub fn as_expected(&self) -> bool {
        self.ok != self.expect_error
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub outcomes: Vec<StepOutcome>,
    pub snapshot: SystemSnapshot,
}

impl Report {
    pub fn passed(&self) -> bool {
        self.outcomes.iter().all(StepOutcome::as_expected)
    }

    pub fn unexpected(&self) -> impl Iterator<Item = &StepOutcome> {
        self.outcomes.iter().filter(|o| !o.as_expected())
    }
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "loading scenario");
        Self::from_toml(&fs::read_to_string(path)?)
    }

    pub fn from_toml(input: &str) -> Result<Self> {
        Ok(toml::from_str(input)?)
    }

    /// Register the users, then run every step against `service`.
    ///
    /// Rejected steps are recorded, not propagated. Only a failure to
    /// register the scenario's users aborts the run.
    pub fn run<S: Store>(&self, service: &TaskService<S>) -> Result<Report> {
        for user in &self.users {
            service.register_user(User::new(&user.id, &user.name, &user.email))?;
        }

        let mut outcomes = Vec::with_capacity(self.steps.len());
        for (index, step) in self.steps.iter().enumerate() {
            let (ok, message) = match apply(service, &step.action) {
                Ok(summary) => (true, summary),
                Err(e) => (false, e.to_string()),
            };
            let outcome = StepOutcome {
                step: index + 1,
                op: step.action.name(),
                expect_error: step.expect_error,
                message,
                ok,
            };
            if !outcome.as_expected() {
                warn!(
                    step = outcome.step,
                    op = outcome.op,
                    expect_error = outcome.expect_error,
                    "step did not match expectation: {}",
                    outcome.message
                );
            }
            outcomes.push(outcome);
        }

        Ok(Report {
            outcomes,
            snapshot: service.snapshot(),
        })
    }
}

fn apply<S: Store>(service: &TaskService<S>, action: &Action) -> Result<String> {
    match action {
        Action::Authenticate { user } => {
            let session = service.authenticate(user)?;
            Ok(format!("{} authenticated until {}", user, session.expires_at))
        }
        Action::Logout { user } => {
            service.logout(user)?;
            Ok(format!("{} logged out", user))
        }
        Action::Create {
            title,
            description,
            assignee,
            priority,
            due_date,
            tags,
            dependencies,
        } => {
            let mut request = NewTask::new(title, description, assignee.clone())
                .with_priority(*priority)
                .with_tags(tags.iter().copied())
                .with_dependencies(dependencies.iter().copied());
            request.due_date = *due_date;
            let task = service.create_task(request)?;
            Ok(format!("created task {} ({})", task.id, task.status))
        }
        Action::Status { task, status } => {
            let task = service.update_status(*task, *status)?;
            Ok(format!("task {} is now {}", task.id, task.status))
        }
        Action::Priority { task, priority } => {
            let task = service.update_priority(*task, *priority)?;
            Ok(format!("task {} priority {}", task.id, task.priority))
        }
        Action::Reassign { task, assignee } => {
            let task = service.reassign(*task, assignee)?;
            Ok(format!("task {} assigned to {}", task.id, task.assignee))
        }
        Action::Details {
            task,
            title,
            description,
            due_date,
        } => {
            let details = TaskDetails {
                title: title.clone(),
                description: description.clone(),
                due_date: *due_date,
            };
            let task = service.update_details(*task, details)?;
            Ok(format!("task {} details updated", task.id))
        }
        Action::Delete { task } => {
            service.delete_task(*task)?;
            Ok(format!("task {} deleted", task))
        }
        Action::BulkStatus { tasks, status } => {
            let updated = service.bulk_update_status(tasks, *status)?;
            Ok(format!("{} task(s) moved to {}", updated.len(), status))
        }
        Action::CheckDependencies => {
            let count = service.check_dependencies()?;
            Ok(format!("{} task(s) unblocked", count))
        }
    }
}
