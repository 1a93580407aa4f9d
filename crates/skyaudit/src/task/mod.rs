// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recurring audit tasks: definitions, the scheduler that owns them, the
//! clock that fires them and the executor that runs them.

pub mod clock;
pub mod executor;
pub mod recurrence;
pub mod scheduler;

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::audit::AuditOperation;
use crate::task::recurrence::{Recurrence, ScheduleParseError};

/// Caller-supplied task definition, as found in the settings file and in
/// create/update requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub name: String,
    pub accounts: Vec<String>,
    pub service: String,
    pub command: String,
    pub schedule: String,
    pub channel: String,
}

/// A registered task. Immutable; an update installs a new `Task` under the
/// same id.
#[derive(Clone)]
pub struct Task {
    pub id: String,
    pub name: String,
    pub accounts: Vec<String>,
    pub service: String,
    pub command: String,
    pub recurrence: Recurrence,
    pub channel: String,
    operation: Arc<dyn AuditOperation>,
}

impl Task {
    pub(crate) fn new(
        id: String,
        spec: TaskSpec,
        recurrence: Recurrence,
        operation: Arc<dyn AuditOperation>,
    ) -> Self {
        Self {
            id,
            name: spec.name,
            accounts: spec.accounts,
            service: spec.service,
            command: spec.command,
            recurrence,
            channel: spec.channel,
            operation,
        }
    }

    /// Operation resolved when the task was created or last updated.
    pub fn operation(&self) -> &Arc<dyn AuditOperation> {
        &self.operation
    }

    pub fn spec(&self) -> TaskSpec {
        TaskSpec {
            name: self.name.clone(),
            accounts: self.accounts.clone(),
            service: self.service.clone(),
            command: self.command.clone(),
            schedule: self.recurrence.expression().to_owned(),
            channel: self.channel.clone(),
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("accounts", &self.accounts)
            .field("service", &self.service)
            .field("command", &self.command)
            .field("schedule", &self.recurrence.expression())
            .field("channel", &self.channel)
            .finish()
    }
}

/// Serializable snapshot of a task and its next occurrence.
#[derive(Debug, Clone, Serialize)]
pub struct TaskView {
    pub id: String,
    pub name: String,
    pub accounts: Vec<String>,
    pub service: String,
    pub command: String,
    pub schedule: String,
    pub channel: String,
    pub next_run: Option<DateTime<Local>>,
}

impl TaskView {
    pub(crate) fn new(task: &Task, next_run: Option<DateTime<Local>>) -> Self {
        let spec = task.spec();
        Self {
            id: task.id.clone(),
            name: spec.name,
            accounts: spec.accounts,
            service: spec.service,
            command: spec.command,
            schedule: spec.schedule,
            channel: spec.channel,
            next_run,
        }
    }
}

/// Scheduler construction and mutation errors.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error(transparent)]
    ScheduleParse(#[from] ScheduleParseError),
    #[error("unknown operation {service}/{command}")]
    UnknownOperation { service: String, command: String },
    #[error("task not found: {0}")]
    NotFound(String),
    #[error("invalid task: {0}")]
    Invalid(String),
}
