// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task storage and registrations.
//!
//! Every live task has exactly one registration. A registration is the pair
//! of a generation number and the next instant it fires. `update` swaps the
//! registration under the same write lock that replaces the task, so a firing
//! collected before the update carries the old generation and is dropped by
//! [`TaskScheduler::is_current`] once the update has returned.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use indexmap::IndexMap;
use tokio::sync::RwLock;

use crate::audit::OperationRegistry;
use crate::task::recurrence::Recurrence;
use crate::task::{SchedulerError, Task, TaskSpec, TaskView};

struct Registration {
    generation: u64,
    next_fire: Option<DateTime<Local>>,
}

struct TaskEntry {
    task: Arc<Task>,
    registration: Registration,
}

/// A due occurrence handed to the clock for dispatch.
#[derive(Debug, Clone)]
pub struct Firing {
    pub task: Arc<Task>,
    pub generation: u64,
    pub scheduled_for: DateTime<Local>,
}

pub struct TaskScheduler {
    registry: OperationRegistry,
    tasks: RwLock<IndexMap<String, TaskEntry>>,
    generations: AtomicU64,
}

impl TaskScheduler {
    pub fn new(registry: OperationRegistry) -> Self {
        Self { registry, tasks: RwLock::new(IndexMap::new()), generations: AtomicU64::new(1) }
    }

    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    /// Validate `spec`, store it under a fresh id and register its next
    /// occurrence.
    pub async fn create(&self, spec: TaskSpec) -> Result<TaskView, SchedulerError> {
        let id = uuid::Uuid::new_v4().to_string();
        let task = Arc::new(self.build(id.clone(), spec)?);
        let registration = self.register(&task.recurrence, Local::now());
        let view = TaskView::new(&task, registration.next_fire);

        self.tasks.write().await.insert(id.clone(), TaskEntry { task, registration });
        tracing::info!(task_id = %id, name = %view.name, schedule = %view.schedule, "task created");
        Ok(view)
    }

    /// Replace the task stored under `id`, retiring its registration.
    pub async fn update(&self, id: &str, spec: TaskSpec) -> Result<TaskView, SchedulerError> {
        let task = Arc::new(self.build(id.to_owned(), spec)?);

        let mut tasks = self.tasks.write().await;
        let entry = tasks.get_mut(id).ok_or_else(|| SchedulerError::NotFound(id.to_owned()))?;
        entry.registration = self.register(&task.recurrence, Local::now());
        entry.task = task;
        let view = TaskView::new(&entry.task, entry.registration.next_fire);
        drop(tasks);

        tracing::info!(task_id = %id, schedule = %view.schedule, "task updated");
        Ok(view)
    }

    pub async fn delete(&self, id: &str) -> Result<(), SchedulerError> {
        match self.tasks.write().await.shift_remove(id) {
            Some(_) => {
                tracing::info!(task_id = %id, "task deleted");
                Ok(())
            }
            None => Err(SchedulerError::NotFound(id.to_owned())),
        }
    }

    pub async fn get(&self, id: &str) -> Result<TaskView, SchedulerError> {
        let tasks = self.tasks.read().await;
        let entry = tasks.get(id).ok_or_else(|| SchedulerError::NotFound(id.to_owned()))?;
        Ok(TaskView::new(&entry.task, entry.registration.next_fire))
    }

    /// The stored task itself, for running it on demand.
    pub async fn task(&self, id: &str) -> Result<Arc<Task>, SchedulerError> {
        let tasks = self.tasks.read().await;
        let entry = tasks.get(id).ok_or_else(|| SchedulerError::NotFound(id.to_owned()))?;
        Ok(Arc::clone(&entry.task))
    }

    /// All tasks in creation order.
    pub async fn list_all(&self) -> Vec<TaskView> {
        let tasks = self.tasks.read().await;
        tasks.values().map(|e| TaskView::new(&e.task, e.registration.next_fire)).collect()
    }

    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }

    /// Tasks whose next occurrence from now falls within `window`.
    pub async fn due_within(&self, window: Duration) -> Vec<TaskView> {
        self.due_within_at(Local::now(), window).await
    }

    /// [`due_within`](Self::due_within) against an explicit clock reading.
    /// Read-only: registrations are not touched.
    pub async fn due_within_at(&self, now: DateTime<Local>, window: Duration) -> Vec<TaskView> {
        let Ok(window) = chrono::Duration::from_std(window) else {
            return self.list_all().await;
        };
        let tasks = self.tasks.read().await;
        tasks
            .values()
            .filter_map(|e| {
                let next = e.task.recurrence.next_after(&now)?;
                (next - now <= window).then(|| TaskView::new(&e.task, Some(next)))
            })
            .collect()
    }

    /// Take every registration due at `now` and advance it past `now`.
    /// Occurrences missed while the clock was stalled collapse into one firing.
    pub async fn collect_due(&self, now: DateTime<Local>) -> Vec<Firing> {
        let mut tasks = self.tasks.write().await;
        let mut due = Vec::new();
        for entry in tasks.values_mut() {
            let Some(at) = entry.registration.next_fire else { continue };
            if at > now {
                continue;
            }
            due.push(Firing {
                task: Arc::clone(&entry.task),
                generation: entry.registration.generation,
                scheduled_for: at,
            });
            entry.registration.next_fire = entry.task.recurrence.next_after(&now);
        }
        due
    }

    /// Whether `generation` is still the live registration of task `id`.
    pub async fn is_current(&self, id: &str, generation: u64) -> bool {
        self.tasks.read().await.get(id).is_some_and(|e| e.registration.generation == generation)
    }

    fn build(&self, id: String, spec: TaskSpec) -> Result<Task, SchedulerError> {
        if spec.name.trim().is_empty() {
            return Err(SchedulerError::Invalid("name is required".to_owned()));
        }
        if spec.accounts.iter().all(|a| a.trim().is_empty()) {
            return Err(SchedulerError::Invalid("at least one account is required".to_owned()));
        }
        let recurrence = Recurrence::parse(&spec.schedule)?;
        let operation = self.registry.resolve(&spec.service, &spec.command).ok_or_else(|| {
            SchedulerError::UnknownOperation {
                service: spec.service.clone(),
                command: spec.command.clone(),
            }
        })?;
        let spec = TaskSpec {
            accounts: spec.accounts.into_iter().map(|a| a.trim().to_owned()).filter(|a| !a.is_empty()).collect(),
            ..spec
        };
        Ok(Task::new(id, spec, recurrence, operation))
    }

    fn register(&self, recurrence: &Recurrence, now: DateTime<Local>) -> Registration {
        Registration {
            generation: self.generations.fetch_add(1, Ordering::Relaxed),
            next_fire: recurrence.next_after(&now),
        }
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
