// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background clock that fires due tasks.
//!
//! Each task gets a lane: a queue drained by its own worker, so runs of one
//! task happen in order while different tasks run in parallel. A lane holds
//! at most one scheduled firing that has not started yet. The scheduler map is locked only to collect due firings and to
//! check a firing is still current, never across an audit run.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_util::sync::CancellationToken;

use crate::task::executor::{JobExecutor, RunReport};
use crate::task::scheduler::{Firing, TaskScheduler};
use crate::task::Task;

enum Job {
    /// Run whatever firing sits in the lane's pending slot.
    Scheduled,
    Manual { task: Arc<Task>, reply: oneshot::Sender<RunReport> },
}

/// A task's queue plus its single pending scheduled firing. Firings collected
/// while one is still waiting replace it instead of queueing behind it.
struct Lane {
    tx: mpsc::UnboundedSender<Job>,
    pending: Arc<Mutex<Option<Firing>>>,
}

/// Routes firings and on-demand runs onto per-task lanes.
pub struct Dispatcher {
    scheduler: Arc<TaskScheduler>,
    executor: Arc<JobExecutor>,
    lanes: Mutex<HashMap<String, Lane>>,
}

impl Dispatcher {
    pub fn new(scheduler: Arc<TaskScheduler>, executor: Arc<JobExecutor>) -> Arc<Self> {
        Arc::new(Self { scheduler, executor, lanes: Mutex::new(HashMap::new()) })
    }

    /// Queue a scheduled firing. At most one waits per task; a later firing
    /// takes the place of one not yet started.
    pub async fn dispatch(&self, firing: Firing) {
        let id = firing.task.id.clone();
        let mut lanes = self.lanes.lock().await;
        let lane = self.lane(&mut lanes, &id);
        if lane.pending.lock().await.replace(firing).is_some() {
            tracing::debug!(task_id = %id, "task busy, coalescing firing");
            return;
        }
        // The worker outlives every sender still in the map.
        let _ = lane.tx.send(Job::Scheduled);
    }

    /// Run `task` now, behind any firing already queued for it.
    pub async fn run_now(&self, task: Arc<Task>) -> anyhow::Result<RunReport> {
        let (reply, rx) = oneshot::channel();
        let id = task.id.clone();
        {
            let mut lanes = self.lanes.lock().await;
            let lane = self.lane(&mut lanes, &id);
            let _ = lane.tx.send(Job::Manual { task, reply });
        }
        rx.await.map_err(|_| anyhow::anyhow!("run of task {id} was abandoned"))
    }

    /// Close lanes of tasks that no longer exist. Their workers exit after
    /// draining what is already queued.
    pub async fn prune(&self) {
        let ids: Vec<String> = self.lanes.lock().await.keys().cloned().collect();
        let mut gone = Vec::new();
        for id in ids {
            if self.scheduler.task(&id).await.is_err() {
                gone.push(id);
            }
        }
        if gone.is_empty() {
            return;
        }
        let mut lanes = self.lanes.lock().await;
        for id in gone {
            lanes.remove(&id);
        }
    }

    pub async fn lane_count(&self) -> usize {
        self.lanes.lock().await.len()
    }

    /// The task's live lane, spawning one if it is missing or its worker died.
    fn lane<'a>(&self, lanes: &'a mut HashMap<String, Lane>, id: &str) -> &'a Lane {
        let live = lanes.get(id).is_some_and(|lane| !lane.tx.is_closed());
        if !live {
            lanes.insert(id.to_owned(), self.spawn_lane(id.to_owned()));
        }
        &lanes[id]
    }

    fn spawn_lane(&self, id: String) -> Lane {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        let pending: Arc<Mutex<Option<Firing>>> = Arc::default();
        let slot = Arc::clone(&pending);
        let scheduler = Arc::clone(&self.scheduler);
        let executor = Arc::clone(&self.executor);
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                match job {
                    Job::Scheduled => {
                        let Some(firing) = slot.lock().await.take() else { continue };
                        if !scheduler.is_current(&id, firing.generation).await {
                            tracing::debug!(task_id = %id, "dropping firing of retired registration");
                            continue;
                        }
                        tracing::debug!(task_id = %id, scheduled_for = %firing.scheduled_for, "task firing");
                        executor.run_and_notify(&firing.task).await;
                    }
                    Job::Manual { task, reply } => {
                        let report = executor.run_and_notify(&task).await;
                        let _ = reply.send(report);
                    }
                }
            }
            tracing::debug!(task_id = %id, "lane closed");
        });
        Lane { tx, pending }
    }
}

/// Spawn the clock loop: every `tick`, collect due firings and dispatch them.
pub fn spawn_clock(
    scheduler: Arc<TaskScheduler>,
    dispatcher: Arc<Dispatcher>,
    tick: Duration,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(tick);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = timer.tick() => {}
            }
            let firings = scheduler.collect_due(Local::now()).await;
            for firing in firings {
                dispatcher.dispatch(firing).await;
            }
            dispatcher.prune().await;
        }
        tracing::debug!("clock stopped");
    })
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
