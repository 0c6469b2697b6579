// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Governed worker pool for short-lived jobs.
//!
//! A fixed set of worker threads, each admitted through the thread governor
//! like any other thread, draining a shared job queue. Components that fire
//! many small jobs (package queries, icon loads) use a pool instead of one
//! thread per job, which keeps them far away from their admission ceilings.

use crossbeam_channel::{unbounded, Receiver, Sender};
use log;
use std::time::{Duration, Instant};
use thiserror::Error;

use warden_core::component::{ComponentId, ThreadId, WorkloadClass};

use crate::thread::ThreadGovernor;

/// A unit of work submitted to the pool.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Failure to construct a worker pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Admission denied every requested worker thread.
    #[error("worker pool '{0}' was denied every worker thread")]
    NoWorkersAdmitted(String),
}

/// Fixed-size pool of governed worker threads.
///
/// Workers are registered under the component `pool/<name>`, so the pool
/// shows up in [`ThreadStats::per_component`](warden_core::stats::ThreadStats)
/// and is subject to the same ceilings as everything else.
pub struct WorkerPool {
    name: String,
    component: ComponentId,
    sender: Option<Sender<Job>>,
    done: Receiver<()>,
    workers: Vec<ThreadId>,
}

impl WorkerPool {
    /// Spawns up to `workers` governed worker threads (clamped to the
    /// configured `max_concurrent_ops`).
    ///
    /// Succeeds as long as at least one worker is admitted; partial pools
    /// are logged and run degraded.
    pub fn new(
        governor: &ThreadGovernor,
        name: impl Into<String>,
        workers: usize,
    ) -> Result<Self, PoolError> {
        let name = name.into();
        let component = ComponentId::new(format!("pool/{name}"));
        let requested = workers.clamp(1, governor.max_concurrent_ops().max(1));

        let (sender, receiver) = unbounded::<Job>();
        let (done_sender, done) = unbounded::<()>();

        let mut admitted = Vec::new();
        for index in 0..requested {
            let receiver = receiver.clone();
            let done_sender = done_sender.clone();
            let id = governor.create_managed(
                format!("pool_{name}_{index}"),
                move || {
                    // The loop ends when the pool drops its sender.
                    for job in receiver.iter() {
                        job();
                    }
                    let _ = done_sender.send(());
                },
                true,
                Some(component.clone()),
                WorkloadClass::Interactive,
            );
            match id {
                Some(id) => admitted.push(id),
                None => log::warn!("worker pool {name}: worker {index} was denied admission"),
            }
        }

        if admitted.is_empty() {
            return Err(PoolError::NoWorkersAdmitted(name));
        }
        if admitted.len() < requested {
            log::warn!(
                "worker pool {name} running degraded: {}/{requested} workers",
                admitted.len()
            );
        }

        Ok(Self {
            name,
            component,
            sender: Some(sender),
            done,
            workers: admitted,
        })
    }

    /// Enqueues a job. Returns `false` after shutdown.
    pub fn submit(&self, job: impl FnOnce() + Send + 'static) -> bool {
        match &self.sender {
            Some(sender) => sender.send(Box::new(job)).is_ok(),
            None => false,
        }
    }

    /// Number of workers that were actually admitted.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Component id the pool's workers are registered under.
    pub fn component(&self) -> &ComponentId {
        &self.component
    }

    /// Closes the queue, then waits up to `wait` for the workers to drain
    /// outstanding jobs and exit. Returns `false` on timeout, in which case
    /// the remaining workers keep draining in the background.
    pub fn shutdown(mut self, wait: Duration) -> bool {
        self.sender.take();
        let deadline = Instant::now() + wait;

        for finished in 0..self.workers.len() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if self.done.recv_timeout(remaining).is_err() {
                log::warn!(
                    "worker pool {} shutdown timed out with {} workers still draining",
                    self.name,
                    self.workers.len() - finished
                );
                return false;
            }
        }
        log::debug!("worker pool {} shut down", self.name);
        true
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the channel lets the workers run down on their own; their
        // completion guards handle the unregistration.
        self.sender.take();
    }
}
