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

//! The governor facade.
//!
//! One [`Governor`] is constructed at process start and injected into every
//! component that creates threads or timers; all mutable state lives behind
//! its locks, never in globals. The facade wires the two governors to the
//! shared accountant and security monitor and exposes the complete caller
//! surface in one place.

use std::sync::Arc;
use std::time::Duration;

use warden_core::component::{ComponentId, ThreadId, TimerId, WorkloadClass};
use warden_core::config::GovernorConfig;
use warden_core::platform::SystemSampler;
use warden_core::schedule::Scheduler;
use warden_core::stats::GovernorStats;

use crate::accountant::ResourceAccountant;
use crate::pool::{PoolError, WorkerPool};
use crate::security::SecurityMonitor;
use crate::thread::ThreadGovernor;
use crate::timer::TimerGovernor;

/// Central authority over every managed thread and timer.
pub struct Governor {
    threads: ThreadGovernor,
    timers: TimerGovernor,
    security: SecurityMonitor,
    sampler: Arc<dyn SystemSampler>,
}

impl Governor {
    /// Builds a governor from configuration and an injected system sampler.
    pub fn new(config: GovernorConfig, sampler: Arc<dyn SystemSampler>) -> Self {
        let accountant = ResourceAccountant::new();
        let security = SecurityMonitor::new(config.security.clone());

        let threads = ThreadGovernor::new(
            config.thread.clone(),
            config.thresholds.clone(),
            accountant.clone(),
            security.clone(),
            Arc::clone(&sampler),
        );
        let timers = TimerGovernor::new(
            config.timer.clone(),
            config.rate.clone(),
            &config.sweep,
            accountant,
            security.clone(),
        );

        Self {
            threads,
            timers,
            security,
            sampler,
        }
    }

    /// The thread governor.
    pub fn threads(&self) -> &ThreadGovernor {
        &self.threads
    }

    /// The timer governor.
    pub fn timers(&self) -> &TimerGovernor {
        &self.timers
    }

    /// Admits and spawns a managed thread. See
    /// [`ThreadGovernor::create_managed`].
    pub fn create_managed_thread<F>(
        &self,
        id: impl Into<ThreadId>,
        work: F,
        background: bool,
        component: Option<ComponentId>,
        workload: WorkloadClass,
    ) -> Option<ThreadId>
    where
        F: FnOnce() + Send + 'static,
    {
        self.threads
            .create_managed(id, work, background, component, workload)
    }

    /// Admits and schedules a managed timer. See [`TimerGovernor::create`].
    pub fn create_timer(
        &self,
        scheduler: Arc<dyn Scheduler>,
        delay: Duration,
        callback: impl FnMut() + Send + 'static,
        component: Option<ComponentId>,
        timeout: Option<Duration>,
        repeat: bool,
    ) -> Option<TimerId> {
        self.timers
            .create(scheduler, delay, callback, component, timeout, repeat)
    }

    /// Cancels one timer. Idempotent.
    pub fn cancel_timer(&self, id: &TimerId) -> bool {
        self.timers.cancel(id)
    }

    /// Cancels every timer owned by a component being torn down.
    pub fn cancel_component_timers(&self, component: &ComponentId) -> usize {
        self.timers.cancel_for_component(component)
    }

    /// Cancels every active timer.
    pub fn cancel_all_timers(&self) -> usize {
        self.timers.cancel_all()
    }

    /// Builds a governed worker pool on top of the thread governor.
    pub fn worker_pool(
        &self,
        name: impl Into<String>,
        workers: usize,
    ) -> Result<WorkerPool, PoolError> {
        WorkerPool::new(&self.threads, name, workers)
    }

    /// Refuses all further thread admissions for one component.
    pub fn block_component(&self, component: &ComponentId, reason: &str) {
        self.threads.block_component(component, reason);
    }

    /// Lifts a component block.
    pub fn unblock_component(&self, component: &ComponentId) {
        self.threads.unblock_component(component);
    }

    /// Emergency containment: blocks every known thread component, force
    /// sweeps the thread registry, cancels all timers, and resets the rate
    /// limiter and the security monitor.
    ///
    /// Already-running threads cannot be killed; they finish on their own.
    pub fn emergency_shutdown(&self) {
        self.threads.emergency_shutdown();
        self.timers.emergency_cleanup();
        self.security.reset();
    }

    /// Merged diagnostics snapshot for a status panel. Pure read.
    pub fn get_stats(&self) -> GovernorStats {
        GovernorStats {
            threads: self.threads.stats(),
            timers: self.timers.stats(),
            suspicious_activity: self.security.is_suspicious(),
            failure_count: self.security.failure_count(),
            cpu_percent: self.sampler.cpu_percent().ok(),
            memory_percent: self.sampler.memory_percent().ok(),
        }
    }
}
