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

//! Gatekeeper and registry for OS-level managed threads.
//!
//! Every background or foreground thread the application creates goes
//! through [`ThreadGovernor::create_managed`]: admission consults system
//! load, the security monitor, the hard ceilings, and the component
//! block-list, then registers the thread *before* spawning it, so there is
//! no window where a running thread is unaccounted for. The spawned closure
//! carries an RAII guard that unregisters the entry when the work returns or
//! panics.
//!
//! There is no preemption primitive: a thread that outlives its timeout is
//! logged and its slot reclaimed, but the work itself keeps running
//! unsupervised.

use log;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use warden_core::component::{ComponentId, ThreadId, WorkloadClass};
use warden_core::config::{SystemThresholds, ThreadLimits};
use warden_core::error::DenialReason;
use warden_core::platform::SystemSampler;
use warden_core::stats::ThreadStats;

use crate::accountant::{ResourceAccountant, ResourceClaim};
use crate::security::SecurityMonitor;

#[derive(Debug)]
struct ThreadEntry {
    // None between registration and spawn, and permanently for entries whose
    // thread finished before the handle could be stored.
    handle: Option<JoinHandle<()>>,
    background: bool,
    component: Option<ComponentId>,
    started_at: Instant,
}

#[derive(Debug)]
struct ThreadState {
    registry: HashMap<ThreadId, ThreadEntry>,
    blocked: HashSet<ComponentId>,
}

struct ThreadShared {
    state: Mutex<ThreadState>,
    accountant: ResourceAccountant,
    security: SecurityMonitor,
    sampler: Arc<dyn SystemSampler>,
    limits: ThreadLimits,
    thresholds: SystemThresholds,
    started_at: Instant,
}

/// Gatekeeper + registry for managed threads. Cloning shares all state.
#[derive(Clone)]
pub struct ThreadGovernor {
    shared: Arc<ThreadShared>,
}

impl ThreadGovernor {
    /// Creates a governor over the shared accountant and security monitor.
    pub fn new(
        limits: ThreadLimits,
        thresholds: SystemThresholds,
        accountant: ResourceAccountant,
        security: SecurityMonitor,
        sampler: Arc<dyn SystemSampler>,
    ) -> Self {
        Self {
            shared: Arc::new(ThreadShared {
                state: Mutex::new(ThreadState {
                    registry: HashMap::new(),
                    blocked: HashSet::new(),
                }),
                accountant,
                security,
                sampler,
                limits,
                thresholds,
                started_at: Instant::now(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ThreadState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Whether a thread could be admitted right now. Performs the same
    /// opportunistic cleanup as [`create_managed`](Self::create_managed).
    pub fn can_create(
        &self,
        background: bool,
        component: Option<&ComponentId>,
        workload: WorkloadClass,
    ) -> bool {
        let mut state = self.lock();
        self.admit(&mut state, background, component, workload).is_ok()
    }

    // The full admission pipeline. Runs under the state lock so the check
    // and any subsequent registration are atomic with respect to concurrent
    // callers. Every denial is recorded with the security monitor.
    fn admit(
        &self,
        state: &mut ThreadState,
        background: bool,
        component: Option<&ComponentId>,
        workload: WorkloadClass,
    ) -> Result<(), DenialReason> {
        // Dead entries are reclaimed before every admission decision so a
        // just-finished thread frees its slot immediately.
        self.sweep_locked(state);

        if !self.system_load_ok(component, workload) {
            self.deny(DenialReason::SystemResources);
            return Err(DenialReason::SystemResources);
        }

        if self.shared.security.is_suspicious() {
            log::warn!("thread creation denied: suspicious activity detected");
            self.deny(DenialReason::SuspiciousActivity);
            return Err(DenialReason::SuspiciousActivity);
        }

        let usage = self.shared.accountant.snapshot();
        let limits = &self.shared.limits;

        if usage.threads >= limits.max_total {
            log::warn!(
                "thread creation denied: reached max total threads ({}), breakdown: {:?}",
                limits.max_total,
                usage.threads_by_component
            );
            self.deny(DenialReason::TotalLimit);
            return Err(DenialReason::TotalLimit);
        }

        if background && usage.background_threads >= limits.max_background {
            log::warn!(
                "background thread creation denied: reached max background threads ({})",
                limits.max_background
            );
            self.deny(DenialReason::BackgroundLimit);
            return Err(DenialReason::BackgroundLimit);
        }

        if let Some(component) = component {
            if usage.threads_for(component) >= limits.max_per_component {
                log::warn!(
                    "thread creation denied: component {component} reached its limit ({})",
                    limits.max_per_component
                );
                self.deny(DenialReason::ComponentLimit);
                return Err(DenialReason::ComponentLimit);
            }

            if state.blocked.contains(component) {
                log::warn!("thread creation denied: component {component} is blocked");
                self.deny(DenialReason::ComponentBlocked);
                return Err(DenialReason::ComponentBlocked);
            }
        }

        Ok(())
    }

    fn deny(&self, reason: DenialReason) {
        self.shared.security.record_failure(reason);
    }

    // System pressure check. Sampler failures are treated as "allow" (fail
    // open) so a broken monitor can never wedge admission. During the
    // startup grace period, and for update-check workloads, the CPU
    // threshold is relaxed; memory is always enforced.
    fn system_load_ok(&self, component: Option<&ComponentId>, workload: WorkloadClass) -> bool {
        let thresholds = &self.shared.thresholds;
        let grace_active = self.shared.started_at.elapsed() < thresholds.startup_grace;

        let cpu = match self.shared.sampler.cpu_percent() {
            Ok(cpu) => cpu,
            Err(err) => {
                log::debug!("cpu sampling failed ({err}), allowing admission");
                return self.memory_ok();
            }
        };

        let mut cpu_threshold = thresholds.max_cpu_percent;
        if grace_active || workload == WorkloadClass::UpdateCheck {
            cpu_threshold =
                (thresholds.max_cpu_percent + thresholds.relaxed_headroom).min(thresholds.relaxed_cap);
        }

        if cpu > cpu_threshold {
            if workload == WorkloadClass::UpdateCheck && cpu < thresholds.pressure_ceiling {
                log::info!(
                    "admitting update-check work for {} despite high cpu ({cpu:.1}%)",
                    component.map(ComponentId::as_str).unwrap_or("unknown")
                );
            } else if grace_active {
                log::info!("thread creation denied during startup: cpu at {cpu:.1}%");
                return false;
            } else {
                log::warn!("thread creation denied: cpu at {cpu:.1}%");
                return false;
            }
        }

        self.memory_ok()
    }

    fn memory_ok(&self) -> bool {
        match self.shared.sampler.memory_percent() {
            Ok(memory) if memory > self.shared.thresholds.max_memory_percent => {
                log::warn!("thread creation denied: memory at {memory:.1}%");
                false
            }
            Ok(_) => true,
            Err(err) => {
                log::debug!("memory sampling failed ({err}), allowing admission");
                true
            }
        }
    }

    /// Admits, registers, and spawns a managed thread running `work`.
    ///
    /// Returns `None` when admission is denied or the spawn itself fails;
    /// the caller must treat that as "operation deferred", not as an error.
    /// On success the thread is already registered and running; it will
    /// unregister itself when `work` returns or panics (the panic then
    /// propagates to the host's thread-failure channel as usual).
    pub fn create_managed<F>(
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
        let id = id.into();
        {
            let mut state = self.lock();
            if self
                .admit(&mut state, background, component.as_ref(), workload)
                .is_err()
            {
                return None;
            }

            // Register before starting the thread, so the thread can never
            // outrun its own bookkeeping.
            let claim = ResourceClaim::thread(id.as_str(), background, component.clone());
            if !self.shared.accountant.register(claim) {
                log::warn!("thread creation denied: id {id} is already in use");
                self.deny(DenialReason::CreationError);
                return None;
            }
            state.registry.insert(
                id.clone(),
                ThreadEntry {
                    handle: None,
                    background,
                    component,
                    started_at: Instant::now(),
                },
            );
            self.shared.security.record_creation(id.as_str(), background);
        }

        let guard = CompletionGuard {
            governor: self.clone(),
            id: id.clone(),
        };
        let spawned = thread::Builder::new()
            .name(format!("managed_{id}"))
            .spawn(move || {
                let _guard = guard;
                work();
            });

        match spawned {
            Ok(handle) => {
                let mut state = self.lock();
                // The thread may already have finished and unregistered
                // itself; in that case the handle is simply dropped.
                if let Some(entry) = state.registry.get_mut(&id) {
                    entry.handle = Some(handle);
                }
                log::debug!("spawned managed thread {id}");
                Some(id)
            }
            Err(err) => {
                log::error!("failed to spawn managed thread {id}: {err}");
                self.unregister(&id);
                self.deny(DenialReason::CreationError);
                None
            }
        }
    }

    /// Removes a thread from the registry and the accountant. Idempotent:
    /// returns `false` when the id was already removed.
    ///
    /// Logs a warning when the measured runtime exceeded the configured
    /// timeout; detection only, the thread itself cannot be interrupted.
    pub fn unregister(&self, id: &ThreadId) -> bool {
        let mut state = self.lock();
        let Some(entry) = state.registry.remove(id) else {
            return false;
        };
        self.shared.accountant.unregister_thread(id.as_str());
        drop(state);

        let runtime = entry.started_at.elapsed();
        if runtime > self.shared.limits.thread_timeout {
            log::warn!(
                "thread {id} ran for {:.1}s (timeout: {}s)",
                runtime.as_secs_f64(),
                self.shared.limits.thread_timeout.as_secs()
            );
        }
        log::debug!(
            "unregistered thread {id} (background: {}) after {:.2}s",
            entry.background,
            runtime.as_secs_f64()
        );
        true
    }

    /// Reclaims dead and timed-out entries. Returns how many were removed.
    ///
    /// Also runs before every admission decision; hosts typically call this
    /// on a fixed interval (a repeating managed timer works well).
    pub fn sweep(&self) -> usize {
        let mut state = self.lock();
        self.sweep_locked(&mut state)
    }

    fn sweep_locked(&self, state: &mut ThreadState) -> usize {
        let timeout = self.shared.limits.thread_timeout;
        let mut reclaim = Vec::new();

        for (id, entry) in &state.registry {
            let finished = entry.handle.as_ref().is_some_and(JoinHandle::is_finished);
            if finished {
                reclaim.push(id.clone());
            } else if entry.started_at.elapsed() > timeout {
                log::warn!(
                    "thread {id} exceeded its {}s timeout; reclaiming the slot, the work keeps running unsupervised",
                    timeout.as_secs()
                );
                reclaim.push(id.clone());
            }
        }

        for id in &reclaim {
            state.registry.remove(id);
            self.shared.accountant.unregister_thread(id.as_str());
        }
        if !reclaim.is_empty() {
            log::debug!("swept {} thread entries", reclaim.len());
        }
        reclaim.len()
    }

    /// Refuses all further admissions for `component` until unblocked.
    /// Intended for emergency containment.
    pub fn block_component(&self, component: &ComponentId, reason: &str) {
        let mut state = self.lock();
        state.blocked.insert(component.clone());
        log::warn!("blocked component {component} from creating threads: {reason}");
    }

    /// Lifts a block placed by [`block_component`](Self::block_component).
    pub fn unblock_component(&self, component: &ComponentId) {
        let mut state = self.lock();
        state.blocked.remove(component);
        log::info!("unblocked component {component}");
    }

    /// Blocks every currently-known component and force-runs a sweep.
    ///
    /// Cannot and does not kill already-running threads; they finish (and
    /// unregister) on their own.
    pub fn emergency_shutdown(&self) {
        log::error!("emergency thread shutdown initiated");
        let mut state = self.lock();

        let known: Vec<ComponentId> = state
            .registry
            .values()
            .filter_map(|entry| entry.component.clone())
            .collect();
        for component in known {
            state.blocked.insert(component);
        }

        let swept = self.sweep_locked(&mut state);
        log::error!(
            "emergency shutdown complete: {swept} entries reclaimed, {} threads still running",
            state.registry.len()
        );
    }

    /// Configured worker ceiling for governed pools.
    pub fn max_concurrent_ops(&self) -> usize {
        self.shared.limits.max_concurrent_ops
    }

    /// Point-in-time snapshot of the thread counters. Pure read.
    pub fn stats(&self) -> ThreadStats {
        let state = self.lock();
        let usage = self.shared.accountant.snapshot();
        let mut blocked: Vec<ComponentId> = state.blocked.iter().cloned().collect();
        blocked.sort();

        ThreadStats {
            total_active: usage.threads,
            background: usage.background_threads,
            foreground: usage.threads - usage.background_threads,
            registry_size: state.registry.len(),
            per_component: usage.threads_by_component,
            blocked_components: blocked,
            max_total: self.shared.limits.max_total,
            max_background: self.shared.limits.max_background,
        }
    }
}

// Unregisters its thread when dropped, so cleanup runs on normal return and
// on panic alike (the panic keeps propagating afterwards).
struct CompletionGuard {
    governor: ThreadGovernor,
    id: ThreadId,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if thread::panicking() {
            log::error!("managed thread {} panicked", self.id);
        }
        self.governor.unregister(&self.id);
    }
}
