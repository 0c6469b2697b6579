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

//! Gatekeeper and registry for scheduled callbacks on the host's
//! cooperative scheduler.
//!
//! Every timer is created with two scheduled primitives: the real fire
//! callback at `delay`, and a timeout guard at `timeout` whose sole purpose
//! is to reclaim a timer that was scheduled but never fired or cancelled
//! (components forget to cancel; the guard makes that a logged warning
//! instead of a leak). Whichever side runs first cancels the other.
//!
//! Callbacks are always invoked with no registry lock held, so a callback
//! may itself create or cancel timers.

use log;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use warden_core::component::{Clearable, ComponentId, TimerId};
use warden_core::config::{RateLimitConfig, SweepConfig, TimerLimits};
use warden_core::error::DenialReason;
use warden_core::schedule::{ScheduleHandle, Scheduler};
use warden_core::stats::TimerStats;

use crate::accountant::{ResourceAccountant, ResourceClaim};
use crate::rate::RateLimiter;
use crate::security::SecurityMonitor;
use crate::sweep::SweepTicker;

// Repeat timers invoke the same callback many times, so callbacks are held
// behind a shared mutable cell rather than consumed on first fire.
type SharedCallback = Arc<Mutex<Box<dyn FnMut() + Send + 'static>>>;

struct TimerEntry {
    scheduler: Arc<dyn Scheduler>,
    fire: ScheduleHandle,
    guard: ScheduleHandle,
    component: Option<ComponentId>,
    delay: Duration,
    repeat: bool,
    created_at: Instant,
    timeout: Duration,
}

struct TimerState {
    registry: HashMap<TimerId, TimerEntry>,
    rate: RateLimiter,
    ticker: SweepTicker,
}

struct TimerShared {
    state: Mutex<TimerState>,
    accountant: ResourceAccountant,
    security: SecurityMonitor,
    limits: TimerLimits,
}

/// Gatekeeper + registry for managed timers. Cloning shares all state.
#[derive(Clone)]
pub struct TimerGovernor {
    shared: Arc<TimerShared>,
}

impl TimerGovernor {
    /// Creates a governor over the shared accountant and security monitor.
    pub fn new(
        limits: TimerLimits,
        rate: RateLimitConfig,
        sweep: &SweepConfig,
        accountant: ResourceAccountant,
        security: SecurityMonitor,
    ) -> Self {
        Self {
            shared: Arc::new(TimerShared {
                state: Mutex::new(TimerState {
                    registry: HashMap::new(),
                    rate: RateLimiter::new(rate),
                    ticker: SweepTicker::new(sweep),
                }),
                accountant,
                security,
                limits,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TimerState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Admits and schedules a managed timer.
    ///
    /// `callback` fires after `delay`; with `repeat` it keeps firing at that
    /// interval until cancelled or reclaimed by its guard. `timeout` bounds
    /// the timer's total lifetime (default five minutes). Returns `None`
    /// when admission is denied.
    pub fn create(
        &self,
        scheduler: Arc<dyn Scheduler>,
        delay: Duration,
        callback: impl FnMut() + Send + 'static,
        component: Option<ComponentId>,
        timeout: Option<Duration>,
        repeat: bool,
    ) -> Option<TimerId> {
        let mut state = self.lock();

        if state.ticker.due() {
            self.sweep_expired_locked(&mut state);
        }

        // Rate limiting applies to component-tagged requests; anonymous
        // timers are still subject to every ceiling below.
        if let Some(component) = component.as_ref() {
            if !state.rate.allow(component) {
                self.shared.security.record_failure(DenialReason::RateLimited);
                return None;
            }
        }

        if self.shared.security.is_suspicious() {
            log::warn!("timer creation denied: suspicious activity detected");
            self.shared
                .security
                .record_failure(DenialReason::SuspiciousActivity);
            return None;
        }

        let limits = &self.shared.limits;
        let mut usage = self.shared.accountant.snapshot();
        if usage.timers >= limits.max_total {
            log::warn!(
                "timer registry at its ceiling ({}), forcing an expiry sweep",
                limits.max_total
            );
            self.sweep_expired_locked(&mut state);
            usage = self.shared.accountant.snapshot();
            if usage.timers >= limits.max_total {
                self.shared.security.record_failure(DenialReason::TotalLimit);
                return None;
            }
        }

        if let Some(component) = component.as_ref() {
            if usage.timers_for(component) >= limits.max_per_component {
                log::warn!(
                    "timer creation denied: component {component} reached its limit ({})",
                    limits.max_per_component
                );
                self.shared
                    .security
                    .record_failure(DenialReason::ComponentLimit);
                return None;
            }
        }

        let id = TimerId::generate();
        let timeout = timeout.unwrap_or(limits.default_timeout);

        // Register before scheduling; the scheduler contract guarantees the
        // callback cannot run synchronously inside `schedule`.
        self.shared
            .accountant
            .register(ResourceClaim::timer(id.as_str(), component.clone()));

        let callback: SharedCallback = Arc::new(Mutex::new(Box::new(callback)));
        let fire = self.arm_fire(&scheduler, &id, &callback, delay);
        let guard = self.arm_guard(&scheduler, &id, timeout);

        state.registry.insert(
            id.clone(),
            TimerEntry {
                scheduler,
                fire,
                guard,
                component,
                delay,
                repeat,
                created_at: Instant::now(),
                timeout,
            },
        );
        self.shared.security.record_creation(id.as_str(), false);

        log::debug!(
            "created timer {id} (delay {:?}, repeat {repeat}, timeout {timeout:?})",
            delay
        );
        Some(id)
    }

    /// One-shot convenience wrapper around [`create`](Self::create).
    pub fn create_delayed(
        &self,
        scheduler: Arc<dyn Scheduler>,
        delay: Duration,
        callback: impl FnMut() + Send + 'static,
        component: Option<ComponentId>,
    ) -> Option<TimerId> {
        self.create(scheduler, delay, callback, component, None, false)
    }

    /// Repeating convenience wrapper around [`create`](Self::create).
    pub fn create_repeating(
        &self,
        scheduler: Arc<dyn Scheduler>,
        interval: Duration,
        callback: impl FnMut() + Send + 'static,
        component: Option<ComponentId>,
        max_lifetime: Option<Duration>,
    ) -> Option<TimerId> {
        self.create(scheduler, interval, callback, component, max_lifetime, true)
    }

    fn arm_fire(
        &self,
        scheduler: &Arc<dyn Scheduler>,
        id: &TimerId,
        callback: &SharedCallback,
        delay: Duration,
    ) -> ScheduleHandle {
        let governor = self.clone();
        let id = id.clone();
        let callback = Arc::clone(callback);
        scheduler.schedule(delay, Box::new(move || governor.handle_fire(id, callback)))
    }

    fn arm_guard(
        &self,
        scheduler: &Arc<dyn Scheduler>,
        id: &TimerId,
        timeout: Duration,
    ) -> ScheduleHandle {
        let governor = self.clone();
        let id = id.clone();
        scheduler.schedule(timeout, Box::new(move || governor.handle_guard(id)))
    }

    // The fire side of the pair. Bookkeeping happens under the lock, the
    // callback runs outside it.
    fn handle_fire(&self, id: TimerId, callback: SharedCallback) {
        let repeat = {
            let state = self.lock();
            let Some(entry) = state.registry.get(&id) else {
                // Cancelled or reclaimed before the event loop got to us.
                return;
            };
            entry.repeat
        };

        if !repeat {
            // Dropped after the callback, so a one-shot timer unregisters
            // and cancels its guard on normal return and on panic alike.
            let _cleanup = FireCleanup {
                governor: self.clone(),
                id: id.clone(),
            };
            let mut callback = callback
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            (*callback)();
            return;
        }

        {
            let mut callback = callback
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            (*callback)();
        }

        // Re-arm unless the callback cancelled its own timer.
        let mut state = self.lock();
        let rearm = state
            .registry
            .get(&id)
            .map(|entry| (Arc::clone(&entry.scheduler), entry.delay));
        if let Some((scheduler, delay)) = rearm {
            let handle = self.arm_fire(&scheduler, &id, &callback, delay);
            if let Some(entry) = state.registry.get_mut(&id) {
                entry.fire = handle;
            }
        }
    }

    fn reclaim_fired(&self, id: &TimerId) {
        let mut state = self.lock();
        if let Some(entry) = state.registry.remove(id) {
            self.shared.accountant.unregister_timer(id.as_str());
            entry.scheduler.cancel(entry.guard);
        }
    }

    // The guard side of the pair: force-reclaims a timer that reached its
    // maximum lifetime without firing or being cancelled.
    fn handle_guard(&self, id: TimerId) {
        let mut state = self.lock();
        if let Some(entry) = state.registry.remove(&id) {
            self.shared.accountant.unregister_timer(id.as_str());
            entry.scheduler.cancel(entry.fire);
            log::warn!("timer {id} timed out after {:?}", entry.timeout);
        }
    }

    /// Cancels a timer, removing both its fire and guard primitives.
    /// Idempotent: returns `false` when the id is not (or no longer)
    /// registered.
    pub fn cancel(&self, id: &TimerId) -> bool {
        let mut state = self.lock();
        self.cancel_locked(&mut state, id)
    }

    fn cancel_locked(&self, state: &mut TimerState, id: &TimerId) -> bool {
        let Some(entry) = state.registry.remove(id) else {
            return false;
        };
        self.shared.accountant.unregister_timer(id.as_str());
        entry.scheduler.cancel(entry.fire);
        entry.scheduler.cancel(entry.guard);
        log::debug!("cancelled timer {id}");
        true
    }

    /// Cancels every timer owned by `component`, for use when the component
    /// is torn down. Returns the number cancelled.
    pub fn cancel_for_component(&self, component: &ComponentId) -> usize {
        let mut state = self.lock();
        let ids: Vec<TimerId> = state
            .registry
            .iter()
            .filter(|(_, entry)| entry.component.as_ref() == Some(component))
            .map(|(id, _)| id.clone())
            .collect();

        let mut cancelled = 0;
        for id in &ids {
            if self.cancel_locked(&mut state, id) {
                cancelled += 1;
            }
        }
        log::debug!("cancelled {cancelled} timers for component {component}");
        cancelled
    }

    /// Cancels every active timer. Global safety valve for error recovery
    /// and test teardown.
    pub fn cancel_all(&self) -> usize {
        let mut state = self.lock();
        let ids: Vec<TimerId> = state.registry.keys().cloned().collect();

        let mut cancelled = 0;
        for id in &ids {
            if self.cancel_locked(&mut state, id) {
                cancelled += 1;
            }
        }
        log::debug!("cancelled all {cancelled} active timers");
        cancelled
    }

    /// Force-reclaims entries older than their timeout. The guard normally
    /// gets there first; the sweep covers guards lost to scheduler teardown.
    pub fn sweep_expired(&self) -> usize {
        let mut state = self.lock();
        let swept = self.sweep_expired_locked(&mut state);
        state.ticker.mark_swept();
        swept
    }

    fn sweep_expired_locked(&self, state: &mut TimerState) -> usize {
        let expired: Vec<TimerId> = state
            .registry
            .iter()
            .filter(|(_, entry)| entry.created_at.elapsed() > entry.timeout)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &expired {
            log::debug!("timer {id} expired");
            self.cancel_locked(state, id);
        }
        if !expired.is_empty() {
            log::info!("cleaned up {} expired timers", expired.len());
        }
        expired.len()
    }

    /// Live timer count, optionally filtered to one component.
    pub fn active_count(&self, component: Option<&ComponentId>) -> usize {
        let usage = self.shared.accountant.snapshot();
        match component {
            Some(component) => usage.timers_for(component),
            None => usage.timers,
        }
    }

    /// Cancels everything and resets the rate-limit window. Used only by
    /// emergency recovery.
    pub fn emergency_cleanup(&self) -> usize {
        log::error!("performing emergency timer cleanup");
        let cancelled = self.cancel_all();
        let mut state = self.lock();
        state.rate.clear();
        log::info!("emergency timer cleanup complete ({cancelled} cancelled)");
        cancelled
    }

    /// Point-in-time snapshot of the timer counters. Pure read.
    pub fn stats(&self) -> TimerStats {
        let state = self.lock();
        let usage = self.shared.accountant.snapshot();
        TimerStats {
            total_active: usage.timers,
            per_component: usage.timers_by_component,
            recent_creations: state.rate.recent_count(),
            max_total: self.shared.limits.max_total,
            max_per_component: self.shared.limits.max_per_component,
        }
    }
}

// Unregisters a fired one-shot timer when dropped, so cleanup happens after
// the callback whether it returned or panicked.
struct FireCleanup {
    governor: TimerGovernor,
    id: TimerId,
}

impl Drop for FireCleanup {
    fn drop(&mut self) {
        self.governor.reclaim_fired(&self.id);
    }
}
