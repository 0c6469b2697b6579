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

//! Live resource accounting.
//!
//! The accountant is the single source of truth for how many governed
//! resources exist right now, globally and per component. It is the leaf
//! dependency of both governors: they check its counts during admission and
//! report every registration and removal to it. All mutation happens under
//! one lock; readers only ever receive owned snapshots.

use log;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use warden_core::component::ComponentId;

/// What kind of resource a claim covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// An OS-level managed thread.
    Thread {
        /// Whether the thread was admitted as a background thread.
        background: bool,
    },
    /// A scheduled timer.
    Timer,
}

/// One registered resource.
#[derive(Debug, Clone)]
pub struct ResourceClaim {
    /// Caller-visible identifier (thread id or timer id).
    pub id: String,
    /// Resource kind, including the background flag for threads.
    pub kind: ResourceKind,
    /// Owning component, if the caller supplied one.
    pub component: Option<ComponentId>,
}

impl ResourceClaim {
    /// Claim for a managed thread.
    pub fn thread(id: impl Into<String>, background: bool, component: Option<ComponentId>) -> Self {
        Self {
            id: id.into(),
            kind: ResourceKind::Thread { background },
            component,
        }
    }

    /// Claim for a managed timer.
    pub fn timer(id: impl Into<String>, component: Option<ComponentId>) -> Self {
        Self {
            id: id.into(),
            kind: ResourceKind::Timer,
            component,
        }
    }

    // Ledger keys are namespaced per kind so a thread and a timer with the
    // same caller-chosen id cannot collide.
    fn key(&self) -> String {
        match self.kind {
            ResourceKind::Thread { .. } => thread_key(&self.id),
            ResourceKind::Timer => timer_key(&self.id),
        }
    }
}

fn thread_key(id: &str) -> String {
    format!("thread/{id}")
}

fn timer_key(id: &str) -> String {
    format!("timer/{id}")
}

#[derive(Debug, Default)]
struct Ledger {
    claims: HashMap<String, ResourceClaim>,
    threads: usize,
    background_threads: usize,
    timers: usize,
    threads_by_component: HashMap<ComponentId, usize>,
    timers_by_component: HashMap<ComponentId, usize>,
}

/// Owned copy of the current counts, safe to hold without pinning any lock.
#[derive(Debug, Clone, Default)]
pub struct UsageSnapshot {
    /// Live managed threads.
    pub threads: usize,
    /// Live background threads.
    pub background_threads: usize,
    /// Live timers.
    pub timers: usize,
    /// Live thread counts per component.
    pub threads_by_component: HashMap<ComponentId, usize>,
    /// Live timer counts per component.
    pub timers_by_component: HashMap<ComponentId, usize>,
}

impl UsageSnapshot {
    /// Live thread count for one component.
    pub fn threads_for(&self, component: &ComponentId) -> usize {
        self.threads_by_component
            .get(component)
            .copied()
            .unwrap_or(0)
    }

    /// Live timer count for one component.
    pub fn timers_for(&self, component: &ComponentId) -> usize {
        self.timers_by_component
            .get(component)
            .copied()
            .unwrap_or(0)
    }
}

/// Thread-safe counter authority shared by both governors. Cloning shares
/// the underlying ledger.
#[derive(Debug, Clone, Default)]
pub struct ResourceAccountant {
    ledger: Arc<Mutex<Ledger>>,
}

impl ResourceAccountant {
    /// Creates an empty accountant.
    pub fn new() -> Self {
        Self::default()
    }

    // A poisoned lock means some thread panicked mid-update; the counters
    // themselves are plain integers and maps, so recovering the guard and
    // continuing is safe (fail open).
    fn lock(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Records a new claim. Returns `false` without mutating anything if a
    /// claim with the same id is already registered.
    pub fn register(&self, claim: ResourceClaim) -> bool {
        let mut ledger = self.lock();
        let key = claim.key();
        if ledger.claims.contains_key(&key) {
            log::warn!("resource {key} is already registered");
            return false;
        }
        match claim.kind {
            ResourceKind::Thread { background } => {
                ledger.threads += 1;
                if background {
                    ledger.background_threads += 1;
                }
                if let Some(component) = claim.component.clone() {
                    *ledger.threads_by_component.entry(component).or_insert(0) += 1;
                }
            }
            ResourceKind::Timer => {
                ledger.timers += 1;
                if let Some(component) = claim.component.clone() {
                    *ledger.timers_by_component.entry(component).or_insert(0) += 1;
                }
            }
        }
        ledger.claims.insert(key, claim);
        true
    }

    /// Removes a thread claim. Idempotent: returns `false` when the id is
    /// not (or no longer) registered.
    pub fn unregister_thread(&self, id: &str) -> bool {
        self.unregister(&thread_key(id))
    }

    /// Removes a timer claim. Idempotent.
    pub fn unregister_timer(&self, id: &str) -> bool {
        self.unregister(&timer_key(id))
    }

    fn unregister(&self, key: &str) -> bool {
        let mut ledger = self.lock();
        let Some(claim) = ledger.claims.remove(key) else {
            return false;
        };
        match claim.kind {
            ResourceKind::Thread { background } => {
                ledger.threads = ledger.threads.saturating_sub(1);
                if background {
                    ledger.background_threads = ledger.background_threads.saturating_sub(1);
                }
                if let Some(component) = claim.component {
                    decrement(&mut ledger.threads_by_component, &component);
                }
            }
            ResourceKind::Timer => {
                ledger.timers = ledger.timers.saturating_sub(1);
                if let Some(component) = claim.component {
                    decrement(&mut ledger.timers_by_component, &component);
                }
            }
        }
        true
    }

    /// Returns an owned copy of the current counts.
    pub fn snapshot(&self) -> UsageSnapshot {
        let ledger = self.lock();
        UsageSnapshot {
            threads: ledger.threads,
            background_threads: ledger.background_threads,
            timers: ledger.timers,
            threads_by_component: ledger.threads_by_component.clone(),
            timers_by_component: ledger.timers_by_component.clone(),
        }
    }
}

// Zero-count components are dropped from the map so that long-lived
// applications cannot grow it without bound.
fn decrement(counts: &mut HashMap<ComponentId, usize>, component: &ComponentId) {
    if let Some(count) = counts.get_mut(component) {
        *count = count.saturating_sub(1);
        if *count == 0 {
            counts.remove(component);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component(name: &str) -> Option<ComponentId> {
        Some(ComponentId::new(name))
    }

    #[test]
    fn register_and_unregister_update_all_counters() {
        let accountant = ResourceAccountant::new();
        assert!(accountant.register(ResourceClaim::thread("t1", true, component("news"))));
        assert!(accountant.register(ResourceClaim::thread("t2", false, component("news"))));
        assert!(accountant.register(ResourceClaim::timer("x1", component("news"))));

        let usage = accountant.snapshot();
        assert_eq!(usage.threads, 2);
        assert_eq!(usage.background_threads, 1);
        assert_eq!(usage.timers, 1);
        assert_eq!(usage.threads_for(&ComponentId::new("news")), 2);
        assert_eq!(usage.timers_for(&ComponentId::new("news")), 1);

        assert!(accountant.unregister_thread("t1"));
        let usage = accountant.snapshot();
        assert_eq!(usage.threads, 1);
        assert_eq!(usage.background_threads, 0);
    }

    #[test]
    fn unregister_is_idempotent() {
        let accountant = ResourceAccountant::new();
        accountant.register(ResourceClaim::thread("t1", false, None));
        assert!(accountant.unregister_thread("t1"));
        assert!(!accountant.unregister_thread("t1"));
        assert_eq!(accountant.snapshot().threads, 0);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let accountant = ResourceAccountant::new();
        assert!(accountant.register(ResourceClaim::thread("t1", false, None)));
        assert!(!accountant.register(ResourceClaim::thread("t1", true, None)));
        assert_eq!(accountant.snapshot().threads, 1);
    }

    #[test]
    fn thread_and_timer_ids_do_not_collide() {
        let accountant = ResourceAccountant::new();
        assert!(accountant.register(ResourceClaim::thread("same", false, None)));
        assert!(accountant.register(ResourceClaim::timer("same", None)));
        assert!(accountant.unregister_timer("same"));
        let usage = accountant.snapshot();
        assert_eq!(usage.threads, 1);
        assert_eq!(usage.timers, 0);
    }

    #[test]
    fn zero_count_components_are_dropped() {
        let accountant = ResourceAccountant::new();
        accountant.register(ResourceClaim::timer("x1", component("panel")));
        accountant.unregister_timer("x1");
        assert!(accountant.snapshot().timers_by_component.is_empty());
    }

    #[test]
    fn snapshot_is_a_copy() {
        let accountant = ResourceAccountant::new();
        accountant.register(ResourceClaim::thread("t1", false, component("a")));
        let before = accountant.snapshot();
        accountant.unregister_thread("t1");
        assert_eq!(before.threads, 1);
        assert_eq!(accountant.snapshot().threads, 0);
    }
}
