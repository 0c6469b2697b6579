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

//! Sliding-window creation rate limiting.
//!
//! Bounds the *rate* of resource creation independently of the steady-state
//! ceilings, to blunt rapid-fire creation storms (a buggy retry loop, a
//! misbehaving component). This is a sliding-window counter, not a token
//! bucket: bursts are rejected once the count inside the window reaches the
//! cap, and the window slides continuously as old records age out.

use log;
use std::collections::{HashMap, VecDeque};
use std::time::Instant;
use warden_core::component::{Clearable, ComponentId};
use warden_core::config::RateLimitConfig;

/// One creation event retained in the recent-history window.
#[derive(Debug, Clone)]
pub struct CreationRecord {
    at: Instant,
    component: ComponentId,
}

/// Sliding-window counter over recent creations, global and per component.
///
/// Not internally synchronized: the owning governor keeps it inside its own
/// state lock.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    records: VecDeque<CreationRecord>,
    per_component: HashMap<ComponentId, usize>,
}

impl RateLimiter {
    /// Creates a limiter with an empty window.
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            records: VecDeque::new(),
            per_component: HashMap::new(),
        }
    }

    /// Checks whether `component` may create a resource right now, recording
    /// the creation when approved.
    pub fn allow(&mut self, component: &ComponentId) -> bool {
        self.allow_at(component, Instant::now())
    }

    fn allow_at(&mut self, component: &ComponentId, now: Instant) -> bool {
        self.evict(now);

        let cap = self.config.window_cap();
        if self.records.len() >= cap {
            log::warn!(
                "global creation rate limit exceeded: {} creations in {:?}",
                self.records.len(),
                self.config.window
            );
            return false;
        }

        let component_count = self.per_component.get(component).copied().unwrap_or(0);
        if component_count >= cap {
            log::warn!(
                "creation rate limit exceeded for {component}: {component_count} in {:?}",
                self.config.window
            );
            return false;
        }

        self.records.push_back(CreationRecord {
            at: now,
            component: component.clone(),
        });
        *self.per_component.entry(component.clone()).or_insert(0) += 1;
        true
    }

    // Records are appended in time order, so eviction is a prefix trim.
    fn evict(&mut self, now: Instant) {
        let window = self.config.window;
        let expired = |record: &CreationRecord| now.duration_since(record.at) > window;
        while self.records.front().is_some_and(expired) {
            if let Some(record) = self.records.pop_front() {
                if let Some(count) = self.per_component.get_mut(&record.component) {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        self.per_component.remove(&record.component);
                    }
                }
            }
        }
    }

    /// Creation events currently inside the window.
    pub fn recent_count(&self) -> usize {
        self.records.len()
    }
}

impl Clearable for RateLimiter {
    fn clear(&mut self) {
        self.records.clear();
        self.per_component.clear();
    }
}
