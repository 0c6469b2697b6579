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

//! Point-in-time diagnostic snapshots.
//!
//! Every type here is an owned copy: readers can hold one as long as they
//! like without pinning any governor lock, and a status panel can serialize
//! it directly.

use crate::component::ComponentId;
use serde::Serialize;
use std::collections::HashMap;

/// Snapshot of the thread governor's counters.
#[derive(Debug, Clone, Serialize)]
pub struct ThreadStats {
    /// Live managed threads, foreground and background combined.
    pub total_active: usize,
    /// Live background threads.
    pub background: usize,
    /// Live foreground threads.
    pub foreground: usize,
    /// Number of entries in the registry. Always equals `total_active`.
    pub registry_size: usize,
    /// Live thread counts per component.
    pub per_component: HashMap<ComponentId, usize>,
    /// Components currently refused all admissions, sorted by name.
    pub blocked_components: Vec<ComponentId>,
    /// Configured global ceiling.
    pub max_total: usize,
    /// Configured background ceiling.
    pub max_background: usize,
}

/// Snapshot of the timer governor's counters.
#[derive(Debug, Clone, Serialize)]
pub struct TimerStats {
    /// Live timers across all components.
    pub total_active: usize,
    /// Live timer counts per component.
    pub per_component: HashMap<ComponentId, usize>,
    /// Creation events currently inside the rate-limit window.
    pub recent_creations: usize,
    /// Configured global ceiling.
    pub max_total: usize,
    /// Configured per-component ceiling.
    pub max_per_component: usize,
}

/// Merged snapshot exposed by the governor facade.
#[derive(Debug, Clone, Serialize)]
pub struct GovernorStats {
    /// Thread governor counters.
    pub threads: ThreadStats,
    /// Timer governor counters.
    pub timers: TimerStats,
    /// Whether the security monitor currently flags activity as suspicious.
    pub suspicious_activity: bool,
    /// Total admission failures recorded since construction.
    pub failure_count: u64,
    /// Best-effort CPU sample; `None` when sampling failed.
    pub cpu_percent: Option<f32>,
    /// Best-effort memory sample; `None` when sampling failed.
    pub memory_percent: Option<f32>,
}
