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

//! Configuration for the governor.
//!
//! All limits are plain data with serde support so a host application can
//! load them from its own settings file; [`GovernorConfig::default`] is the
//! tuning for a desktop application and is what production code uses.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Ceilings and timeouts for OS-level managed threads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreadLimits {
    /// Maximum live managed threads, foreground and background combined.
    pub max_total: usize,
    /// Maximum live background threads.
    pub max_background: usize,
    /// Maximum live threads per component.
    pub max_per_component: usize,
    /// Worker ceiling for governed worker pools.
    pub max_concurrent_ops: usize,
    /// Runtime past which a thread is considered timed out. Detection only;
    /// there is no preemption primitive.
    pub thread_timeout: Duration,
}

impl Default for ThreadLimits {
    fn default() -> Self {
        Self {
            max_total: 30,
            max_background: 20,
            max_per_component: 10,
            max_concurrent_ops: 8,
            thread_timeout: Duration::from_secs(180),
        }
    }
}

/// Ceilings and lifetimes for scheduled timers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerLimits {
    /// Maximum live timers across all components.
    pub max_total: usize,
    /// Maximum live timers per component.
    pub max_per_component: usize,
    /// Maximum lifetime applied when the caller does not supply one; the
    /// timeout guard force-reclaims the timer past this age.
    pub default_timeout: Duration,
}

impl Default for TimerLimits {
    fn default() -> Self {
        Self {
            max_total: 100,
            max_per_component: 10,
            default_timeout: Duration::from_secs(300),
        }
    }
}

/// Sliding-window creation rate limiting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Average creations per second permitted over the window.
    pub max_per_second: u32,
    /// Width of the sliding window.
    pub window: Duration,
}

impl RateLimitConfig {
    /// The creation count cap enforced over one full window.
    pub fn window_cap(&self) -> usize {
        (self.max_per_second as f64 * self.window.as_secs_f64()).floor() as usize
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_per_second: 5,
            window: Duration::from_secs(10),
        }
    }
}

/// System-pressure thresholds consulted before thread admission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemThresholds {
    /// CPU utilisation (percent) above which thread creation is denied.
    pub max_cpu_percent: f32,
    /// Memory utilisation (percent) above which thread creation is denied.
    /// Always enforced; no workload class relaxes it.
    pub max_memory_percent: f32,
    /// Window after construction during which CPU admission is more lenient,
    /// since application startup is legitimately CPU-heavy.
    pub startup_grace: Duration,
    /// Extra CPU headroom (percentage points) granted during the startup
    /// grace period and to update-check workloads.
    pub relaxed_headroom: f32,
    /// Upper bound on the relaxed CPU threshold.
    pub relaxed_cap: f32,
    /// Absolute CPU ceiling past which even update-check work is denied.
    pub pressure_ceiling: f32,
}

impl Default for SystemThresholds {
    fn default() -> Self {
        Self {
            max_cpu_percent: 80.0,
            max_memory_percent: 85.0,
            startup_grace: Duration::from_secs(30),
            relaxed_headroom: 15.0,
            relaxed_cap: 95.0,
            pressure_ceiling: 98.0,
        }
    }
}

/// Thresholds for the security monitor's pattern detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityThresholds {
    /// Creations inside `burst_window` beyond which activity is flagged.
    pub burst_threshold: usize,
    /// Trailing window evaluated by the burst heuristic.
    pub burst_window: Duration,
    /// Failure count past which a warning is logged.
    pub failure_warn_threshold: u64,
    /// How long a suspicion flag keeps gating admissions.
    pub suspicion_ttl: Duration,
    /// Capacity of the bounded recent-creation history.
    pub creation_history: usize,
}

impl Default for SecurityThresholds {
    fn default() -> Self {
        Self {
            burst_threshold: 15,
            burst_window: Duration::from_secs(10),
            failure_warn_threshold: 10,
            suspicion_ttl: Duration::from_secs(60),
            creation_history: 100,
        }
    }
}

/// Cadence of the opportunistic cleanup sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Minimum interval between two sweeps triggered by admission checks.
    pub interval: Duration,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
        }
    }
}

/// Complete governor configuration, injected once at construction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernorConfig {
    /// Thread ceilings and timeouts.
    pub thread: ThreadLimits,
    /// Timer ceilings and lifetimes.
    pub timer: TimerLimits,
    /// Creation rate limiting.
    pub rate: RateLimitConfig,
    /// System-pressure thresholds.
    pub thresholds: SystemThresholds,
    /// Security monitor thresholds.
    pub security: SecurityThresholds,
    /// Cleanup sweep cadence.
    pub sweep: SweepConfig,
}
