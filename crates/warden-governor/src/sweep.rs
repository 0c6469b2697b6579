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

//! Interval gating for opportunistic cleanup sweeps.
//!
//! Both governors sweep their registries before admission decisions, but a
//! full sweep on every call would be wasted work on hot paths; the ticker
//! limits sweeps to a configured cadence. Callers that need an immediate
//! sweep (emergency shutdown, a registry at its ceiling) bypass the ticker.

use std::time::{Duration, Instant};
use warden_core::config::SweepConfig;

/// Decides when a periodic sweep is due. Not internally synchronized; lives
/// inside the owning governor's state lock.
#[derive(Debug)]
pub struct SweepTicker {
    interval: Duration,
    last: Instant,
}

impl SweepTicker {
    /// Creates a ticker that first becomes due `interval` from now.
    pub fn new(config: &SweepConfig) -> Self {
        Self {
            interval: config.interval,
            last: Instant::now(),
        }
    }

    /// Returns `true` when the interval has elapsed, resetting the cadence.
    pub fn due(&mut self) -> bool {
        if self.last.elapsed() >= self.interval {
            self.last = Instant::now();
            true
        } else {
            false
        }
    }

    /// Resets the cadence after an out-of-band sweep.
    pub fn mark_swept(&mut self) {
        self.last = Instant::now();
    }
}
