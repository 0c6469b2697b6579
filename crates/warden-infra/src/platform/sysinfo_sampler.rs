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

//! sysinfo-based implementation of the SystemSampler trait.

use std::sync::Mutex;
use sysinfo::System;
use warden_core::error::SampleError;
use warden_core::platform::SystemSampler;

/// A system sampler that uses the `sysinfo` crate.
///
/// CPU utilisation is computed from the delta between two refreshes, so the
/// very first reading after construction reports 0.0; the governor fails
/// open on low readings, which is the safe direction.
pub struct SysinfoSampler {
    system: Mutex<System>,
}

impl SysinfoSampler {
    /// Creates a new sampler and primes the first CPU measurement.
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_all();
        system.refresh_memory();
        Self {
            system: Mutex::new(system),
        }
    }
}

impl SystemSampler for SysinfoSampler {
    fn cpu_percent(&self) -> Result<f32, SampleError> {
        let mut system = self
            .system
            .lock()
            .map_err(|_| SampleError::Unavailable("sampler lock poisoned".to_string()))?;
        system.refresh_cpu_all();
        Ok(system.global_cpu_usage())
    }

    fn memory_percent(&self) -> Result<f32, SampleError> {
        let mut system = self
            .system
            .lock()
            .map_err(|_| SampleError::Unavailable("sampler lock poisoned".to_string()))?;
        system.refresh_memory();
        let total = system.total_memory();
        if total == 0 {
            return Err(SampleError::Unavailable(
                "total memory reported as zero".to_string(),
            ));
        }
        Ok(system.used_memory() as f32 / total as f32 * 100.0)
    }
}

impl Default for SysinfoSampler {
    fn default() -> Self {
        Self::new()
    }
}
