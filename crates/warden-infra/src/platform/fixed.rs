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

//! Constant-value and always-failing samplers for tests and headless demos.

use warden_core::error::SampleError;
use warden_core::platform::SystemSampler;

/// A sampler that always reports the same readings.
#[derive(Debug, Clone, Copy)]
pub struct FixedSampler {
    cpu: f32,
    memory: f32,
}

impl FixedSampler {
    /// Creates a sampler pinned to the given CPU and memory percentages.
    pub fn new(cpu: f32, memory: f32) -> Self {
        Self { cpu, memory }
    }

    /// A sampler reporting an idle system.
    pub fn idle() -> Self {
        Self::new(0.0, 0.0)
    }
}

impl SystemSampler for FixedSampler {
    fn cpu_percent(&self) -> Result<f32, SampleError> {
        Ok(self.cpu)
    }

    fn memory_percent(&self) -> Result<f32, SampleError> {
        Ok(self.memory)
    }
}

/// A sampler whose every reading fails.
///
/// Used to exercise the governor's fail-open policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingSampler;

impl SystemSampler for FailingSampler {
    fn cpu_percent(&self) -> Result<f32, SampleError> {
        Err(SampleError::Unavailable("sampling disabled".to_string()))
    }

    fn memory_percent(&self) -> Result<f32, SampleError> {
        Err(SampleError::Unavailable("sampling disabled".to_string()))
    }
}
