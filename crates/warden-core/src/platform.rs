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

//! Abstraction over the host platform's resource sampling.
//!
//! The governor only ever reads two numbers from the platform, so the
//! contract is deliberately small. The production implementation lives in
//! `warden-infra` (sysinfo-backed); tests inject fixed or failing samplers.

use crate::error::SampleError;

/// Best-effort view of system-wide load.
///
/// Both methods may fail (a sandboxed process, a missing /proc); the
/// governor treats every failure as "allow" and logs it, so implementations
/// should report honest errors rather than guessing.
pub trait SystemSampler: Send + Sync {
    /// Current overall CPU utilisation, 0.0 to 100.0.
    fn cpu_percent(&self) -> Result<f32, SampleError>;

    /// Current physical memory utilisation, 0.0 to 100.0.
    fn memory_percent(&self) -> Result<f32, SampleError>;
}
