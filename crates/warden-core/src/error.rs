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

//! Error taxonomy for the governor.
//!
//! Admission denial is deliberately NOT an error type: callers receive a
//! plain `None`/`false` because denial is a frequent, expected outcome they
//! must handle inline ("system busy"), never a crash. [`DenialReason`] exists
//! for logging and for the security monitor's failure ledger.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Why an admission request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DenialReason {
    /// System CPU or memory pressure exceeded the configured thresholds.
    SystemResources,
    /// The security monitor flagged recent activity as suspicious.
    SuspiciousActivity,
    /// The global resource ceiling was reached.
    TotalLimit,
    /// The background-thread ceiling was reached.
    BackgroundLimit,
    /// The requesting component reached its per-component ceiling.
    ComponentLimit,
    /// The requesting component is administratively blocked.
    ComponentBlocked,
    /// The creation rate limiter rejected the request.
    RateLimited,
    /// The underlying primitive failed to create the resource.
    CreationError,
}

impl DenialReason {
    /// Stable machine-readable name, used in logs and diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            DenialReason::SystemResources => "system_resources",
            DenialReason::SuspiciousActivity => "suspicious_activity",
            DenialReason::TotalLimit => "total_limit",
            DenialReason::BackgroundLimit => "background_limit",
            DenialReason::ComponentLimit => "component_limit",
            DenialReason::ComponentBlocked => "component_blocked",
            DenialReason::RateLimited => "rate_limited",
            DenialReason::CreationError => "creation_error",
        }
    }
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error reported by a [`SystemSampler`](crate::platform::SystemSampler).
///
/// Sampling is best-effort: the governor treats any sampler error as
/// "allow" (fail open) so that a broken monitor can never wedge admission.
#[derive(Debug, Error)]
pub enum SampleError {
    /// The sampler could not produce a reading.
    #[error("system sampler unavailable: {0}")]
    Unavailable(String),
}
