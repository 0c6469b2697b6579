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

//! Contract for the host's cooperative scheduler.
//!
//! The real implementation is the application's UI event loop, which is out
//! of scope here; `warden-infra` provides a deterministic in-process host for
//! tests and headless use. "Suspension" in this model means "not yet due",
//! never preemption.

use std::time::Duration;

/// Opaque token identifying one scheduled callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScheduleHandle(u64);

impl ScheduleHandle {
    /// Wraps a raw scheduler-assigned token.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw token value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// A deferred callback hosted by a scheduler.
pub type ScheduledCallback = Box<dyn FnOnce() + Send + 'static>;

/// The scheduling boundary offered by the host event loop.
///
/// Contract, matching the `after`/`after_cancel` semantics of common UI
/// toolkits:
///
/// - `schedule` only enqueues; it must never invoke the callback
///   synchronously.
/// - Callbacks may themselves call `schedule` and `cancel` (reentrancy).
/// - `cancel` on a handle that already fired, was already cancelled, or was
///   never issued is a silent no-op.
pub trait Scheduler: Send + Sync {
    /// Enqueues `callback` to run once `delay` has elapsed.
    fn schedule(&self, delay: Duration, callback: ScheduledCallback) -> ScheduleHandle;

    /// Cancels a pending callback, if it is still pending.
    fn cancel(&self, handle: ScheduleHandle);
}
