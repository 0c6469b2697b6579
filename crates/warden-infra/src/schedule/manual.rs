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

//! A deterministic cooperative scheduler with a virtual clock.
//!
//! Stands in for the application's UI event loop: callbacks only run when the
//! owner pumps the clock with [`ManualScheduler::advance`], in due-time order,
//! with no lock held while a callback executes (so callbacks may schedule and
//! cancel freely, as the `Scheduler` contract requires).

use std::sync::Mutex;
use std::time::Duration;
use warden_core::schedule::{ScheduleHandle, ScheduledCallback, Scheduler};

struct Pending {
    due: Duration,
    seq: u64,
    handle: ScheduleHandle,
    callback: ScheduledCallback,
}

#[derive(Default)]
struct ManualState {
    now: Duration,
    next_token: u64,
    queue: Vec<Pending>,
}

/// Virtual-clock scheduler host for tests and headless runs.
#[derive(Default)]
pub struct ManualScheduler {
    state: Mutex<ManualState>,
}

impl ManualScheduler {
    /// Creates a scheduler with the clock at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the virtual clock forward by `delta`, firing every callback that
    /// becomes due, in due-time order (FIFO among equal due times).
    pub fn advance(&self, delta: Duration) {
        let target = {
            let state = self.state.lock().unwrap();
            state.now + delta
        };
        loop {
            let next = {
                let mut state = self.state.lock().unwrap();
                let due_index = state
                    .queue
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| p.due <= target)
                    .min_by_key(|(_, p)| (p.due, p.seq))
                    .map(|(i, _)| i);
                match due_index {
                    Some(i) => {
                        let pending = state.queue.remove(i);
                        // The clock jumps to each fire time so callbacks that
                        // reschedule themselves see a consistent "now".
                        state.now = pending.due;
                        Some(pending.callback)
                    }
                    None => {
                        state.now = target;
                        None
                    }
                }
            };
            match next {
                Some(callback) => callback(),
                None => break,
            }
        }
    }

    /// Number of callbacks still pending.
    pub fn pending(&self) -> usize {
        self.state.lock().unwrap().queue.len()
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.state.lock().unwrap().now
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, callback: ScheduledCallback) -> ScheduleHandle {
        let mut state = self.state.lock().unwrap();
        let token = state.next_token;
        state.next_token += 1;
        let handle = ScheduleHandle::new(token);
        let due = state.now + delay;
        state.queue.push(Pending {
            due,
            seq: token,
            handle,
            callback,
        });
        handle
    }

    fn cancel(&self, handle: ScheduleHandle) {
        // Cancelling a spent or unknown handle is a no-op per contract.
        let mut state = self.state.lock().unwrap();
        state.queue.retain(|p| p.handle != handle);
    }
}
