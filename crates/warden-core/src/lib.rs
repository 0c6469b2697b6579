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

//! # Warden Core
//!
//! Foundational crate containing traits, core types, and interface contracts
//! for the warden concurrency governor.
//!
//! The governor mediates every background thread and scheduled timer callback
//! an interactive application creates: this crate defines the identity types,
//! configuration, error taxonomy, and the boundary traits towards the host
//! platform (system sampling) and the host UI event loop (cooperative
//! scheduling). Concrete implementations of those boundaries live in
//! `warden-infra`; the governor service itself lives in `warden-governor`.

#![warn(missing_docs)]

pub mod component;
pub mod config;
pub mod error;
pub mod platform;
pub mod schedule;
pub mod stats;

pub use component::{Clearable, ComponentId, ThreadId, TimerId, WorkloadClass};
pub use config::GovernorConfig;
pub use error::{DenialReason, SampleError};
pub use platform::SystemSampler;
pub use schedule::{ScheduleHandle, ScheduledCallback, Scheduler};
