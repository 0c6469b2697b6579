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

//! # Warden Governor
//!
//! The concurrency resource governor: a pair of cooperating managers that
//! mediate every background thread and every scheduled timer callback an
//! interactive application creates, enforcing global and per-component
//! ceilings, rate-limiting creation bursts, flagging anomalous creation
//! patterns, and guaranteeing deterministic cleanup of expired or orphaned
//! resources.
//!
//! One [`Governor`] is constructed at process start and injected into every
//! component that needs it; there is no global state. Admission denial is a
//! normal outcome (`None`/`false`), never a panic or an error: callers defer
//! or surface a "system busy" message.
//!
//! ```no_run
//! use std::sync::Arc;
//! use warden_core::{ComponentId, GovernorConfig, WorkloadClass};
//! use warden_governor::Governor;
//! # struct Sampler;
//! # impl warden_core::SystemSampler for Sampler {
//! #     fn cpu_percent(&self) -> Result<f32, warden_core::SampleError> { Ok(0.0) }
//! #     fn memory_percent(&self) -> Result<f32, warden_core::SampleError> { Ok(0.0) }
//! # }
//!
//! let governor = Governor::new(GovernorConfig::default(), Arc::new(Sampler));
//! let component = ComponentId::new("news_panel");
//! let started = governor.create_managed_thread(
//!     "news_refresh",
//!     || { /* fetch feeds */ },
//!     true,
//!     Some(component),
//!     WorkloadClass::Interactive,
//! );
//! if started.is_none() {
//!     // Denied: thread limit reached, rate limited, or system under pressure.
//! }
//! ```

pub mod accountant;
pub mod governor;
pub mod pool;
pub mod rate;
pub mod security;
pub mod sweep;
pub mod thread;
pub mod timer;

pub use accountant::{ResourceAccountant, ResourceClaim, ResourceKind, UsageSnapshot};
pub use governor::Governor;
pub use pool::{PoolError, WorkerPool};
pub use rate::RateLimiter;
pub use security::SecurityMonitor;
pub use thread::ThreadGovernor;
pub use timer::TimerGovernor;
