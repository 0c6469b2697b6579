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

//! Detection of anomalous creation patterns.
//!
//! The hard ceilings stop runaway growth but say nothing about *how* a
//! caller got there; the security monitor watches the shape of recent
//! activity instead. Many failed admissions suggest a caller retrying
//! against denial; a creation burst suggests a loop gone wrong. Detection is
//! advisory except for [`SecurityMonitor::is_suspicious`], which both
//! governors consult as an extra admission gate.

use log;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use warden_core::component::Clearable;
use warden_core::config::SecurityThresholds;
use warden_core::error::DenialReason;

/// Named suspicion pattern, kept with the time it was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SuspicionKind {
    HighCreationRate,
}

impl fmt::Display for SuspicionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuspicionKind::HighCreationRate => write!(f, "high_creation_rate"),
        }
    }
}

/// The lock-free core of the monitor. Wrapped by [`SecurityMonitor`]; unit
/// tests drive it directly with synthetic timestamps.
#[derive(Debug)]
pub struct SecurityLedger {
    thresholds: SecurityThresholds,
    creations: VecDeque<Instant>,
    failure_count: u64,
    last_failure: Option<Instant>,
    patterns: Vec<(SuspicionKind, Instant)>,
}

impl SecurityLedger {
    fn new(thresholds: SecurityThresholds) -> Self {
        Self {
            thresholds,
            creations: VecDeque::new(),
            failure_count: 0,
            last_failure: None,
            patterns: Vec::new(),
        }
    }

    fn record_creation(&mut self, id: &str, background: bool, now: Instant) {
        if self.creations.len() == self.thresholds.creation_history {
            self.creations.pop_front();
        }
        self.creations.push_back(now);
        log::trace!("recorded creation of {id} (background: {background})");
        self.check_creation_rate(now);
    }

    fn check_creation_rate(&mut self, now: Instant) {
        let window = self.thresholds.burst_window;
        let recent = self
            .creations
            .iter()
            .filter(|at| now.duration_since(**at) < window)
            .count();
        if recent > self.thresholds.burst_threshold {
            log::warn!("high creation rate detected: {recent} creations in {window:?}");
            self.patterns.push((SuspicionKind::HighCreationRate, now));
        }
    }

    fn record_failure(&mut self, reason: DenialReason, now: Instant) {
        self.failure_count += 1;
        self.last_failure = Some(now);
        if self.failure_count > self.thresholds.failure_warn_threshold {
            log::warn!(
                "high admission failure rate: {} failures (latest: {reason})",
                self.failure_count
            );
        }
    }

    fn is_suspicious(&self, now: Instant) -> bool {
        let ttl = self.thresholds.suspicion_ttl;
        self.patterns
            .iter()
            .any(|(_, at)| now.duration_since(*at) < ttl)
    }

    // Expired patterns are dropped whenever new ones arrive, keeping the
    // pattern list bounded by the TTL rather than by process lifetime.
    fn prune(&mut self, now: Instant) {
        let ttl = self.thresholds.suspicion_ttl;
        self.patterns.retain(|(_, at)| now.duration_since(*at) < ttl);
    }
}

impl Clearable for SecurityLedger {
    fn clear(&mut self) {
        self.creations.clear();
        self.failure_count = 0;
        self.last_failure = None;
        self.patterns.clear();
    }
}

/// Thread-safe handle over the [`SecurityLedger`], shared by both governors.
/// Cloning shares the underlying state.
#[derive(Debug, Clone)]
pub struct SecurityMonitor {
    inner: Arc<Mutex<SecurityLedger>>,
}

impl SecurityMonitor {
    /// Creates a monitor with a clean ledger.
    pub fn new(thresholds: SecurityThresholds) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SecurityLedger::new(thresholds))),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SecurityLedger> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Records one successful resource creation and re-evaluates the burst
    /// heuristic.
    pub fn record_creation(&self, id: &str, background: bool) {
        let now = Instant::now();
        let mut ledger = self.lock();
        ledger.prune(now);
        ledger.record_creation(id, background, now);
    }

    /// Records one denied or failed admission.
    pub fn record_failure(&self, reason: DenialReason) {
        self.lock().record_failure(reason, Instant::now());
    }

    /// Whether any suspicion pattern is still inside its TTL.
    pub fn is_suspicious(&self) -> bool {
        self.lock().is_suspicious(Instant::now())
    }

    /// Total failures recorded since construction (or the last reset).
    pub fn failure_count(&self) -> u64 {
        self.lock().failure_count
    }

    /// When the most recent failure was recorded, if any.
    pub fn last_failure(&self) -> Option<Instant> {
        self.lock().last_failure
    }

    /// Wipes all accumulated state. Used by emergency recovery.
    pub fn reset(&self) {
        self.lock().clear();
        log::info!("security monitor state cleared");
    }
}

impl Default for SecurityMonitor {
    fn default() -> Self {
        Self::new(SecurityThresholds::default())
    }
}
