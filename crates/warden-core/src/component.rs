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

//! Identity types shared by the governors.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a logical owner of governed resources.
///
/// A component is typically an application module or widget (a news panel,
/// a package browser, an autosave service). All resources created under the
/// same component id are counted together and can be bulk-reclaimed together.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ComponentId(String);

impl ComponentId {
    /// Creates a component id from any string-like name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the component name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ComponentId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ComponentId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Opaque identifier of a managed thread, chosen by the caller at admission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadId(String);

impl ThreadId {
    /// Creates a thread id from any string-like name.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ThreadId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ThreadId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Opaque identifier of a managed timer, generated at admission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimerId(String);

impl TimerId {
    /// Generates a fresh timer id of the form `timer_xxxxxxxx`.
    pub fn generate() -> Self {
        let hex = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("timer_{}", &hex[..8]))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Classifies the work a caller is asking to run.
///
/// Certain legitimate long operations (full update checks) are admitted under
/// higher CPU pressure than interactive work. The class is an explicit tag on
/// the admission call; admission never inspects component names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WorkloadClass {
    /// Short-lived work driven by user interaction. Default.
    #[default]
    Interactive,
    /// Long CPU-bound update checking; gets relaxed CPU admission thresholds.
    UpdateCheck,
}

impl fmt::Display for WorkloadClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkloadClass::Interactive => write!(f, "interactive"),
            WorkloadClass::UpdateCheck => write!(f, "update-check"),
        }
    }
}

/// Capability trait for state that can be wiped during emergency recovery.
///
/// Implemented only by types that genuinely accumulate reclaimable state
/// (the rate-limit window, the security ledger).
pub trait Clearable {
    /// Discards all accumulated state, returning the value to its
    /// freshly-constructed condition.
    fn clear(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_id_display_and_eq() {
        let a = ComponentId::new("news_panel");
        let b: ComponentId = "news_panel".into();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "news_panel");
    }

    #[test]
    fn timer_ids_are_prefixed_and_unique() {
        let a = TimerId::generate();
        let b = TimerId::generate();
        assert!(a.as_str().starts_with("timer_"));
        assert_eq!(a.as_str().len(), "timer_".len() + 8);
        assert_ne!(a, b);
    }

    #[test]
    fn workload_class_defaults_to_interactive() {
        assert_eq!(WorkloadClass::default(), WorkloadClass::Interactive);
    }
}
