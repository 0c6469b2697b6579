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

//! Integration tests for the timer governor, driven by the deterministic
//! manual scheduler.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use warden_core::component::ComponentId;
use warden_core::config::{GovernorConfig, RateLimitConfig};
use warden_governor::Governor;
use warden_infra::{FixedSampler, ManualScheduler};

fn governor() -> Governor {
    Governor::new(GovernorConfig::default(), Arc::new(FixedSampler::idle()))
}

fn governor_with(config: GovernorConfig) -> Governor {
    Governor::new(config, Arc::new(FixedSampler::idle()))
}

fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

#[test]
fn one_shot_timer_fires_once_and_unregisters() {
    let governor = governor();
    let scheduler = Arc::new(ManualScheduler::new());
    let fired = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&fired);
    let id = governor
        .create_timer(
            scheduler.clone(),
            ms(100),
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
            },
            Some(ComponentId::new("dashboard")),
            None,
            false,
        )
        .unwrap();
    assert_eq!(governor.get_stats().timers.total_active, 1);

    scheduler.advance(ms(100));
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(governor.get_stats().timers.total_active, 0);
    // The guard was cancelled together with the fire.
    assert_eq!(scheduler.pending(), 0);
    // And cancelling afterwards is a clean no-op.
    assert!(!governor.cancel_timer(&id));
}

#[test]
fn guard_reclaims_a_timer_that_never_fires() {
    let governor = governor();
    let scheduler = Arc::new(ManualScheduler::new());
    let fired = Arc::new(AtomicUsize::new(0));

    // The fire is scheduled beyond the guard, standing in for a host that
    // lost or starved the callback: delay 2000ms, timeout 1500ms.
    let counter = Arc::clone(&fired);
    governor
        .create_timer(
            scheduler.clone(),
            ms(2000),
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
            },
            Some(ComponentId::new("leaky_panel")),
            Some(ms(1500)),
            false,
        )
        .unwrap();

    scheduler.advance(ms(1499));
    assert_eq!(governor.get_stats().timers.total_active, 1);

    scheduler.advance(ms(1));
    // At 1500ms the guard fired: entry reclaimed, fire handle cancelled.
    assert_eq!(governor.get_stats().timers.total_active, 0);
    assert_eq!(scheduler.pending(), 0);

    scheduler.advance(ms(1000));
    assert_eq!(fired.load(Ordering::SeqCst), 0);
}

#[test]
fn repeating_timer_refires_until_cancelled() {
    let governor = governor();
    let scheduler = Arc::new(ManualScheduler::new());
    let fired = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&fired);
    let id = governor
        .create_timer(
            scheduler.clone(),
            ms(100),
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
            },
            Some(ComponentId::new("autosave")),
            None,
            true,
        )
        .unwrap();

    scheduler.advance(ms(350));
    assert_eq!(fired.load(Ordering::SeqCst), 3);
    assert_eq!(governor.get_stats().timers.total_active, 1);

    assert!(governor.cancel_timer(&id));
    scheduler.advance(ms(500));
    assert_eq!(fired.load(Ordering::SeqCst), 3);
    assert_eq!(scheduler.pending(), 0);
}

#[test]
fn component_teardown_cancels_exactly_its_timers() {
    let governor = governor();
    let scheduler = Arc::new(ManualScheduler::new());
    let x = ComponentId::new("X");

    for _ in 0..3 {
        governor
            .create_timer(scheduler.clone(), ms(500), || {}, Some(x.clone()), None, false)
            .unwrap();
    }
    governor
        .create_timer(
            scheduler.clone(),
            ms(500),
            || {},
            Some(ComponentId::new("Y")),
            None,
            false,
        )
        .unwrap();

    assert_eq!(governor.cancel_component_timers(&x), 3);
    assert_eq!(governor.timers().active_count(Some(&x)), 0);
    assert_eq!(governor.timers().active_count(None), 1);
    // A second teardown finds nothing left.
    assert_eq!(governor.cancel_component_timers(&x), 0);
}

#[test]
fn cancel_is_idempotent() {
    let governor = governor();
    let scheduler = Arc::new(ManualScheduler::new());

    let id = governor
        .create_timer(scheduler.clone(), ms(100), || {}, None, None, false)
        .unwrap();
    assert!(governor.cancel_timer(&id));
    assert!(!governor.cancel_timer(&id));
    assert_eq!(scheduler.pending(), 0);
}

#[test]
fn global_and_component_ceilings_are_enforced() {
    let mut config = GovernorConfig::default();
    config.timer.max_total = 3;
    config.timer.max_per_component = 2;
    let governor = governor_with(config);
    let scheduler = Arc::new(ManualScheduler::new());
    let panel = ComponentId::new("panel");

    for _ in 0..2 {
        assert!(governor
            .create_timer(scheduler.clone(), ms(100), || {}, Some(panel.clone()), None, false)
            .is_some());
    }
    // Component ceiling.
    assert!(governor
        .create_timer(scheduler.clone(), ms(100), || {}, Some(panel.clone()), None, false)
        .is_none());

    // Another component still fits under the global ceiling.
    assert!(governor
        .create_timer(
            scheduler.clone(),
            ms(100),
            || {},
            Some(ComponentId::new("other")),
            None,
            false,
        )
        .is_some());
    // Global ceiling.
    assert!(governor
        .create_timer(scheduler.clone(), ms(100), || {}, None, None, false)
        .is_none());
}

#[test]
fn rapid_creation_is_rate_limited_then_readmitted() {
    let mut config = GovernorConfig::default();
    // Cap of one creation per 200ms window.
    config.rate = RateLimitConfig {
        max_per_second: 5,
        window: ms(200),
    };
    let governor = governor_with(config);
    let scheduler = Arc::new(ManualScheduler::new());
    let storm = ComponentId::new("storm");

    assert!(governor
        .create_timer(scheduler.clone(), ms(50), || {}, Some(storm.clone()), None, false)
        .is_some());
    assert!(governor
        .create_timer(scheduler.clone(), ms(50), || {}, Some(storm.clone()), None, false)
        .is_none());

    // Once the window slides past the first record, admission resumes.
    std::thread::sleep(ms(250));
    assert!(governor
        .create_timer(scheduler.clone(), ms(50), || {}, Some(storm.clone()), None, false)
        .is_some());
}

#[test]
fn callbacks_may_create_more_timers() {
    let governor = Arc::new(governor());
    let scheduler = Arc::new(ManualScheduler::new());
    let fired = Arc::new(AtomicUsize::new(0));

    let inner_governor = Arc::clone(&governor);
    let inner_scheduler = Arc::clone(&scheduler);
    let inner_fired = Arc::clone(&fired);
    governor
        .create_timer(
            scheduler.clone(),
            ms(10),
            move || {
                let counter = Arc::clone(&inner_fired);
                inner_governor.create_timer(
                    inner_scheduler.clone(),
                    ms(10),
                    move || {
                        counter.fetch_add(1, Ordering::SeqCst);
                    },
                    None,
                    None,
                    false,
                );
            },
            None,
            None,
            false,
        )
        .unwrap();

    scheduler.advance(ms(30));
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(governor.get_stats().timers.total_active, 0);
}

#[test]
fn expiry_sweep_reclaims_overdue_timers() {
    let governor = governor();
    let scheduler = Arc::new(ManualScheduler::new());

    // The scheduler is never pumped, standing in for a torn-down host; the
    // wall-clock sweep is the backstop that reclaims the entry.
    governor
        .create_timer(scheduler.clone(), ms(10), || {}, None, Some(ms(30)), false)
        .unwrap();
    std::thread::sleep(ms(60));

    assert_eq!(governor.timers().sweep_expired(), 1);
    assert_eq!(governor.get_stats().timers.total_active, 0);
}
