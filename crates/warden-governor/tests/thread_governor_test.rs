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

//! Integration tests for the thread governor's admission pipeline.

use crossbeam_channel::{unbounded, Receiver};
use std::sync::Arc;
use std::time::{Duration, Instant};
use warden_core::component::{ComponentId, WorkloadClass};
use warden_core::config::GovernorConfig;
use warden_governor::Governor;
use warden_infra::{FailingSampler, FixedSampler};

// Tests create deliberate bursts; the burst heuristic gets its own test.
fn quiet_config() -> GovernorConfig {
    let mut config = GovernorConfig::default();
    config.security.burst_threshold = 10_000;
    config.thresholds.startup_grace = Duration::ZERO;
    config
}

fn idle_governor(config: GovernorConfig) -> Governor {
    Governor::new(config, Arc::new(FixedSampler::idle()))
}

// A worker that parks until the test closes or signals the channel, so the
// test controls exactly how many threads are alive.
fn gated_worker(receiver: Receiver<()>) -> impl FnOnce() + Send + 'static {
    move || {
        let _ = receiver.recv();
    }
}

fn wait_until(what: &str, predicate: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if predicate() {
            return;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    panic!("timed out waiting for: {what}");
}

#[test]
fn ceiling_denies_thread_31_until_a_slot_frees() {
    let governor = idle_governor(quiet_config());
    let (release, receiver) = unbounded::<()>();

    for i in 0..30 {
        let id = governor.create_managed_thread(
            format!("worker_{i}"),
            gated_worker(receiver.clone()),
            false,
            None,
            WorkloadClass::Interactive,
        );
        assert!(id.is_some(), "thread {i} should be admitted");
    }
    assert_eq!(governor.get_stats().threads.total_active, 30);

    // Request #31 bounces off the global ceiling.
    let denied = governor.create_managed_thread(
        "worker_31",
        || {},
        false,
        None,
        WorkloadClass::Interactive,
    );
    assert!(denied.is_none());

    // Release one worker; once its slot frees, the same request succeeds.
    release.send(()).unwrap();
    wait_until("one slot to free", || {
        governor.get_stats().threads.total_active == 29
    });
    let admitted = governor.create_managed_thread(
        "worker_31",
        gated_worker(receiver.clone()),
        false,
        None,
        WorkloadClass::Interactive,
    );
    assert!(admitted.is_some());

    drop(release);
    wait_until("all workers to drain", || {
        governor.get_stats().threads.total_active == 0
    });
}

#[test]
fn background_ceiling_leaves_foreground_admissions_alone() {
    let mut config = quiet_config();
    config.thread.max_background = 2;
    let governor = idle_governor(config);
    let (release, receiver) = unbounded::<()>();

    for i in 0..2 {
        assert!(governor
            .create_managed_thread(
                format!("bg_{i}"),
                gated_worker(receiver.clone()),
                true,
                None,
                WorkloadClass::Interactive,
            )
            .is_some());
    }
    assert!(governor
        .create_managed_thread(
            "bg_2",
            || {},
            true,
            None,
            WorkloadClass::Interactive,
        )
        .is_none());

    // Foreground work is only subject to the total ceiling.
    assert!(governor
        .create_managed_thread(
            "fg_0",
            gated_worker(receiver.clone()),
            false,
            None,
            WorkloadClass::Interactive,
        )
        .is_some());

    drop(release);
    wait_until("workers to drain", || {
        governor.get_stats().threads.total_active == 0
    });
}

#[test]
fn per_component_ceiling_only_binds_that_component() {
    let mut config = quiet_config();
    config.thread.max_per_component = 2;
    let governor = idle_governor(config);
    let (release, receiver) = unbounded::<()>();
    let news = ComponentId::new("news_panel");

    for i in 0..2 {
        assert!(governor
            .create_managed_thread(
                format!("news_{i}"),
                gated_worker(receiver.clone()),
                false,
                Some(news.clone()),
                WorkloadClass::Interactive,
            )
            .is_some());
    }
    assert!(governor
        .create_managed_thread(
            "news_2",
            || {},
            false,
            Some(news.clone()),
            WorkloadClass::Interactive,
        )
        .is_none());

    // A different component is unaffected.
    assert!(governor
        .create_managed_thread(
            "history_0",
            gated_worker(receiver.clone()),
            false,
            Some(ComponentId::new("update_history")),
            WorkloadClass::Interactive,
        )
        .is_some());

    drop(release);
    wait_until("workers to drain", || {
        governor.get_stats().threads.total_active == 0
    });
}

#[test]
fn blocked_component_is_refused_until_unblocked() {
    let governor = idle_governor(quiet_config());
    let component = ComponentId::new("pkg_update");

    governor.block_component(&component, "test containment");
    assert!(!governor
        .threads()
        .can_create(false, Some(&component), WorkloadClass::Interactive));
    assert!(governor
        .create_managed_thread(
            "pkg_check",
            || {},
            false,
            Some(component.clone()),
            WorkloadClass::Interactive,
        )
        .is_none());

    governor.unblock_component(&component);
    assert!(governor
        .threads()
        .can_create(false, Some(&component), WorkloadClass::Interactive));
}

#[test]
fn unregister_is_idempotent_and_counts_track_the_registry() {
    let governor = idle_governor(quiet_config());
    let (release, receiver) = unbounded::<()>();

    let id = governor
        .create_managed_thread(
            "solo",
            gated_worker(receiver),
            false,
            None,
            WorkloadClass::Interactive,
        )
        .unwrap();

    let stats = governor.get_stats().threads;
    assert_eq!(stats.total_active, 1);
    assert_eq!(stats.registry_size, 1);

    assert!(governor.threads().unregister(&id));
    assert!(!governor.threads().unregister(&id));

    let stats = governor.get_stats().threads;
    assert_eq!(stats.total_active, 0);
    assert_eq!(stats.registry_size, 0);

    drop(release);
}

#[test]
fn panicking_work_still_unregisters() {
    let governor = idle_governor(quiet_config());
    let id = governor.create_managed_thread(
        "doomed",
        || panic!("boom"),
        false,
        None,
        WorkloadClass::Interactive,
    );
    assert!(id.is_some());
    wait_until("the panicked thread to unregister", || {
        governor.get_stats().threads.total_active == 0
    });
}

#[test]
fn duplicate_ids_are_rejected_while_live() {
    let governor = idle_governor(quiet_config());
    let (release, receiver) = unbounded::<()>();

    assert!(governor
        .create_managed_thread(
            "dup",
            gated_worker(receiver.clone()),
            false,
            None,
            WorkloadClass::Interactive,
        )
        .is_some());
    assert!(governor
        .create_managed_thread("dup", || {}, false, None, WorkloadClass::Interactive)
        .is_none());

    // Once the first holder exits, the id is reusable.
    drop(release);
    wait_until("the first holder to exit", || {
        governor.get_stats().threads.total_active == 0
    });
    assert!(governor
        .create_managed_thread("dup", || {}, false, None, WorkloadClass::Interactive)
        .is_some());
    wait_until("the reused thread to finish", || {
        governor.get_stats().threads.total_active == 0
    });
}

#[test]
fn sampler_failure_fails_open() {
    let governor = Governor::new(quiet_config(), Arc::new(FailingSampler));
    assert!(governor
        .create_managed_thread("n", || {}, false, None, WorkloadClass::Interactive)
        .is_some());
    wait_until("the thread to finish", || {
        governor.get_stats().threads.total_active == 0
    });
}

#[test]
fn update_check_work_is_admitted_under_cpu_pressure() {
    let governor = Governor::new(quiet_config(), Arc::new(FixedSampler::new(90.0, 50.0)));
    let component = ComponentId::new("update_checker");

    assert!(!governor
        .threads()
        .can_create(false, Some(&component), WorkloadClass::Interactive));
    assert!(governor
        .threads()
        .can_create(false, Some(&component), WorkloadClass::UpdateCheck));
}

#[test]
fn extreme_cpu_pressure_denies_even_update_checks() {
    let governor = Governor::new(quiet_config(), Arc::new(FixedSampler::new(99.0, 50.0)));
    assert!(!governor
        .threads()
        .can_create(false, None, WorkloadClass::UpdateCheck));
}

#[test]
fn memory_pressure_is_always_enforced() {
    let governor = Governor::new(quiet_config(), Arc::new(FixedSampler::new(0.0, 95.0)));
    assert!(!governor
        .threads()
        .can_create(false, None, WorkloadClass::UpdateCheck));
}

#[test]
fn startup_grace_relaxes_the_cpu_threshold() {
    let mut config = quiet_config();
    config.thresholds.startup_grace = Duration::from_secs(60);
    let governor = Governor::new(config, Arc::new(FixedSampler::new(90.0, 50.0)));
    assert!(governor
        .threads()
        .can_create(false, None, WorkloadClass::Interactive));
}

#[test]
fn creation_burst_trips_the_suspicion_gate() {
    let mut config = GovernorConfig::default();
    config.thresholds.startup_grace = Duration::ZERO;
    let governor = idle_governor(config);
    let (release, receiver) = unbounded::<()>();

    let mut created = 0;
    for i in 0..18 {
        if governor
            .create_managed_thread(
                format!("burst_{i}"),
                gated_worker(receiver.clone()),
                false,
                None,
                WorkloadClass::Interactive,
            )
            .is_some()
        {
            created += 1;
        }
    }

    // The 16th creation exceeds the 15-in-10s burst threshold; everything
    // after it is denied by the suspicion gate.
    assert_eq!(created, 16);
    assert!(governor.get_stats().suspicious_activity);
    assert!(!governor
        .threads()
        .can_create(false, None, WorkloadClass::Interactive));

    drop(release);
    wait_until("workers to drain", || {
        governor.get_stats().threads.total_active == 0
    });
}

#[test]
fn sweeper_reclaims_threads_past_their_timeout() {
    let mut config = quiet_config();
    config.thread.thread_timeout = Duration::from_millis(50);
    let governor = idle_governor(config);
    let (release, receiver) = unbounded::<()>();

    governor
        .create_managed_thread(
            "laggard",
            gated_worker(receiver),
            false,
            None,
            WorkloadClass::Interactive,
        )
        .unwrap();
    std::thread::sleep(Duration::from_millis(80));

    assert_eq!(governor.threads().sweep(), 1);
    assert_eq!(governor.get_stats().threads.total_active, 0);

    // The thread itself is still parked; releasing it exercises the
    // idempotent unregister path in its completion guard.
    drop(release);
}

#[test]
fn emergency_shutdown_blocks_known_components() {
    let governor = idle_governor(quiet_config());
    let (release, receiver) = unbounded::<()>();
    let news = ComponentId::new("news_panel");

    governor
        .create_managed_thread(
            "news_fetch",
            gated_worker(receiver),
            false,
            Some(news.clone()),
            WorkloadClass::Interactive,
        )
        .unwrap();

    governor.emergency_shutdown();
    assert!(!governor
        .threads()
        .can_create(false, Some(&news), WorkloadClass::Interactive));
    // Components the governor has never seen are not blocked.
    assert!(governor.threads().can_create(
        false,
        Some(&ComponentId::new("fresh")),
        WorkloadClass::Interactive
    ));

    drop(release);
    wait_until("workers to drain", || {
        governor.get_stats().threads.total_active == 0
    });
}
