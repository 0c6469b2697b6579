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

//! Headless demonstration of the governor.
//!
//! Wires a [`Governor`] to the real sysinfo sampler and a manual scheduler
//! (standing in for the UI event loop), runs a few governed "fetch" jobs
//! through a worker pool, schedules an autosave timer, and prints the stats
//! a status panel would render.
//!
//! Run with `RUST_LOG=debug cargo run --example governed_fetch` to watch the
//! admission decisions.

use std::sync::Arc;
use std::time::Duration;

use warden_core::component::{ComponentId, WorkloadClass};
use warden_core::config::GovernorConfig;
use warden_governor::Governor;
use warden_infra::{ManualScheduler, SysinfoSampler};

fn main() {
    env_logger::init();

    let governor = Governor::new(GovernorConfig::default(), Arc::new(SysinfoSampler::new()));
    let scheduler = Arc::new(ManualScheduler::new());

    // A long-running update check, admitted with the relaxed CPU thresholds.
    let checker = ComponentId::new("update_checker");
    governor.create_managed_thread(
        "full_update_check",
        || {
            std::thread::sleep(Duration::from_millis(200));
            println!("update check finished");
        },
        true,
        Some(checker),
        WorkloadClass::UpdateCheck,
    );

    // Short package queries go through a governed pool instead of one
    // thread each.
    let pool = governor
        .worker_pool("pkg_query", 4)
        .expect("pool admission");
    for name in ["linux", "pacman", "systemd", "glibc"] {
        pool.submit(move || println!("queried package {name}"));
    }

    // An autosave timer on the (manually pumped) scheduler.
    let saves = ComponentId::new("settings_autosave");
    governor.create_timer(
        scheduler.clone(),
        Duration::from_millis(100),
        || println!("settings saved"),
        Some(saves),
        None,
        true,
    );

    // Pump the cooperative scheduler the way a UI loop would.
    for _ in 0..3 {
        scheduler.advance(Duration::from_millis(100));
    }
    governor.cancel_all_timers();

    pool.shutdown(Duration::from_secs(2));

    let stats = governor.get_stats();
    match serde_json::to_string_pretty(&stats) {
        Ok(json) => println!("{json}"),
        Err(err) => eprintln!("failed to render stats: {err}"),
    }
}
