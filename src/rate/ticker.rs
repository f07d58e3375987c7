// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use tokio::{
    runtime::Handle,
    sync::mpsc::Sender,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tracing::{debug, warn};

use super::ramp::tick_interval;
use crate::controller::Command;

/// A task that posts ramp ticks to the control loop at the ramp tick rate. Each ticker
/// belongs to one ramp generation and stops ticking when dropped.
pub struct RampTicker {
    generation: u64,
    handle: JoinHandle<()>,
}

impl RampTicker {
    /// Spawns a ticker for the given ramp generation. Returns None outside of a tokio
    /// runtime, in which case the owner must drive the ramp itself.
    pub fn spawn(generation: u64, sender: Sender<Command>) -> Option<RampTicker> {
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                warn!(generation, "No runtime available, ramp ticks will not be scheduled.");
                return None;
            }
        };

        let handle = runtime.spawn(async move {
            let mut interval = time::interval(tick_interval());
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            // The first tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                if sender.send(Command::RampTick(generation)).await.is_err() {
                    debug!(generation, "Control loop closed, ramp ticker exiting.");
                    return;
                }
            }
        });

        Some(RampTicker { generation, handle })
    }

    /// The ramp generation this ticker drives.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for RampTicker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
