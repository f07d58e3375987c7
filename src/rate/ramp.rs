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

//! Time based linear interpolation between two speeds.

use std::time::{Duration, Instant};

use super::clamp_speed;

/// How often an in-flight ramp is evaluated.
pub const TICK_RATE_HZ: u32 = 60;

/// The interval between ramp evaluations.
pub fn tick_interval() -> Duration {
    Duration::from_secs_f64(1.0 / f64::from(TICK_RATE_HZ))
}

/// The state of a ramp that is currently in flight.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RampState {
    /// The applied speed when the ramp began.
    pub start_speed: f32,
    /// The clamped speed the ramp ends on.
    pub target_speed: f32,
    /// When the ramp began.
    pub start_time: Instant,
    /// Length of the ramp. Zero or negative completes on the first tick.
    pub duration_secs: f32,
}

/// The result of evaluating a ramp.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RampStep {
    /// The ramp is still running and the speed is an interpolated value.
    InFlight(f32),
    /// The ramp reached its target and has been cleared.
    Finished(f32),
}

impl RampStep {
    /// The speed to apply for this step.
    pub fn speed(&self) -> f32 {
        match self {
            RampStep::InFlight(speed) | RampStep::Finished(speed) => *speed,
        }
    }

    /// Returns true if this was the final step of the ramp.
    pub fn is_finished(&self) -> bool {
        matches!(self, RampStep::Finished(_))
    }
}

/// A speed ramp. Holds at most one in-flight ramp; beginning a new one replaces it.
#[derive(Debug, Default)]
pub struct RateRamp {
    state: Option<RampState>,
}

impl RateRamp {
    /// Creates an idle ramp.
    pub fn new() -> RateRamp {
        RateRamp { state: None }
    }

    /// Begins ramping from `current` to `target` over `duration_secs`, replacing any
    /// ramp already in flight. The target is clamped to the applicable speed range.
    pub fn begin(&mut self, target: f32, duration_secs: f32, current: f32, now: Instant) {
        self.state = Some(RampState {
            start_speed: current,
            target_speed: clamp_speed(target),
            start_time: now,
            duration_secs,
        });
    }

    /// Evaluates the ramp at `now`. Returns None when no ramp is in flight.
    pub fn tick(&mut self, now: Instant) -> Option<RampStep> {
        let state = self.state?;

        let t = if state.duration_secs > 0.0 {
            let elapsed = now.saturating_duration_since(state.start_time).as_secs_f32();
            (elapsed / state.duration_secs).clamp(0.0, 1.0)
        } else {
            1.0
        };

        if t >= 1.0 {
            self.state = None;
            return Some(RampStep::Finished(state.target_speed));
        }

        Some(RampStep::InFlight(
            state.start_speed + (state.target_speed - state.start_speed) * t,
        ))
    }

    /// Drops the in-flight ramp, if any, leaving the applied speed wherever it is.
    pub fn cancel(&mut self) {
        self.state = None;
    }

    /// Returns true while a ramp is in flight.
    pub fn in_flight(&self) -> bool {
        self.state.is_some()
    }

    /// Returns the in-flight ramp.
    pub fn state(&self) -> Option<&RampState> {
        self.state.as_ref()
    }
}
