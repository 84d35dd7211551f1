use std::time::Duration;

use tracing::{debug, trace};

use super::params::{normalize, Direction, ProtocolParameters, Shape, EPS};
use super::SignalGenerator;

/// Staircase current protocol engine
///
/// One engine runs one protocol. On every tick it emits the commanded current
/// for the current position in the protocol and advances its counters by the
/// host quantum. Two phase shapes share the engine:
///
/// - Downtime: each step opens with a zero-current downtime, then holds the
///   staircase level `range_start + step` for one period.
/// - Duty cycle: each step holds `range_start ± step · delta` for the duty
///   fraction of the period and a fixed depolarizing level for a set time.
///
/// Once all cycles have run the engine emits the offset and stops advancing.
/// The returned value is already multiplied by the output scale.
#[derive(Debug, Clone)]
pub struct ProtocolEngine {
    params: ProtocolParameters,
    state: ProtocolState,
    scale: f64,
    quantum: Duration,
    // Quantum in seconds
    dt: f64,
    observed: f64,
    phase: Phase,
}

/// Mutable counters of a running protocol
///
/// Recreated from scratch whenever the parameters change.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ProtocolState {
    /// Completed cycles
    pub cycle: i32,
    /// Step index for duty-cycle protocols, accumulated pA for downtime protocols
    pub step: i64,
    /// Seconds elapsed in the current step
    pub age: f64,
    /// Seconds spent in the secondary (downtime or depolarization) phase
    pub inter_age: f64,
    /// Amplitude increment per duty-cycle step
    pub derived_delta: f64,
}

impl ProtocolState {
    pub fn new(params: &ProtocolParameters) -> Self {
        Self {
            derived_delta: params.step_delta(),
            ..Self::default()
        }
    }
}

/// Phase the last tick was spent in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No tick since the last reset
    Idle,
    /// Zero-current downtime
    Downtime,
    /// Staircase level
    Active,
    /// Fixed depolarizing level
    Depolarization,
    /// Waiting out the rest of the period at the offset level
    Hold,
    /// All cycles done
    Complete,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Downtime => "downtime",
            Phase::Active => "active",
            Phase::Depolarization => "depolarization",
            Phase::Hold => "hold",
            Phase::Complete => "complete",
        }
    }
}

impl ProtocolEngine {
    /// Create an engine from raw parameters
    ///
    /// # Arguments
    /// * `params` - Raw parameters, normalized before use
    /// * `scale` - Factor applied to every emitted sample (pA to output units)
    /// * `quantum` - Host tick period
    pub fn new(params: ProtocolParameters, scale: f64, quantum: Duration) -> Self {
        let params = normalize(params);
        Self {
            state: ProtocolState::new(&params),
            params,
            scale,
            quantum,
            dt: quantum.as_secs_f64(),
            observed: 0.0,
            phase: Phase::Idle,
        }
    }

    /// Replace the parameter set and restart the protocol
    pub fn configure(&mut self, params: ProtocolParameters) {
        self.params = normalize(params);
        self.reset();
    }

    /// Pick up a new host quantum for the following ticks
    ///
    /// Time already counted stays as is.
    pub fn set_quantum(&mut self, quantum: Duration) {
        self.quantum = quantum;
        self.dt = quantum.as_secs_f64();
    }

    pub fn quantum(&self) -> Duration {
        self.quantum
    }

    pub fn parameters(&self) -> &ProtocolParameters {
        &self.params
    }

    pub fn state(&self) -> &ProtocolState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn output_scale(&self) -> f64 {
        self.scale
    }

    /// Last observed input sample
    pub fn observed(&self) -> f64 {
        self.observed
    }

    pub fn is_complete(&self) -> bool {
        self.state.cycle >= self.params.cycles
    }

    fn tick_downtime(&mut self, step_size: i32, downtime: f64) -> f64 {
        let p = self.params;
        let dt = self.dt;
        let s = &mut self.state;
        let step_size = i64::from(step_size);
        let mut out = p.offset;

        if (s.step as f64) < p.range_end + step_size as f64 {
            let level = s.step as f64;
            let active_start = p.delay + downtime;

            // The opening downtime also uses up the inter-step downtime, so the
            // delay window that follows is held rather than zeroed again.
            if s.age <= downtime {
                out = 0.0;
                s.age += dt;
                s.inter_age += dt;
                self.phase = Phase::Downtime;
            } else if s.age >= active_start && s.age < active_start + p.period - EPS {
                out = if level > p.range_end {
                    p.range_end
                } else {
                    p.offset + p.range_start + level
                };
                s.age += dt;
                self.phase = Phase::Active;
            } else if s.inter_age < downtime {
                out = 0.0;
                s.inter_age += dt;
                self.phase = Phase::Downtime;
            } else {
                s.age += dt;
                self.phase = Phase::Hold;
            }

            if s.age >= p.period + downtime - EPS {
                s.step += step_size;
                s.age = 0.0;
                s.inter_age = 0.0;
                trace!(step = s.step, cycle = s.cycle, "step advanced");
            }
        } else {
            self.phase = Phase::Hold;
        }

        if s.step as f64 > p.range_end {
            s.cycle += 1;
            s.step = 0;
            debug!(cycle = s.cycle, cycles = p.cycles, "cycle complete");
        }

        out
    }

    fn tick_duty_cycle(
        &mut self,
        steps: i32,
        duty_cycle: f64,
        depolarization: f64,
        depolarization_time: f64,
        direction: Direction,
    ) -> f64 {
        let p = self.params;
        let dt = self.dt;
        let s = &mut self.state;
        let steps = i64::from(steps);
        let mut out = p.offset;

        if s.step < steps {
            let active_end = p.delay + p.period * (duty_cycle / 100.0) - EPS;

            if s.age >= p.delay && s.age < active_end {
                out = p.offset + p.range_start + direction.sign() * s.step as f64 * s.derived_delta;
                s.age += dt;
                self.phase = Phase::Active;
            } else if s.inter_age < depolarization_time {
                out = depolarization;
                s.inter_age += dt;
                self.phase = Phase::Depolarization;
            } else {
                s.age += dt;
                self.phase = Phase::Hold;
            }

            if s.age >= p.period - EPS {
                s.step += 1;
                s.age = 0.0;
                s.inter_age = 0.0;
                trace!(step = s.step, cycle = s.cycle, "step advanced");
            }
        } else {
            self.phase = Phase::Hold;
        }

        if s.step == steps {
            s.cycle += 1;
            s.step = 0;
            debug!(cycle = s.cycle, cycles = p.cycles, "cycle complete");
        }

        out
    }
}

impl SignalGenerator for ProtocolEngine {
    fn tick(&mut self, observed: f64) -> f64 {
        self.observed = observed;

        if self.is_complete() {
            self.phase = Phase::Complete;
            return self.params.offset * self.scale;
        }

        let out = match self.params.shape {
            Shape::Downtime {
                step_size,
                downtime,
            } => self.tick_downtime(step_size, downtime),
            Shape::DutyCycle {
                steps,
                duty_cycle,
                depolarization,
                depolarization_time,
                direction,
            } => self.tick_duty_cycle(
                steps,
                duty_cycle,
                depolarization,
                depolarization_time,
                direction,
            ),
        };

        if self.is_complete() {
            debug!(cycles = self.params.cycles, "protocol complete");
        }

        out * self.scale
    }

    fn is_complete(&self) -> bool {
        self.is_complete()
    }

    fn reset(&mut self) {
        self.state = ProtocolState::new(&self.params);
        self.phase = Phase::Idle;
    }
}
