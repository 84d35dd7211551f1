//! Protocol parameters and their normalization
//!
//! The host pushes raw values; [`normalize`] coerces them into a set the engine
//! can always run. Out-of-range values are replaced, never rejected.

use serde::Deserialize;
use std::str::FromStr;

use crate::error::ConfigError;

/// Tolerance applied at every phase boundary comparison
pub const EPS: f64 = 1e-9;

/// Direction of the amplitude ramp in duty-cycle protocols
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Each step adds the increment to the start amplitude
    Ascending,
    /// Each step subtracts the increment from the start amplitude
    Descending,
}

impl Direction {
    pub fn sign(self) -> f64 {
        match self {
            Direction::Ascending => 1.0,
            Direction::Descending => -1.0,
        }
    }
}

/// Phase shape of a protocol, with the fields only that shape uses
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    /// Staircase gated by a zero-current downtime at the start of every step.
    ///
    /// `step_size` is the amplitude increment in pA between steps.
    Downtime { step_size: i32, downtime: f64 },
    /// Duty-cycled staircase followed by a fixed depolarizing level.
    ///
    /// `steps` is the number of amplitude levels between the two bounds,
    /// `duty_cycle` the percentage of the period spent on the ramp level.
    DutyCycle {
        steps: i32,
        duty_cycle: f64,
        depolarization: f64,
        depolarization_time: f64,
        direction: Direction,
    },
}

/// Complete parameter set of one protocol
///
/// Times are in seconds, amplitudes in picoamps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProtocolParameters {
    /// Cycle length of one step
    pub period: f64,
    /// Time after the step start before the active phase begins
    pub delay: f64,
    pub range_start: f64,
    pub range_end: f64,
    /// Number of protocol repetitions
    pub cycles: i32,
    /// Constant bias added to the emitted amplitude
    pub offset: f64,
    pub shape: Shape,
}

impl ProtocolParameters {
    /// Amplitude increment between consecutive duty-cycle steps
    ///
    /// Zero for downtime protocols and whenever there are fewer than two steps.
    pub fn step_delta(&self) -> f64 {
        match self.shape {
            Shape::DutyCycle { steps, .. } if steps > 1 => {
                (self.range_end - self.range_start).abs() / f64::from(steps - 1)
            }
            _ => 0.0,
        }
    }

    /// Upper bound a non-zero delay may take before it is discarded
    pub fn delay_limit(&self) -> f64 {
        match self.shape {
            Shape::Downtime { .. } => self.period,
            Shape::DutyCycle { duty_cycle, .. } => self.period * duty_cycle / 100.0,
        }
    }

    /// Read a parameter by id, `None` if the shape has no such field
    pub fn get(&self, id: ParameterId) -> Option<f64> {
        match (id, self.shape) {
            (ParameterId::Period, _) => Some(self.period),
            (ParameterId::Delay, _) => Some(self.delay),
            (ParameterId::RangeStart, _) => Some(self.range_start),
            (ParameterId::RangeEnd, _) => Some(self.range_end),
            (ParameterId::Cycles, _) => Some(f64::from(self.cycles)),
            (ParameterId::Offset, _) => Some(self.offset),
            (ParameterId::StepSize, Shape::Downtime { step_size, .. }) => {
                Some(f64::from(step_size))
            }
            (ParameterId::Downtime, Shape::Downtime { downtime, .. }) => Some(downtime),
            (ParameterId::Steps, Shape::DutyCycle { steps, .. }) => Some(f64::from(steps)),
            (ParameterId::DutyCycle, Shape::DutyCycle { duty_cycle, .. }) => Some(duty_cycle),
            (ParameterId::Depolarization, Shape::DutyCycle { depolarization, .. }) => {
                Some(depolarization)
            }
            (
                ParameterId::DepolarizationTime,
                Shape::DutyCycle {
                    depolarization_time,
                    ..
                },
            ) => Some(depolarization_time),
            _ => None,
        }
    }

    /// Write a parameter by id
    ///
    /// Integer parameters take the value truncated toward zero. Returns `false`
    /// and leaves the set untouched when the shape has no such field.
    pub fn set(&mut self, id: ParameterId, value: f64) -> bool {
        match (id, &mut self.shape) {
            (ParameterId::Period, _) => self.period = value,
            (ParameterId::Delay, _) => self.delay = value,
            (ParameterId::RangeStart, _) => self.range_start = value,
            (ParameterId::RangeEnd, _) => self.range_end = value,
            (ParameterId::Cycles, _) => self.cycles = value as i32,
            (ParameterId::Offset, _) => self.offset = value,
            (ParameterId::StepSize, Shape::Downtime { step_size, .. }) => {
                *step_size = value as i32
            }
            (ParameterId::Downtime, Shape::Downtime { downtime, .. }) => *downtime = value,
            (ParameterId::Steps, Shape::DutyCycle { steps, .. }) => *steps = value as i32,
            (ParameterId::DutyCycle, Shape::DutyCycle { duty_cycle, .. }) => *duty_cycle = value,
            (ParameterId::Depolarization, Shape::DutyCycle { depolarization, .. }) => {
                *depolarization = value
            }
            (
                ParameterId::DepolarizationTime,
                Shape::DutyCycle {
                    depolarization_time,
                    ..
                },
            ) => *depolarization_time = value,
            _ => return false,
        }
        true
    }
}

/// Identifier of a single protocol parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterId {
    Period,
    Delay,
    RangeStart,
    RangeEnd,
    StepSize,
    Steps,
    Cycles,
    DutyCycle,
    Downtime,
    Depolarization,
    DepolarizationTime,
    Offset,
}

impl ParameterId {
    /// Machine key used in protocol files and on the command line
    pub fn key(self) -> &'static str {
        match self {
            ParameterId::Period => "period",
            ParameterId::Delay => "delay",
            ParameterId::RangeStart => "range_start",
            ParameterId::RangeEnd => "range_end",
            ParameterId::StepSize => "step_size",
            ParameterId::Steps => "steps",
            ParameterId::Cycles => "cycles",
            ParameterId::DutyCycle => "duty_cycle",
            ParameterId::Downtime => "downtime",
            ParameterId::Depolarization => "depolarization",
            ParameterId::DepolarizationTime => "depolarization_time",
            ParameterId::Offset => "offset",
        }
    }
}

impl FromStr for ParameterId {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "period" => Ok(ParameterId::Period),
            "delay" => Ok(ParameterId::Delay),
            "range_start" | "min" => Ok(ParameterId::RangeStart),
            "range_end" | "max" => Ok(ParameterId::RangeEnd),
            "step_size" | "increment" => Ok(ParameterId::StepSize),
            "steps" | "increments" => Ok(ParameterId::Steps),
            "cycles" => Ok(ParameterId::Cycles),
            "duty_cycle" | "duty" => Ok(ParameterId::DutyCycle),
            "downtime" => Ok(ParameterId::Downtime),
            "depolarization" => Ok(ParameterId::Depolarization),
            "depolarization_time" => Ok(ParameterId::DepolarizationTime),
            "offset" => Ok(ParameterId::Offset),
            _ => Err(ConfigError::UnknownParameter(s.to_string())),
        }
    }
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

/// Coerce a raw parameter set into one the engine can run
///
/// Never fails and is idempotent. A delay of exactly zero goes through the same
/// reset as a negative one, which leaves it at zero.
pub fn normalize(raw: ProtocolParameters) -> ProtocolParameters {
    let mut p = raw;

    if !p.period.is_finite() || p.period <= 0.0 {
        p.period = 1.0;
    }
    p.range_start = finite_or(p.range_start, 0.0);
    p.range_end = finite_or(p.range_end, 0.0);
    p.offset = finite_or(p.offset, 0.0);

    let descending = matches!(
        p.shape,
        Shape::DutyCycle {
            direction: Direction::Descending,
            ..
        }
    );
    if descending {
        if p.range_start < p.range_end {
            p.range_end = p.range_start;
        }
    } else if p.range_end < p.range_start {
        p.range_end = p.range_start;
    }

    if p.cycles < 1 {
        p.cycles = 1;
    }

    match &mut p.shape {
        Shape::Downtime {
            step_size,
            downtime,
        } => {
            if *step_size < 0 {
                *step_size = 0;
            }
            *downtime = finite_or(*downtime, 0.0);
        }
        Shape::DutyCycle {
            steps,
            duty_cycle,
            depolarization,
            depolarization_time,
            ..
        } => {
            if *steps < 0 {
                *steps = 0;
            }
            if !duty_cycle.is_finite() || *duty_cycle < 0.0 || *duty_cycle > 100.0 {
                *duty_cycle = 0.0;
            }
            *depolarization = finite_or(*depolarization, 0.0);
            *depolarization_time = finite_or(*depolarization_time, 0.0);
        }
    }

    if !p.delay.is_finite() || p.delay <= 0.0 || p.delay > p.delay_limit() {
        p.delay = 0.0;
    }

    p
}

#[cfg(test)]
mod tests {
    use super::*;

    fn downtime_params() -> ProtocolParameters {
        ProtocolParameters {
            period: 0.2,
            delay: 0.0,
            range_start: -100.0,
            range_end: 0.0,
            cycles: 1,
            offset: 0.0,
            shape: Shape::Downtime {
                step_size: 10,
                downtime: 0.1,
            },
        }
    }

    fn duty_params(direction: Direction) -> ProtocolParameters {
        ProtocolParameters {
            period: 1.0,
            delay: 0.0,
            range_start: -210.0,
            range_end: 0.0,
            cycles: 1,
            offset: 0.0,
            shape: Shape::DutyCycle {
                steps: 8,
                duty_cycle: 15.0,
                depolarization: 150.0,
                depolarization_time: 1.0,
                direction,
            },
        }
    }

    #[test]
    fn test_non_positive_period_becomes_one() {
        let mut p = downtime_params();
        p.period = 0.0;
        assert_eq!(normalize(p).period, 1.0);

        p.period = -3.0;
        assert_eq!(normalize(p).period, 1.0);

        p.period = f64::NAN;
        assert_eq!(normalize(p).period, 1.0);
    }

    #[test]
    fn test_inverted_bounds_clamp_end_to_start() {
        let mut p = downtime_params();
        p.range_start = 50.0;
        p.range_end = -50.0;
        let n = normalize(p);
        assert_eq!(n.range_start, 50.0);
        assert_eq!(n.range_end, 50.0);

        let mut p = duty_params(Direction::Ascending);
        p.range_start = 10.0;
        p.range_end = -10.0;
        assert_eq!(normalize(p).range_end, 10.0);
    }

    #[test]
    fn test_descending_bounds_keep_start_above_end() {
        let mut p = duty_params(Direction::Descending);
        p.range_start = -210.0;
        p.range_end = 0.0;
        let n = normalize(p);
        assert_eq!(n.range_start, -210.0);
        assert_eq!(n.range_end, -210.0);

        p.range_start = 0.0;
        p.range_end = -210.0;
        let n = normalize(p);
        assert_eq!(n.range_start, 0.0);
        assert_eq!(n.range_end, -210.0);
    }

    #[test]
    fn test_counts_are_floored() {
        let mut p = downtime_params();
        p.cycles = -4;
        p.shape = Shape::Downtime {
            step_size: -5,
            downtime: 0.1,
        };
        let n = normalize(p);
        assert_eq!(n.cycles, 1);
        assert_eq!(
            n.shape,
            Shape::Downtime {
                step_size: 0,
                downtime: 0.1
            }
        );

        let mut p = duty_params(Direction::Ascending);
        p.set(ParameterId::Steps, -2.0);
        assert_eq!(normalize(p).get(ParameterId::Steps), Some(0.0));
    }

    #[test]
    fn test_duty_cycle_out_of_range_becomes_zero() {
        for duty in [-1.0, 100.5, f64::INFINITY] {
            let mut p = duty_params(Direction::Ascending);
            p.set(ParameterId::DutyCycle, duty);
            assert_eq!(normalize(p).get(ParameterId::DutyCycle), Some(0.0));
        }

        let mut p = duty_params(Direction::Ascending);
        p.set(ParameterId::DutyCycle, 100.0);
        assert_eq!(normalize(p).get(ParameterId::DutyCycle), Some(100.0));
    }

    #[test]
    fn test_delay_outside_window_is_zeroed() {
        // Downtime protocols allow a delay up to the period
        let mut p = downtime_params();
        p.delay = 0.15;
        assert_eq!(normalize(p).delay, 0.15);
        p.delay = 0.25;
        assert_eq!(normalize(p).delay, 0.0);
        p.delay = -0.1;
        assert_eq!(normalize(p).delay, 0.0);

        // Duty-cycle protocols only up to the active part of the period
        let mut p = duty_params(Direction::Ascending);
        p.delay = 0.1;
        assert_eq!(normalize(p).delay, 0.1);
        p.delay = 0.2;
        assert_eq!(normalize(p).delay, 0.0);
    }

    #[test]
    fn test_zero_delay_is_coerced_to_zero() {
        let mut p = downtime_params();
        p.delay = 0.0;
        assert_eq!(normalize(p).delay, 0.0);

        let mut p = duty_params(Direction::Descending);
        p.delay = 0.0;
        assert_eq!(normalize(p).delay, 0.0);
    }

    #[test]
    fn test_delay_checked_against_corrected_period() {
        let mut p = downtime_params();
        p.period = -1.0;
        p.delay = 0.5;
        let n = normalize(p);
        assert_eq!(n.period, 1.0);
        assert_eq!(n.delay, 0.5);
    }

    #[test]
    fn test_step_delta() {
        let p = duty_params(Direction::Ascending);
        assert!((p.step_delta() - 30.0).abs() < 1e-12);

        let mut p = duty_params(Direction::Descending);
        p.range_start = 0.0;
        p.range_end = -210.0;
        assert!((p.step_delta() - 30.0).abs() < 1e-12);

        let mut p = duty_params(Direction::Ascending);
        p.set(ParameterId::Steps, 1.0);
        assert_eq!(p.step_delta(), 0.0);
        p.set(ParameterId::Steps, 0.0);
        assert_eq!(p.step_delta(), 0.0);

        assert_eq!(downtime_params().step_delta(), 0.0);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let mut cases = vec![downtime_params(), duty_params(Direction::Ascending)];

        let mut p = downtime_params();
        p.period = -2.0;
        p.delay = 3.0;
        p.range_start = 5.0;
        p.range_end = f64::NAN;
        p.cycles = 0;
        cases.push(p);

        let mut p = duty_params(Direction::Descending);
        p.period = 0.0;
        p.delay = 0.1;
        p.offset = f64::NEG_INFINITY;
        p.set(ParameterId::DutyCycle, 250.0);
        p.set(ParameterId::Steps, -7.0);
        cases.push(p);

        let mut p = duty_params(Direction::Ascending);
        p.delay = 0.15;
        p.set(ParameterId::DutyCycle, 15.0);
        cases.push(p);

        for raw in cases {
            let once = normalize(raw);
            assert_eq!(normalize(once), once, "not idempotent for {:?}", raw);
        }
    }

    #[test]
    fn test_get_and_set_respect_shape() {
        let mut p = downtime_params();
        assert_eq!(p.get(ParameterId::StepSize), Some(10.0));
        assert_eq!(p.get(ParameterId::DutyCycle), None);
        assert!(!p.set(ParameterId::Depolarization, 1.0));
        assert!(p.set(ParameterId::Downtime, 0.3));
        assert_eq!(p.get(ParameterId::Downtime), Some(0.3));

        let mut p = duty_params(Direction::Ascending);
        assert_eq!(p.get(ParameterId::Downtime), None);
        assert!(p.set(ParameterId::Steps, 4.9));
        assert_eq!(p.get(ParameterId::Steps), Some(4.0));
    }

    #[test]
    fn test_parameter_id_from_str() {
        assert_eq!("period".parse::<ParameterId>().ok(), Some(ParameterId::Period));
        assert_eq!("duty".parse::<ParameterId>().ok(), Some(ParameterId::DutyCycle));
        for id in [ParameterId::DepolarizationTime, ParameterId::StepSize] {
            assert_eq!(id.key().parse::<ParameterId>().ok(), Some(id));
        }
        assert!(matches!(
            "gain".parse::<ParameterId>(),
            Err(ConfigError::UnknownParameter(name)) if name == "gain"
        ));
    }
}
