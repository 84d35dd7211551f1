//! The three stimulus protocols built on [`ProtocolEngine`]
//!
//! Each variant fixes a phase shape, a default parameter set, the host-facing
//! parameter table and the output scale of the amplifier it drives.

use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

use super::engine::ProtocolEngine;
use super::params::{Direction, ParameterId, ProtocolParameters, Shape};
use crate::error::ConfigError;

/// Output scale of the downtime staircase: 50 mV command per 100 pA
pub const DOWNTIME_OUTPUT_SCALE: f64 = 0.5e-3;

/// Output scale of the duty-cycle staircases: pA to A
pub const PICOAMP_OUTPUT_SCALE: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// Staircase with a zero-current downtime opening every step
    DowntimeStaircase,
    /// Ascending duty-cycle staircase followed by a fixed depolarization
    ActivationStaircase,
    /// Descending counterpart of the activation staircase
    InactivationStaircase,
}

/// Numeric type the host uses for a parameter field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    Double,
    UInteger,
}

/// Host-facing description of one parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterDescriptor {
    pub id: ParameterId,
    pub label: &'static str,
    pub description: &'static str,
    pub kind: ParameterKind,
}

impl ParameterDescriptor {
    const fn new(
        id: ParameterId,
        label: &'static str,
        description: &'static str,
        kind: ParameterKind,
    ) -> Self {
        Self {
            id,
            label,
            description,
            kind,
        }
    }
}

const DOWNTIME_PARAMETERS: [ParameterDescriptor; 8] = [
    ParameterDescriptor::new(
        ParameterId::Period,
        "Period (s)",
        "Amount of time current is injected at every step",
        ParameterKind::Double,
    ),
    ParameterDescriptor::new(
        ParameterId::Delay,
        "Delay (s)",
        "Time until step starts from beginning of cycle",
        ParameterKind::Double,
    ),
    ParameterDescriptor::new(
        ParameterId::RangeStart,
        "Current Range Start (pA)",
        "Starting current of the steps",
        ParameterKind::Double,
    ),
    ParameterDescriptor::new(
        ParameterId::RangeEnd,
        "Current Range End (pA)",
        "Ending current of the steps",
        ParameterKind::Double,
    ),
    ParameterDescriptor::new(
        ParameterId::StepSize,
        "Increment (pA)",
        "Current added at every step",
        ParameterKind::UInteger,
    ),
    ParameterDescriptor::new(
        ParameterId::Cycles,
        "Cycles (#)",
        "How many times to repeat the protocol",
        ParameterKind::UInteger,
    ),
    ParameterDescriptor::new(
        ParameterId::Downtime,
        "Down Time (s)",
        "The time between each step where the output is 0",
        ParameterKind::Double,
    ),
    ParameterDescriptor::new(
        ParameterId::Offset,
        "Offset (pA)",
        "DC offset to add",
        ParameterKind::Double,
    ),
];

const ACTIVATION_PARAMETERS: [ParameterDescriptor; 10] = [
    ParameterDescriptor::new(
        ParameterId::Period,
        "Period (s)",
        "Duration of one cycle",
        ParameterKind::Double,
    ),
    ParameterDescriptor::new(
        ParameterId::Delay,
        "Delay (s)",
        "Time until step starts from beginning of cycle",
        ParameterKind::Double,
    ),
    ParameterDescriptor::new(
        ParameterId::RangeStart,
        "Min Amp (pA)",
        "Starting current of the steps",
        ParameterKind::Double,
    ),
    ParameterDescriptor::new(
        ParameterId::RangeEnd,
        "Max Amp (pA)",
        "Ending current of the steps",
        ParameterKind::Double,
    ),
    ParameterDescriptor::new(
        ParameterId::Steps,
        "Increments",
        "How many steps to take between min and max",
        ParameterKind::UInteger,
    ),
    ParameterDescriptor::new(
        ParameterId::Cycles,
        "Cycles (#)",
        "How many times to repeat the protocol",
        ParameterKind::UInteger,
    ),
    ParameterDescriptor::new(
        ParameterId::DutyCycle,
        "Duty Cycle (%)",
        "On time of the step during a single cycle",
        ParameterKind::Double,
    ),
    ParameterDescriptor::new(
        ParameterId::Depolarization,
        "Fixed Depolarization (pA)",
        "Value of the depolarization current",
        ParameterKind::Double,
    ),
    ParameterDescriptor::new(
        ParameterId::DepolarizationTime,
        "Depolarization Time (s)",
        "Time current is at depolarized value",
        ParameterKind::Double,
    ),
    ParameterDescriptor::new(
        ParameterId::Offset,
        "Offset (pA)",
        "DC offset to add",
        ParameterKind::Double,
    ),
];

const INACTIVATION_PARAMETERS: [ParameterDescriptor; 10] = [
    ACTIVATION_PARAMETERS[0],
    ACTIVATION_PARAMETERS[1],
    ParameterDescriptor::new(
        ParameterId::RangeStart,
        "Start Amp (pA)",
        "Starting (highest) current of the steps",
        ParameterKind::Double,
    ),
    ParameterDescriptor::new(
        ParameterId::RangeEnd,
        "End Amp (pA)",
        "Ending (lowest) current of the steps",
        ParameterKind::Double,
    ),
    ParameterDescriptor::new(
        ParameterId::Steps,
        "Increments",
        "How many steps to take between start and end",
        ParameterKind::UInteger,
    ),
    ACTIVATION_PARAMETERS[5],
    ACTIVATION_PARAMETERS[6],
    ACTIVATION_PARAMETERS[7],
    ACTIVATION_PARAMETERS[8],
    ACTIVATION_PARAMETERS[9],
];

impl Variant {
    pub const ALL: [Variant; 3] = [
        Variant::DowntimeStaircase,
        Variant::ActivationStaircase,
        Variant::InactivationStaircase,
    ];

    /// Module name shown by the host
    pub fn name(self) -> &'static str {
        match self {
            Variant::DowntimeStaircase => "MRT",
            Variant::ActivationStaircase => "IA Activation",
            Variant::InactivationStaircase => "IA Inactivation",
        }
    }

    /// Key used in protocol files and on the command line
    pub fn key(self) -> &'static str {
        match self {
            Variant::DowntimeStaircase => "downtime_staircase",
            Variant::ActivationStaircase => "activation_staircase",
            Variant::InactivationStaircase => "inactivation_staircase",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Variant::DowntimeStaircase => {
                "Generates a series of currents in a designated range, each step opened by a zero-current downtime."
            }
            Variant::ActivationStaircase => {
                "Generates a train of current pulses with amplitudes rising from a minimum to a maximum, each followed by a fixed depolarization."
            }
            Variant::InactivationStaircase => {
                "Generates a train of current pulses with amplitudes falling from a start to an end value, each followed by a fixed depolarization."
            }
        }
    }

    pub fn output_scale(self) -> f64 {
        match self {
            Variant::DowntimeStaircase => DOWNTIME_OUTPUT_SCALE,
            Variant::ActivationStaircase | Variant::InactivationStaircase => PICOAMP_OUTPUT_SCALE,
        }
    }

    pub fn default_parameters(self) -> ProtocolParameters {
        match self {
            Variant::DowntimeStaircase => ProtocolParameters {
                period: 0.25,
                delay: 0.0,
                range_start: -100.0,
                range_end: 380.0,
                cycles: 1,
                offset: 0.0,
                shape: Shape::Downtime {
                    step_size: 20,
                    downtime: 0.0,
                },
            },
            Variant::ActivationStaircase => ProtocolParameters {
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
                    direction: Direction::Ascending,
                },
            },
            Variant::InactivationStaircase => ProtocolParameters {
                range_start: 0.0,
                range_end: -210.0,
                shape: Shape::DutyCycle {
                    steps: 8,
                    duty_cycle: 15.0,
                    depolarization: 150.0,
                    depolarization_time: 1.0,
                    direction: Direction::Descending,
                },
                ..Variant::ActivationStaircase.default_parameters()
            },
        }
    }

    pub fn descriptors(self) -> &'static [ParameterDescriptor] {
        match self {
            Variant::DowntimeStaircase => &DOWNTIME_PARAMETERS,
            Variant::ActivationStaircase => &ACTIVATION_PARAMETERS,
            Variant::InactivationStaircase => &INACTIVATION_PARAMETERS,
        }
    }

    /// Look up a parameter by its host label or machine key
    pub fn find_parameter(self, name: &str) -> Option<&'static ParameterDescriptor> {
        self.descriptors()
            .iter()
            .find(|d| d.label == name || d.id.key() == name)
    }

    /// Engine running this variant's defaults
    pub fn engine(self, quantum: Duration) -> ProtocolEngine {
        ProtocolEngine::new(self.default_parameters(), self.output_scale(), quantum)
    }
}

impl FromStr for Variant {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Variant::ALL
            .into_iter()
            .find(|v| v.key() == s || v.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ConfigError::UnknownVariant(s.to_string()))
    }
}
