//! Protocol files
//!
//! A protocol file names a variant, the host quantum and any parameter
//! overrides, plus optional host events. Example:
//!
//! ```json
//! {
//!   "variant": "activation_staircase",
//!   "quantum_us": 100,
//!   "ticks": 100000,
//!   "parameters": { "steps": 4, "range_start": -120, "range_end": 0 },
//!   "events": [
//!     { "at_tick": 20000, "kind": "pause" },
//!     { "at_tick": 25000, "kind": "resume" },
//!     { "at_tick": 30000, "kind": "set", "parameter": "offset", "value": 10 }
//!   ]
//! }
//! ```
//!
//! Fields left out of `parameters` keep the variant defaults.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;
use crate::generator::{ParameterId, ProtocolParameters, Variant};
use crate::host::{HostEvent, Module, ScheduledEvent, Scheduler};

/// Quantum used when a protocol file does not name one (10 kHz)
pub const DEFAULT_QUANTUM_US: u64 = 100;

fn default_quantum_us() -> u64 {
    DEFAULT_QUANTUM_US
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProtocolFile {
    pub variant: Variant,
    #[serde(default = "default_quantum_us")]
    pub quantum_us: u64,
    /// Ticks to run; until completion when absent
    #[serde(default)]
    pub ticks: Option<usize>,
    #[serde(default)]
    pub parameters: BTreeMap<ParameterId, f64>,
    #[serde(default)]
    pub events: Vec<EventEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventEntry {
    pub at_tick: usize,
    #[serde(flatten)]
    pub action: EventAction,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventAction {
    Pause,
    Resume,
    Reinitialize,
    Quantum { quantum_us: u64 },
    Set { parameter: ParameterId, value: f64 },
}

impl ProtocolFile {
    /// Protocol file running a variant's defaults
    pub fn for_variant(variant: Variant) -> Self {
        Self {
            variant,
            quantum_us: DEFAULT_QUANTUM_US,
            ticks: None,
            parameters: BTreeMap::new(),
            events: Vec::new(),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn quantum(&self) -> Duration {
        Duration::from_micros(self.quantum_us)
    }

    /// Apply a `name=value` override, by machine key or host label
    pub fn apply_assignment(&mut self, assignment: &str) -> Result<(), ConfigError> {
        let (name, value) = assignment
            .split_once('=')
            .ok_or_else(|| ConfigError::InvalidAssignment(assignment.to_string()))?;
        let name = name.trim();
        let value: f64 = value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidAssignment(assignment.to_string()))?;

        let id = match self.variant.find_parameter(name) {
            Some(descriptor) => descriptor.id,
            None => name.parse::<ParameterId>()?,
        };
        self.check_applicable(id)?;
        self.parameters.insert(id, value);
        Ok(())
    }

    fn check_applicable(&self, id: ParameterId) -> Result<(), ConfigError> {
        if self.variant.default_parameters().get(id).is_none() {
            return Err(ConfigError::NotApplicable {
                parameter: id,
                variant: self.variant,
            });
        }
        Ok(())
    }

    /// Variant defaults with the file's overrides applied, not yet normalized
    pub fn parameters(&self) -> Result<ProtocolParameters, ConfigError> {
        let mut params = self.variant.default_parameters();
        for (&id, &value) in &self.parameters {
            if !params.set(id, value) {
                return Err(ConfigError::NotApplicable {
                    parameter: id,
                    variant: self.variant,
                });
            }
        }
        Ok(params)
    }

    pub fn host_events(&self) -> Result<Vec<ScheduledEvent>, ConfigError> {
        self.events
            .iter()
            .map(|entry| {
                let event = match entry.action {
                    EventAction::Pause => HostEvent::Pause,
                    EventAction::Resume => HostEvent::Resume,
                    EventAction::Reinitialize => HostEvent::Reinitialize,
                    EventAction::Quantum { quantum_us } => {
                        HostEvent::ChangeQuantum(Duration::from_micros(quantum_us))
                    }
                    EventAction::Set { parameter, value } => {
                        self.check_applicable(parameter)?;
                        HostEvent::SetParameter(parameter, value)
                    }
                };
                Ok(ScheduledEvent::new(entry.at_tick, event))
            })
            .collect()
    }

    /// Module configured from this file
    pub fn module(&self) -> Result<Module, ConfigError> {
        let mut module = Module::new(self.variant, self.quantum());
        if !self.parameters.is_empty() {
            module.on_parameters_changed(self.parameters()?);
        }
        Ok(module)
    }

    pub fn scheduler(&self) -> Result<Scheduler, ConfigError> {
        Ok(Scheduler::new(self.module()?, self.host_events()?))
    }
}
