//! In-process model of the real-time host
//!
//! A [`Module`] wraps one [`ProtocolEngine`] with the lifecycle the host drives:
//! initialization, parameter changes, pause and quantum changes. The
//! [`Scheduler`] runs a module tick by tick and dispatches timed host events.

pub mod scheduler;

pub use scheduler::{HostEvent, ScheduledEvent, Scheduler, TraceSample};

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::error::ConfigError;
use crate::generator::params::ParameterId;
use crate::generator::{Phase, ProtocolEngine, ProtocolParameters, SignalGenerator, Variant};

/// Name of the observed voltage channel
pub const INPUT_CHANNEL: &str = "Vin";

/// Name of the commanded current channel
pub const OUTPUT_CHANNEL: &str = "Iout";

/// Convert the host's clock period in nanoseconds to a quantum
pub fn quantum_from_period_ns(period_ns: u64) -> Duration {
    Duration::from_nanos(period_ns)
}

/// One protocol module as seen by the host
pub struct Module {
    variant: Variant,
    engine: ProtocolEngine,
    output: f64,
    paused: bool,
    staged: Arc<Mutex<Option<ProtocolParameters>>>,
}

/// Cross-thread handle staging a parameter set for a [`Module`]
///
/// The staged set replaces the module's parameters whole at the start of the
/// next tick. Staging again before that tick overwrites the earlier set.
#[derive(Clone)]
pub struct ReconfigureHandle {
    staged: Arc<Mutex<Option<ProtocolParameters>>>,
}

impl ReconfigureHandle {
    pub fn stage(&self, params: ProtocolParameters) {
        *self.staged.lock() = Some(params);
    }

    pub fn is_pending(&self) -> bool {
        self.staged.lock().is_some()
    }
}

impl Module {
    /// Create a module running the variant's defaults
    pub fn new(variant: Variant, quantum: Duration) -> Self {
        let mut module = Self {
            variant,
            engine: variant.engine(quantum),
            output: 0.0,
            paused: false,
            staged: Arc::new(Mutex::new(None)),
        };
        module.on_init();
        module
    }

    /// Apply the variant defaults and restart the protocol
    pub fn on_init(&mut self) {
        self.engine.configure(self.variant.default_parameters());
        self.output = 0.0;
        self.paused = false;
        info!(module = self.variant.name(), "initialized with defaults");
    }

    /// Replace the parameter set and restart the protocol
    pub fn on_parameters_changed(&mut self, params: ProtocolParameters) {
        self.engine.configure(params);
        let applied = self.engine.parameters();
        if *applied != params {
            debug!(requested = ?params, applied = ?applied, "parameters coerced");
        }
        info!(module = self.variant.name(), "parameters changed");
    }

    /// Change a single parameter, keeping the others
    pub fn set_parameter(&mut self, id: ParameterId, value: f64) -> Result<(), ConfigError> {
        let mut params = *self.engine.parameters();
        if !params.set(id, value) {
            return Err(ConfigError::NotApplicable {
                parameter: id,
                variant: self.variant,
            });
        }
        self.on_parameters_changed(params);
        Ok(())
    }

    /// Change a parameter by its host label or machine key
    pub fn set_named_parameter(&mut self, name: &str, value: f64) -> Result<(), ConfigError> {
        let descriptor = self
            .variant
            .find_parameter(name)
            .ok_or_else(|| ConfigError::UnknownParameter(name.to_string()))?;
        self.set_parameter(descriptor.id, value)
    }

    /// Force the output to zero and stop advancing until resumed
    pub fn on_pause_requested(&mut self) {
        self.paused = true;
        self.output = 0.0;
        info!(module = self.variant.name(), "paused");
    }

    pub fn on_resume(&mut self) {
        self.paused = false;
        info!(module = self.variant.name(), "resumed");
    }

    /// Pick up a new quantum without restarting the protocol
    pub fn on_quantum_changed(&mut self, quantum: Duration) {
        self.engine.set_quantum(quantum);
        debug!(quantum_us = quantum.as_micros() as u64, "quantum changed");
    }

    /// Run one quantum: read the input sample, return the output sample
    pub fn execute(&mut self, input: f64) -> f64 {
        self.apply_staged();

        self.output = if self.paused {
            0.0
        } else {
            self.engine.tick(input)
        };
        self.output
    }

    fn apply_staged(&mut self) {
        // A contended lock means the control thread is mid-write; take it next tick
        let staged = self.staged.try_lock().and_then(|mut slot| slot.take());
        if let Some(params) = staged {
            self.on_parameters_changed(params);
        }
    }

    pub fn reconfigure_handle(&self) -> ReconfigureHandle {
        ReconfigureHandle {
            staged: Arc::clone(&self.staged),
        }
    }

    /// Last value written to the output channel
    pub fn output(&self) -> f64 {
        self.output
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn engine(&self) -> &ProtocolEngine {
        &self.engine
    }

    pub fn parameters(&self) -> &ProtocolParameters {
        self.engine.parameters()
    }

    pub fn quantum(&self) -> Duration {
        self.engine.quantum()
    }

    pub fn phase(&self) -> Phase {
        self.engine.phase()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_complete(&self) -> bool {
        self.engine.is_complete()
    }
}
