pub mod engine;
pub mod params;
pub mod variant;

pub use engine::{Phase, ProtocolEngine, ProtocolState};
pub use params::{normalize, Direction, ParameterId, ProtocolParameters, Shape};
pub use variant::Variant;

/// Represents the current state of a signal generator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorState {
    /// Generator is still producing samples
    Running,
    /// Generator has completed and emits only its idle value
    Complete,
}

/// Core trait for tick-driven signal generators
///
/// The host calls [`tick`](SignalGenerator::tick) once per quantum with the
/// sample read from the input channel and writes the returned value to the
/// output channel.
pub trait SignalGenerator {
    /// Advance by one quantum and return the commanded output
    fn tick(&mut self, input: f64) -> f64;

    /// Run one tick per output slot
    ///
    /// Missing input samples read as zero.
    ///
    /// # Returns
    /// * `GeneratorState::Running` if the generator is still active
    /// * `GeneratorState::Complete` if the generator has finished
    fn process(&mut self, inputs: &[f64], outputs: &mut [f64]) -> GeneratorState {
        for (i, out) in outputs.iter_mut().enumerate() {
            *out = self.tick(inputs.get(i).copied().unwrap_or(0.0));
        }

        if self.is_complete() {
            GeneratorState::Complete
        } else {
            GeneratorState::Running
        }
    }

    /// Check if this generator has completed
    fn is_complete(&self) -> bool;

    /// Reset the generator to its initial state
    fn reset(&mut self);
}
