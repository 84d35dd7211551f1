//! Tick scheduler
//!
//! Drives a [`Module`] one quantum at a time, the way the real-time host does.
//! Host events (reconfiguration, quantum changes, pause) are dispatched at tick
//! boundaries before the module runs, and every tick is recorded as a
//! [`TraceSample`].

use std::time::Duration;

use tracing::{debug, warn};

use super::Module;
use crate::generator::params::ParameterId;
use crate::generator::{Phase, ProtocolParameters};

/// Something the host does to a module between ticks
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    Reconfigure(ProtocolParameters),
    SetParameter(ParameterId, f64),
    ChangeQuantum(Duration),
    Pause,
    Resume,
    /// Re-apply the variant defaults
    Reinitialize,
}

/// Host event bound to the tick before which it is dispatched
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledEvent {
    pub tick: usize,
    pub event: HostEvent,
}

impl ScheduledEvent {
    pub fn new(tick: usize, event: HostEvent) -> Self {
        Self { tick, event }
    }
}

/// One recorded tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceSample {
    /// Host time at the start of the tick in seconds
    pub time: f64,
    pub input: f64,
    pub output: f64,
    /// Engine phase, `None` while the module is paused
    pub phase: Option<Phase>,
}

pub struct Scheduler {
    module: Module,
    events: Vec<ScheduledEvent>,
    /// Next event to dispatch
    event_index: usize,
    current_tick: usize,
    /// Host time in seconds
    elapsed: f64,
}

impl Scheduler {
    /// Create a scheduler
    ///
    /// # Arguments
    /// * `module` - Module to drive
    /// * `events` - Host events, in any order
    pub fn new(module: Module, mut events: Vec<ScheduledEvent>) -> Self {
        events.sort_by_key(|e| e.tick);
        Self {
            module,
            events,
            event_index: 0,
            current_tick: 0,
            elapsed: 0.0,
        }
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn module_mut(&mut self) -> &mut Module {
        &mut self.module
    }

    pub fn current_tick(&self) -> usize {
        self.current_tick
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Check if there are pending events or the protocol is still running
    pub fn is_active(&self) -> bool {
        self.event_index < self.events.len() || !self.module.is_complete()
    }

    /// Dispatch every event due at the current tick
    fn process_events(&mut self) {
        while self.event_index < self.events.len()
            && self.events[self.event_index].tick <= self.current_tick
        {
            let event = self.events[self.event_index].event.clone();
            self.event_index += 1;
            debug!(tick = self.current_tick, ?event, "dispatching host event");
            self.dispatch(event);
        }
    }

    fn dispatch(&mut self, event: HostEvent) {
        match event {
            HostEvent::Reconfigure(params) => self.module.on_parameters_changed(params),
            HostEvent::SetParameter(id, value) => {
                if let Err(e) = self.module.set_parameter(id, value) {
                    warn!(tick = self.current_tick, "ignoring host event: {}", e);
                }
            }
            HostEvent::ChangeQuantum(quantum) => self.module.on_quantum_changed(quantum),
            HostEvent::Pause => self.module.on_pause_requested(),
            HostEvent::Resume => self.module.on_resume(),
            HostEvent::Reinitialize => self.module.on_init(),
        }
    }

    /// Run a single tick and record it
    pub fn tick(&mut self, input: f64) -> TraceSample {
        self.process_events();

        let time = self.elapsed;
        let output = self.module.execute(input);
        let phase = if self.module.is_paused() {
            None
        } else {
            Some(self.module.phase())
        };

        // Advance by the quantum the tick actually ran with
        self.elapsed += self.module.quantum().as_secs_f64();
        self.current_tick += 1;

        TraceSample {
            time,
            input,
            output,
            phase,
        }
    }

    /// Process one frame: one tick per output slot
    ///
    /// Missing input samples read as zero.
    pub fn process_frame(&mut self, inputs: &[f64], outputs: &mut [f64]) {
        for (i, out) in outputs.iter_mut().enumerate() {
            *out = self.tick(inputs.get(i).copied().unwrap_or(0.0)).output;
        }
    }

    /// Run a fixed number of ticks
    ///
    /// `input` maps host time in seconds to the observed sample.
    pub fn run<F>(&mut self, ticks: usize, mut input: F) -> Vec<TraceSample>
    where
        F: FnMut(f64) -> f64,
    {
        let mut trace = Vec::with_capacity(ticks);
        for _ in 0..ticks {
            let sample = input(self.elapsed);
            trace.push(self.tick(sample));
        }
        trace
    }

    /// Run until the protocol completes and all events are dispatched
    ///
    /// Stops after `max_ticks` regardless, since a degenerate protocol may
    /// never complete.
    pub fn run_until_complete<F>(&mut self, max_ticks: usize, mut input: F) -> Vec<TraceSample>
    where
        F: FnMut(f64) -> f64,
    {
        let mut trace = Vec::new();
        while self.is_active() && trace.len() < max_ticks {
            let sample = input(self.elapsed);
            trace.push(self.tick(sample));
        }
        if self.is_active() {
            warn!(max_ticks, "protocol still running at tick limit");
        }
        trace
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::Variant;

    const QUANTUM: Duration = Duration::from_millis(125);

    fn single_step() -> ProtocolParameters {
        let mut params = Variant::ActivationStaircase.default_parameters();
        params.range_start = 100.0;
        params.range_end = 100.0;
        params.set(ParameterId::Steps, 1.0);
        params.set(ParameterId::DutyCycle, 100.0);
        params.set(ParameterId::DepolarizationTime, 0.0);
        params
    }

    fn scheduler(events: Vec<ScheduledEvent>) -> Scheduler {
        let mut module = Module::new(Variant::ActivationStaircase, QUANTUM);
        module.on_parameters_changed(single_step());
        Scheduler::new(module, events)
    }

    #[test]
    fn test_run_until_complete() {
        let mut s = scheduler(vec![]);
        let trace = s.run_until_complete(1000, |_| 0.0);

        // 1s period at 125ms per tick
        assert_eq!(trace.len(), 8);
        assert!(trace.iter().all(|t| t.phase == Some(Phase::Active)));
        assert!(!s.is_active());
        assert_eq!(s.elapsed(), 1.0);
    }

    #[test]
    fn test_events_dispatch_before_their_tick() {
        let events = vec![
            ScheduledEvent::new(4, HostEvent::Resume),
            ScheduledEvent::new(2, HostEvent::Pause),
        ];
        let mut s = scheduler(events);
        let trace = s.run(6, |_| 0.0);

        assert!(trace[..2].iter().all(|t| t.output > 0.0));
        assert!(trace[2..4].iter().all(|t| t.output == 0.0 && t.phase.is_none()));
        assert!(trace[4..].iter().all(|t| t.output > 0.0));
        assert_eq!(s.module().engine().state().age, 0.5);
    }

    #[test]
    fn test_quantum_change_affects_later_ticks_only() {
        let events = vec![ScheduledEvent::new(
            2,
            HostEvent::ChangeQuantum(Duration::from_millis(250)),
        )];
        let mut s = scheduler(events);
        let trace = s.run_until_complete(100, |_| 0.0);

        let times: Vec<f64> = trace.iter().map(|t| t.time).collect();
        assert_eq!(times, vec![0.0, 0.125, 0.25, 0.5, 0.75]);
    }

    #[test]
    fn test_reconfigure_restarts_protocol() {
        let mut next = single_step();
        next.offset = 50.0;
        let events = vec![ScheduledEvent::new(6, HostEvent::Reconfigure(next))];
        let mut s = scheduler(events);
        let trace = s.run_until_complete(100, |_| 0.0);

        // 6 ticks before the change, then a full fresh period
        assert_eq!(trace.len(), 6 + 8);
        assert!((trace[6].output - 150.0e-12).abs() < 1e-24);
    }

    #[test]
    fn test_invalid_set_parameter_is_ignored() {
        let events = vec![
            ScheduledEvent::new(0, HostEvent::SetParameter(ParameterId::StepSize, 5.0)),
            ScheduledEvent::new(0, HostEvent::SetParameter(ParameterId::Offset, 5.0)),
        ];
        let mut s = scheduler(events);
        s.tick(0.0);
        assert_eq!(s.module().parameters().offset, 5.0);
    }

    #[test]
    fn test_input_is_sampled_at_host_time() {
        let mut s = scheduler(vec![]);
        let trace = s.run(3, |t| -0.065 + t);
        assert_eq!(trace[2].input, -0.065 + 0.25);
        assert_eq!(s.module().engine().observed(), -0.065 + 0.25);
    }

    #[test]
    fn test_process_frame() {
        let mut s = scheduler(vec![]);
        let mut outputs = [0.0; 10];
        s.process_frame(&[], &mut outputs);
        assert!(outputs[..8].iter().all(|&o| o > 0.0));
        assert_eq!(outputs[8..], [0.0, 0.0]);
        assert_eq!(s.current_tick(), 10);
    }
}
