//! Journaling backend fake.
//!
//! Records the exact call sequence the harness drives against the backend
//! seams, and can be told to fail at chosen points so abort paths are
//! observable from the outside.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tessel::backend::spec::{
    BackendError, BackendResult, CompilationUnit, DeviceRuntime, KernelBackend, MappingOptions,
};
use tessel::tensor::{Shape, Tensor};

/// One recorded call against the backend surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Define,
    Compile,
    Run,
    RunTimed,
    UncheckedRun,
    Synchronize,
}

#[derive(Debug, Default)]
struct Journal {
    events: Vec<Event>,
    synchronize_calls: usize,
}

#[derive(Debug, Clone, Copy, Default)]
struct Behavior {
    fail_compile: bool,
    fail_synchronize_at: Option<usize>,
}

/// Test-only backend journaling every call the harness makes.
#[derive(Debug)]
pub struct RecordingBackend {
    journal: Arc<Mutex<Journal>>,
    behavior: Behavior,
    device: RecordingDevice,
}

impl RecordingBackend {
    pub fn new() -> Self {
        RecordingBackend::with_behavior(Behavior::default())
    }

    /// A backend whose `compile` always fails.
    pub fn failing_compile() -> Self {
        RecordingBackend::with_behavior(Behavior {
            fail_compile: true,
            ..Behavior::default()
        })
    }

    /// A backend whose `call`-th synchronize (counting from 1) fails.
    pub fn failing_synchronize_at(call: usize) -> Self {
        RecordingBackend::with_behavior(Behavior {
            fail_synchronize_at: Some(call),
            ..Behavior::default()
        })
    }

    fn with_behavior(behavior: Behavior) -> Self {
        let journal = Arc::new(Mutex::new(Journal::default()));
        RecordingBackend {
            device: RecordingDevice {
                journal: journal.clone(),
                behavior,
            },
            journal,
            behavior,
        }
    }

    /// Snapshot of the recorded call sequence.
    pub fn events(&self) -> Vec<Event> {
        self.journal
            .lock()
            .expect("journal mutex poisoned")
            .events
            .clone()
    }

    /// Number of synchronize calls observed so far.
    pub fn synchronize_calls(&self) -> usize {
        self.journal
            .lock()
            .expect("journal mutex poisoned")
            .synchronize_calls
    }
}

impl Default for RecordingBackend {
    fn default() -> Self {
        RecordingBackend::new()
    }
}

impl KernelBackend for RecordingBackend {
    type Unit = RecordingUnit;
    type Device = RecordingDevice;

    fn name(&self) -> &str {
        "recording"
    }

    fn new_compilation_unit(&self) -> RecordingUnit {
        RecordingUnit {
            journal: self.journal.clone(),
            behavior: self.behavior,
        }
    }

    fn device(&self) -> &RecordingDevice {
        &self.device
    }
}

/// Compilation-unit half of the fake, sharing the backend's journal.
#[derive(Debug)]
pub struct RecordingUnit {
    journal: Arc<Mutex<Journal>>,
    behavior: Behavior,
}

impl RecordingUnit {
    fn record(&self, event: Event) {
        self.journal
            .lock()
            .expect("journal mutex poisoned")
            .events
            .push(event);
    }
}

impl CompilationUnit for RecordingUnit {
    type KernelHandle = ();

    fn define(&mut self, _source: &str) -> BackendResult<()> {
        self.record(Event::Define);
        Ok(())
    }

    fn compile(
        &mut self,
        name: &str,
        _inputs: &[Tensor],
        _options: &MappingOptions,
    ) -> BackendResult<()> {
        self.record(Event::Compile);
        if self.behavior.fail_compile {
            return Err(BackendError::execution(format!(
                "forced compile failure for {}",
                name
            )));
        }
        Ok(())
    }

    fn run(
        &mut self,
        _handle: &(),
        _inputs: &[Tensor],
        outputs: &mut Vec<Tensor>,
    ) -> BackendResult<()> {
        self.record(Event::Run);
        ensure_outputs(outputs);
        Ok(())
    }

    fn run_timed(
        &mut self,
        _handle: &(),
        _inputs: &[Tensor],
        outputs: &mut Vec<Tensor>,
    ) -> BackendResult<Duration> {
        self.record(Event::RunTimed);
        ensure_outputs(outputs);
        Ok(Duration::ZERO)
    }

    fn unchecked_run(
        &mut self,
        _handle: &(),
        _inputs: &[Tensor],
        outputs: &mut Vec<Tensor>,
    ) -> BackendResult<()> {
        self.record(Event::UncheckedRun);
        ensure_outputs(outputs);
        Ok(())
    }
}

fn ensure_outputs(outputs: &mut Vec<Tensor>) {
    if outputs.is_empty() {
        outputs.push(Tensor::zeros(Shape::new(vec![1])));
    }
}

/// Device half of the fake: counts barrier calls and can fail on cue.
#[derive(Debug)]
pub struct RecordingDevice {
    journal: Arc<Mutex<Journal>>,
    behavior: Behavior,
}

impl DeviceRuntime for RecordingDevice {
    fn synchronize(&self) -> BackendResult<()> {
        let mut journal = self.journal.lock().expect("journal mutex poisoned");
        journal.events.push(Event::Synchronize);
        journal.synchronize_calls += 1;
        if self.behavior.fail_synchronize_at == Some(journal.synchronize_calls) {
            return Err(BackendError::execution(format!(
                "forced synchronize failure on call {}",
                journal.synchronize_calls
            )));
        }
        Ok(())
    }
}
