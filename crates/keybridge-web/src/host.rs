#![forbid(unsafe_code)]

//! Host-side session: a machine feeding the encoded queue, plus fault
//! bookkeeping. Independent of the DOM so it runs under native tests.

use keybridge_core::{CompositionMachine, DomEvent, ImeConfig, ScratchSurface};
use tracing::{debug, warn};

use crate::queue::EncodedEventQueue;

pub struct HostSession<S> {
    machine: CompositionMachine<S, EncodedEventQueue>,
    fault: Option<String>,
    faults_total: u64,
}

impl<S: ScratchSurface> HostSession<S> {
    #[must_use]
    pub fn new(surface: S, config: ImeConfig, queue_limit: usize) -> Self {
        let machine = CompositionMachine::builder(surface, EncodedEventQueue::with_limit(queue_limit))
            .config(config)
            .build();
        Self {
            machine,
            fault: None,
            faults_total: 0,
        }
    }

    /// Feed one DOM event.
    ///
    /// A protocol violation is recorded as the pending fault and the session
    /// is reset so typing can continue.
    pub fn dispatch(&mut self, event: &DomEvent) {
        if let Err(err) = self.machine.handle_dom(event) {
            warn!(error = %err, kind = err.kind(), "composition session faulted, resetting");
            self.fault = Some(err.to_string());
            self.faults_total += 1;
            self.machine.reset();
        }
    }

    /// Queued canonical events as JSON strings, oldest first.
    pub fn drain(&mut self) -> Vec<String> {
        self.machine.sink_mut().drain()
    }

    /// Most recent fault since the last call, if any.
    pub fn take_fault(&mut self) -> Option<String> {
        self.fault.take()
    }

    #[must_use]
    pub const fn faults_total(&self) -> u64 {
        self.faults_total
    }

    #[must_use]
    pub fn dropped_events(&self) -> u64 {
        self.machine.sink().dropped()
    }

    #[must_use]
    pub const fn is_composing(&self) -> bool {
        self.machine.is_composing()
    }

    #[must_use]
    pub const fn is_disposed(&self) -> bool {
        self.machine.is_disposed()
    }

    /// The scratch surface lost focus.
    pub fn blur(&mut self) {
        if self.machine.is_disposed() {
            return;
        }
        self.machine.surface_mut().reclaim_focus();
    }

    pub fn reset(&mut self) {
        self.machine.reset();
    }

    pub fn dispose(&mut self) {
        self.machine.dispose();
        debug!(pending = self.machine.sink().len(), "host session disposed");
    }

    #[must_use]
    pub const fn surface(&self) -> &S {
        self.machine.surface()
    }
}
