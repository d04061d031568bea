use std::fs;
use std::path::PathBuf;

use usbmitm_engine::{Flow, Stage};
use usbmitm_model::DeviceIdentity;
use usbmitm_wire::message::UsbData;
use usbmitm_wire::request::RequestDescriptor;
use usbmitm_wire::{Descriptor, Management, Message};

/// `idle`/`observing`: `new_device` transitions idle → observing,
/// `reset` (or teardown) transitions either → idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClonerState {
    Idle,
    Observing,
}

/// Watches the packet stream and, on every `NEW_DEVICE`/`RESET` cycle,
/// writes out whatever descriptors it saw answered in between. Purely a
/// `log_pkt` observer: it never produces, modifies, or consumes a
/// datagram of its own.
pub struct Cloner {
    path: PathBuf,
    state: ClonerState,
    captured: Vec<Descriptor>,
}

impl Cloner {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Cloner {
            path: path.into(),
            state: ClonerState::Idle,
            captured: Vec::new(),
        }
    }

    pub fn state(&self) -> ClonerState {
        self.state
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    fn start(&mut self) {
        self.captured.clear();
        self.state = ClonerState::Observing;
    }

    /// Persists whatever was captured since the last `start`, then
    /// returns to idle. Called on `RESET` and again, idempotently, on
    /// `teardown`.
    fn finish(&mut self) {
        if !self.captured.is_empty() {
            let identity = DeviceIdentity::from_captured(self.captured.drain(..));
            if let Err(e) = fs::write(&self.path, identity.save()) {
                log::error!(
                    "failed to persist cloned identity to {}: {e}",
                    self.path.display()
                );
            }
        }
        self.state = ClonerState::Idle;
    }

    fn observe(&mut self, data: &UsbData) {
        if let (Some(RequestDescriptor::GetDescriptor { .. }), Some(response)) =
            (&data.request, &data.response)
        {
            self.captured.push(response.clone());
        }
    }
}

impl Stage for Cloner {
    fn log_pkt(&mut self, pkt: &Message, _flow: Flow) {
        match pkt {
            Message::Management(Management::NewDevice(_)) => self.start(),
            Message::Management(Management::Reset) => self.finish(),
            Message::UsbData(data) if self.state == ClonerState::Observing => self.observe(data),
            _ => {}
        }
    }

    fn teardown(&mut self) {
        self.finish();
    }

    fn description(&self) -> &'static str {
        "passive observer that persists a cloned device identity on reset"
    }
}

#[cfg(test)]
#[path = "tests/cloner.rs"]
mod tests;
