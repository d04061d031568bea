use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use usbmitm_emulator::{DeviceEmulator, EmulatorState};
use usbmitm_engine::{Flow, Stage};
use usbmitm_model::DeviceIdentity;
use usbmitm_wire::Message;

/// `idle`/`waiting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Waiting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanConfig {
    /// How long to wait for evidence of support before giving up on a
    /// candidate (default 15 s).
    pub timeout: Duration,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            timeout: Duration::from_secs(15),
        }
    }
}

/// Outcome of trying one candidate identity against the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanResult {
    pub candidate: usize,
    pub supported: bool,
}

/// Iterates a list of candidate identities through a shared
/// [`DeviceEmulator`], recording which ones the host appears to support.
pub struct HostScan {
    emulator: Rc<RefCell<DeviceEmulator>>,
    candidates: Vec<DeviceIdentity>,
    config: ScanConfig,
    state: ScanState,
    index: usize,
    deadline: Option<Instant>,
    results: Vec<ScanResult>,
}

impl HostScan {
    pub fn new(
        emulator: Rc<RefCell<DeviceEmulator>>,
        candidates: Vec<DeviceIdentity>,
        config: ScanConfig,
    ) -> Self {
        HostScan {
            emulator,
            candidates,
            config,
            state: ScanState::Idle,
            index: 0,
            deadline: None,
            results: Vec::new(),
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn results(&self) -> &[ScanResult] {
        &self.results
    }

    /// True once every candidate has been tried.
    pub fn is_finished(&self) -> bool {
        self.index >= self.candidates.len()
    }

    fn start_next_candidate(&mut self) {
        if self.is_finished() {
            return;
        }
        if self.emulator.borrow().state() != EmulatorState::Disconnected {
            return;
        }
        let candidate = self.candidates[self.index].clone();
        {
            let mut emulator = self.emulator.borrow_mut();
            emulator.set_identity(candidate);
            emulator.connect();
        }
        self.deadline = Some(Instant::now() + self.config.timeout);
        self.state = ScanState::Waiting;
    }

    fn finish_candidate(&mut self, supported: bool) {
        self.results.push(ScanResult {
            candidate: self.index,
            supported,
        });
        self.emulator.borrow_mut().disconnect();
        self.index += 1;
        self.deadline = None;
        self.state = ScanState::Idle;
    }
}

impl Stage for HostScan {
    fn tick(&mut self) {
        match self.state {
            ScanState::Idle => self.start_next_candidate(),
            ScanState::Waiting => {
                if matches!(self.emulator.borrow().state(), EmulatorState::Configured { .. }) {
                    self.finish_candidate(true);
                } else if self.deadline.is_some_and(|d| Instant::now() >= d) {
                    self.finish_candidate(false);
                }
            }
        }
    }

    /// Looks for evidence the host accepted the current candidate: a
    /// class-specific request on endpoint 0 (the Mass-Storage
    /// `GET_MAX_LUN` request, `bRequest == 0xFE`, is a typical example).
    /// Reaching `configured` is checked on `tick` instead, since it's a
    /// state change rather than a packet this stage would otherwise see.
    fn log_pkt(&mut self, pkt: &Message, flow: Flow) {
        if self.state != ScanState::Waiting || flow != Flow::HostToDevice {
            return;
        }
        if let Message::UsbData(data) = pkt {
            if data.endpoint.is_control_zero() {
                if let Some(request) = &data.request {
                    if request.b_request() == 0xFE {
                        self.finish_candidate(true);
                    }
                }
            }
        }
    }

    fn description(&self) -> &'static str {
        "iterates candidate device identities to find which the host accepts"
    }
}

#[cfg(test)]
#[path = "tests/scan.rs"]
mod tests;
