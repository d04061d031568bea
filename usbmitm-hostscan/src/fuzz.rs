//! Host-fuzz stage, driving the `hostfuzz` CLI verb. Bit/byte-corrupts
//! decoded packet payloads heading to the host, and bounces the link
//! if nothing gets corrupted for too long.
//!
//! Corruption routines are ported from
//! `usbmitm/forward/usbmutation.py::corrupt_bits`/`corrupt_bytes`
//! (itself taken from scapy); the watchdog is
//! `usbmitm/forward/usbmutation.py::hookUSBDevice`'s per-direction
//! `Timer`, which is cancelled (restarted) every time a packet actually
//! gets modified and otherwise fires `reload_communication` — i.e. "no
//! forward progress" means no successful corruption, not merely no
//! traffic.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use usbmitm_engine::Stage;
use usbmitm_net::UdpTransport;
use usbmitm_wire::{Direction, Endpoint, Message, TransferType};

/// Whether a corruption pass flips individual bits or replaces whole
/// bytes (`usbmutation.py --bytes`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorruptionUnit {
    Bits,
    Bytes,
}

/// Restricts which endpoints are eligible for corruption
/// (`usbmutation.py`'s positional `endpoints` argument and `match`
/// method). An empty filter matches every endpoint.
#[derive(Debug, Clone, Default)]
pub struct EndpointFilter(Vec<(TransferType, u16, Direction)>);

impl EndpointFilter {
    pub fn all() -> Self {
        EndpointFilter(Vec::new())
    }

    pub fn only(entries: impl IntoIterator<Item = (TransferType, u16, Direction)>) -> Self {
        EndpointFilter(entries.into_iter().collect())
    }

    fn matches(&self, endpoint: &Endpoint) -> bool {
        self.0.is_empty()
            || self
                .0
                .iter()
                .any(|(t, n, d)| *t == endpoint.transfer_type && *n == endpoint.number && *d == endpoint.direction)
    }
}

#[derive(Debug, Clone)]
pub struct HostFuzzConfig {
    pub unit: CorruptionUnit,
    /// Chance, 0.0-100.0, that a given eligible packet gets touched at
    /// all (`usbmutation.py`'s `--percentage-pkt`).
    pub chance_percent: f64,
    /// Fraction, 0.0-1.0, of bits/bytes corrupted within a chosen packet
    /// when `count` is `None` (`--percentage`).
    pub rate: f64,
    /// Exact number of bits/bytes to corrupt, overriding `rate`
    /// (`--number`).
    pub count: Option<usize>,
    pub endpoints: EndpointFilter,
    /// How long to go with no successful corruption before bouncing the
    /// link (`--timer`).
    pub watchdog: Duration,
}

impl Default for HostFuzzConfig {
    fn default() -> Self {
        HostFuzzConfig {
            unit: CorruptionUnit::Bits,
            chance_percent: 100.0,
            rate: 0.01,
            count: None,
            endpoints: EndpointFilter::all(),
            watchdog: Duration::from_secs(10),
        }
    }
}

fn corrupt_bytes(data: &mut [u8], rng: &mut StdRng, n: usize) {
    let len = data.len();
    if len == 0 || n == 0 {
        return;
    }
    for i in rand::seq::index::sample(rng, len, n.min(len)).iter() {
        data[i] = data[i].wrapping_add(rng.random_range(1..=255u16) as u8);
    }
}

fn corrupt_bits(data: &mut [u8], rng: &mut StdRng, n: usize) {
    let bits = data.len() * 8;
    if bits == 0 || n == 0 {
        return;
    }
    for i in rand::seq::index::sample(rng, bits, n.min(bits)).iter() {
        data[i / 8] ^= 1 << (i % 8);
    }
}

/// Corrupts decoded packet payloads heading to the host at a configurable
/// rate, and watches for stalled progress to force a link reset+reload.
pub struct HostFuzz {
    transport: Rc<RefCell<UdpTransport>>,
    config: HostFuzzConfig,
    rng: StdRng,
    last_progress: Instant,
}

impl HostFuzz {
    pub fn new(transport: Rc<RefCell<UdpTransport>>, config: HostFuzzConfig) -> Self {
        HostFuzz {
            transport,
            config,
            rng: StdRng::from_os_rng(),
            last_progress: Instant::now(),
        }
    }

    #[cfg(test)]
    fn with_rng(transport: Rc<RefCell<UdpTransport>>, config: HostFuzzConfig, rng: StdRng) -> Self {
        HostFuzz {
            transport,
            config,
            rng,
            last_progress: Instant::now(),
        }
    }

    fn corruption_count(&self, len_units: usize) -> usize {
        match self.config.count {
            Some(n) => n,
            None => ((len_units as f64) * self.config.rate).max(1.0) as usize,
        }
    }

    fn corrupt(&mut self, data: &mut [u8]) {
        let units = match self.config.unit {
            CorruptionUnit::Bits => data.len() * 8,
            CorruptionUnit::Bytes => data.len(),
        };
        let n = self.corruption_count(units);
        match self.config.unit {
            CorruptionUnit::Bits => corrupt_bits(data, &mut self.rng, n),
            CorruptionUnit::Bytes => corrupt_bytes(data, &mut self.rng, n),
        }
    }
}

impl Stage for HostFuzz {
    fn tick(&mut self) {
        if self.last_progress.elapsed() > self.config.watchdog {
            let mut transport = self.transport.borrow_mut();
            transport.reset();
            transport.reload();
            self.last_progress = Instant::now();
        }
    }

    fn device_modify(&mut self, pkt: &mut Message) {
        let Message::UsbData(data) = pkt else {
            return;
        };
        if data.data.is_empty() || !self.config.endpoints.matches(&data.endpoint) {
            return;
        }
        if !self.rng.random_bool((self.config.chance_percent / 100.0).clamp(0.0, 1.0)) {
            return;
        }
        self.corrupt(&mut data.data);
        self.last_progress = Instant::now();
    }

    fn description(&self) -> &'static str {
        "corrupts device-to-host payloads and bounces the link on stalled progress"
    }
}

#[cfg(test)]
#[path = "tests/fuzz.rs"]
mod tests;
