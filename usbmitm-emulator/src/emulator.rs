use std::collections::VecDeque;

use usbmitm_engine::Stage;
use usbmitm_model::DeviceIdentity;
use usbmitm_wire::message::UsbData;
use usbmitm_wire::request::RequestDescriptor;
use usbmitm_wire::{Endpoint, Management, Message};

/// Whether the emulator advances `disconnected → connected` on its own
/// the moment it notices it has nothing attached, or waits to be driven
/// explicitly by another stage (host-scan iterating candidates, the
/// cloner staging a capture).
#[derive(Debug, Clone, Copy, Default)]
pub struct EmulatorConfig {
    pub auto_connect: bool,
}

/// `disconnected ─connect→ connected ─configure→ configured`, with
/// `disconnect` returning to `disconnected` from either, and `terminate`
/// reachable from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmulatorState {
    Disconnected,
    Connected,
    Configured { configuration_value: u8 },
    Terminated,
}

/// A virtual USB device. Owns its own device-side queues and wire
/// codec calls, so it can be registered in place of [`usbmitm_net::UdpTransport`]'s
/// device half entirely: it *is* the device side when the real device
/// socket is disabled.
pub struct DeviceEmulator {
    identity: DeviceIdentity,
    config: EmulatorConfig,
    state: EmulatorState,
    /// Datagrams awaiting forwarding to the host.
    out_queue: VecDeque<Vec<u8>>,
    /// Raw datagrams received from the host, awaiting processing on the
    /// next `tick`: tick always fires before the first I/O of each
    /// iteration, giving emulators a deterministic enqueue point.
    in_queue: VecDeque<Vec<u8>>,
}

impl DeviceEmulator {
    pub fn new(identity: DeviceIdentity, config: EmulatorConfig) -> Self {
        DeviceEmulator {
            identity,
            config,
            state: EmulatorState::Disconnected,
            out_queue: VecDeque::new(),
            in_queue: VecDeque::new(),
        }
    }

    pub fn state(&self) -> EmulatorState {
        self.state
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    /// Swaps in a different identity to present, e.g. the next candidate
    /// a host-scan is trying. Has no effect on the current connection
    /// state; call [`Self::disconnect`]/[`Self::connect`] around it if a
    /// fresh `NEW_DEVICE` announcement is wanted.
    pub fn set_identity(&mut self, identity: DeviceIdentity) {
        self.identity = identity;
    }

    fn enqueue(&mut self, msg: &Message) {
        self.out_queue.push_back(usbmitm_wire::encode_device(msg));
    }

    /// `disconnected → connected`: announces the current identity with a
    /// `MANAGEMENT/NEW_DEVICE` datagram. A no-op once terminated.
    pub fn connect(&mut self) {
        if self.state == EmulatorState::Terminated {
            return;
        }
        let new_device = self.identity.to_new_device();
        self.enqueue(&Message::Management(Management::NewDevice(new_device)));
        self.state = EmulatorState::Connected;
    }

    /// `connected`/`configured` → `disconnected`: announces a
    /// `MANAGEMENT/RESET`. A no-op once terminated.
    pub fn disconnect(&mut self) {
        if self.state == EmulatorState::Terminated {
            return;
        }
        self.enqueue(&Message::Management(Management::Reset));
        self.state = EmulatorState::Disconnected;
    }

    /// Reachable from any state: announces a `MANAGEMENT/RESET` and
    /// leaves the emulator permanently inert.
    pub fn terminate(&mut self) {
        self.enqueue(&Message::Management(Management::Reset));
        self.state = EmulatorState::Terminated;
    }

    fn handle_control_request(&mut self, endpoint: Endpoint, request: RequestDescriptor) {
        match request {
            RequestDescriptor::GetDescriptor { .. } => {
                if let Some(descriptor) = self.identity.from_request(&request) {
                    self.enqueue(&Message::UsbData(UsbData {
                        endpoint,
                        request: Some(request),
                        response: Some(descriptor),
                        data: Vec::new(),
                    }));
                }
            }
            RequestDescriptor::SetConfiguration {
                configuration_value,
                ..
            } => {
                self.state = EmulatorState::Configured { configuration_value };
            }
            // Left for other stages to handle.
            _ => {}
        }
    }

    fn process_inbound(&mut self) {
        while let Some(data) = self.in_queue.pop_front() {
            match usbmitm_wire::decode_host(&data) {
                Ok(Message::UsbData(usb)) if usb.endpoint.is_control_zero() => {
                    if let Some(request) = usb.request {
                        self.handle_control_request(usb.endpoint, request);
                    }
                }
                Ok(_) => {}
                Err(e) => log::warn!("emulator dropped malformed inbound datagram: {e}"),
            }
        }
    }
}

impl Stage for DeviceEmulator {
    fn tick(&mut self) {
        if self.config.auto_connect && self.state == EmulatorState::Disconnected {
            self.connect();
        }
        self.process_inbound();
    }

    fn device_has_packet(&mut self) -> bool {
        !self.out_queue.is_empty()
    }

    fn get_device_packet(&mut self) -> Option<Vec<u8>> {
        self.out_queue.pop_front()
    }

    fn send_device_packet(&mut self, data: &[u8]) -> Option<()> {
        self.in_queue.push_back(data.to_vec());
        Some(())
    }

    fn device_decode(&mut self, data: &[u8]) -> Option<Message> {
        usbmitm_wire::decode_device(data).ok()
    }

    fn device_encode(&mut self, pkt: &Message) -> Option<Vec<u8>> {
        Some(usbmitm_wire::encode_device(pkt))
    }

    fn description(&self) -> &'static str {
        "virtual USB device presenting a DeviceIdentity to the host"
    }
}

#[cfg(test)]
#[path = "tests/emulator.rs"]
mod tests;
