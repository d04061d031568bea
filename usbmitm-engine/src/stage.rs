use std::cell::RefCell;
use std::rc::Rc;

use usbmitm_wire::Message;

/// A stage's self-description, gathered from every currently-registered
/// stage by [`crate::StageRegistry::declared_plugins`]. Used so a future
/// CLI front-end can list `--stages` without this crate knowing
/// anything about argv.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageInfo {
    pub name: String,
    pub description: &'static str,
}

/// Which pipeline a packet is travelling through. Most hooks are already
/// split by direction (`device_decode` vs `host_decode`, and so on), but
/// `log_pkt` is a single shared sink — a logging stage
/// that cares about direction (the PCAP writer does: SUBMIT vs COMPLETE
/// framing depends on it) can't always recover it from the decoded
/// `Message` alone, since a non-control-endpoint `UsbData` looks
/// identical regardless of which way it travelled. The engine passes
/// `Flow` alongside the packet rather than asking stages to guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Observed on the device side, forwarded toward the host.
    DeviceToHost,
    /// Observed on the host side, forwarded toward the device.
    HostToDevice,
}

/// An extension point a stage can participate in. Every one of these
/// corresponds to a fixed named hook; a stage implements only the ones
/// relevant to what it does and leaves the rest at their default (a
/// no-op / `None` / `false`), the same way a plugin only implements the
/// hooks it cares about.
///
/// # Dispatch
///
/// The registry calls every registered stage's implementation of a hook,
/// in registration order, and combines the results one of three ways:
///
/// - **first-non-null** (`tick_wait`-style results, `get_*_packet`,
///   `*_decode`, `*_encode`, `send_*_packet`): the first `Some(_)`
///   returned wins; later stages are still called for any hooks that are
///   declared all-run, but a first-non-null hook short-circuits.
/// - **all-run** (`tick`, `log_pkt`, `*_modify`, `teardown`): every stage
///   runs regardless of what earlier ones returned.
/// - **any-true** (`host_has_packet`, `device_has_packet`): every stage
///   runs; the combined result is true if any one of them said so.
pub trait Stage {
    /// Called once per engine tick, before anything else, so a stage can
    /// do time-driven work (a timeout firing, a state machine advancing)
    /// independent of whether a packet is waiting.
    fn tick(&mut self) {}

    /// Blocks for up to approximately one second waiting for a packet to
    /// become available from either direction. Returning `Some(true)`
    /// signals data is ready; the return value itself is otherwise
    /// unused; this hook exists purely to avoid busy-looping.
    fn wait_for_packet(&mut self) -> Option<bool> {
        None
    }

    fn host_has_packet(&mut self) -> bool {
        false
    }

    fn device_has_packet(&mut self) -> bool {
        false
    }

    /// Retrieves one raw datagram from the host side. Format is whatever
    /// this stage's paired `host_decode` expects.
    fn get_host_packet(&mut self) -> Option<Vec<u8>> {
        None
    }

    fn get_device_packet(&mut self) -> Option<Vec<u8>> {
        None
    }

    /// Sends raw, already-encoded bytes toward the device. Returns
    /// `Some(())` once some stage has accepted responsibility for the
    /// datagram, whether or not it was ultimately delivered (a transport
    /// stage that drops the datagram because no device is connected yet
    /// still returns `Some(())`, having logged why).
    fn send_device_packet(&mut self, _data: &[u8]) -> Option<()> {
        None
    }

    fn send_host_packet(&mut self, _data: &[u8]) -> Option<()> {
        None
    }

    fn host_decode(&mut self, _data: &[u8]) -> Option<Message> {
        None
    }

    fn device_decode(&mut self, _data: &[u8]) -> Option<Message> {
        None
    }

    fn host_encode(&mut self, _pkt: &Message) -> Option<Vec<u8>> {
        None
    }

    fn device_encode(&mut self, _pkt: &Message) -> Option<Vec<u8>> {
        None
    }

    /// Mutates a packet travelling host-to-device in place. Every
    /// registered stage gets a chance, in registration order, so one
    /// stage's mutation is visible to the next.
    fn host_modify(&mut self, _pkt: &mut Message) {}

    fn device_modify(&mut self, _pkt: &mut Message) {}

    fn log_pkt(&mut self, _pkt: &Message, _flow: Flow) {}

    /// A short, static self-description: what this stage is, for
    /// introspection. Most stages leave this blank; it costs nothing
    /// and a future `--stages` listing reads better with it filled in.
    fn description(&self) -> &'static str {
        ""
    }

    /// Called once, after the engine's run loop has been asked to stop,
    /// before the final drain pass. Must be idempotent: a stage may be
    /// torn down more than once if the registry itself is dropped
    /// afterwards.
    fn teardown(&mut self) {}
}

/// Lets a stage be registered by a shared handle instead of by unique
/// ownership, so something outside the registry (another stage, or the
/// driver wiring everything together) can keep reaching into it after
/// it's been boxed up. This is the Rust shape of what the original
/// Python plugin manager did implicitly via `pm.get_plugin(name)`:
/// host-scan and host-fuzz both need to drive the emulator/transport
/// directly (connect/disconnect candidates, force a reset+reload)
/// without the registry itself exposing a lookup-by-name API. Grounded
/// on `cotton_usb_host::interrupt::InterruptPipe`'s own
/// `&'stack RefCell<HC::MultiInterruptPipe>` shared-mutable-device
/// pattern.
impl<T: Stage> Stage for Rc<RefCell<T>> {
    fn tick(&mut self) {
        self.borrow_mut().tick()
    }

    fn wait_for_packet(&mut self) -> Option<bool> {
        self.borrow_mut().wait_for_packet()
    }

    fn host_has_packet(&mut self) -> bool {
        self.borrow_mut().host_has_packet()
    }

    fn device_has_packet(&mut self) -> bool {
        self.borrow_mut().device_has_packet()
    }

    fn get_host_packet(&mut self) -> Option<Vec<u8>> {
        self.borrow_mut().get_host_packet()
    }

    fn get_device_packet(&mut self) -> Option<Vec<u8>> {
        self.borrow_mut().get_device_packet()
    }

    fn send_device_packet(&mut self, data: &[u8]) -> Option<()> {
        self.borrow_mut().send_device_packet(data)
    }

    fn send_host_packet(&mut self, data: &[u8]) -> Option<()> {
        self.borrow_mut().send_host_packet(data)
    }

    fn host_decode(&mut self, data: &[u8]) -> Option<Message> {
        self.borrow_mut().host_decode(data)
    }

    fn device_decode(&mut self, data: &[u8]) -> Option<Message> {
        self.borrow_mut().device_decode(data)
    }

    fn host_encode(&mut self, pkt: &Message) -> Option<Vec<u8>> {
        self.borrow_mut().host_encode(pkt)
    }

    fn device_encode(&mut self, pkt: &Message) -> Option<Vec<u8>> {
        self.borrow_mut().device_encode(pkt)
    }

    fn host_modify(&mut self, pkt: &mut Message) {
        self.borrow_mut().host_modify(pkt)
    }

    fn device_modify(&mut self, pkt: &mut Message) {
        self.borrow_mut().device_modify(pkt)
    }

    fn log_pkt(&mut self, pkt: &Message, flow: Flow) {
        self.borrow_mut().log_pkt(pkt, flow)
    }

    fn description(&self) -> &'static str {
        self.borrow().description()
    }

    fn teardown(&mut self) {
        self.borrow_mut().teardown()
    }
}
