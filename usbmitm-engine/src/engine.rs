use crate::error::EngineError;
use crate::registry::StageRegistry;
use crate::stage::Flow;

/// The cooperative, single-threaded packet-forwarding loop.
///
/// One `tick` does, in order: let every stage do time-driven work, block
/// briefly waiting for something to do, then fully drain whatever
/// direction(s) have packets waiting before returning. Draining one
/// direction completely before touching the other means a burst from the
/// device can't starve the host side, or vice versa, within a single
/// tick — but a tick itself never blocks longer than `wait_for_packet`'s
/// bound, so the caller's `run` loop stays responsive to a stop request.
pub struct Engine {
    registry: StageRegistry,
}

impl Engine {
    pub fn new(registry: StageRegistry) -> Self {
        Engine { registry }
    }

    pub fn registry(&self) -> &StageRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut StageRegistry {
        &mut self.registry
    }

    pub fn into_registry(self) -> StageRegistry {
        self.registry
    }

    fn do_device_packet(&mut self) -> Result<(), EngineError> {
        let data = self
            .registry
            .get_device_packet()
            .ok_or(EngineError::NoProducer("usbq_get_device_packet"))?;
        let mut pkt = self
            .registry
            .device_decode(&data)
            .ok_or(EngineError::NoProducer("usbq_device_decode"))?;
        self.registry.log_pkt(&pkt, Flow::DeviceToHost);
        self.registry.device_modify(&mut pkt);
        let send_data = self
            .registry
            .device_encode(&pkt)
            .ok_or(EngineError::NoProducer("usbq_device_encode"))?;
        self.registry
            .send_host_packet(&send_data)
            .ok_or(EngineError::NoProducer("usbq_send_host_packet"))?;
        Ok(())
    }

    fn do_host_packet(&mut self) -> Result<(), EngineError> {
        let data = self
            .registry
            .get_host_packet()
            .ok_or(EngineError::NoProducer("usbq_get_host_packet"))?;
        let mut pkt = self
            .registry
            .host_decode(&data)
            .ok_or(EngineError::NoProducer("usbq_host_decode"))?;
        self.registry.log_pkt(&pkt, Flow::HostToDevice);
        self.registry.host_modify(&mut pkt);
        let send_data = self
            .registry
            .host_encode(&pkt)
            .ok_or(EngineError::NoProducer("usbq_host_encode"))?;
        // A stage that can't forward this because no device is
        // connected yet is expected to log and swallow that itself
        // (see DESIGN.md); reaching `None` here means no transport
        // stage exists at all, which is a wiring error.
        self.registry
            .send_device_packet(&send_data)
            .ok_or(EngineError::NoProducer("usbq_send_device_packet"))?;
        Ok(())
    }

    /// Runs exactly one iteration of the engine: tick, wait, then drain
    /// device-to-host packets fully, then host-to-device packets fully.
    pub fn tick(&mut self) -> Result<(), EngineError> {
        self.registry.tick();
        self.registry.wait_for_packet();

        while self.registry.device_has_packet() {
            self.do_device_packet()?;
        }
        while self.registry.host_has_packet() {
            self.do_host_packet()?;
        }
        Ok(())
    }

    /// Runs `tick` until `should_stop` returns true, then tears every
    /// stage down and takes one final tick to flush anything already in
    /// flight.
    pub fn run(&mut self, mut should_stop: impl FnMut() -> bool) -> Result<(), EngineError> {
        while !should_stop() {
            self.tick()?;
        }
        self.registry.teardown();
        self.tick()
    }
}
