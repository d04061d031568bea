//! Wires every stage into one running [`Engine`], the way a (not yet
//! written) CLI front-end's `mitm` verb would, except every option here
//! is a hand-written constant instead of a parsed argv: option parsing
//! is the front-end's job, not this crate's.
//!
//! Run with `cargo run -p usbmitm --example wiring -- 127.0.0.1:7878
//! 127.0.0.1:7879`: the first address is where the physical bridge's
//! device-side datagrams are expected to arrive, the second is the
//! address of whatever is playing the "USB host" peer.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use usbmitm::{
    DeviceEmulator, DeviceIdentity, Engine, EmulatorConfig, PcapWriter, StageRegistry,
    TransportConfig, UdpTransport,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let device_bind = args.next().unwrap_or_else(|| "127.0.0.1:7878".to_string());
    let host_dest = args.next().unwrap_or_else(|| "127.0.0.1:7879".to_string());

    let transport = UdpTransport::new(TransportConfig {
        device_bind: Some(device_bind.parse()?),
        host_dest: Some(host_dest.parse()?),
    })?;

    let mut registry = StageRegistry::new();
    registry.register("transport", Box::new(transport))?;
    registry.register("pcap", Box::new(PcapWriter::create("capture.pcap")?))?;

    // An emulator is only useful once the real device socket above is
    // disabled: it stands in for the device side. Left registered-but-
    // dormant here just to show the wiring; it never sees
    // `device_has_packet` return true while `transport`'s own device
    // socket answers first.
    let emulator = Rc::new(RefCell::new(DeviceEmulator::new(
        DeviceIdentity::default(),
        EmulatorConfig { auto_connect: false },
    )));
    registry.register("emulator", Box::new(emulator.clone()))?;

    for info in registry.declared_plugins() {
        log::info!("registered stage '{}': {}", info.name, info.description);
    }

    let mut engine = Engine::new(registry);
    let deadline = std::time::Instant::now() + Duration::from_secs(30);
    engine.run(|| std::time::Instant::now() >= deadline)?;
    Ok(())
}
