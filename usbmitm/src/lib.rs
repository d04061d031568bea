//! Facade crate for the usbmitm controller workspace.
//!
//! Every stage and the engine that drives them lives in its own crate
//! (`usbmitm-wire`, `usbmitm-model`, `usbmitm-engine`, `usbmitm-net`,
//! `usbmitm-pcap`, `usbmitm-emulator`, `usbmitm-cloner`,
//! `usbmitm-hostscan`, `usbmitm-hotreload`); this crate only re-exports
//! them under one name, the way `cotton_usb_host::prelude`-style facades
//! in the rest of the pack collect a family of sibling crates for a
//! downstream binary to depend on a single thing.
//!
//! This crate owns no CLI parsing, no subscriber installation, and no
//! argv handling: those are the command-line front-end's job, kept
//! outside this core. `demos/wiring.rs` shows the pieces wired into a
//! running `Engine` for a hand-written configuration, not a parsed one.

pub use usbmitm_cloner::{Cloner, ClonerState};
pub use usbmitm_emulator::{DeviceEmulator, EmulatorConfig, EmulatorState};
pub use usbmitm_engine::{Engine, EngineError, Flow, Stage, StageInfo, StageRegistry};
pub use usbmitm_hostscan::{
    default_candidates, CorruptionUnit, EndpointFilter, HostFuzz, HostFuzzConfig, HostScan,
    ScanConfig, ScanResult, ScanState,
};
pub use usbmitm_model::DeviceIdentity;
pub use usbmitm_net::{LinkState, TransportConfig, UdpTransport};
pub use usbmitm_pcap::PcapWriter;
pub use usbmitm_wire::{
    self as wire, Descriptor, Direction, Endpoint, Management, ManagementNewDevice, Message,
    RequestDescriptor, Speed, TransferType,
};

pub use usbmitm_hotreload::Error as HotReloadError;

#[cfg(feature = "dylib-reload")]
pub use usbmitm_hotreload::HotReload;
