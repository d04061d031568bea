//! Virtual USB device stage: presents a [`usbmitm_model::DeviceIdentity`]
//! to a real host across the bridge, standing in for the device-side
//! transport entirely when no physical device socket is wired up.

mod emulator;

pub use emulator::{DeviceEmulator, EmulatorConfig, EmulatorState};
