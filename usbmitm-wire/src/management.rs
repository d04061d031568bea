//! Out-of-band control datagrams between controller and bridge: device
//! attach notification, reset, and hook reload.

use crate::descriptor::{ConfigurationDescriptor, DeviceDescriptor, DEVICE_DESCRIPTOR_LEN};
use crate::error::Error;

const SUBTYPE_RESET: u32 = 0;
const SUBTYPE_NEW_DEVICE: u32 = 1;
const SUBTYPE_RELOAD: u32 = 2;

/// USB signalling speed, as reported by the bridge on device attach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Speed {
    Low = 1,
    Full = 2,
    High = 3,
}

impl Speed {
    fn from_wire(v: u32) -> Result<Self, Error> {
        match v {
            1 => Ok(Self::Low),
            2 => Ok(Self::Full),
            3 => Ok(Self::High),
            _ => Err(Error::UnknownDiscriminant {
                what: "device speed",
                value: v,
            }),
        }
    }
}

/// Payload of a `NEW_DEVICE` management datagram: the bridge hands over
/// the device and (first) configuration descriptor it enumerated so the
/// controller doesn't have to issue its own `GET_DESCRIPTOR` requests to
/// learn what just attached.
#[derive(Debug, Clone, PartialEq)]
pub struct ManagementNewDevice {
    pub speed: Speed,
    pub device: DeviceDescriptor,
    pub configuration: ConfigurationDescriptor,
}

/// An out-of-band management datagram.
#[derive(Debug, Clone, PartialEq)]
pub enum Management {
    /// Request (controller to bridge) or notification (bridge to
    /// controller) that the link should restart as if freshly attached.
    Reset,
    /// A device has attached to the bridge.
    NewDevice(ManagementNewDevice),
    /// Request that stage-registered hooks be reloaded.
    Reload,
}

impl Management {
    pub fn decode(buf: &[u8]) -> Result<Self, Error> {
        if buf.len() < 4 {
            return Err(Error::Truncated {
                what: "management datagram",
                need: 4,
                have: buf.len(),
            });
        }
        let subtype = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let rest = &buf[4..];
        match subtype {
            SUBTYPE_RESET => Ok(Management::Reset),
            SUBTYPE_RELOAD => Ok(Management::Reload),
            SUBTYPE_NEW_DEVICE => {
                if rest.len() < 4 + DEVICE_DESCRIPTOR_LEN {
                    return Err(Error::Truncated {
                        what: "NEW_DEVICE management datagram",
                        need: 4 + DEVICE_DESCRIPTOR_LEN,
                        have: rest.len(),
                    });
                }
                let speed = Speed::from_wire(u32::from_le_bytes([
                    rest[0], rest[1], rest[2], rest[3],
                ]))?;
                let dev_bytes = &rest[4..4 + DEVICE_DESCRIPTOR_LEN];
                let device: DeviceDescriptor = *bytemuck::from_bytes(dev_bytes);
                let (configuration, tail) =
                    ConfigurationDescriptor::decode(&rest[4 + DEVICE_DESCRIPTOR_LEN..])?;
                if !tail.is_empty() {
                    return Err(Error::LengthMismatch {
                        what: "NEW_DEVICE management datagram",
                        declared: rest.len() - tail.len(),
                        actual: rest.len(),
                    });
                }
                Ok(Management::NewDevice(ManagementNewDevice {
                    speed,
                    device,
                    configuration,
                }))
            }
            other => Err(Error::UnknownDiscriminant {
                what: "management subtype",
                value: other,
            }),
        }
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Management::Reset => out.extend_from_slice(&SUBTYPE_RESET.to_le_bytes()),
            Management::Reload => out.extend_from_slice(&SUBTYPE_RELOAD.to_le_bytes()),
            Management::NewDevice(nd) => {
                out.extend_from_slice(&SUBTYPE_NEW_DEVICE.to_le_bytes());
                out.extend_from_slice(&(nd.speed as u32).to_le_bytes());
                out.extend_from_slice(bytemuck::bytes_of(&nd.device));
                nd.configuration.encode(out);
            }
        }
    }
}
