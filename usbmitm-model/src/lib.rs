//! Device identity: the set of descriptors that characterise one USB
//! device, shared by the cloner, emulator and host-scan stages so they
//! all describe a device the same way.

use std::fmt;

use usbmitm_wire::descriptor::{
    ConfigurationDescriptor, DeviceDescriptor, EndpointDescriptor, InterfaceDescriptor,
    StringDescriptor,
};
use usbmitm_wire::management::{ManagementNewDevice, Speed};
use usbmitm_wire::request::RequestDescriptor;
use usbmitm_wire::{descriptor, Descriptor};

/// Error produced while loading a persisted [`DeviceIdentity`].
#[derive(Debug)]
pub enum LoadError {
    Truncated,
    Wire(usbmitm_wire::Error),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Truncated => write!(f, "identity blob ended unexpectedly"),
            LoadError::Wire(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for LoadError {}

impl From<usbmitm_wire::Error> for LoadError {
    fn from(e: usbmitm_wire::Error) -> Self {
        LoadError::Wire(e)
    }
}

fn default_interface() -> InterfaceDescriptor {
    InterfaceDescriptor {
        b_length: descriptor::INTERFACE_DESCRIPTOR_LEN as u8,
        b_descriptor_type: descriptor::DESCRIPTOR_TYPE_INTERFACE,
        b_interface_number: 0,
        b_alternate_setting: 0,
        b_num_endpoints: 1,
        b_interface_class: 0,
        b_interface_sub_class: 0,
        b_interface_protocol: 0,
        i_interface: 0,
    }
}

fn default_endpoint() -> EndpointDescriptor {
    EndpointDescriptor {
        b_length: descriptor::ENDPOINT_DESCRIPTOR_LEN as u8,
        b_descriptor_type: descriptor::DESCRIPTOR_TYPE_ENDPOINT,
        b_endpoint_address: 0x81,
        bm_attributes: 0x03,
        w_max_packet_size: 8u16.to_le_bytes(),
        b_interval: 10,
    }
}

fn default_configuration() -> ConfigurationDescriptor {
    ConfigurationDescriptor {
        b_configuration_value: 1,
        i_configuration: 0,
        bm_attributes: 0x80,
        b_max_power: 50,
        b_num_interfaces: 1,
        embedded: vec![
            Descriptor::Interface(default_interface()),
            Descriptor::Endpoint(default_endpoint()),
        ],
    }
}

fn default_strings() -> Vec<StringDescriptor> {
    vec![
        // Index 0: supported-languages list, a single LANGID 0x0409
        // (US English).
        StringDescriptor {
            b_string: vec![0x0409],
        },
        StringDescriptor::from_str("USBIQUITOUS"),
        StringDescriptor::from_str("USBiquitous emulated generic device"),
        StringDescriptor::from_str("0xDEADBEEF"),
    ]
}

/// Set of USB descriptors that characterise a device: what the emulator
/// presents to the host, what the cloner captures from a real device,
/// and what the host-scan stage builds as a synthetic candidate.
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceIdentity {
    pub device: DeviceDescriptor,
    pub configuration: ConfigurationDescriptor,
    pub strings: Vec<StringDescriptor>,
    pub speed: Speed,
}

impl Default for DeviceIdentity {
    fn default() -> Self {
        DeviceIdentity {
            device: DeviceDescriptor::placeholder(),
            configuration: default_configuration(),
            strings: default_strings(),
            speed: Speed::High,
        }
    }
}

impl DeviceIdentity {
    /// Builds an identity around a single captured configuration
    /// descriptor, leaving the device descriptor at its placeholder
    /// value. Used by the cloner when it has only observed one
    /// interface's worth of descriptors so far.
    pub fn from_interface(configuration: ConfigurationDescriptor) -> Self {
        DeviceIdentity {
            device: DeviceDescriptor::placeholder(),
            configuration,
            strings: Vec::new(),
            speed: Speed::High,
        }
    }

    /// Builds an identity out of exactly the descriptors a clone session
    /// observed, in the order seen: the last `Device` descriptor wins for
    /// [`Self::device`], the last `Configuration` descriptor (embedded
    /// interface/endpoint descriptors and all) wins for
    /// [`Self::configuration`], and every `String` descriptor accumulates
    /// into [`Self::strings`] in capture order. Deliberately not built on
    /// top of [`Self::default`]: a replayed clone must come back out
    /// exactly as captured, not patched over a generic placeholder
    /// device. Falls back to a placeholder device descriptor and an
    /// empty default configuration if either was never captured, mirroring
    /// `usbq/plugins/clonedevice.py`'s `DeviceIdentity(self._desc)`, which
    /// is happy to construct an identity from whatever subset of
    /// descriptors the trace happened to contain.
    pub fn from_captured(descriptors: impl IntoIterator<Item = Descriptor>) -> Self {
        let mut device = None;
        let mut configuration = None;
        let mut strings = Vec::new();
        for descriptor in descriptors {
            match descriptor {
                Descriptor::Device(d) => device = Some(d),
                Descriptor::Configuration(c) => configuration = Some(c),
                Descriptor::String(s) => strings.push(s),
                _ => {}
            }
        }
        DeviceIdentity {
            device: device.unwrap_or_else(DeviceDescriptor::placeholder),
            configuration: configuration.unwrap_or_else(default_configuration),
            strings,
            speed: Speed::High,
        }
    }

    /// Builds an identity directly from a `NEW_DEVICE` management
    /// datagram, as handed over by the bridge on attach.
    pub fn from_new_device(new_device: &ManagementNewDevice) -> Self {
        DeviceIdentity {
            device: new_device.device,
            configuration: new_device.configuration.clone(),
            strings: Vec::new(),
            speed: new_device.speed,
        }
    }

    pub fn to_new_device(&self) -> ManagementNewDevice {
        ManagementNewDevice {
            speed: self.speed,
            device: self.device,
            configuration: self.configuration.clone(),
        }
    }

    /// Resolves the descriptor a `GET_DESCRIPTOR` request is asking for,
    /// trimmed to the request's `wLength` the way a real device truncates
    /// an over-long response rather than padding it.
    pub fn from_request(&self, request: &RequestDescriptor) -> Option<Descriptor> {
        let RequestDescriptor::GetDescriptor {
            descriptor_index,
            descriptor_type,
            w_length,
            ..
        } = *request
        else {
            return None;
        };

        let full = match descriptor_type {
            descriptor::DESCRIPTOR_TYPE_DEVICE => Descriptor::Device(self.device),
            descriptor::DESCRIPTOR_TYPE_CONFIGURATION => {
                Descriptor::Configuration(self.configuration.clone())
            }
            descriptor::DESCRIPTOR_TYPE_STRING => {
                let strings = &self.strings;
                if strings.is_empty() {
                    return None;
                }
                let index = if descriptor_index as usize >= strings.len() {
                    0
                } else {
                    descriptor_index as usize
                };
                Descriptor::String(strings[index].clone())
            }
            _ => return None,
        };

        let mut bytes = Vec::new();
        full.encode(&mut bytes);
        // A short wLength truncates the response without touching the
        // length fields already encoded into it (e.g. a configuration
        // descriptor's wTotalLength still names the full size on a
        // short first read), so the trimmed bytes are kept verbatim
        // rather than re-parsed and re-validated.
        let truncated = (bytes.len() as u16) > w_length;
        bytes.truncate(w_length as usize);
        if truncated {
            Some(Descriptor::Raw(bytes))
        } else {
            Some(full)
        }
    }

    pub fn set_strings(&mut self, strings: impl IntoIterator<Item = String>) {
        for s in strings {
            self.strings.push(StringDescriptor::from_str(&s));
        }
    }

    /// Serializes this identity to a self-describing blob, reusing the
    /// wire codec rather than a general-purpose serialization format: a
    /// speed byte, the device descriptor, the configuration descriptor
    /// (with its own embedded `wTotalLength` framing), a string count,
    /// then each string descriptor in turn.
    pub fn save(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(self.speed as u32).to_le_bytes());
        out.extend_from_slice(bytemuck::bytes_of(&self.device));
        self.configuration.encode(&mut out);
        out.extend_from_slice(&(self.strings.len() as u32).to_le_bytes());
        for s in &self.strings {
            s.encode(&mut out);
        }
        out
    }

    pub fn load(buf: &[u8]) -> Result<Self, LoadError> {
        if buf.len() < 4 + descriptor::DEVICE_DESCRIPTOR_LEN {
            return Err(LoadError::Truncated);
        }
        let speed_val = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let speed = match speed_val {
            1 => Speed::Low,
            2 => Speed::Full,
            3 => Speed::High,
            other => {
                return Err(LoadError::Wire(usbmitm_wire::Error::UnknownDiscriminant {
                    what: "device speed",
                    value: other,
                }))
            }
        };
        let rest = &buf[4..];
        let device: DeviceDescriptor =
            *bytemuck::from_bytes(&rest[..descriptor::DEVICE_DESCRIPTOR_LEN]);
        let rest = &rest[descriptor::DEVICE_DESCRIPTOR_LEN..];
        let (configuration, rest) = ConfigurationDescriptor::decode(rest)?;
        if rest.len() < 4 {
            return Err(LoadError::Truncated);
        }
        let count = u32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]) as usize;
        let mut rest = &rest[4..];
        let mut strings = Vec::with_capacity(count);
        for _ in 0..count {
            let (s, tail) = StringDescriptor::decode(rest)?;
            strings.push(s);
            rest = tail;
        }
        Ok(DeviceIdentity {
            device,
            configuration,
            strings,
            speed,
        })
    }
}
