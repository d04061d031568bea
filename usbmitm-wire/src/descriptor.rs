//! USB 2.0 descriptor structs and the type-tagged [`Descriptor`] enum.
//!
//! Fixed-layout descriptors are `#[repr(C)]` + `bytemuck::Pod` structs, the
//! same way `cotton_usb_host::wire` represents them, with multi-byte fields
//! kept as little-endian byte arrays rather than native integers so the
//! `Pod` impl is endianness-independent.

use crate::error::Error;
use bytemuck::{Pod, Zeroable};

pub const DESCRIPTOR_TYPE_DEVICE: u8 = 1;
pub const DESCRIPTOR_TYPE_CONFIGURATION: u8 = 2;
pub const DESCRIPTOR_TYPE_STRING: u8 = 3;
pub const DESCRIPTOR_TYPE_INTERFACE: u8 = 4;
pub const DESCRIPTOR_TYPE_ENDPOINT: u8 = 5;
pub const DESCRIPTOR_TYPE_BOS: u8 = 0x0F;
pub const DESCRIPTOR_TYPE_HID: u8 = 0x21;
pub const DESCRIPTOR_TYPE_HID_REPORT: u8 = 0x22;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct DeviceDescriptor {
    pub b_length: u8,
    pub b_descriptor_type: u8,
    pub bcd_usb: [u8; 2],
    pub b_device_class: u8,
    pub b_device_sub_class: u8,
    pub b_device_protocol: u8,
    pub b_max_packet_size0: u8,
    pub id_vendor: [u8; 2],
    pub id_product: [u8; 2],
    pub bcd_device: [u8; 2],
    pub i_manufacturer: u8,
    pub i_product: u8,
    pub i_serial_number: u8,
    pub b_num_configurations: u8,
}

pub const DEVICE_DESCRIPTOR_LEN: usize = core::mem::size_of::<DeviceDescriptor>();

impl DeviceDescriptor {
    /// The identity the emulator and cloner fall back on when nothing else
    /// has been captured or configured.
    pub fn placeholder() -> Self {
        DeviceDescriptor {
            b_length: DEVICE_DESCRIPTOR_LEN as u8,
            b_descriptor_type: DESCRIPTOR_TYPE_DEVICE,
            bcd_usb: 0x0200u16.to_le_bytes(),
            b_device_class: 0,
            b_device_sub_class: 0,
            b_device_protocol: 0,
            b_max_packet_size0: 64,
            id_vendor: 0x6464u16.to_le_bytes(),
            id_product: 0x6464u16.to_le_bytes(),
            bcd_device: 0x0100u16.to_le_bytes(),
            i_manufacturer: 0,
            i_product: 0,
            i_serial_number: 0,
            b_num_configurations: 1,
        }
    }

    pub fn id_vendor(&self) -> u16 {
        u16::from_le_bytes(self.id_vendor)
    }

    pub fn id_product(&self) -> u16 {
        u16::from_le_bytes(self.id_product)
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct InterfaceDescriptor {
    pub b_length: u8,
    pub b_descriptor_type: u8,
    pub b_interface_number: u8,
    pub b_alternate_setting: u8,
    pub b_num_endpoints: u8,
    pub b_interface_class: u8,
    pub b_interface_sub_class: u8,
    pub b_interface_protocol: u8,
    pub i_interface: u8,
}

pub const INTERFACE_DESCRIPTOR_LEN: usize = core::mem::size_of::<InterfaceDescriptor>();

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct EndpointDescriptor {
    pub b_length: u8,
    pub b_descriptor_type: u8,
    pub b_endpoint_address: u8,
    pub bm_attributes: u8,
    pub w_max_packet_size: [u8; 2],
    pub b_interval: u8,
}

pub const ENDPOINT_DESCRIPTOR_LEN: usize = core::mem::size_of::<EndpointDescriptor>();

impl EndpointDescriptor {
    pub fn w_max_packet_size(&self) -> u16 {
        u16::from_le_bytes(self.w_max_packet_size)
    }
}

/// `bLength`/`bDescriptorType` header common to every configuration-scope
/// descriptor, used while walking the blob embedded after a configuration
/// descriptor's own 9 bytes.
const CFG_HEADER_LEN: usize = 9;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Pod, Zeroable)]
struct ConfigurationHeader {
    b_length: u8,
    b_descriptor_type: u8,
    w_total_length: [u8; 2],
    b_num_interfaces: u8,
    b_configuration_value: u8,
    i_configuration: u8,
    bm_attributes: u8,
    b_max_power: u8,
}

/// A configuration descriptor together with the interface, endpoint, HID
/// and other descriptors nested inside its `wTotalLength`-delimited blob.
///
/// The embedded descriptors are kept in wire order rather than split into
/// separate interface/endpoint lists: nothing downstream needs random
/// access to them, and keeping them flat means re-encoding never has to
/// reconstruct an order the device didn't originally use.
#[derive(Clone, Debug, PartialEq)]
pub struct ConfigurationDescriptor {
    pub b_configuration_value: u8,
    pub i_configuration: u8,
    pub bm_attributes: u8,
    pub b_max_power: u8,
    pub b_num_interfaces: u8,
    pub embedded: Vec<Descriptor>,
}

impl ConfigurationDescriptor {
    pub fn decode(buf: &[u8]) -> Result<(Self, &[u8]), Error> {
        if buf.len() < CFG_HEADER_LEN {
            return Err(Error::Truncated {
                what: "configuration descriptor",
                need: CFG_HEADER_LEN,
                have: buf.len(),
            });
        }
        let header: ConfigurationHeader = *bytemuck::from_bytes(&buf[..CFG_HEADER_LEN]);
        let total = u16::from_le_bytes(header.w_total_length) as usize;
        if total < CFG_HEADER_LEN || buf.len() < total {
            return Err(Error::LengthMismatch {
                what: "configuration descriptor wTotalLength",
                declared: total,
                actual: buf.len(),
            });
        }
        let mut rest = &buf[CFG_HEADER_LEN..total];
        let mut embedded = Vec::new();
        while !rest.is_empty() {
            let (descriptor, tail) = Descriptor::decode_one(rest)?;
            embedded.push(descriptor);
            rest = tail;
        }
        let cfg = ConfigurationDescriptor {
            b_configuration_value: header.b_configuration_value,
            i_configuration: header.i_configuration,
            bm_attributes: header.bm_attributes,
            b_max_power: header.b_max_power,
            b_num_interfaces: header.b_num_interfaces,
            embedded,
        };
        Ok((cfg, &buf[total..]))
    }

    /// Encodes the header and embedded descriptors, recomputing
    /// `wTotalLength` and `bLength` rather than trusting stored values,
    /// since callers build these programmatically as often as they parse
    /// them off the wire.
    pub fn encode(&self, out: &mut Vec<u8>) {
        let mut body = Vec::new();
        for d in &self.embedded {
            d.encode(&mut body);
        }
        let total = CFG_HEADER_LEN + body.len();
        let header = ConfigurationHeader {
            b_length: CFG_HEADER_LEN as u8,
            b_descriptor_type: DESCRIPTOR_TYPE_CONFIGURATION,
            w_total_length: (total as u16).to_le_bytes(),
            b_num_interfaces: self.b_num_interfaces,
            b_configuration_value: self.b_configuration_value,
            i_configuration: self.i_configuration,
            bm_attributes: self.bm_attributes,
            b_max_power: self.b_max_power,
        };
        out.extend_from_slice(bytemuck::bytes_of(&header));
        out.extend_from_slice(&body);
    }

    pub fn interfaces(&self) -> impl Iterator<Item = &InterfaceDescriptor> {
        self.embedded.iter().filter_map(|d| match d {
            Descriptor::Interface(i) => Some(i),
            _ => None,
        })
    }

    pub fn endpoints(&self) -> impl Iterator<Item = &EndpointDescriptor> {
        self.embedded.iter().filter_map(|d| match d {
            Descriptor::Endpoint(e) => Some(e),
            _ => None,
        })
    }
}

/// `bLength`/`bString` string descriptor. `bString` is UTF-16LE and is kept
/// as raw code units rather than decoded to a `String`, since malformed or
/// truncated UTF-16 must still round-trip byte-for-byte.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StringDescriptor {
    pub b_string: Vec<u16>,
}

impl StringDescriptor {
    pub fn from_str(s: &str) -> Self {
        StringDescriptor {
            b_string: s.encode_utf16().collect(),
        }
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf16_lossy(&self.b_string)
    }

    pub fn decode(buf: &[u8]) -> Result<(Self, &[u8]), Error> {
        let (len, rest) = header(buf, "string descriptor")?;
        let payload = &rest[..len - 2];
        let b_string = payload
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        Ok((StringDescriptor { b_string }, &rest[len - 2..]))
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        let len = 2 + self.b_string.len() * 2;
        out.push(len as u8);
        out.push(DESCRIPTOR_TYPE_STRING);
        for unit in &self.b_string {
            out.extend_from_slice(&unit.to_le_bytes());
        }
    }
}

/// USB HID class descriptor: a 6-byte fixed header followed by
/// `bNumDescriptors` `(type, length)` pairs describing the report
/// descriptor(s) that follow it in the configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HidDescriptor {
    pub bcd_hid: u16,
    pub b_country_code: u8,
    pub sub_descriptors: Vec<(u8, u16)>,
}

impl HidDescriptor {
    pub fn decode(buf: &[u8]) -> Result<(Self, &[u8]), Error> {
        let (len, rest) = header(buf, "HID descriptor")?;
        let body = &rest[..len - 2];
        if body.len() < 3 {
            return Err(Error::Truncated {
                what: "HID descriptor",
                need: 5,
                have: body.len() + 2,
            });
        }
        let bcd_hid = u16::from_le_bytes([body[0], body[1]]);
        let b_country_code = body[2];
        let b_num_descriptors = body[3] as usize;
        let mut sub_descriptors = Vec::with_capacity(b_num_descriptors);
        let mut tail = &body[4..];
        for _ in 0..b_num_descriptors {
            if tail.len() < 3 {
                break;
            }
            let ty = tail[0];
            let dlen = u16::from_le_bytes([tail[1], tail[2]]);
            sub_descriptors.push((ty, dlen));
            tail = &tail[3..];
        }
        Ok((
            HidDescriptor {
                bcd_hid,
                b_country_code,
                sub_descriptors,
            },
            &rest[len - 2..],
        ))
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        let len = 6 + self.sub_descriptors.len() * 3;
        out.push(len as u8);
        out.push(DESCRIPTOR_TYPE_HID);
        out.extend_from_slice(&self.bcd_hid.to_le_bytes());
        out.push(self.b_country_code);
        out.push(self.sub_descriptors.len() as u8);
        for (ty, dlen) in &self.sub_descriptors {
            out.push(*ty);
            out.extend_from_slice(&dlen.to_le_bytes());
        }
    }
}

/// Raw HID report descriptor bytecode. Unlike other descriptors this has
/// no `bLength`/`bDescriptorType` header of its own: it's returned as the
/// entire response payload to a `GET_DESCRIPTOR(HID_REPORT)` request, so
/// it's modelled as an opaque byte blob rather than parsed further.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HidReportDescriptor(pub Vec<u8>);

/// BOS (Binary device OS) descriptor: header plus opaque capability data,
/// mirroring the original controller's treatment of BOS as a capability
/// blob it forwards without interpreting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BosDescriptor {
    pub b_dev_capability_type: u8,
    pub data: Vec<u8>,
}

impl BosDescriptor {
    pub fn decode(buf: &[u8]) -> Result<(Self, &[u8]), Error> {
        let (len, rest) = header(buf, "BOS descriptor")?;
        let body = &rest[..len - 2];
        if body.is_empty() {
            return Err(Error::Truncated {
                what: "BOS descriptor",
                need: 3,
                have: 2,
            });
        }
        let b_dev_capability_type = body[0];
        let data = body[1..].to_vec();
        Ok((
            BosDescriptor {
                b_dev_capability_type,
                data,
            },
            &rest[len - 2..],
        ))
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        let len = 3 + self.data.len();
        out.push(len as u8);
        out.push(DESCRIPTOR_TYPE_BOS);
        out.push(self.b_dev_capability_type);
        out.extend_from_slice(&self.data);
    }
}

/// A descriptor of a recognised type but layout this crate doesn't model
/// in detail, kept as `bLength`/`bDescriptorType` plus the raw trailing
/// bytes so it still round-trips exactly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownDescriptor {
    pub b_descriptor_type: u8,
    pub data: Vec<u8>,
}

impl UnknownDescriptor {
    pub fn encode(&self, out: &mut Vec<u8>) {
        let len = 2 + self.data.len();
        out.push(len as u8);
        out.push(self.b_descriptor_type);
        out.extend_from_slice(&self.data);
    }
}

/// Any USB descriptor, type-tagged the way `GET_DESCRIPTOR` responses are
/// tagged by `bDescriptorType` (or, for the HID report descriptor, by the
/// request that produced them, since that one carries no header of its
/// own).
#[derive(Clone, Debug, PartialEq)]
pub enum Descriptor {
    Device(DeviceDescriptor),
    Configuration(ConfigurationDescriptor),
    String(StringDescriptor),
    Interface(InterfaceDescriptor),
    Endpoint(EndpointDescriptor),
    Hid(HidDescriptor),
    HidReport(HidReportDescriptor),
    Bos(BosDescriptor),
    Unknown(UnknownDescriptor),
    /// Verbatim bytes, encoded exactly as given with no header
    /// recomputed. Used for responses deliberately truncated to less
    /// than their declared length (the standard two-pass `GET_DESCRIPTOR
    /// CONFIGURATION` read, where the first, short response still
    /// declares the full `wTotalLength`): re-parsing and re-encoding
    /// those would either fail length validation or silently "fix up"
    /// a length field the real device left alone.
    Raw(Vec<u8>),
}

fn header<'a>(buf: &'a [u8], what: &'static str) -> Result<(usize, &'a [u8]), Error> {
    if buf.len() < 2 {
        return Err(Error::Truncated {
            what,
            need: 2,
            have: buf.len(),
        });
    }
    let len = buf[0] as usize;
    if len < 2 || buf.len() < len {
        return Err(Error::LengthMismatch {
            what,
            declared: len,
            actual: buf.len(),
        });
    }
    Ok((len, buf))
}

impl Descriptor {
    /// Decodes one descriptor from the front of `buf`, returning the
    /// remainder. Used both for top-level `GET_DESCRIPTOR` responses and
    /// while walking a configuration descriptor's embedded blob.
    pub fn decode_one(buf: &[u8]) -> Result<(Self, &[u8]), Error> {
        if buf.len() < 2 {
            return Err(Error::Truncated {
                what: "descriptor",
                need: 2,
                have: buf.len(),
            });
        }
        let declared_len = buf[0] as usize;
        let ty = buf[1];

        // The original controller's quirk: a 5-byte payload tagged as a
        // device descriptor is actually a short HID report descriptor,
        // because some devices answer GET_DESCRIPTOR(HID_REPORT) with a
        // report that happens to start with byte 0x01 (bDescriptorType
        // for DEVICE) in its first two bytes. Preserved for compatibility
        // with bridges that rely on it.
        #[cfg(feature = "legacy-hid-report-quirk")]
        if declared_len == 5 && ty == DESCRIPTOR_TYPE_DEVICE && buf.len() >= 5 {
            let data = buf[..5].to_vec();
            return Ok((Descriptor::HidReport(HidReportDescriptor(data)), &buf[5..]));
        }

        match ty {
            DESCRIPTOR_TYPE_DEVICE => {
                if buf.len() < DEVICE_DESCRIPTOR_LEN {
                    return Err(Error::Truncated {
                        what: "device descriptor",
                        need: DEVICE_DESCRIPTOR_LEN,
                        have: buf.len(),
                    });
                }
                let d: DeviceDescriptor = *bytemuck::from_bytes(&buf[..DEVICE_DESCRIPTOR_LEN]);
                Ok((Descriptor::Device(d), &buf[DEVICE_DESCRIPTOR_LEN..]))
            }
            DESCRIPTOR_TYPE_CONFIGURATION => {
                let (cfg, rest) = ConfigurationDescriptor::decode(buf)?;
                Ok((Descriptor::Configuration(cfg), rest))
            }
            DESCRIPTOR_TYPE_STRING => {
                let (s, rest) = StringDescriptor::decode(buf)?;
                Ok((Descriptor::String(s), rest))
            }
            DESCRIPTOR_TYPE_INTERFACE => {
                if buf.len() < INTERFACE_DESCRIPTOR_LEN {
                    return Err(Error::Truncated {
                        what: "interface descriptor",
                        need: INTERFACE_DESCRIPTOR_LEN,
                        have: buf.len(),
                    });
                }
                let d: InterfaceDescriptor =
                    *bytemuck::from_bytes(&buf[..INTERFACE_DESCRIPTOR_LEN]);
                Ok((Descriptor::Interface(d), &buf[INTERFACE_DESCRIPTOR_LEN..]))
            }
            DESCRIPTOR_TYPE_ENDPOINT => {
                if buf.len() < ENDPOINT_DESCRIPTOR_LEN {
                    return Err(Error::Truncated {
                        what: "endpoint descriptor",
                        need: ENDPOINT_DESCRIPTOR_LEN,
                        have: buf.len(),
                    });
                }
                let d: EndpointDescriptor = *bytemuck::from_bytes(&buf[..ENDPOINT_DESCRIPTOR_LEN]);
                Ok((Descriptor::Endpoint(d), &buf[ENDPOINT_DESCRIPTOR_LEN..]))
            }
            DESCRIPTOR_TYPE_HID => {
                let (h, rest) = HidDescriptor::decode(buf)?;
                Ok((Descriptor::Hid(h), rest))
            }
            DESCRIPTOR_TYPE_HID_REPORT => {
                let data = buf[..declared_len.max(2)].to_vec();
                Ok((
                    Descriptor::HidReport(HidReportDescriptor(data)),
                    &buf[declared_len.max(2)..],
                ))
            }
            DESCRIPTOR_TYPE_BOS => {
                let (b, rest) = BosDescriptor::decode(buf)?;
                Ok((Descriptor::Bos(b), rest))
            }
            other => {
                if buf.len() < declared_len {
                    return Err(Error::LengthMismatch {
                        what: "descriptor",
                        declared: declared_len,
                        actual: buf.len(),
                    });
                }
                let data = buf[2..declared_len].to_vec();
                Ok((
                    Descriptor::Unknown(UnknownDescriptor {
                        b_descriptor_type: other,
                        data,
                    }),
                    &buf[declared_len..],
                ))
            }
        }
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Descriptor::Device(d) => out.extend_from_slice(bytemuck::bytes_of(d)),
            Descriptor::Configuration(c) => c.encode(out),
            Descriptor::String(s) => s.encode(out),
            Descriptor::Interface(i) => out.extend_from_slice(bytemuck::bytes_of(i)),
            Descriptor::Endpoint(e) => out.extend_from_slice(bytemuck::bytes_of(e)),
            Descriptor::Hid(h) => h.encode(out),
            Descriptor::HidReport(r) => out.extend_from_slice(&r.0),
            Descriptor::Bos(b) => b.encode(out),
            Descriptor::Unknown(u) => u.encode(out),
            Descriptor::Raw(bytes) => out.extend_from_slice(bytes),
        }
    }

    pub fn b_descriptor_type(&self) -> u8 {
        match self {
            Descriptor::Device(_) => DESCRIPTOR_TYPE_DEVICE,
            Descriptor::Configuration(_) => DESCRIPTOR_TYPE_CONFIGURATION,
            Descriptor::String(_) => DESCRIPTOR_TYPE_STRING,
            Descriptor::Interface(_) => DESCRIPTOR_TYPE_INTERFACE,
            Descriptor::Endpoint(_) => DESCRIPTOR_TYPE_ENDPOINT,
            Descriptor::Hid(_) => DESCRIPTOR_TYPE_HID,
            Descriptor::HidReport(_) => DESCRIPTOR_TYPE_HID_REPORT,
            Descriptor::Bos(_) => DESCRIPTOR_TYPE_BOS,
            Descriptor::Unknown(u) => u.b_descriptor_type,
            Descriptor::Raw(bytes) => bytes.get(1).copied().unwrap_or(0),
        }
    }
}
