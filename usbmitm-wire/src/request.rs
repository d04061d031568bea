//! Control-transfer `SETUP` packets, decoded into a type-tagged enum the
//! way the physical USB packet layout (`bmRequestType`, `bRequest`,
//! `wValue`, `wIndex`, `wLength`) is reinterpreted per the request's
//! `bRequest` number.

use crate::error::Error;

pub const GET_DESCRIPTOR: u8 = 6;
pub const GET_REPORT: u8 = 1;
pub const SET_CONFIGURATION: u8 = 9;
pub const SET_IDLE: u8 = 0x0A;
pub const SET_INTERFACE: u8 = 0x0B;

pub const SETUP_PACKET_LEN: usize = 8;

/// A decoded `SETUP` packet. Every variant keeps `bm_request_type` and,
/// where relevant, the raw `wValue`/`wIndex` fields it was built from are
/// reinterpreted by name (e.g. `wValue`'s low byte becomes
/// `descriptor_index`) rather than discarded, so [`RequestDescriptor::encode`]
/// can reconstruct the exact 8 bytes that were received.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestDescriptor {
    GetDescriptor {
        bm_request_type: u8,
        descriptor_index: u8,
        descriptor_type: u8,
        language_id: u16,
        w_length: u16,
    },
    GetReport {
        bm_request_type: u8,
        w_value: u16,
        w_index: u16,
        w_length: u16,
    },
    SetConfiguration {
        bm_request_type: u8,
        configuration_value: u8,
        w_index: u16,
        w_length: u16,
    },
    SetIdle {
        bm_request_type: u8,
        w_value: u16,
        w_index: u16,
        w_length: u16,
    },
    SetInterface {
        bm_request_type: u8,
        interface: u16,
        alternate_setting: u8,
        w_length: u16,
    },
    /// Any other standard, class or vendor request: kept verbatim.
    Generic {
        bm_request_type: u8,
        b_request: u8,
        w_value: u16,
        w_index: u16,
        w_length: u16,
    },
}

impl RequestDescriptor {
    pub fn b_request(&self) -> u8 {
        match self {
            RequestDescriptor::GetDescriptor { .. } => GET_DESCRIPTOR,
            RequestDescriptor::GetReport { .. } => GET_REPORT,
            RequestDescriptor::SetConfiguration { .. } => SET_CONFIGURATION,
            RequestDescriptor::SetIdle { .. } => SET_IDLE,
            RequestDescriptor::SetInterface { .. } => SET_INTERFACE,
            RequestDescriptor::Generic { b_request, .. } => *b_request,
        }
    }

    pub fn bm_request_type(&self) -> u8 {
        match self {
            RequestDescriptor::GetDescriptor {
                bm_request_type, ..
            }
            | RequestDescriptor::GetReport {
                bm_request_type, ..
            }
            | RequestDescriptor::SetConfiguration {
                bm_request_type, ..
            }
            | RequestDescriptor::SetIdle {
                bm_request_type, ..
            }
            | RequestDescriptor::SetInterface {
                bm_request_type, ..
            }
            | RequestDescriptor::Generic {
                bm_request_type, ..
            } => *bm_request_type,
        }
    }

    pub fn w_length(&self) -> u16 {
        match self {
            RequestDescriptor::GetDescriptor { w_length, .. }
            | RequestDescriptor::GetReport { w_length, .. }
            | RequestDescriptor::SetConfiguration { w_length, .. }
            | RequestDescriptor::SetIdle { w_length, .. }
            | RequestDescriptor::SetInterface { w_length, .. }
            | RequestDescriptor::Generic { w_length, .. } => *w_length,
        }
    }

    pub fn decode(buf: &[u8]) -> Result<(Self, &[u8]), Error> {
        if buf.len() < SETUP_PACKET_LEN {
            return Err(Error::Truncated {
                what: "SETUP packet",
                need: SETUP_PACKET_LEN,
                have: buf.len(),
            });
        }
        let bm_request_type = buf[0];
        let b_request = buf[1];
        let w_value = u16::from_le_bytes([buf[2], buf[3]]);
        let w_index = u16::from_le_bytes([buf[4], buf[5]]);
        let w_length = u16::from_le_bytes([buf[6], buf[7]]);
        let req = match b_request {
            GET_DESCRIPTOR => RequestDescriptor::GetDescriptor {
                bm_request_type,
                descriptor_index: (w_value & 0xFF) as u8,
                descriptor_type: (w_value >> 8) as u8,
                language_id: w_index,
                w_length,
            },
            GET_REPORT => RequestDescriptor::GetReport {
                bm_request_type,
                w_value,
                w_index,
                w_length,
            },
            SET_CONFIGURATION => RequestDescriptor::SetConfiguration {
                bm_request_type,
                configuration_value: (w_value & 0xFF) as u8,
                w_index,
                w_length,
            },
            SET_IDLE => RequestDescriptor::SetIdle {
                bm_request_type,
                w_value,
                w_index,
                w_length,
            },
            SET_INTERFACE => RequestDescriptor::SetInterface {
                bm_request_type,
                interface: w_index,
                alternate_setting: (w_value & 0xFF) as u8,
                w_length,
            },
            other => RequestDescriptor::Generic {
                bm_request_type,
                b_request: other,
                w_value,
                w_index,
                w_length,
            },
        };
        Ok((req, &buf[SETUP_PACKET_LEN..]))
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.bm_request_type());
        out.push(self.b_request());
        let (w_value, w_index) = match *self {
            RequestDescriptor::GetDescriptor {
                descriptor_index,
                descriptor_type,
                language_id,
                ..
            } => (
                (descriptor_index as u16) | ((descriptor_type as u16) << 8),
                language_id,
            ),
            RequestDescriptor::GetReport {
                w_value, w_index, ..
            } => (w_value, w_index),
            RequestDescriptor::SetConfiguration {
                configuration_value,
                w_index,
                ..
            } => (configuration_value as u16, w_index),
            RequestDescriptor::SetIdle {
                w_value, w_index, ..
            } => (w_value, w_index),
            RequestDescriptor::SetInterface {
                interface,
                alternate_setting,
                ..
            } => (alternate_setting as u16, interface),
            RequestDescriptor::Generic {
                w_value, w_index, ..
            } => (w_value, w_index),
        };
        out.extend_from_slice(&w_value.to_le_bytes());
        out.extend_from_slice(&w_index.to_le_bytes());
        out.extend_from_slice(&self.w_length().to_le_bytes());
    }
}
