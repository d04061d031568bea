//! Top-level bridge datagram framing: a 4-byte LE length prefix, a 4-byte
//! LE `kind`, and a kind-specific payload.
//!
//! `USB_DATA` datagrams carry the same payload shape whichever direction
//! they travel, except that only datagrams flowing device-to-host ever
//! carry a `response`: a host-to-device `SETUP`/`OUT` transfer has nothing
//! to respond with yet. [`decode_device`]/[`decode_host`] and
//! [`encode_device`]/[`encode_host`] take that direction as an explicit
//! parameter rather than guessing it from content, mirroring the bridge's
//! own two sockets (one per direction).

use crate::descriptor::Descriptor;
use crate::endpoint::Endpoint;
use crate::error::Error;
use crate::management::Management;
use crate::request::RequestDescriptor;
use crate::{KIND_ACK, KIND_MANAGEMENT, KIND_USB_DATA, MAX_DATAGRAM_SIZE};

const HEADER_LEN: usize = 8;

/// Payload of a `USB_DATA` datagram.
#[derive(Debug, Clone, PartialEq)]
pub struct UsbData {
    pub endpoint: Endpoint,
    /// Only present when `endpoint` is the default control pipe.
    pub request: Option<RequestDescriptor>,
    /// Only ever present on a datagram decoded with [`decode_device`]:
    /// the response half of a control transfer the bridge observed.
    pub response: Option<Descriptor>,
    pub data: Vec<u8>,
}

/// Acknowledgement of a completed transfer, carrying the host controller
/// status code so `log_pkt` hooks can tell success from a stalled/NAK'd
/// endpoint without re-deriving it from `data`.
#[derive(Debug, Clone, PartialEq)]
pub struct Ack {
    pub endpoint: Endpoint,
    pub status: i32,
    pub data: Vec<u8>,
}

/// A single bridge datagram once its length/kind framing has been
/// stripped.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    UsbData(UsbData),
    Ack(Ack),
    Management(Management),
}

fn decode_usb_data(body: &[u8], want_response: bool) -> Result<UsbData, Error> {
    let (endpoint, rest) = Endpoint::decode(body)?;
    if !endpoint.is_control_zero() {
        return Ok(UsbData {
            endpoint,
            request: None,
            response: None,
            data: rest.to_vec(),
        });
    }
    if rest.is_empty() {
        return Ok(UsbData {
            endpoint,
            request: None,
            response: None,
            data: Vec::new(),
        });
    }
    let (request, rest) = RequestDescriptor::decode(rest)?;
    let (response, rest) = if want_response && !rest.is_empty() {
        let (d, tail) = Descriptor::decode_one(rest)?;
        (Some(d), tail)
    } else {
        (None, rest)
    };
    Ok(UsbData {
        endpoint,
        request: Some(request),
        response,
        data: rest.to_vec(),
    })
}

fn encode_usb_data(msg: &UsbData, out: &mut Vec<u8>, emit_response: bool) {
    msg.endpoint.encode(out);
    if !msg.endpoint.is_control_zero() {
        out.extend_from_slice(&msg.data);
        return;
    }
    let Some(request) = &msg.request else {
        out.extend_from_slice(&msg.data);
        return;
    };
    request.encode(out);
    if emit_response {
        if let Some(response) = &msg.response {
            response.encode(out);
        }
    }
    out.extend_from_slice(&msg.data);
}

fn decode_ack(body: &[u8]) -> Result<Ack, Error> {
    let (endpoint, rest) = Endpoint::decode(body)?;
    if rest.len() < 4 {
        return Err(Error::Truncated {
            what: "ACK datagram",
            need: 4,
            have: rest.len(),
        });
    }
    let status = i32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]);
    Ok(Ack {
        endpoint,
        status,
        data: rest[4..].to_vec(),
    })
}

fn encode_ack(ack: &Ack, out: &mut Vec<u8>) {
    ack.endpoint.encode(out);
    out.extend_from_slice(&ack.status.to_le_bytes());
    out.extend_from_slice(&ack.data);
}

fn decode(buf: &[u8], want_response: bool) -> Result<Message, Error> {
    if buf.len() < HEADER_LEN {
        return Err(Error::Truncated {
            what: "bridge datagram header",
            need: HEADER_LEN,
            have: buf.len(),
        });
    }
    let len = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    if len != buf.len() {
        return Err(Error::LengthMismatch {
            what: "bridge datagram",
            declared: len,
            actual: buf.len(),
        });
    }
    if len > MAX_DATAGRAM_SIZE {
        return Err(Error::TooLarge { len });
    }
    let kind = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
    let body = &buf[HEADER_LEN..];
    match kind {
        KIND_USB_DATA => Ok(Message::UsbData(decode_usb_data(body, want_response)?)),
        KIND_ACK => Ok(Message::Ack(decode_ack(body)?)),
        KIND_MANAGEMENT => Ok(Message::Management(Management::decode(body)?)),
        other => Err(Error::UnknownDiscriminant {
            what: "datagram kind",
            value: other,
        }),
    }
}

fn encode(msg: &Message, emit_response: bool) -> Vec<u8> {
    let mut body = Vec::new();
    let kind = match msg {
        Message::UsbData(d) => {
            encode_usb_data(d, &mut body, emit_response);
            KIND_USB_DATA
        }
        Message::Ack(a) => {
            encode_ack(a, &mut body);
            KIND_ACK
        }
        Message::Management(m) => {
            m.encode(&mut body);
            KIND_MANAGEMENT
        }
    };
    let len = (HEADER_LEN + body.len()) as u32;
    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(&kind.to_le_bytes());
    out.extend_from_slice(&body);
    out
}

/// Decodes a datagram received from the bridge (device side): `USB_DATA`
/// payloads may carry a response descriptor.
pub fn decode_device(buf: &[u8]) -> Result<Message, Error> {
    decode(buf, true)
}

/// Decodes a datagram bound for the bridge (host side): `USB_DATA`
/// payloads never carry a response.
pub fn decode_host(buf: &[u8]) -> Result<Message, Error> {
    decode(buf, false)
}

/// Encodes a datagram to send toward the host, including any response on
/// `USB_DATA` payloads.
pub fn encode_device(msg: &Message) -> Vec<u8> {
    encode(msg, true)
}

/// Encodes a datagram to send toward the bridge/device, omitting any
/// response on `USB_DATA` payloads even if one happens to be set.
pub fn encode_host(msg: &Message) -> Vec<u8> {
    encode(msg, false)
}
