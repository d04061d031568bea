use crate::error::Error;

/// Transfer type of an endpoint, as carried on the bridge wire.
///
/// This is an explicit 4-byte wire enum rather than a bitfield extracted
/// from a descriptor, because the bridge tags every datagram with it
/// directly instead of making the far end look the endpoint up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum TransferType {
    Control = 0,
    Isochronous = 1,
    Bulk = 2,
    Interrupt = 3,
}

impl TransferType {
    fn from_wire(v: u32) -> Result<Self, Error> {
        match v {
            0 => Ok(Self::Control),
            1 => Ok(Self::Isochronous),
            2 => Ok(Self::Bulk),
            3 => Ok(Self::Interrupt),
            _ => Err(Error::UnknownDiscriminant {
                what: "endpoint transfer type",
                value: v,
            }),
        }
    }
}

/// Direction of an endpoint, from the host's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Direction {
    In = 0,
    Out = 1,
}

impl Direction {
    fn from_wire(v: u32) -> Result<Self, Error> {
        match v {
            0 => Ok(Self::In),
            1 => Ok(Self::Out),
            _ => Err(Error::UnknownDiscriminant {
                what: "endpoint direction",
                value: v,
            }),
        }
    }
}

/// The endpoint a [`crate::Message`] was captured on.
///
/// Wire layout is 10 bytes: `epnum` (u16 LE), `eptype` (u32 LE), `epdir`
/// (u32 LE). `epnum` is the plain endpoint number (0-15), not packed with
/// the direction bit the way `bEndpointAddress` is in a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub number: u16,
    pub transfer_type: TransferType,
    pub direction: Direction,
}

pub(crate) const WIRE_LEN: usize = 10;

impl Endpoint {
    pub const CONTROL_ZERO: Endpoint = Endpoint {
        number: 0,
        transfer_type: TransferType::Control,
        direction: Direction::Out,
    };

    /// True for the default control pipe, the only endpoint on which a
    /// [`crate::RequestDescriptor`] is meaningful.
    pub fn is_control_zero(&self) -> bool {
        self.number == 0 && matches!(self.transfer_type, TransferType::Control)
    }

    pub fn decode(buf: &[u8]) -> Result<(Self, &[u8]), Error> {
        if buf.len() < WIRE_LEN {
            return Err(Error::Truncated {
                what: "endpoint",
                need: WIRE_LEN,
                have: buf.len(),
            });
        }
        let number = u16::from_le_bytes([buf[0], buf[1]]);
        let eptype = u32::from_le_bytes([buf[2], buf[3], buf[4], buf[5]]);
        let epdir = u32::from_le_bytes([buf[6], buf[7], buf[8], buf[9]]);
        let ep = Endpoint {
            number,
            transfer_type: TransferType::from_wire(eptype)?,
            direction: Direction::from_wire(epdir)?,
        };
        Ok((ep, &buf[WIRE_LEN..]))
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.number.to_le_bytes());
        out.extend_from_slice(&(self.transfer_type as u32).to_le_bytes());
        out.extend_from_slice(&(self.direction as u32).to_le_bytes());
    }
}
