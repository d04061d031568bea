//! On-disk layout: a pcap v2.4 global header followed by records, each a
//! standard pcap per-packet header wrapping a 64-byte Linux-USB capture
//! pseudo-header (the `usbmon` packet format libpcap calls linktype 220,
//! `DLT_USB_LINUX_MMAPPED`) and the captured payload bytes.
//!
//! Grounded in `usbq/usbpcap.py::USBPcap` for which fields get set to
//! what on a SUBMIT vs a COMPLETE record; the exact byte layout here is
//! libpcap's own public `DLT_USB_LINUX_MMAPPED` format rather than scapy's
//! bitfield-heavy rendition of it.

use bytemuck::{Pod, Zeroable};

pub const PCAP_MAGIC: u32 = 0xA1B2_C3D4;
pub const PCAP_VERSION_MAJOR: u16 = 2;
pub const PCAP_VERSION_MINOR: u16 = 4;
pub const SNAPLEN: u32 = 65535;
pub const LINKTYPE_USB_LINUX_MMAPPED: u32 = 220;

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct GlobalHeader {
    pub magic_number: u32,
    pub version_major: u16,
    pub version_minor: u16,
    pub thiszone: i32,
    pub sigfigs: u32,
    pub snaplen: u32,
    pub network: u32,
}

impl GlobalHeader {
    pub fn new() -> Self {
        GlobalHeader {
            magic_number: PCAP_MAGIC,
            version_major: PCAP_VERSION_MAJOR,
            version_minor: PCAP_VERSION_MINOR,
            thiszone: 0,
            sigfigs: 0,
            snaplen: SNAPLEN,
            network: LINKTYPE_USB_LINUX_MMAPPED,
        }
    }

    pub fn to_bytes(self) -> [u8; 24] {
        bytemuck::bytes_of(&self).try_into().unwrap()
    }
}

impl Default for GlobalHeader {
    fn default() -> Self {
        Self::new()
    }
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct RecordHeader {
    pub ts_sec: u32,
    pub ts_usec: u32,
    pub incl_len: u32,
    pub orig_len: u32,
}

impl RecordHeader {
    pub fn to_bytes(self) -> [u8; 16] {
        bytemuck::bytes_of(&self).try_into().unwrap()
    }
}

/// `urb_type` byte: ASCII 'S' for a submission, 'C' for its completion,
/// matching `usbq/usbpcap.py`'s `SUBMIT`/`COMPLETE` constants.
pub const URB_SUBMIT: u8 = b'S';
pub const URB_COMPLETE: u8 = b'C';

/// Setup/data "not present" sentinel bytes, preserved verbatim from
/// `usbq/usbpcap.py`'s `pcap_setup_request`/`pcap_data_present` tables
/// (`0x2d` = `'-'`, `0x3c` = `'<'`) rather than the more common `0`.
pub const SETUP_NOT_RELEVANT: u8 = 0x2d;
pub const SETUP_RELEVANT: u8 = 0x00;
pub const DATA_NOT_PRESENT: u8 = 0x3c;
pub const DATA_PRESENT: u8 = 0x00;

/// The 64-byte `usbmon`/linktype-220 pseudo-header.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct UsbPseudoHeader {
    pub id: u64,
    pub urb_type: u8,
    pub xfer_type: u8,
    pub epnum: u8,
    pub devnum: u8,
    pub busnum: u16,
    pub flag_setup: u8,
    pub flag_data: u8,
    pub ts_sec: i64,
    pub ts_usec: i32,
    pub status: i32,
    pub length: u32,
    pub len_cap: u32,
    pub setup_packet: [u8; 8],
    pub interval: i32,
    pub start_frame: i32,
    pub xfer_flags: u32,
    pub ndesc: u32,
}

pub const USB_PSEUDO_HEADER_LEN: usize = core::mem::size_of::<UsbPseudoHeader>();

impl UsbPseudoHeader {
    pub fn to_bytes(self) -> [u8; USB_PSEUDO_HEADER_LEN] {
        bytemuck::bytes_of(&self).try_into().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pseudo_header_is_64_bytes() {
        assert_eq!(USB_PSEUDO_HEADER_LEN, 64);
    }
}
