//! PCAP (libpcap linktype 220, Linux usbmon) capture stage: observes every
//! `USB_DATA` transfer the engine decodes and writes it to a `.pcap` file
//! Wireshark can open directly.

mod error;
mod format;
mod writer;

pub use error::Error;
pub use format::{GlobalHeader, RecordHeader, UsbPseudoHeader};
pub use usbmitm_engine::Stage;
pub use writer::PcapWriter;
