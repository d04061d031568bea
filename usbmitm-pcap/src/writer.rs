//! The capture stage: a passive `log_pkt` observer that turns decoded
//! [`Message::UsbData`] traffic into pcap records.
//!
//! Mapping is grounded in `usbq/usbpcap.py`'s `usbhost_to_usbpcap` (host to
//! device, i.e. [`Flow::HostToDevice`]) and `usbdev_to_usbpcap` (device to
//! host, [`Flow::DeviceToHost`]): a `SETUP`/`OUT` transfer observed on the
//! host side is a real SUBMIT, and for `OUT` transfers (the real device's
//! implicit ACK is otherwise never observed on this side of the bridge) a
//! synthetic COMPLETE is appended immediately. A transfer observed on the
//! device side is the real COMPLETE; for non-control endpoints, which never
//! have a corresponding SUBMIT of their own on the wire, a synthetic SUBMIT
//! is written first. `Message::Ack` and `Message::Management` datagrams are
//! not logged.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use usbmitm_engine::{Flow, Stage};
use usbmitm_wire::endpoint::{Direction, TransferType};
use usbmitm_wire::message::UsbData;
use usbmitm_wire::Message;

use crate::error::Error;
use crate::format::{
    GlobalHeader, RecordHeader, UsbPseudoHeader, DATA_NOT_PRESENT, DATA_PRESENT,
    SETUP_NOT_RELEVANT, SETUP_RELEVANT, URB_COMPLETE, URB_SUBMIT,
};

fn wall_clock() -> (i64, i32) {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    (now.as_secs() as i64, now.subsec_micros() as i32)
}

/// Writes every `USB_DATA` transfer it sees to a pcap file, linktype 220
/// (Linux usbmon). Registered like any other stage; it never produces or
/// modifies packets, only observes them.
pub struct PcapWriter {
    out: BufWriter<File>,
    host_to_device_id: u64,
    device_to_host_id: u64,
    clock: fn() -> (i64, i32),
}

impl PcapWriter {
    pub fn create(path: impl AsRef<Path>) -> Result<Self, Error> {
        let file = File::create(path).map_err(Error)?;
        let mut out = BufWriter::new(file);
        out.write_all(&GlobalHeader::new().to_bytes()).map_err(Error)?;
        Ok(PcapWriter {
            out,
            host_to_device_id: 0,
            device_to_host_id: 0,
            clock: wall_clock,
        })
    }

    #[cfg(test)]
    fn with_clock(path: impl AsRef<Path>, clock: fn() -> (i64, i32)) -> Result<Self, Error> {
        let mut writer = Self::create(path)?;
        writer.clock = clock;
        Ok(writer)
    }

    fn next_id(&mut self, flow: Flow) -> u64 {
        let counter = match flow {
            Flow::HostToDevice => &mut self.host_to_device_id,
            Flow::DeviceToHost => &mut self.device_to_host_id,
        };
        let id = *counter;
        *counter += 1;
        id
    }

    fn write_record(&mut self, header: UsbPseudoHeader, payload: &[u8]) {
        let incl_len = (std::mem::size_of::<UsbPseudoHeader>() + payload.len()) as u32;
        let record = RecordHeader {
            ts_sec: header.ts_sec as u32,
            ts_usec: header.ts_usec as u32,
            incl_len,
            orig_len: incl_len,
        };
        if let Err(e) = self.write_framed(&record.to_bytes(), &header.to_bytes(), payload) {
            log::error!("pcap write failed, dropping record: {e}");
        }
    }

    fn write_framed(&mut self, record: &[u8], header: &[u8], payload: &[u8]) -> io::Result<()> {
        self.out.write_all(record)?;
        self.out.write_all(header)?;
        self.out.write_all(payload)?;
        self.out.flush()
    }

    fn pseudo_header(
        &self,
        id: u64,
        urb_type: u8,
        data: &UsbData,
        length: u32,
        len_cap: u32,
        setup: Option<[u8; 8]>,
    ) -> UsbPseudoHeader {
        let (ts_sec, ts_usec) = (self.clock)();
        let epnum = data.endpoint.number as u8
            | if data.endpoint.direction == Direction::In {
                0x80
            } else {
                0
            };
        let xfer_type = match data.endpoint.transfer_type {
            TransferType::Control => 0,
            TransferType::Isochronous => 1,
            TransferType::Bulk => 2,
            TransferType::Interrupt => 3,
        };
        let (flag_setup, setup_packet) = match setup {
            Some(bytes) => (SETUP_RELEVANT, bytes),
            None => (SETUP_NOT_RELEVANT, [0u8; 8]),
        };
        let flag_data = if length > 0 { DATA_PRESENT } else { DATA_NOT_PRESENT };
        UsbPseudoHeader {
            id,
            urb_type,
            xfer_type,
            epnum,
            devnum: 1,
            busnum: 1,
            flag_setup,
            flag_data,
            ts_sec,
            ts_usec,
            status: 0,
            length,
            len_cap,
            setup_packet,
            interval: 0,
            start_frame: 0,
            xfer_flags: 0,
            ndesc: 0,
        }
    }

    /// A `SETUP`/`OUT` transfer seen on the way to the device: the real
    /// SUBMIT, plus a synthetic COMPLETE for `OUT` transfers since the
    /// device's own ACK never crosses the bridge's host-facing socket.
    fn log_host_to_device(&mut self, data: &UsbData) {
        let id = self.next_id(Flow::HostToDevice);
        let is_ctrl0 = data.endpoint.is_control_zero();
        let setup = data.request.as_ref().filter(|_| is_ctrl0).map(|req| {
            let mut bytes = Vec::with_capacity(8);
            req.encode(&mut bytes);
            let mut out = [0u8; 8];
            out.copy_from_slice(&bytes[..8]);
            out
        });
        let length = match &data.request {
            Some(req) if is_ctrl0 => req.w_length() as u32,
            _ => data.data.len() as u32,
        };
        let submit = self.pseudo_header(id, URB_SUBMIT, data, length, data.data.len() as u32, setup);
        self.write_record(submit, &data.data);

        // An OUT transfer's device-side ACK never crosses the bridge as
        // its own datagram (see `Ack`, which isn't logged), so its
        // completion is synthesized here instead, grounded on
        // `usbmitm/forward/pcapwriter.py::hookUSBHost`'s `epdir ==
        // PROTO_OUT` check.
        if data.endpoint.direction == Direction::Out {
            let complete = self.pseudo_header(id, URB_COMPLETE, data, length, 0, None);
            self.write_record(complete, &[]);
        }
    }

    /// A transfer seen on the way to the host: the real COMPLETE, with a
    /// synthetic SUBMIT prepended for non-control endpoints (control
    /// transfers already got their SUBMIT from the `SETUP` half on the
    /// host-to-device side).
    fn log_device_to_host(&mut self, data: &UsbData) {
        let id = self.next_id(Flow::DeviceToHost);
        let is_ctrl0_in =
            data.endpoint.is_control_zero() && data.endpoint.direction == Direction::In;

        // `hookUSBDevice` only synthesizes a request record for non-control
        // endpoints: a control transfer's SUBMIT was already written from
        // the real `SETUP` packet on the host-to-device side.
        if data.endpoint.transfer_type != TransferType::Control {
            let submit = self.pseudo_header(id, URB_SUBMIT, data, data.data.len() as u32, 0, None);
            self.write_record(submit, &[]);
        }

        let mut payload = Vec::new();
        if is_ctrl0_in {
            if let Some(response) = &data.response {
                response.encode(&mut payload);
            }
        }
        payload.extend_from_slice(&data.data);
        let complete = self.pseudo_header(
            id,
            URB_COMPLETE,
            data,
            payload.len() as u32,
            payload.len() as u32,
            None,
        );
        self.write_record(complete, &payload);
    }
}

impl Stage for PcapWriter {
    fn log_pkt(&mut self, pkt: &Message, flow: Flow) {
        let Message::UsbData(data) = pkt else {
            return;
        };
        match flow {
            Flow::HostToDevice => self.log_host_to_device(data),
            Flow::DeviceToHost => self.log_device_to_host(data),
        }
    }
}

#[cfg(test)]
#[path = "tests/writer.rs"]
mod tests;
