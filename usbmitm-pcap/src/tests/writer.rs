use usbmitm_wire::endpoint::{Direction, Endpoint, TransferType};
use usbmitm_wire::message::UsbData;
use usbmitm_wire::request::RequestDescriptor;
use usbmitm_wire::Message;

use super::*;

const DEVICE_GET_DESCRIPTOR: RequestDescriptor = RequestDescriptor::GetDescriptor {
    bm_request_type: 0x80,
    descriptor_index: 0,
    descriptor_type: 1,
    language_id: 0,
    w_length: 18,
};

fn fixed_clock() -> (i64, i32) {
    (1_700_000_000, 0)
}

/// Reads back every record's 16-byte pcap header + 64-byte pseudo-header,
/// returning `(urb_type, id, payload_len)` per record, skipping the global
/// header.
fn read_records(path: &std::path::Path) -> Vec<(u8, u64, usize)> {
    let bytes = std::fs::read(path).unwrap();
    assert!(bytes.len() >= 24);
    assert_eq!(&bytes[0..4], &0xA1B2_C3D4u32.to_le_bytes());
    let mut offset = 24;
    let mut out = Vec::new();
    while offset < bytes.len() {
        let incl_len =
            u32::from_le_bytes(bytes[offset + 8..offset + 12].try_into().unwrap()) as usize;
        offset += 16;
        let pseudo = &bytes[offset..offset + 64];
        let id = u64::from_le_bytes(pseudo[0..8].try_into().unwrap());
        let urb_type = pseudo[8];
        let payload_len = incl_len - 64;
        out.push((urb_type, id, payload_len));
        offset += incl_len;
    }
    out
}

#[test]
fn control_in_transfer_produces_submit_then_complete_sharing_an_id() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("capture.pcap");
    let mut writer = PcapWriter::with_clock(&path, fixed_clock).unwrap();

    let request = UsbData {
        endpoint: Endpoint::CONTROL_ZERO,
        request: Some(DEVICE_GET_DESCRIPTOR),
        response: None,
        data: Vec::new(),
    };
    writer.log_pkt(&Message::UsbData(request), Flow::HostToDevice);

    let response_bytes = {
        let mut b = Vec::new();
        usbmitm_wire::Descriptor::Device(usbmitm_wire::descriptor::DeviceDescriptor::placeholder())
            .encode(&mut b);
        b
    };
    let response = UsbData {
        endpoint: Endpoint {
            number: 0,
            transfer_type: TransferType::Control,
            direction: Direction::In,
        },
        request: Some(DEVICE_GET_DESCRIPTOR),
        response: Some(usbmitm_wire::Descriptor::Device(
            usbmitm_wire::descriptor::DeviceDescriptor::placeholder(),
        )),
        data: Vec::new(),
    };
    writer.log_pkt(&Message::UsbData(response), Flow::DeviceToHost);
    drop(writer);

    let records = read_records(&path);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].0, URB_SUBMIT);
    assert_eq!(records[1].0, URB_COMPLETE);
    assert_eq!(records[1].2, response_bytes.len());
    // Host-to-device and device-to-host ids are independent counters,
    // each starting at zero.
    assert_eq!(records[0].1, 0);
    assert_eq!(records[1].1, 0);
}

#[test]
fn bulk_out_transfer_gets_a_synthetic_complete_appended() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("capture.pcap");
    let mut writer = PcapWriter::with_clock(&path, fixed_clock).unwrap();

    let out = UsbData {
        endpoint: Endpoint {
            number: 2,
            transfer_type: TransferType::Bulk,
            direction: Direction::Out,
        },
        request: None,
        response: None,
        data: vec![1, 2, 3, 4],
    };
    writer.log_pkt(&Message::UsbData(out), Flow::HostToDevice);
    drop(writer);

    let records = read_records(&path);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].0, URB_SUBMIT);
    assert_eq!(records[0].2, 4);
    assert_eq!(records[1].0, URB_COMPLETE);
    assert_eq!(records[1].2, 0);
    assert_eq!(records[0].1, records[1].1);
}

#[test]
fn bulk_in_transfer_gets_a_synthetic_submit_prepended() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("capture.pcap");
    let mut writer = PcapWriter::with_clock(&path, fixed_clock).unwrap();

    let data_in = UsbData {
        endpoint: Endpoint {
            number: 1,
            transfer_type: TransferType::Bulk,
            direction: Direction::In,
        },
        request: None,
        response: None,
        data: vec![9, 9, 9],
    };
    writer.log_pkt(&Message::UsbData(data_in), Flow::DeviceToHost);
    drop(writer);

    let records = read_records(&path);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].0, URB_SUBMIT);
    assert_eq!(records[0].2, 0);
    assert_eq!(records[1].0, URB_COMPLETE);
    assert_eq!(records[1].2, 3);
}

#[test]
fn management_and_ack_datagrams_are_not_logged() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("capture.pcap");
    let mut writer = PcapWriter::with_clock(&path, fixed_clock).unwrap();

    writer.log_pkt(
        &Message::Management(usbmitm_wire::management::Management::Reset),
        Flow::HostToDevice,
    );
    writer.log_pkt(
        &Message::Ack(usbmitm_wire::message::Ack {
            endpoint: Endpoint::CONTROL_ZERO,
            status: 0,
            data: Vec::new(),
        }),
        Flow::DeviceToHost,
    );
    drop(writer);

    assert_eq!(std::fs::read(&path).unwrap().len(), 24);
}
