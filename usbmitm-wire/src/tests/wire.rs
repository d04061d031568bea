use super::*;
use descriptor::{
    BosDescriptor, ConfigurationDescriptor, DeviceDescriptor, Descriptor, EndpointDescriptor,
    HidReportDescriptor, InterfaceDescriptor, StringDescriptor,
};
use endpoint::{Direction, Endpoint, TransferType};
use management::{Management, ManagementNewDevice, Speed};
use request::RequestDescriptor;

fn sample_configuration() -> ConfigurationDescriptor {
    ConfigurationDescriptor {
        b_configuration_value: 1,
        i_configuration: 0,
        bm_attributes: 0x80,
        b_max_power: 50,
        b_num_interfaces: 1,
        embedded: vec![
            Descriptor::Interface(InterfaceDescriptor {
                b_length: INTERFACE_DESCRIPTOR_LEN_CONST,
                b_descriptor_type: descriptor::DESCRIPTOR_TYPE_INTERFACE,
                b_interface_number: 0,
                b_alternate_setting: 0,
                b_num_endpoints: 1,
                b_interface_class: 3,
                b_interface_sub_class: 0,
                b_interface_protocol: 0,
                i_interface: 0,
            }),
            Descriptor::Endpoint(EndpointDescriptor {
                b_length: ENDPOINT_DESCRIPTOR_LEN_CONST,
                b_descriptor_type: descriptor::DESCRIPTOR_TYPE_ENDPOINT,
                b_endpoint_address: 0x81,
                bm_attributes: 0x03,
                w_max_packet_size: 8u16.to_le_bytes(),
                b_interval: 10,
            }),
        ],
    }
}

const INTERFACE_DESCRIPTOR_LEN_CONST: u8 = descriptor::INTERFACE_DESCRIPTOR_LEN as u8;
const ENDPOINT_DESCRIPTOR_LEN_CONST: u8 = descriptor::ENDPOINT_DESCRIPTOR_LEN as u8;

#[test]
fn five_byte_device_descriptor_is_hid_report() {
    let bytes = [5u8, descriptor::DESCRIPTOR_TYPE_DEVICE, 0x01, 0xA1, 0x00];
    let (d, rest) = Descriptor::decode_one(&bytes).unwrap();
    assert!(rest.is_empty());
    match d {
        Descriptor::HidReport(HidReportDescriptor(data)) => assert_eq!(data, bytes),
        other => panic!("expected HidReport quirk, got {other:?}"),
    }
}

#[test]
fn get_descriptor_request_host_to_device_round_trips() {
    // bmRequestType=0x80 (device-to-host, standard, device), bRequest=6
    // (GET_DESCRIPTOR), wValue=0x0100 (index 0, type DEVICE), wIndex=0,
    // wLength=18 -- the canonical first request issued on enumeration.
    let setup = [0x80u8, 0x06, 0x00, 0x01, 0x00, 0x00, 0x12, 0x00];
    let msg = UsbData {
        endpoint: Endpoint::CONTROL_ZERO,
        request: Some(RequestDescriptor::decode(&setup).unwrap().0),
        response: None,
        data: Vec::new(),
    };
    let encoded = encode_host(&Message::UsbData(msg.clone()));
    let decoded = decode_host(&encoded).unwrap();
    assert_eq!(decoded, Message::UsbData(msg));

    match decoded {
        Message::UsbData(d) => match d.request.unwrap() {
            RequestDescriptor::GetDescriptor {
                descriptor_index,
                descriptor_type,
                language_id,
                w_length,
                ..
            } => {
                assert_eq!(descriptor_index, 0);
                assert_eq!(descriptor_type, descriptor::DESCRIPTOR_TYPE_DEVICE);
                assert_eq!(language_id, 0);
                assert_eq!(w_length, 18);
            }
            other => panic!("expected GetDescriptor, got {other:?}"),
        },
        _ => unreachable!(),
    }
}

#[test]
fn spec_scenario_decode_then_encode_identity_for_a_captured_get_descriptor_setup() {
    // A host-to-device USB_DATA on control-0 carrying
    // GET_DESCRIPTOR(type=DEVICE, wLength=64).
    let bytes: [u8; 26] = [
        0x1a, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x80, 0x06, 0x00, 0x01, 0x00, 0x00, 0x40, 0x00,
    ];
    let decoded = decode_host(&bytes).unwrap();
    match &decoded {
        Message::UsbData(d) => {
            assert!(d.endpoint.is_control_zero());
            match d.request.unwrap() {
                RequestDescriptor::GetDescriptor {
                    descriptor_type,
                    w_length,
                    ..
                } => {
                    assert_eq!(descriptor_type, descriptor::DESCRIPTOR_TYPE_DEVICE);
                    assert_eq!(w_length, 64);
                }
                other => panic!("expected GetDescriptor, got {other:?}"),
            }
        }
        other => panic!("expected UsbData, got {other:?}"),
    }
    assert_eq!(encode_host(&decoded), bytes);
}

#[test]
fn device_to_host_message_carries_response_but_host_to_device_does_not() {
    let device = DeviceDescriptor::placeholder();
    let msg = UsbData {
        endpoint: Endpoint::CONTROL_ZERO,
        request: Some(RequestDescriptor::GetDescriptor {
            bm_request_type: 0x80,
            descriptor_index: 0,
            descriptor_type: descriptor::DESCRIPTOR_TYPE_DEVICE,
            language_id: 0,
            w_length: 18,
        }),
        response: Some(Descriptor::Device(device)),
        data: Vec::new(),
    };

    let device_bytes = encode_device(&Message::UsbData(msg.clone()));
    let decoded = decode_device(&device_bytes).unwrap();
    assert_eq!(decoded, Message::UsbData(msg.clone()));

    let host_bytes = encode_host(&Message::UsbData(msg));
    match decode_host(&host_bytes).unwrap() {
        Message::UsbData(d) => assert!(d.response.is_none()),
        _ => panic!("expected UsbData"),
    }
}

#[test]
fn non_control_endpoint_carries_raw_data_only() {
    let msg = UsbData {
        endpoint: Endpoint {
            number: 1,
            transfer_type: TransferType::Bulk,
            direction: Direction::In,
        },
        request: None,
        response: None,
        data: vec![1, 2, 3, 4],
    };
    let bytes = encode_device(&Message::UsbData(msg.clone()));
    assert_eq!(decode_device(&bytes).unwrap(), Message::UsbData(msg));
}

#[test]
fn ack_round_trips() {
    let ack = Ack {
        endpoint: Endpoint::CONTROL_ZERO,
        status: -1,
        data: vec![0xAA, 0xBB],
    };
    let bytes = encode_device(&Message::Ack(ack.clone()));
    assert_eq!(decode_device(&bytes).unwrap(), Message::Ack(ack));
}

#[test]
fn reset_and_reload_round_trip_with_no_payload() {
    for msg in [Management::Reset, Management::Reload] {
        let bytes = encode_device(&Message::Management(msg.clone()));
        assert_eq!(
            decode_device(&bytes).unwrap(),
            Message::Management(msg)
        );
    }
}

#[test]
fn new_device_management_round_trips_with_embedded_configuration() {
    let nd = ManagementNewDevice {
        speed: Speed::Full,
        device: DeviceDescriptor::placeholder(),
        configuration: sample_configuration(),
    };
    let bytes = encode_device(&Message::Management(Management::NewDevice(nd.clone())));
    assert_eq!(
        decode_device(&bytes).unwrap(),
        Message::Management(Management::NewDevice(nd))
    );
}

#[test]
fn configuration_descriptor_recomputes_total_length_on_encode() {
    let cfg = sample_configuration();
    let mut bytes = Vec::new();
    cfg.encode(&mut bytes);
    let declared = u16::from_le_bytes([bytes[2], bytes[3]]) as usize;
    assert_eq!(declared, bytes.len());

    let (decoded, rest) = ConfigurationDescriptor::decode(&bytes).unwrap();
    assert!(rest.is_empty());
    assert_eq!(decoded, cfg);
    assert_eq!(decoded.interfaces().count(), 1);
    assert_eq!(decoded.endpoints().count(), 1);
}

#[test]
fn string_descriptor_round_trips_utf16() {
    let s = StringDescriptor::from_str("usbmitm");
    let mut bytes = Vec::new();
    s.encode(&mut bytes);
    let (decoded, rest) = Descriptor::decode_one(&bytes).unwrap();
    assert!(rest.is_empty());
    match decoded {
        Descriptor::String(d) => assert_eq!(d.to_string_lossy(), "usbmitm"),
        other => panic!("expected String, got {other:?}"),
    }
}

#[test]
fn bos_descriptor_preserves_opaque_capability_data() {
    let bos = BosDescriptor {
        b_dev_capability_type: 0x02,
        data: vec![0, 0, 0, 6],
    };
    let mut bytes = Vec::new();
    bos.encode(&mut bytes);
    bytes[0] = bytes.len() as u8;
    let (decoded, rest) = Descriptor::decode_one(&bytes).unwrap();
    assert!(rest.is_empty());
    assert_eq!(decoded, Descriptor::Bos(bos));
}

#[test]
fn datagram_length_prefix_mismatch_is_rejected() {
    let mut bytes = encode_device(&Message::Ack(Ack {
        endpoint: Endpoint::CONTROL_ZERO,
        status: 0,
        data: Vec::new(),
    }));
    bytes.truncate(bytes.len() - 1);
    assert!(matches!(
        decode_device(&bytes),
        Err(Error::LengthMismatch { .. })
    ));
}

#[test]
fn unknown_datagram_kind_is_rejected() {
    let bytes = [12u8, 0, 0, 0, 99, 0, 0, 0, 1, 2, 3, 4];
    assert!(matches!(
        decode_device(&bytes),
        Err(Error::UnknownDiscriminant { .. })
    ));
}

#[test]
fn datagram_over_max_size_is_rejected() {
    let mut bytes = vec![0u8; MAX_DATAGRAM_SIZE + 1];
    let len = bytes.len() as u32;
    bytes[0..4].copy_from_slice(&len.to_le_bytes());
    bytes[4..8].copy_from_slice(&KIND_ACK.to_le_bytes());
    assert!(matches!(decode_device(&bytes), Err(Error::TooLarge { .. })));
}
