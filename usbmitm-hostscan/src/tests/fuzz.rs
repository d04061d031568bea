use rand::SeedableRng;
use usbmitm_net::{LinkState, TransportConfig};
use usbmitm_wire::message::UsbData;
use usbmitm_wire::{Direction, Endpoint, TransferType};

use super::*;

fn transport() -> Rc<RefCell<UdpTransport>> {
    Rc::new(RefCell::new(
        UdpTransport::new(TransportConfig::default()).unwrap(),
    ))
}

fn bulk_in(number: u16) -> Endpoint {
    Endpoint {
        transfer_type: TransferType::Bulk,
        number,
        direction: Direction::In,
    }
}

#[test]
fn corrupt_bytes_changes_exactly_the_requested_count() {
    let mut rng = StdRng::seed_from_u64(1);
    let mut data = vec![0u8; 16];
    corrupt_bytes(&mut data, &mut rng, 4);
    assert_eq!(data.iter().filter(|&&b| b != 0).count(), 4);
}

#[test]
fn corrupt_bytes_is_a_no_op_on_empty_data() {
    let mut rng = StdRng::seed_from_u64(1);
    let mut data: Vec<u8> = Vec::new();
    corrupt_bytes(&mut data, &mut rng, 4);
    assert!(data.is_empty());
}

#[test]
fn corrupt_bits_flips_exactly_the_requested_count() {
    let mut rng = StdRng::seed_from_u64(2);
    let mut data = vec![0u8; 4];
    corrupt_bits(&mut data, &mut rng, 5);
    let flipped: u32 = data.iter().map(|b| b.count_ones()).sum();
    assert_eq!(flipped, 5);
}

#[test]
fn device_modify_corrupts_a_matching_endpoint_with_full_chance() {
    let config = HostFuzzConfig {
        chance_percent: 100.0,
        count: Some(3),
        endpoints: EndpointFilter::only([(TransferType::Bulk, 1, Direction::In)]),
        ..HostFuzzConfig::default()
    };
    let mut fuzz = HostFuzz::with_rng(transport(), config, StdRng::seed_from_u64(3));

    let mut pkt = Message::UsbData(UsbData {
        endpoint: bulk_in(1),
        request: None,
        response: None,
        data: vec![0u8; 8],
    });
    fuzz.device_modify(&mut pkt);

    let Message::UsbData(data) = pkt else {
        panic!("expected UsbData");
    };
    assert_ne!(data.data, vec![0u8; 8]);
}

#[test]
fn device_modify_ignores_endpoints_outside_the_filter() {
    let config = HostFuzzConfig {
        chance_percent: 100.0,
        count: Some(3),
        endpoints: EndpointFilter::only([(TransferType::Bulk, 2, Direction::In)]),
        ..HostFuzzConfig::default()
    };
    let mut fuzz = HostFuzz::with_rng(transport(), config, StdRng::seed_from_u64(4));

    let mut pkt = Message::UsbData(UsbData {
        endpoint: bulk_in(1),
        request: None,
        response: None,
        data: vec![0u8; 8],
    });
    fuzz.device_modify(&mut pkt);

    let Message::UsbData(data) = pkt else {
        panic!("expected UsbData");
    };
    assert_eq!(data.data, vec![0u8; 8]);
}

#[test]
fn device_modify_leaves_empty_payloads_untouched() {
    let config = HostFuzzConfig {
        chance_percent: 100.0,
        count: Some(3),
        ..HostFuzzConfig::default()
    };
    let mut fuzz = HostFuzz::with_rng(transport(), config, StdRng::seed_from_u64(5));

    let mut pkt = Message::UsbData(UsbData {
        endpoint: bulk_in(1),
        request: None,
        response: None,
        data: Vec::new(),
    });
    fuzz.device_modify(&mut pkt);

    let Message::UsbData(data) = pkt else {
        panic!("expected UsbData");
    };
    assert!(data.data.is_empty());
}

#[test]
fn device_modify_never_touches_non_usb_data_messages() {
    let config = HostFuzzConfig {
        chance_percent: 100.0,
        count: Some(3),
        ..HostFuzzConfig::default()
    };
    let mut fuzz = HostFuzz::with_rng(transport(), config, StdRng::seed_from_u64(6));

    let mut pkt = Message::Management(usbmitm_wire::Management::Reset);
    fuzz.device_modify(&mut pkt);
    assert!(matches!(pkt, Message::Management(usbmitm_wire::Management::Reset)));
}

#[test]
fn tick_bounces_the_link_once_the_watchdog_elapses() {
    let config = HostFuzzConfig {
        watchdog: Duration::from_millis(0),
        ..HostFuzzConfig::default()
    };
    let transport = transport();
    transport.borrow_mut().start();
    let mut fuzz = HostFuzz::with_rng(transport.clone(), config, StdRng::seed_from_u64(7));

    fuzz.tick();
    assert_eq!(transport.borrow().state(), LinkState::Running);
}

#[test]
fn tick_does_nothing_while_still_within_the_watchdog_window() {
    let config = HostFuzzConfig {
        watchdog: Duration::from_secs(10),
        ..HostFuzzConfig::default()
    };
    let transport = transport();
    let mut fuzz = HostFuzz::with_rng(transport.clone(), config, StdRng::seed_from_u64(8));

    fuzz.tick();
    assert_eq!(transport.borrow().state(), LinkState::Idle);
}
