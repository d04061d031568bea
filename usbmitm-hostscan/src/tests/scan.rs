use usbmitm_emulator::EmulatorConfig;
use usbmitm_model::DeviceIdentity;
use usbmitm_wire::message::UsbData;
use usbmitm_wire::request::RequestDescriptor;
use usbmitm_wire::Endpoint;

use super::*;

fn scan_with(candidates: Vec<DeviceIdentity>, config: ScanConfig) -> (HostScan, Rc<RefCell<DeviceEmulator>>) {
    let emulator = Rc::new(RefCell::new(DeviceEmulator::new(
        DeviceIdentity::default(),
        EmulatorConfig { auto_connect: false },
    )));
    (HostScan::new(emulator.clone(), candidates, config), emulator)
}

#[test]
fn tick_connects_the_first_candidate_when_idle() {
    let (mut scan, emulator) = scan_with(
        vec![DeviceIdentity::default(), DeviceIdentity::default()],
        ScanConfig::default(),
    );
    scan.tick();
    assert_eq!(scan.state(), ScanState::Waiting);
    assert_eq!(emulator.borrow().state(), EmulatorState::Connected);
}

#[test]
fn max_lun_request_on_endpoint_zero_marks_the_candidate_supported() {
    let (mut scan, emulator) = scan_with(vec![DeviceIdentity::default()], ScanConfig::default());
    scan.tick();

    let request = Message::UsbData(UsbData {
        endpoint: Endpoint::CONTROL_ZERO,
        request: Some(RequestDescriptor::Generic {
            bm_request_type: 0xA1,
            b_request: 0xFE,
            w_value: 0,
            w_index: 0,
            w_length: 1,
        }),
        response: None,
        data: Vec::new(),
    });
    scan.log_pkt(&request, Flow::HostToDevice);

    assert_eq!(scan.state(), ScanState::Idle);
    assert_eq!(scan.results(), &[ScanResult { candidate: 0, supported: true }]);
    assert_eq!(emulator.borrow().state(), EmulatorState::Disconnected);
}

#[test]
fn reaching_configured_marks_the_candidate_supported_on_tick() {
    let (mut scan, emulator) = scan_with(vec![DeviceIdentity::default()], ScanConfig::default());
    scan.tick(); // connects candidate 0

    // The host issuing SET_CONFIGURATION against the emulator directly,
    // as it would via the normal packet pipeline.
    let set_config = Message::UsbData(UsbData {
        endpoint: Endpoint::CONTROL_ZERO,
        request: Some(RequestDescriptor::SetConfiguration {
            bm_request_type: 0,
            configuration_value: 1,
            w_index: 0,
            w_length: 0,
        }),
        response: None,
        data: Vec::new(),
    });
    let bytes = usbmitm_wire::encode_host(&set_config);
    emulator.borrow_mut().send_device_packet(&bytes);
    emulator.borrow_mut().tick();
    assert!(matches!(
        emulator.borrow().state(),
        EmulatorState::Configured { .. }
    ));

    scan.tick();
    assert_eq!(scan.state(), ScanState::Idle);
    assert_eq!(scan.results(), &[ScanResult { candidate: 0, supported: true }]);
}

#[test]
fn timeout_marks_unsupported_and_advances_to_the_next_candidate() {
    let (mut scan, emulator) = scan_with(
        vec![DeviceIdentity::default(), DeviceIdentity::default()],
        ScanConfig {
            timeout: Duration::from_millis(0),
        },
    );
    scan.tick(); // connects candidate 0, deadline already passed
    scan.tick(); // notices the timeout, disconnects, reports
    assert_eq!(
        scan.results(),
        &[ScanResult { candidate: 0, supported: false }]
    );
    assert_eq!(emulator.borrow().state(), EmulatorState::Disconnected);

    scan.tick(); // starts candidate 1
    assert_eq!(scan.state(), ScanState::Waiting);
    assert!(!scan.is_finished());
}

#[test]
fn is_finished_once_every_candidate_has_been_tried() {
    let (mut scan, _emulator) = scan_with(
        vec![DeviceIdentity::default()],
        ScanConfig {
            timeout: Duration::from_millis(0),
        },
    );
    scan.tick();
    scan.tick();
    assert!(scan.is_finished());
}
