use usbmitm_wire::descriptor::{self, DeviceDescriptor};
use usbmitm_wire::{Endpoint, ManagementNewDevice, Speed};

use super::*;

fn get_descriptor_response(response: Descriptor, descriptor_type: u8) -> Message {
    Message::UsbData(UsbData {
        endpoint: Endpoint::CONTROL_ZERO,
        request: Some(RequestDescriptor::GetDescriptor {
            bm_request_type: 0x80,
            descriptor_index: 0,
            descriptor_type,
            language_id: 0,
            w_length: 255,
        }),
        response: Some(response),
        data: Vec::new(),
    })
}

#[test]
fn captures_descriptors_between_new_device_and_reset_and_persists_them() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cloned.bin");
    let mut cloner = Cloner::new(&path);

    let new_device = ManagementNewDevice {
        speed: Speed::Full,
        device: DeviceDescriptor::placeholder(),
        configuration: {
            let identity = DeviceIdentity::default();
            identity.configuration
        },
    };
    cloner.log_pkt(
        &Message::Management(Management::NewDevice(new_device)),
        Flow::DeviceToHost,
    );
    assert_eq!(cloner.state(), ClonerState::Observing);

    let device = DeviceDescriptor::placeholder();
    cloner.log_pkt(
        &get_descriptor_response(Descriptor::Device(device), descriptor::DESCRIPTOR_TYPE_DEVICE),
        Flow::DeviceToHost,
    );

    cloner.log_pkt(&Message::Management(Management::Reset), Flow::DeviceToHost);
    assert_eq!(cloner.state(), ClonerState::Idle);

    assert!(path.exists());
    let blob = std::fs::read(&path).unwrap();
    let loaded = DeviceIdentity::load(&blob).unwrap();
    assert_eq!(loaded.device, device);
}

#[test]
fn reset_with_nothing_captured_writes_no_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cloned.bin");
    let mut cloner = Cloner::new(&path);

    cloner.log_pkt(&Message::Management(Management::Reset), Flow::DeviceToHost);
    assert!(!path.exists());
}

#[test]
fn usb_data_outside_observing_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let mut cloner = Cloner::new(dir.path().join("cloned.bin"));
    cloner.log_pkt(
        &get_descriptor_response(
            Descriptor::Device(DeviceDescriptor::placeholder()),
            descriptor::DESCRIPTOR_TYPE_DEVICE,
        ),
        Flow::DeviceToHost,
    );
    cloner.log_pkt(&Message::Management(Management::Reset), Flow::DeviceToHost);
    assert!(!cloner.path().exists());
}

#[test]
fn teardown_persists_an_in_progress_capture() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cloned.bin");
    let mut cloner = Cloner::new(&path);

    let new_device = ManagementNewDevice {
        speed: Speed::High,
        device: DeviceDescriptor::placeholder(),
        configuration: DeviceIdentity::default().configuration,
    };
    cloner.log_pkt(
        &Message::Management(Management::NewDevice(new_device)),
        Flow::DeviceToHost,
    );
    cloner.log_pkt(
        &get_descriptor_response(
            Descriptor::Device(DeviceDescriptor::placeholder()),
            descriptor::DESCRIPTOR_TYPE_DEVICE,
        ),
        Flow::DeviceToHost,
    );

    cloner.teardown();
    assert!(path.exists());
}
