//! Candidate device identities a host-scan run iterates through.
//!
//! Grounded on `usbq/plugins/hostscan.py::usbq_device_identity`'s
//! mass-storage-shaped identity (interface class 8 / subclass 6 / protocol
//! 0x50, bulk-only transport, two bulk endpoints); the HID keyboard and
//! printer candidates extend the same construction to other common
//! device classes a host-capability probe would want to try.

use usbmitm_model::DeviceIdentity;
use usbmitm_wire::descriptor::{
    self, ConfigurationDescriptor, DeviceDescriptor, EndpointDescriptor, InterfaceDescriptor,
};
use usbmitm_wire::management::Speed;
use usbmitm_wire::Descriptor;

fn endpoint(address: u8, attributes: u8, max_packet_size: u16, interval: u8) -> EndpointDescriptor {
    EndpointDescriptor {
        b_length: descriptor::ENDPOINT_DESCRIPTOR_LEN as u8,
        b_descriptor_type: descriptor::DESCRIPTOR_TYPE_ENDPOINT,
        b_endpoint_address: address,
        bm_attributes: attributes,
        w_max_packet_size: max_packet_size.to_le_bytes(),
        b_interval: interval,
    }
}

fn interface(class: u8, sub_class: u8, protocol: u8, num_endpoints: u8) -> InterfaceDescriptor {
    InterfaceDescriptor {
        b_length: descriptor::INTERFACE_DESCRIPTOR_LEN as u8,
        b_descriptor_type: descriptor::DESCRIPTOR_TYPE_INTERFACE,
        b_interface_number: 0,
        b_alternate_setting: 0,
        b_num_endpoints: num_endpoints,
        b_interface_class: class,
        b_interface_sub_class: sub_class,
        b_interface_protocol: protocol,
        i_interface: 0,
    }
}

fn candidate(iface: InterfaceDescriptor, endpoints: Vec<EndpointDescriptor>) -> DeviceIdentity {
    let mut embedded = vec![Descriptor::Interface(iface)];
    embedded.extend(endpoints.into_iter().map(Descriptor::Endpoint));
    DeviceIdentity {
        device: DeviceDescriptor::placeholder(),
        configuration: ConfigurationDescriptor {
            b_configuration_value: 1,
            i_configuration: 0,
            bm_attributes: 0x80,
            b_max_power: 50,
            b_num_interfaces: 1,
            embedded,
        },
        strings: Vec::new(),
        speed: Speed::Full,
    }
}

/// Mass-storage (bulk-only transport), a HID boot keyboard, and a
/// bidirectional printer.
pub fn default_candidates() -> Vec<DeviceIdentity> {
    vec![
        candidate(
            interface(0x08, 0x06, 0x50, 2),
            vec![endpoint(0x81, 0x02, 512, 0), endpoint(0x02, 0x02, 512, 0)],
        ),
        candidate(interface(0x03, 0x01, 0x01, 1), vec![endpoint(0x81, 0x03, 8, 10)]),
        candidate(
            interface(0x07, 0x01, 0x02, 2),
            vec![endpoint(0x81, 0x02, 64, 0), endpoint(0x02, 0x02, 64, 0)],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn produces_three_distinct_device_classes() {
        let candidates = default_candidates();
        assert_eq!(candidates.len(), 3);
        let classes: Vec<u8> = candidates
            .iter()
            .map(|c| c.configuration.interfaces().next().unwrap().b_interface_class)
            .collect();
        assert_eq!(classes, vec![0x08, 0x03, 0x07]);
    }
}
