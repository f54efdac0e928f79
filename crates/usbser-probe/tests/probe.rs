//! Integration tests for device tree probing
//!
//! These tests walk simulated device trees and verify:
//! - Traversal order (parents before children, hubs descended into)
//! - Matching against the default and custom probe tables
//! - VID/PID filtered lookups

use std::sync::Arc;

use usbser_driver::SerialDriver;
use usbser_probe::{ProbeTable, Prober};
use usbser_sim::SimDevice;
use usbser_usb::UsbDevice;

mod helpers {
    use super::*;

    pub fn pl2303() -> Arc<dyn UsbDevice> {
        SimDevice::builder(0x067B, 0x2303)
            .max_packet_size_0(64)
            .interface(0, &[0x81, 0x02, 0x83])
            .build()
    }

    pub fn keyboard() -> Arc<dyn UsbDevice> {
        SimDevice::builder(0x046D, 0xC31C)
            .interface(0, &[0x81])
            .build()
    }

    /// A root hub with a keyboard, an adapter, and a nested hub holding
    /// a second adapter
    pub fn tree() -> Arc<dyn UsbDevice> {
        let nested_hub = SimDevice::builder(0x1D6B, 0x0002)
            .child(pl2303())
            .build();
        SimDevice::builder(0x1D6B, 0x0002)
            .child(keyboard())
            .child(pl2303())
            .child(nested_hub)
            .build()
    }
}

#[test]
fn devices_are_listed_parents_first() {
    let root = helpers::tree();
    let prober = Prober::new();

    let devices = prober.devices(&root);
    let ids: Vec<(u16, u16)> = devices
        .iter()
        .map(|d| {
            let descriptor = d.descriptor();
            (descriptor.vendor_id, descriptor.product_id)
        })
        .collect();
    assert_eq!(
        ids,
        vec![
            (0x1D6B, 0x0002),
            (0x046D, 0xC31C),
            (0x067B, 0x2303),
            (0x1D6B, 0x0002),
            (0x067B, 0x2303),
        ]
    );
}

#[test]
fn find_all_drivers_matches_every_adapter_in_the_tree() {
    let root = helpers::tree();
    let prober = Prober::new();

    let drivers = prober.find_all_drivers(&root);
    assert_eq!(drivers.len(), 2);
    for driver in &drivers {
        assert_eq!(driver.device().descriptor().vendor_id, 0x067B);
        assert_eq!(driver.ports().len(), 1);
    }
}

#[test]
fn unknown_devices_are_skipped_silently() {
    let root = helpers::keyboard();
    let prober = Prober::new();
    assert!(prober.probe_device(&root).is_none());
    assert!(prober.find_all_drivers(&root).is_empty());
}

#[test]
fn an_empty_table_matches_nothing() {
    let root = helpers::tree();
    let prober = Prober::with_table(ProbeTable::empty());
    assert!(prober.find_all_drivers(&root).is_empty());
}

#[test]
fn find_devices_filters_by_vid_and_pid() {
    let root = helpers::tree();
    let prober = Prober::new();

    assert_eq!(prober.find_devices(&root, 0x067B, 0x2303).len(), 2);
    assert_eq!(prober.find_devices(&root, 0x046D, 0xC31C).len(), 1);
    assert_eq!(prober.find_devices(&root, 0x067B, 0xFFFF).len(), 0);
}

#[test]
fn a_probed_driver_is_bound_to_its_own_device() {
    let adapter = helpers::pl2303();
    let prober = Prober::new();

    let driver = prober.probe_device(&adapter).unwrap();
    assert!(Arc::ptr_eq(driver.device(), &adapter));
}
