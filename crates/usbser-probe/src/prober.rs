//! Walking the device tree and matching devices against the probe table

use std::sync::Arc;

use tracing::{debug, trace};
use usbser_driver::SerialDriver;
use usbser_usb::UsbDevice;

use crate::table::ProbeTable;

/// Finds supported serial adapters in a USB device tree
///
/// Probing is matching only: no transfer is issued and no interface is
/// claimed, so a probe never disturbs a device another program is
/// using. Devices without a table entry are skipped silently.
#[derive(Debug, Clone)]
pub struct Prober {
    table: ProbeTable,
}

impl Prober {
    /// A prober over the default probe table
    pub fn new() -> Self {
        Self::with_table(ProbeTable::with_default_drivers())
    }

    /// A prober over a caller-supplied table
    pub fn with_table(table: ProbeTable) -> Self {
        Self { table }
    }

    /// The table this prober matches against
    pub fn table(&self) -> &ProbeTable {
        &self.table
    }

    /// Every device reachable from `root`, parents before children
    ///
    /// Hubs are descended into and included in the result themselves.
    pub fn devices(&self, root: &Arc<dyn UsbDevice>) -> Vec<Arc<dyn UsbDevice>> {
        let mut found = Vec::new();
        collect(root, &mut found);
        found
    }

    /// Construct a driver for a single device, if the table knows it
    pub fn probe_device(&self, device: &Arc<dyn UsbDevice>) -> Option<Arc<dyn SerialDriver>> {
        self.table.find_driver(device)
    }

    /// Probe every device under `root` and return a driver per match
    ///
    /// Matches are returned in tree order. A hub that happens to carry
    /// adapter IDs is probed like any other device.
    pub fn find_all_drivers(&self, root: &Arc<dyn UsbDevice>) -> Vec<Arc<dyn SerialDriver>> {
        let mut drivers = Vec::new();
        for device in self.devices(root) {
            let descriptor = device.descriptor();
            trace!(
                vid = format_args!("{:#06x}", descriptor.vendor_id),
                pid = format_args!("{:#06x}", descriptor.product_id),
                "probing device"
            );
            if let Some(driver) = self.probe_device(&device) {
                drivers.push(driver);
            }
        }
        debug!(matches = drivers.len(), "device tree probed");
        drivers
    }

    /// Every device under `root` with the given VID/PID, in tree order
    pub fn find_devices(
        &self,
        root: &Arc<dyn UsbDevice>,
        vendor_id: u16,
        product_id: u16,
    ) -> Vec<Arc<dyn UsbDevice>> {
        self.devices(root)
            .into_iter()
            .filter(|device| {
                let descriptor = device.descriptor();
                descriptor.vendor_id == vendor_id && descriptor.product_id == product_id
            })
            .collect()
    }
}

impl Default for Prober {
    fn default() -> Self {
        Self::new()
    }
}

fn collect(device: &Arc<dyn UsbDevice>, found: &mut Vec<Arc<dyn UsbDevice>>) {
    found.push(Arc::clone(device));
    if device.is_hub() {
        for child in device.children() {
            collect(&child, found);
        }
    }
}
