//! The probe table: VID/PID pairs mapped to driver constructors

use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;
use usbser_driver::{Pl2303Driver, SerialDriver};
use usbser_usb::UsbDevice;

use crate::usb_ids::{self, UsbId};

/// Constructs a driver for a device that matched its table entry
///
/// Construction is infallible; whether the device actually behaves like
/// the chip only becomes known when a port is opened.
pub type DriverFactory = fn(Arc<dyn UsbDevice>) -> Arc<dyn SerialDriver>;

/// Maps known VID/PID pairs to driver factories
///
/// [`ProbeTable::default`] carries every chip this crate has a protocol
/// engine for; callers with custom hardware can start from an empty
/// table and register their own entries.
#[derive(Clone, Default)]
pub struct ProbeTable {
    entries: HashMap<UsbId, DriverFactory>,
}

impl ProbeTable {
    /// An empty table with no registered chips
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Register one VID/PID pair
    ///
    /// A later registration for the same pair replaces the earlier one.
    pub fn register(&mut self, id: UsbId, factory: DriverFactory) -> &mut Self {
        self.entries.insert(id, factory);
        self
    }

    /// Register every product ID of one vendor for the same factory
    pub fn register_vendor(
        &mut self,
        vid: u16,
        pids: &[u16],
        factory: DriverFactory,
    ) -> &mut Self {
        for &pid in pids {
            self.register(UsbId::new(vid, pid), factory);
        }
        self
    }

    /// Look up the factory for a VID/PID pair
    pub fn find_factory(&self, vid: u16, pid: u16) -> Option<DriverFactory> {
        self.entries.get(&UsbId::new(vid, pid)).copied()
    }

    /// Construct a driver for `device` if its IDs are in the table
    pub fn find_driver(&self, device: &Arc<dyn UsbDevice>) -> Option<Arc<dyn SerialDriver>> {
        let descriptor = device.descriptor();
        let factory = self.find_factory(descriptor.vendor_id, descriptor.product_id)?;
        trace!(
            vid = format_args!("{:#06x}", descriptor.vendor_id),
            pid = format_args!("{:#06x}", descriptor.product_id),
            "probe table match"
        );
        Some(factory(Arc::clone(device)))
    }

    /// Number of registered VID/PID pairs
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The table of every chip supported out of the box
    pub fn with_default_drivers() -> Self {
        let mut table = Self::empty();
        table.register_vendor(usb_ids::prolific::VID, usb_ids::prolific::ALL_PIDS, |device| {
            Arc::new(Pl2303Driver::new(device))
        });
        table
    }
}

impl std::fmt::Debug for ProbeTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeTable")
            .field("entries", &self.entries.keys())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_knows_prolific() {
        let table = ProbeTable::with_default_drivers();
        assert!(table
            .find_factory(usb_ids::prolific::VID, 0x2303)
            .is_some());
        assert!(table.find_factory(0x1234, 0x5678).is_none());
    }

    #[test]
    fn later_registration_replaces_earlier() {
        let mut table = ProbeTable::empty();
        table.register(UsbId::new(1, 2), |device| Arc::new(Pl2303Driver::new(device)));
        table.register(UsbId::new(1, 2), |device| Arc::new(Pl2303Driver::new(device)));
        assert_eq!(table.len(), 1);
    }
}
