//! USB descriptor and setup packet types

/// Request type bits for control transfer setup packets
pub mod request_type {
    /// Host-to-device data phase
    pub const DIR_OUT: u8 = 0x00;
    /// Device-to-host data phase
    pub const DIR_IN: u8 = 0x80;

    /// Standard request
    pub const TYPE_STANDARD: u8 = 0x00;
    /// Class-defined request
    pub const TYPE_CLASS: u8 = 0x20;
    /// Vendor-defined request
    pub const TYPE_VENDOR: u8 = 0x40;

    /// Request addressed to the device
    pub const RECIPIENT_DEVICE: u8 = 0x00;
    /// Request addressed to an interface
    pub const RECIPIENT_INTERFACE: u8 = 0x01;
}

/// Mask selecting the direction bit of an endpoint address
pub const ENDPOINT_DIR_MASK: u8 = 0x80;

/// Returns true if the endpoint address describes a device-to-host endpoint
pub fn endpoint_is_input(address: u8) -> bool {
    address & ENDPOINT_DIR_MASK != 0
}

/// The fields of a USB device descriptor that drivers inspect
///
/// Vendor and product identity drive probe matching; the class code and
/// `max_packet_size_0` drive chip subtype detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceDescriptor {
    /// USB vendor ID
    pub vendor_id: u16,
    /// USB product ID
    pub product_id: u16,
    /// Device class code (`bDeviceClass`)
    pub class_code: u8,
    /// Device subclass code (`bDeviceSubClass`)
    pub subclass_code: u8,
    /// Device protocol code (`bDeviceProtocol`)
    pub protocol_code: u8,
    /// Maximum packet size for endpoint zero (`bMaxPacketSize0`)
    pub max_packet_size_0: u8,
}

impl DeviceDescriptor {
    /// Synthesize the 18-byte wire form of this descriptor
    ///
    /// Only the fields this crate models are populated; the BCD version
    /// fields and string indices are left zero. Drivers that inspect raw
    /// descriptor bytes (PL2303 subtype detection reads offset 7) get
    /// the standard layout.
    pub fn raw_bytes(&self) -> [u8; 18] {
        let mut raw = [0u8; 18];
        raw[0] = 18; // bLength
        raw[1] = 0x01; // bDescriptorType: device
        raw[4] = self.class_code;
        raw[5] = self.subclass_code;
        raw[6] = self.protocol_code;
        raw[7] = self.max_packet_size_0;
        raw[8..10].copy_from_slice(&self.vendor_id.to_le_bytes());
        raw[10..12].copy_from_slice(&self.product_id.to_le_bytes());
        raw[17] = 1; // bNumConfigurations
        raw
    }
}

/// The setup phase of a control transfer
///
/// Carried verbatim to the device; the payload travels separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetupPacket {
    /// Request type bits (direction, type, recipient)
    pub request_type: u8,
    /// Request code
    pub request: u8,
    /// Value field
    pub value: u16,
    /// Index field
    pub index: u16,
}

impl SetupPacket {
    /// Returns true if the data phase moves device-to-host
    pub fn is_input(&self) -> bool {
        self.request_type & ENDPOINT_DIR_MASK != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_bytes_layout() {
        let descriptor = DeviceDescriptor {
            vendor_id: 0x067b,
            product_id: 0x2303,
            class_code: 0x00,
            subclass_code: 0x00,
            protocol_code: 0x00,
            max_packet_size_0: 64,
        };
        let raw = descriptor.raw_bytes();
        assert_eq!(raw[0], 18);
        assert_eq!(raw[1], 0x01);
        assert_eq!(raw[7], 64);
        assert_eq!(&raw[8..10], &[0x7b, 0x06]);
        assert_eq!(&raw[10..12], &[0x03, 0x23]);
    }

    #[test]
    fn setup_packet_direction() {
        let setup = SetupPacket {
            request_type: request_type::DIR_IN | request_type::TYPE_VENDOR,
            request: 0x01,
            value: 0,
            index: 0,
        };
        assert!(setup.is_input());
        assert!(endpoint_is_input(0x83));
        assert!(!endpoint_is_input(0x02));
    }
}
