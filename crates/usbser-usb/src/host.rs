//! Traits supplied by the USB host stack
//!
//! Drivers in this workspace never talk to hardware directly; they go
//! through these traits. A production backend implements them on top of
//! a real host stack, and `usbser-sim` implements them in memory for
//! tests. All transfer submission is blocking with a caller-chosen
//! timeout; there is no other cancellation mechanism.

use std::sync::Arc;
use std::time::Duration;

use crate::descriptor::{DeviceDescriptor, SetupPacket};
use crate::error::UsbError;

/// One physical USB device, possibly a hub
pub trait UsbDevice: Send + Sync {
    /// The parsed device descriptor
    fn descriptor(&self) -> DeviceDescriptor;

    /// The raw 18-byte device descriptor
    ///
    /// Backends that can read the real bytes should override this; the
    /// default synthesizes them from [`descriptor`](Self::descriptor).
    fn raw_descriptor(&self) -> [u8; 18] {
        self.descriptor().raw_bytes()
    }

    /// Read the device serial number string descriptor
    ///
    /// Fails with [`UsbError::NoStringDescriptor`] when the device does
    /// not carry one. The absence of a serial number is an explicit
    /// outcome, never an empty string.
    fn serial_number(&self) -> Result<String, UsbError>;

    /// All interfaces across the device's configurations
    fn interfaces(&self) -> Vec<Arc<dyn UsbInterface>>;

    /// Find the interface with the given number in any configuration
    fn find_interface(&self, number: u8) -> Option<Arc<dyn UsbInterface>> {
        self.interfaces()
            .into_iter()
            .find(|interface| interface.number() == number)
    }

    /// Whether this device is a hub
    fn is_hub(&self) -> bool {
        false
    }

    /// Devices attached downstream of this device
    ///
    /// Empty unless [`is_hub`](Self::is_hub) returns true.
    fn children(&self) -> Vec<Arc<dyn UsbDevice>> {
        Vec::new()
    }

    /// Submit a control transfer on endpoint zero and block for the result
    ///
    /// The data phase direction follows the setup packet's request type.
    /// Returns the number of bytes actually moved, which may be shorter
    /// than `data`.
    fn submit_control(
        &self,
        setup: SetupPacket,
        data: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, UsbError>;
}

/// One interface of a USB device
pub trait UsbInterface: Send + Sync {
    /// The interface number (`bInterfaceNumber`)
    fn number(&self) -> u8;

    /// Claim exclusive access to this interface
    ///
    /// With `force` set, a competing claim (such as a kernel driver) is
    /// detached first.
    fn claim(&self, force: bool) -> Result<(), UsbError>;

    /// Release a previous claim
    fn release(&self) -> Result<(), UsbError>;

    /// The endpoints belonging to this interface
    fn endpoints(&self) -> Vec<Arc<dyn UsbEndpoint>>;
}

/// One endpoint of an interface
pub trait UsbEndpoint: Send + Sync {
    /// The endpoint address, direction bit included
    fn address(&self) -> u8;

    /// Open the host-side pipe for this endpoint
    fn open_pipe(&self) -> Result<Arc<dyn UsbPipe>, UsbError>;
}

/// An open host-side pipe
pub trait UsbPipe: Send + Sync {
    /// Submit a transfer and block for completion or timeout
    ///
    /// Direction follows the endpoint address. Returns the number of
    /// bytes actually moved.
    fn submit(&self, data: &mut [u8], timeout: Duration) -> Result<usize, UsbError>;

    /// Close the pipe
    fn close(&self) -> Result<(), UsbError>;
}
