//! The chip-independent serial port and driver contracts

use std::sync::Arc;
use std::time::Duration;

use usbser_usb::{DeviceConnection, UsbDevice};

use crate::error::SerialError;
use crate::line::{Parity, StopBits};

/// Default size of the internal read staging buffer
pub const DEFAULT_READ_BUFFER_SIZE: usize = 16 * 1024;
/// Default size of the internal write staging buffer
pub const DEFAULT_WRITE_BUFFER_SIZE: usize = 16 * 1024;

/// One serial port of a USB serial adapter
///
/// Implemented per chip family. A port is `Closed` until [`open`]
/// succeeds and `Closed` again after [`close`]; reopening rebuilds the
/// endpoint bindings from scratch. Every operation that touches the
/// device fails with [`SerialError::NotOpen`] while closed.
///
/// [`open`]: Self::open
/// [`close`]: Self::close
pub trait SerialPort: Send + Sync {
    /// Index of this port within its driver
    fn port_number(&self) -> usize;

    /// The device serial number, as an explicit outcome
    fn serial_number(&self) -> Result<String, SerialError>;

    /// Open the port over an exclusive connection to its device
    ///
    /// Claims the chip's interface (detaching a competing claim),
    /// resolves the role endpoints, and runs the chip's bring-up
    /// sequence. If anything fails after the claim, the claim is
    /// released and the port stays closed; no partially open state is
    /// observable.
    fn open(&self, connection: DeviceConnection) -> Result<(), SerialError>;

    /// Close the port
    ///
    /// Stops the status monitor, runs the chip's shutdown, and releases
    /// every claimed resource. Resource release happens even when the
    /// shutdown itself fails.
    fn close(&self) -> Result<(), SerialError>;

    /// Read up to `dest.len()` bytes, blocking at most `timeout`
    ///
    /// A transport failure or timeout reads as zero bytes, never as an
    /// error.
    fn read(&self, dest: &mut [u8], timeout: Duration) -> Result<usize, SerialError>;

    /// Write all of `src`, chunked to the write buffer size
    ///
    /// Each chunk blocks at most `timeout`. A chunk that makes no
    /// progress fails the whole call; bytes already written are not
    /// reported back.
    fn write(&self, src: &[u8], timeout: Duration) -> Result<usize, SerialError>;

    /// Configure baud rate, data bits, stop bits, and parity
    ///
    /// A no-op when identical to the current configuration. Invalid
    /// values are rejected before any transfer is attempted.
    fn set_parameters(
        &self,
        baud_rate: u32,
        data_bits: u8,
        stop_bits: StopBits,
        parity: Parity,
    ) -> Result<(), SerialError>;

    /// Carrier Detect, from the monitored status byte
    fn carrier_detect(&self) -> Result<bool, SerialError>;

    /// Clear To Send, from the monitored status byte
    fn clear_to_send(&self) -> Result<bool, SerialError>;

    /// Data Set Ready, from the monitored status byte
    fn data_set_ready(&self) -> Result<bool, SerialError>;

    /// Ring Indicator, from the monitored status byte
    fn ring_indicator(&self) -> Result<bool, SerialError>;

    /// Data Terminal Ready, from the local control line cache
    fn dtr(&self) -> bool;

    /// Request To Send, from the local control line cache
    fn rts(&self) -> bool;

    /// Drive Data Terminal Ready
    fn set_dtr(&self, active: bool) -> Result<(), SerialError>;

    /// Drive Request To Send
    fn set_rts(&self, active: bool) -> Result<(), SerialError>;

    /// Flush the chip's receive and/or transmit FIFOs
    ///
    /// The flush commands are fire and forget; the return value reports
    /// whether any flush was requested.
    fn purge_buffers(&self, purge_read: bool, purge_write: bool) -> Result<bool, SerialError>;

    /// Resize the internal read staging buffer
    ///
    /// Resizing to the current size is a no-op. Most callers never need
    /// this.
    fn set_read_buffer_size(&self, size: usize);

    /// Resize the internal write staging buffer
    ///
    /// Resizing to the current size is a no-op. Most callers never need
    /// this.
    fn set_write_buffer_size(&self, size: usize);
}

/// One matched device together with the serial ports it exposes
///
/// Produced by the prober; most adapter chips expose exactly one port.
pub trait SerialDriver: Send + Sync {
    /// The device this driver is bound to
    fn device(&self) -> &Arc<dyn UsbDevice>;

    /// The ports this device exposes; never empty
    fn ports(&self) -> &[Arc<dyn SerialPort>];
}
