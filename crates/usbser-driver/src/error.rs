//! Error types for serial port operations

use thiserror::Error;
use usbser_usb::{TransferError, UsbError};

/// Errors reported by serial port operations
#[derive(Debug, Error)]
pub enum SerialError {
    /// `open` was called on a port that is already open
    #[error("port is already open")]
    AlreadyOpen,

    /// An operation that needs an open port was called on a closed one
    #[error("port is not open")]
    NotOpen,

    /// The device does not expose the interface the chip requires
    #[error("USB interface {0} not found")]
    InterfaceNotFound(u8),

    /// The interface could not be claimed
    #[error("failed to claim USB interface {0}")]
    ClaimFailed(u8),

    /// The interface is missing one of the chip's role endpoints
    #[error("endpoint {0:#04x} not found")]
    EndpointNotFound(u8),

    /// A required control transfer failed or moved too few bytes
    #[error("control transfer with value {value:#06x} failed")]
    ControlTransfer {
        /// The value field of the failed request
        value: u16,
    },

    /// A data transfer failed at the transport boundary
    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// A bulk write chunk made no progress; earlier chunks are not
    /// reported back
    #[error("write stalled after {written} of {total} bytes")]
    WriteStalled {
        /// Bytes written before the stalled chunk
        written: usize,
        /// Total length of the source
        total: usize,
    },

    /// The requested baud rate is not usable
    #[error("invalid baud rate: {0}")]
    InvalidBaudRate(u32),

    /// The requested data bits are outside the chip's 5..=8 range
    #[error("invalid data bits: {0}")]
    InvalidDataBits(u8),

    /// The status endpoint delivered a truncated frame
    ///
    /// Recorded by the status monitor and surfaced exactly once by the
    /// next status query after it occurred.
    #[error("short status frame: expected {expected} bytes, got {actual}")]
    ShortStatusFrame {
        /// The chip's fixed status frame length
        expected: usize,
        /// Bytes actually delivered
        actual: usize,
    },

    /// The device has no readable serial number
    #[error("serial number unavailable")]
    SerialNumberUnavailable(#[source] UsbError),
}
