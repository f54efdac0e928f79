//! Error types for the USB host stack boundary

use thiserror::Error;

/// Errors reported by the underlying USB host stack
///
/// These are the raw failure modes a host stack can produce. The
/// [`DeviceConnection`](crate::DeviceConnection) transport adapter
/// collapses all of them into [`TransferError`] at the transfer
/// boundary; they stay visible for non-transfer operations such as
/// claiming interfaces or reading string descriptors.
#[derive(Debug, Error)]
pub enum UsbError {
    /// The transfer did not complete within the requested bound
    #[error("transfer timed out")]
    Timeout,

    /// The endpoint returned a STALL handshake
    #[error("endpoint stalled")]
    Stall,

    /// The device is no longer attached
    #[error("device disconnected")]
    Disconnected,

    /// The interface is claimed by another client
    #[error("interface is already claimed")]
    Busy,

    /// The pipe was used before being opened, or after being closed
    #[error("pipe is not open")]
    PipeNotOpen,

    /// The device has no such string descriptor, or it could not be read
    #[error("string descriptor unavailable")]
    NoStringDescriptor,

    /// Any other host stack failure
    #[error("host stack error: {0}")]
    Host(String),
}

/// Opaque transfer failure sentinel
///
/// A control or bulk transfer through a
/// [`DeviceConnection`](crate::DeviceConnection) either succeeds with a
/// byte count or fails with this value. Submission errors, host stack
/// exceptions, and incomplete transfers are indistinguishable by design;
/// the protocol engine decides per operation whether a failure is fatal
/// or absorbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("USB transfer failed")]
pub struct TransferError;
