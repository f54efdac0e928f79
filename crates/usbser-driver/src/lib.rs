//! USB serial port drivers
//!
//! This crate turns a claimed USB device into a classic serial port:
//! open and close, configure baud rate and framing, move bytes, and
//! read or drive the modem control lines. The [`SerialPort`] and
//! [`SerialDriver`] traits are the chip-independent contract; each chip
//! family supplies a protocol engine that implements them on top of the
//! `usbser-usb` transport adapter, hiding the vendor command sequences
//! that particular silicon requires.
//!
//! # Architecture
//!
//! A [`SerialDriver`] groups one bound device with the ports it exposes
//! (PL2303-class chips expose exactly one). A port is opened by handing
//! it an exclusive [`DeviceConnection`]; from then on every operation
//! goes through that connection, and `close` releases everything the
//! open claimed. Modem status lines (CD, DSR, RI, CTS) are kept fresh
//! by a background monitor thread that polls the chip's interrupt
//! endpoint; DTR and RTS are answered from a local cache that is
//! committed only after the corresponding control transfer succeeded.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use usbser_driver::{
//!     Parity, Pl2303Driver, SerialDriver, SerialError, SerialPort, StopBits,
//! };
//! use usbser_usb::{DeviceConnection, UsbDevice};
//!
//! fn echo(device: Arc<dyn UsbDevice>) -> Result<(), SerialError> {
//!     let driver = Pl2303Driver::new(device);
//!     let port = &driver.ports()[0];
//!     port.open(DeviceConnection::new(Arc::clone(driver.device())))?;
//!     port.set_parameters(115_200, 8, StopBits::One, Parity::None)?;
//!     port.write(b"hello", Duration::from_secs(5))?;
//!     let mut reply = [0u8; 64];
//!     let n = port.read(&mut reply, Duration::from_secs(1))?;
//!     println!("got {n} bytes");
//!     port.close()
//! }
//! ```

pub mod error;
pub mod line;
pub mod pl2303;
pub mod port;

pub use error::SerialError;
pub use line::{ControlLines, LineCoding, Parity, StopBits};
pub use pl2303::{DeviceType, Pl2303Driver, Pl2303Port};
pub use port::{SerialDriver, SerialPort, DEFAULT_READ_BUFFER_SIZE, DEFAULT_WRITE_BUFFER_SIZE};
