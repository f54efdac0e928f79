//! USB host stack boundary for USB serial drivers
//!
//! This crate defines the interface between serial adapter drivers and
//! whatever USB host stack the application runs on. It has two halves:
//!
//! - The host stack traits ([`UsbDevice`], [`UsbInterface`],
//!   [`UsbEndpoint`], [`UsbPipe`]): the primitives a host stack must
//!   supply: descriptor access, interface claiming, pipe lifecycle, and
//!   blocking transfer submission with a timeout. Drivers consume these;
//!   they never implement them.
//! - The transport adapter ([`DeviceConnection`]): wraps one bound device
//!   and turns the heterogeneous host stack failure modes into a single
//!   result convention. Every control or bulk transfer either reports the
//!   number of bytes moved or fails with the opaque [`TransferError`]
//!   sentinel. It also owns the set of opened pipes and the interfaces
//!   claimed through it, and releases both (best effort) on close.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use usbser_usb::{request_type, DeviceConnection, UsbDevice};
//!
//! fn read_register(device: Arc<dyn UsbDevice>) {
//!     let connection = DeviceConnection::new(device);
//!     let mut data = [0u8; 1];
//!     let request_type = request_type::DIR_IN | request_type::TYPE_VENDOR;
//!     match connection.control_transfer(
//!         request_type,
//!         0x01,
//!         0x8484,
//!         0,
//!         &mut data,
//!         Duration::from_secs(1),
//!     ) {
//!         Ok(n) => println!("read {n} bytes: {data:02x?}"),
//!         Err(_) => println!("transfer failed"),
//!     }
//!     connection.close();
//! }
//! ```

pub mod connection;
pub mod descriptor;
pub mod error;
pub mod host;

pub use connection::DeviceConnection;
pub use descriptor::{request_type, DeviceDescriptor, SetupPacket};
pub use error::{TransferError, UsbError};
pub use host::{UsbDevice, UsbEndpoint, UsbInterface, UsbPipe};
