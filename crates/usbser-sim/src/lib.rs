//! Simulated USB host stack
//!
//! This crate implements the `usbser-usb` host traits entirely in
//! memory, so driver and prober behavior can be tested without physical
//! hardware. It provides:
//!
//! - **SimDevice**: a scriptable device; descriptor fields, serial
//!   number, interfaces, and hub children are set through a builder;
//!   every control transfer is recorded for order assertions, and IN
//!   requests can be given canned replies or forced to fail.
//! - **SimEndpoint / SimPipe**: IN endpoints serve queued frames and
//!   time out when the queue is empty; OUT endpoints capture every
//!   chunk written through them. Pipe opens and closes are counted.
//!
//! # Example
//!
//! ```rust
//! use usbser_sim::SimDevice;
//!
//! let device = SimDevice::builder(0x067b, 0x2303)
//!     .max_packet_size_0(64)
//!     .serial_number("SIM0001")
//!     .interface(0, &[0x81, 0x02, 0x83])
//!     .build();
//!
//! let endpoint = device.endpoint(0x83).unwrap();
//! endpoint.queue_frame(b"hello");
//! ```

pub mod device;
pub mod endpoint;

pub use device::{ControlRequest, SimDevice, SimDeviceBuilder, SimInterface};
pub use endpoint::{SimEndpoint, SimPipe};
