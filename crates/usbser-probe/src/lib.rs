//! Detection of supported USB serial adapters
//!
//! Walks a USB device tree, matches each device's vendor and product
//! IDs against a [`ProbeTable`], and hands back a ready-to-use
//! `SerialDriver` for every match. Matching is purely descriptor based:
//! nothing is claimed or transferred until a port is opened, so probing
//! is safe to run against a bus other software is using.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use usbser_driver::SerialDriver;
//! use usbser_probe::Prober;
//! use usbser_usb::UsbDevice;
//!
//! fn list_adapters(root_hub: Arc<dyn UsbDevice>) {
//!     let prober = Prober::new();
//!     for driver in prober.find_all_drivers(&root_hub) {
//!         let descriptor = driver.device().descriptor();
//!         println!(
//!             "{:#06x}:{:#06x} with {} port(s)",
//!             descriptor.vendor_id,
//!             descriptor.product_id,
//!             driver.ports().len()
//!         );
//!     }
//! }
//! ```

pub mod prober;
pub mod table;
pub mod usb_ids;

pub use prober::Prober;
pub use table::{DriverFactory, ProbeTable};
pub use usb_ids::UsbId;
