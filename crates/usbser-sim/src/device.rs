//! Simulated devices, interfaces, and hubs

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::trace;
use usbser_usb::{DeviceDescriptor, SetupPacket, UsbDevice, UsbEndpoint, UsbError, UsbInterface};

use crate::endpoint::SimEndpoint;

/// One recorded control transfer
///
/// For host-to-device requests `data` holds the payload that was sent;
/// for device-to-host requests it is empty and `length` holds the
/// requested read size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlRequest {
    pub request_type: u8,
    pub request: u8,
    pub value: u16,
    pub index: u16,
    pub data: Vec<u8>,
    pub length: usize,
}

/// A simulated interface with claim accounting
pub struct SimInterface {
    number: u8,
    endpoints: Vec<Arc<SimEndpoint>>,
    claimed: AtomicBool,
    /// Simulates a competing claim (e.g. a kernel driver): claiming
    /// without `force` fails until it is detached.
    competing_claim: AtomicBool,
    total_claims: AtomicUsize,
    total_releases: AtomicUsize,
}

impl SimInterface {
    fn new(number: u8, endpoint_addresses: &[u8]) -> Arc<Self> {
        Arc::new(Self {
            number,
            endpoints: endpoint_addresses
                .iter()
                .map(|&address| SimEndpoint::new(address))
                .collect(),
            claimed: AtomicBool::new(false),
            competing_claim: AtomicBool::new(false),
            total_claims: AtomicUsize::new(0),
            total_releases: AtomicUsize::new(0),
        })
    }

    /// Pretend another driver holds this interface
    pub fn set_competing_claim(&self, held: bool) {
        self.competing_claim.store(held, Ordering::Release);
    }

    /// Whether the interface is currently claimed
    pub fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::Acquire)
    }

    /// Total successful claims over the interface's lifetime
    pub fn claim_count(&self) -> usize {
        self.total_claims.load(Ordering::Acquire)
    }

    /// Total successful releases over the interface's lifetime
    pub fn release_count(&self) -> usize {
        self.total_releases.load(Ordering::Acquire)
    }

    /// The simulated endpoint with the given address, if any
    pub fn endpoint(&self, address: u8) -> Option<Arc<SimEndpoint>> {
        self.endpoints
            .iter()
            .find(|endpoint| UsbEndpoint::address(endpoint.as_ref()) == address)
            .cloned()
    }
}

impl UsbInterface for SimInterface {
    fn number(&self) -> u8 {
        self.number
    }

    fn claim(&self, force: bool) -> Result<(), UsbError> {
        if self.competing_claim.load(Ordering::Acquire) {
            if !force {
                return Err(UsbError::Busy);
            }
            self.competing_claim.store(false, Ordering::Release);
        }
        if self.claimed.swap(true, Ordering::AcqRel) {
            return Err(UsbError::Busy);
        }
        self.total_claims.fetch_add(1, Ordering::AcqRel);
        trace!(number = self.number, "interface claimed");
        Ok(())
    }

    fn release(&self) -> Result<(), UsbError> {
        if !self.claimed.swap(false, Ordering::AcqRel) {
            return Err(UsbError::Host("interface is not claimed".into()));
        }
        self.total_releases.fetch_add(1, Ordering::AcqRel);
        trace!(number = self.number, "interface released");
        Ok(())
    }

    fn endpoints(&self) -> Vec<Arc<dyn UsbEndpoint>> {
        self.endpoints
            .iter()
            .map(|endpoint| Arc::clone(endpoint) as Arc<dyn UsbEndpoint>)
            .collect()
    }
}

/// A scriptable simulated USB device
///
/// Built through [`SimDevice::builder`]. Every control transfer is
/// appended to a log that tests can assert against; device-to-host
/// requests answer with a canned reply when one was scripted for the
/// request's value field, and zero-filled payloads otherwise.
pub struct SimDevice {
    descriptor: DeviceDescriptor,
    serial_number: Option<String>,
    interfaces: Vec<Arc<SimInterface>>,
    children: Vec<Arc<dyn UsbDevice>>,
    control_log: Mutex<Vec<ControlRequest>>,
    control_replies: Mutex<HashMap<u16, Vec<u8>>>,
    fail_control_values: Mutex<Vec<u16>>,
    fail_all_control: AtomicBool,
}

impl SimDevice {
    /// Start building a device with the given vendor and product IDs
    pub fn builder(vendor_id: u16, product_id: u16) -> SimDeviceBuilder {
        SimDeviceBuilder {
            descriptor: DeviceDescriptor {
                vendor_id,
                product_id,
                class_code: 0x00,
                subclass_code: 0x00,
                protocol_code: 0x00,
                max_packet_size_0: 64,
            },
            serial_number: None,
            interfaces: Vec::new(),
            children: Vec::new(),
        }
    }

    /// The simulated interface with the given number, if any
    pub fn interface(&self, number: u8) -> Option<Arc<SimInterface>> {
        self.interfaces
            .iter()
            .find(|interface| UsbInterface::number(interface.as_ref()) == number)
            .cloned()
    }

    /// The simulated endpoint with the given address, searching every
    /// interface
    pub fn endpoint(&self, address: u8) -> Option<Arc<SimEndpoint>> {
        self.interfaces
            .iter()
            .find_map(|interface| interface.endpoint(address))
    }

    /// All control transfers seen so far, in submission order
    pub fn control_log(&self) -> Vec<ControlRequest> {
        self.control_log.lock().clone()
    }

    /// Forget the control transfers recorded so far
    pub fn clear_control_log(&self) {
        self.control_log.lock().clear();
    }

    /// Script the reply payload for IN requests with the given value
    pub fn set_control_reply(&self, value: u16, payload: &[u8]) {
        self.control_replies.lock().insert(value, payload.to_vec());
    }

    /// Fail every control transfer whose value field matches
    pub fn fail_control_value(&self, value: u16) {
        self.fail_control_values.lock().push(value);
    }

    /// Fail every control transfer
    pub fn set_fail_all_control(&self, fail: bool) {
        self.fail_all_control.store(fail, Ordering::Release);
    }
}

impl UsbDevice for SimDevice {
    fn descriptor(&self) -> DeviceDescriptor {
        self.descriptor
    }

    fn serial_number(&self) -> Result<String, UsbError> {
        self.serial_number
            .clone()
            .ok_or(UsbError::NoStringDescriptor)
    }

    fn interfaces(&self) -> Vec<Arc<dyn UsbInterface>> {
        self.interfaces
            .iter()
            .map(|interface| Arc::clone(interface) as Arc<dyn UsbInterface>)
            .collect()
    }

    fn is_hub(&self) -> bool {
        !self.children.is_empty()
    }

    fn children(&self) -> Vec<Arc<dyn UsbDevice>> {
        self.children.clone()
    }

    fn submit_control(
        &self,
        setup: SetupPacket,
        data: &mut [u8],
        _timeout: Duration,
    ) -> Result<usize, UsbError> {
        let input = setup.is_input();
        self.control_log.lock().push(ControlRequest {
            request_type: setup.request_type,
            request: setup.request,
            value: setup.value,
            index: setup.index,
            data: if input { Vec::new() } else { data.to_vec() },
            length: data.len(),
        });

        if self.fail_all_control.load(Ordering::Acquire)
            || self.fail_control_values.lock().contains(&setup.value)
        {
            return Err(UsbError::Host("forced control failure".into()));
        }

        if input {
            match self.control_replies.lock().get(&setup.value) {
                Some(reply) => {
                    let n = reply.len().min(data.len());
                    data[..n].copy_from_slice(&reply[..n]);
                    Ok(n)
                }
                None => {
                    data.fill(0);
                    Ok(data.len())
                }
            }
        } else {
            Ok(data.len())
        }
    }
}

/// Builder for [`SimDevice`]
pub struct SimDeviceBuilder {
    descriptor: DeviceDescriptor,
    serial_number: Option<String>,
    interfaces: Vec<Arc<SimInterface>>,
    children: Vec<Arc<dyn UsbDevice>>,
}

impl SimDeviceBuilder {
    /// Set the device class code
    pub fn device_class(mut self, class_code: u8) -> Self {
        self.descriptor.class_code = class_code;
        self
    }

    /// Set the maximum packet size for endpoint zero
    pub fn max_packet_size_0(mut self, size: u8) -> Self {
        self.descriptor.max_packet_size_0 = size;
        self
    }

    /// Give the device a serial number string descriptor
    pub fn serial_number(mut self, serial: impl Into<String>) -> Self {
        self.serial_number = Some(serial.into());
        self
    }

    /// Add an interface with endpoints at the given addresses
    pub fn interface(mut self, number: u8, endpoint_addresses: &[u8]) -> Self {
        self.interfaces
            .push(SimInterface::new(number, endpoint_addresses));
        self
    }

    /// Attach a downstream device, making this device a hub
    pub fn child(mut self, device: Arc<dyn UsbDevice>) -> Self {
        self.children.push(device);
        self
    }

    /// Build the device
    pub fn build(self) -> Arc<SimDevice> {
        Arc::new(SimDevice {
            descriptor: self.descriptor,
            serial_number: self.serial_number,
            interfaces: self.interfaces,
            children: self.children,
            control_log: Mutex::new(Vec::new()),
            control_replies: Mutex::new(HashMap::new()),
            fail_control_values: Mutex::new(Vec::new()),
            fail_all_control: AtomicBool::new(false),
        })
    }
}
