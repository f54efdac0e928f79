//! Prolific PL2303 protocol engine
//!
//! Turns the generic [`SerialPort`] operations into the control and
//! bulk transfer sequences a PL2303-class chip requires. The chip
//! speaks three fixed endpoints on interface 0 (bulk in 0x83, bulk out
//! 0x02, interrupt 0x81), a class request pair for line coding and
//! control lines, and a family of vendor requests for FIFO flushes and
//! the undocumented registers touched during bring-up.
//!
//! Modem status lines arrive as unsolicited 10-byte frames on the
//! interrupt endpoint; a background thread keeps the cached status byte
//! current while the port is open.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, warn};
use usbser_usb::{request_type, DeviceConnection, UsbDevice, UsbEndpoint, UsbInterface};

use crate::error::SerialError;
use crate::line::{ControlLines, LineCoding, Parity, StopBits};
use crate::port::{
    SerialDriver, SerialPort, DEFAULT_READ_BUFFER_SIZE, DEFAULT_WRITE_BUFFER_SIZE,
};

const READ_ENDPOINT: u8 = 0x83;
const WRITE_ENDPOINT: u8 = 0x02;
const INTERRUPT_ENDPOINT: u8 = 0x81;

const VENDOR_READ_REQUEST: u8 = 0x01;
const VENDOR_WRITE_REQUEST: u8 = 0x01;

const VENDOR_IN_REQTYPE: u8 = request_type::DIR_IN | request_type::TYPE_VENDOR;
const VENDOR_OUT_REQTYPE: u8 = request_type::DIR_OUT | request_type::TYPE_VENDOR;
const CTRL_OUT_REQTYPE: u8 =
    request_type::DIR_OUT | request_type::TYPE_CLASS | request_type::RECIPIENT_INTERFACE;

const SET_LINE_REQUEST: u8 = 0x20;
const SET_CONTROL_REQUEST: u8 = 0x22;

const FLUSH_RX_REQUEST: u16 = 0x08;
const FLUSH_TX_REQUEST: u16 = 0x09;

const STATUS_FRAME_LEN: usize = 10;
const STATUS_BYTE_INDEX: usize = 8;

const STATUS_FLAG_CD: u8 = 0x01;
const STATUS_FLAG_DSR: u8 = 0x02;
const STATUS_FLAG_RI: u8 = 0x08;
const STATUS_FLAG_CTS: u8 = 0x80;

const USB_READ_TIMEOUT: Duration = Duration::from_millis(1000);
const USB_WRITE_TIMEOUT: Duration = Duration::from_millis(5000);
const INITIAL_STATUS_TIMEOUT: Duration = Duration::from_millis(100);
const STATUS_POLL_TIMEOUT: Duration = Duration::from_millis(500);

/// PL2303 hardware revisions that need different bring-up values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceType {
    /// HX revision (the common modern part)
    Hx,
    /// Revision 0 (communications class devices)
    Type0,
    /// Revision 1
    Type1,
}

/// Driver for PL2303-class adapters; exposes exactly one port
pub struct Pl2303Driver {
    device: Arc<dyn UsbDevice>,
    ports: Vec<Arc<dyn SerialPort>>,
}

impl Pl2303Driver {
    /// Build a driver bound to `device`
    pub fn new(device: Arc<dyn UsbDevice>) -> Self {
        let port: Arc<dyn SerialPort> = Arc::new(Pl2303Port::new(Arc::clone(&device), 0));
        Self {
            device,
            ports: vec![port],
        }
    }
}

impl SerialDriver for Pl2303Driver {
    fn device(&self) -> &Arc<dyn UsbDevice> {
        &self.device
    }

    fn ports(&self) -> &[Arc<dyn SerialPort>] {
        &self.ports
    }
}

/// Everything that only exists while the port is open
struct PortState {
    connection: Arc<DeviceConnection>,
    read_endpoint: Arc<dyn UsbEndpoint>,
    write_endpoint: Arc<dyn UsbEndpoint>,
    interrupt_endpoint: Arc<dyn UsbEndpoint>,
    device_type: DeviceType,
    monitor: Arc<StatusMonitor>,
}

/// One PL2303 serial port
pub struct Pl2303Port {
    device: Arc<dyn UsbDevice>,
    port_number: usize,
    /// `Some` iff the port is open
    state: Mutex<Option<PortState>>,
    read_buffer: Mutex<Vec<u8>>,
    write_buffer: Mutex<Vec<u8>>,
    control_lines: Mutex<ControlLines>,
    line_coding: Mutex<Option<LineCoding>>,
}

impl Pl2303Port {
    fn new(device: Arc<dyn UsbDevice>, port_number: usize) -> Self {
        Self {
            device,
            port_number,
            state: Mutex::new(None),
            read_buffer: Mutex::new(vec![0; DEFAULT_READ_BUFFER_SIZE]),
            write_buffer: Mutex::new(vec![0; DEFAULT_WRITE_BUFFER_SIZE]),
            control_lines: Mutex::new(ControlLines::default()),
            line_coding: Mutex::new(None),
        }
    }

    /// Run `f` against the open state, or fail with `NotOpen`
    fn with_state<T>(&self, f: impl FnOnce(&PortState) -> T) -> Result<T, SerialError> {
        match self.state.lock().as_ref() {
            Some(state) => Ok(f(state)),
            None => Err(SerialError::NotOpen),
        }
    }

    fn connection(&self) -> Result<Arc<DeviceConnection>, SerialError> {
        self.with_state(|state| Arc::clone(&state.connection))
    }

    fn vendor_in(
        &self,
        connection: &DeviceConnection,
        value: u16,
        index: u16,
        length: usize,
    ) -> Result<Vec<u8>, SerialError> {
        let mut data = vec![0; length];
        let transferred = connection
            .control_transfer(
                VENDOR_IN_REQTYPE,
                VENDOR_READ_REQUEST,
                value,
                index,
                &mut data,
                USB_READ_TIMEOUT,
            )
            .map_err(|_| SerialError::ControlTransfer { value })?;
        if transferred != length {
            return Err(SerialError::ControlTransfer { value });
        }
        Ok(data)
    }

    fn vendor_out(
        &self,
        connection: &DeviceConnection,
        value: u16,
        index: u16,
        data: &[u8],
    ) -> Result<(), SerialError> {
        self.out_control_transfer(
            connection,
            VENDOR_OUT_REQTYPE,
            VENDOR_WRITE_REQUEST,
            value,
            index,
            data,
        )
    }

    fn ctrl_out(
        &self,
        connection: &DeviceConnection,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
    ) -> Result<(), SerialError> {
        self.out_control_transfer(connection, CTRL_OUT_REQTYPE, request, value, index, data)
    }

    fn out_control_transfer(
        &self,
        connection: &DeviceConnection,
        req_type: u8,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
    ) -> Result<(), SerialError> {
        let mut payload = data.to_vec();
        let transferred = connection
            .control_transfer(
                req_type,
                request,
                value,
                index,
                &mut payload,
                USB_WRITE_TIMEOUT,
            )
            .map_err(|_| SerialError::ControlTransfer { value })?;
        if transferred != data.len() {
            return Err(SerialError::ControlTransfer { value });
        }
        Ok(())
    }

    /// Detect which PL2303 revision is attached
    ///
    /// Communications-class devices are Type 0. Otherwise the raw
    /// device descriptor decides: a 64-byte endpoint zero means HX, a
    /// device class of 0x00 or 0xff means Type 1, and anything else
    /// falls back to HX. Detection is best effort and never fails the
    /// open.
    fn detect_device_type(&self) -> DeviceType {
        let descriptor = self.device.descriptor();
        if descriptor.class_code == 0x02 {
            return DeviceType::Type0;
        }
        let raw = self.device.raw_descriptor();
        if raw[7] == 64 {
            DeviceType::Hx
        } else if descriptor.class_code == 0x00 || descriptor.class_code == 0xff {
            DeviceType::Type1
        } else {
            warn!(
                class = descriptor.class_code,
                "could not detect PL2303 subtype, assuming HX"
            );
            DeviceType::Hx
        }
    }

    /// The fixed register sequence that brings the chip out of reset
    ///
    /// Reverse engineered; the order and values must not change. One
    /// write depends on the detected revision.
    fn startup_sequence(
        &self,
        connection: &DeviceConnection,
        device_type: DeviceType,
    ) -> Result<(), SerialError> {
        self.vendor_in(connection, 0x8484, 0, 1)?;
        self.vendor_out(connection, 0x0404, 0, &[])?;
        self.vendor_in(connection, 0x8484, 0, 1)?;
        self.vendor_in(connection, 0x8383, 0, 1)?;
        self.vendor_in(connection, 0x8484, 0, 1)?;
        self.vendor_out(connection, 0x0404, 1, &[])?;
        self.vendor_in(connection, 0x8484, 0, 1)?;
        self.vendor_in(connection, 0x8383, 0, 1)?;
        self.vendor_out(connection, 0, 1, &[])?;
        self.vendor_out(connection, 1, 0, &[])?;
        let register_two = if device_type == DeviceType::Hx {
            0x44
        } else {
            0x24
        };
        self.vendor_out(connection, 2, register_two, &[])
    }

    fn push_control_lines(
        &self,
        connection: &DeviceConnection,
        lines: ControlLines,
    ) -> Result<(), SerialError> {
        self.ctrl_out(
            connection,
            SET_CONTROL_REQUEST,
            u16::from(lines.bits()),
            0,
            &[],
        )
    }

    fn flush_fifos(
        &self,
        connection: &DeviceConnection,
        flush_read: bool,
        flush_write: bool,
    ) -> Result<bool, SerialError> {
        if flush_read {
            self.vendor_out(connection, FLUSH_RX_REQUEST, 0, &[])?;
        }
        if flush_write {
            self.vendor_out(connection, FLUSH_TX_REQUEST, 0, &[])?;
        }
        Ok(flush_read || flush_write)
    }

    fn reset_device(&self, connection: &DeviceConnection) -> Result<(), SerialError> {
        self.flush_fifos(connection, true, true).map(|_| ())
    }

    /// Endpoint discovery, subtype detection, and chip bring-up
    ///
    /// Runs after the interface claim; any error here makes `open`
    /// release the claim.
    fn bring_up(
        &self,
        connection: &Arc<DeviceConnection>,
        interface: &Arc<dyn UsbInterface>,
    ) -> Result<PortState, SerialError> {
        let mut read_endpoint = None;
        let mut write_endpoint = None;
        let mut interrupt_endpoint = None;
        for endpoint in interface.endpoints() {
            match endpoint.address() {
                READ_ENDPOINT => read_endpoint = Some(endpoint),
                WRITE_ENDPOINT => write_endpoint = Some(endpoint),
                INTERRUPT_ENDPOINT => interrupt_endpoint = Some(endpoint),
                _ => {}
            }
        }
        let read_endpoint = read_endpoint.ok_or(SerialError::EndpointNotFound(READ_ENDPOINT))?;
        let write_endpoint = write_endpoint.ok_or(SerialError::EndpointNotFound(WRITE_ENDPOINT))?;
        let interrupt_endpoint =
            interrupt_endpoint.ok_or(SerialError::EndpointNotFound(INTERRUPT_ENDPOINT))?;

        let device_type = self.detect_device_type();
        debug!(?device_type, "PL2303 subtype detected");

        self.push_control_lines(connection, *self.control_lines.lock())?;
        self.reset_device(connection)?;
        self.startup_sequence(connection, device_type)?;

        Ok(PortState {
            connection: Arc::clone(connection),
            read_endpoint,
            write_endpoint,
            interrupt_endpoint,
            device_type,
            monitor: StatusMonitor::new(),
        })
    }

    fn status_byte(&self) -> Result<u8, SerialError> {
        let (connection, endpoint, monitor) = self.with_state(|state| {
            (
                Arc::clone(&state.connection),
                Arc::clone(&state.interrupt_endpoint),
                Arc::clone(&state.monitor),
            )
        })?;
        monitor.ensure_started(&connection, &endpoint);
        if let Some(error) = monitor.take_error() {
            return Err(error);
        }
        Ok(monitor.status())
    }

    fn status_flag(&self, flag: u8) -> Result<bool, SerialError> {
        Ok(self.status_byte()? & flag == flag)
    }

    /// The revision detected at open time, while the port is open
    pub fn device_type(&self) -> Option<DeviceType> {
        self.state.lock().as_ref().map(|state| state.device_type)
    }
}

impl SerialPort for Pl2303Port {
    fn port_number(&self) -> usize {
        self.port_number
    }

    fn serial_number(&self) -> Result<String, SerialError> {
        self.device
            .serial_number()
            .map_err(SerialError::SerialNumberUnavailable)
    }

    fn open(&self, connection: DeviceConnection) -> Result<(), SerialError> {
        let mut state = self.state.lock();
        if state.is_some() {
            return Err(SerialError::AlreadyOpen);
        }

        let interface = self
            .device
            .find_interface(0)
            .ok_or(SerialError::InterfaceNotFound(0))?;
        if !connection.claim_interface(&interface, true) {
            return Err(SerialError::ClaimFailed(0));
        }

        let connection = Arc::new(connection);
        match self.bring_up(&connection, &interface) {
            Ok(opened) => {
                debug!(port = self.port_number, "port opened");
                *state = Some(opened);
                Ok(())
            }
            Err(error) => {
                connection.release_interface(&interface);
                Err(error)
            }
        }
    }

    fn close(&self) -> Result<(), SerialError> {
        let Some(state) = self.state.lock().take() else {
            return Err(SerialError::NotOpen);
        };

        state.monitor.stop_and_join();
        let shutdown = self.reset_device(&state.connection);
        // Resource release is unconditional, whatever shutdown said.
        state.connection.close();
        debug!(port = self.port_number, "port closed");
        shutdown
    }

    fn read(&self, dest: &mut [u8], timeout: Duration) -> Result<usize, SerialError> {
        let (connection, endpoint) = self.with_state(|state| {
            (
                Arc::clone(&state.connection),
                Arc::clone(&state.read_endpoint),
            )
        })?;
        let mut buffer = self.read_buffer.lock();
        let amount = dest.len().min(buffer.len());
        match connection.bulk_transfer(&endpoint, &mut buffer[..amount], timeout) {
            Ok(transferred) => {
                dest[..transferred].copy_from_slice(&buffer[..transferred]);
                Ok(transferred)
            }
            // A timed out or failed transfer reads as "nothing arrived".
            Err(_) => Ok(0),
        }
    }

    fn write(&self, src: &[u8], timeout: Duration) -> Result<usize, SerialError> {
        let (connection, endpoint) = self.with_state(|state| {
            (
                Arc::clone(&state.connection),
                Arc::clone(&state.write_endpoint),
            )
        })?;
        let mut written = 0;
        while written < src.len() {
            let progress = {
                let mut buffer = self.write_buffer.lock();
                let chunk = (src.len() - written).min(buffer.len());
                buffer[..chunk].copy_from_slice(&src[written..written + chunk]);
                connection.bulk_transfer(&endpoint, &mut buffer[..chunk], timeout)
            };
            match progress {
                Ok(transferred) if transferred > 0 => written += transferred,
                _ => {
                    return Err(SerialError::WriteStalled {
                        written,
                        total: src.len(),
                    })
                }
            }
        }
        Ok(written)
    }

    fn set_parameters(
        &self,
        baud_rate: u32,
        data_bits: u8,
        stop_bits: StopBits,
        parity: Parity,
    ) -> Result<(), SerialError> {
        let coding = LineCoding {
            baud_rate,
            data_bits,
            stop_bits,
            parity,
        };
        coding.validate()?;

        let connection = self.connection()?;
        let mut cached = self.line_coding.lock();
        if *cached == Some(coding) {
            return Ok(());
        }

        self.ctrl_out(&connection, SET_LINE_REQUEST, 0, 0, &coding.encode())?;
        self.reset_device(&connection)?;
        *cached = Some(coding);
        Ok(())
    }

    fn carrier_detect(&self) -> Result<bool, SerialError> {
        self.status_flag(STATUS_FLAG_CD)
    }

    fn clear_to_send(&self) -> Result<bool, SerialError> {
        self.status_flag(STATUS_FLAG_CTS)
    }

    fn data_set_ready(&self) -> Result<bool, SerialError> {
        self.status_flag(STATUS_FLAG_DSR)
    }

    fn ring_indicator(&self) -> Result<bool, SerialError> {
        self.status_flag(STATUS_FLAG_RI)
    }

    fn dtr(&self) -> bool {
        self.control_lines.lock().contains(ControlLines::DTR)
    }

    fn rts(&self) -> bool {
        self.control_lines.lock().contains(ControlLines::RTS)
    }

    fn set_dtr(&self, active: bool) -> Result<(), SerialError> {
        self.set_control_line(ControlLines::DTR, active)
    }

    fn set_rts(&self, active: bool) -> Result<(), SerialError> {
        self.set_control_line(ControlLines::RTS, active)
    }

    fn purge_buffers(&self, purge_read: bool, purge_write: bool) -> Result<bool, SerialError> {
        let connection = self.connection()?;
        self.flush_fifos(&connection, purge_read, purge_write)
    }

    fn set_read_buffer_size(&self, size: usize) {
        let mut buffer = self.read_buffer.lock();
        if buffer.len() == size {
            return;
        }
        *buffer = vec![0; size];
    }

    fn set_write_buffer_size(&self, size: usize) {
        let mut buffer = self.write_buffer.lock();
        if buffer.len() == size {
            return;
        }
        *buffer = vec![0; size];
    }
}

impl Pl2303Port {
    /// Recompute the control line mask and push the whole mask in one
    /// transfer; the cache commits only after the transfer succeeded
    fn set_control_line(&self, line: u8, active: bool) -> Result<(), SerialError> {
        let connection = self.connection()?;
        let mut lines = self.control_lines.lock();
        let next = lines.with(line, active);
        self.push_control_lines(&connection, next)?;
        *lines = next;
        Ok(())
    }
}

impl std::fmt::Debug for Pl2303Port {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pl2303Port")
            .field("port_number", &self.port_number)
            .field("open", &self.state.lock().is_some())
            .finish()
    }
}

/// Background status line monitor
///
/// Started lazily by the first status query: one short synchronous read
/// primes the cached status byte, then a polling thread takes over. The
/// thread is the only writer of the status byte. A truncated frame is a
/// protocol violation; it is parked in the sticky error slot, delivered
/// by the next status query, and cleared by that delivery.
struct StatusMonitor {
    status: AtomicU8,
    error: Mutex<Option<SerialError>>,
    stop: AtomicBool,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl StatusMonitor {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            status: AtomicU8::new(0),
            error: Mutex::new(None),
            stop: AtomicBool::new(false),
            thread: Mutex::new(None),
        })
    }

    /// Prime the status byte and start the polling thread, once
    ///
    /// Concurrent first queriers serialize on the thread slot lock; a
    /// monitor that already stopped on a sticky error is not restarted.
    fn ensure_started(
        self: &Arc<Self>,
        connection: &Arc<DeviceConnection>,
        endpoint: &Arc<dyn UsbEndpoint>,
    ) {
        let mut thread = self.thread.lock();
        if thread.is_some() || self.error.lock().is_some() {
            return;
        }

        let mut frame = [0u8; STATUS_FRAME_LEN];
        match connection.bulk_transfer(endpoint, &mut frame, INITIAL_STATUS_TIMEOUT) {
            Ok(n) if n == STATUS_FRAME_LEN => {
                self.status
                    .store(frame[STATUS_BYTE_INDEX], Ordering::Release);
            }
            _ => warn!("could not read initial CTS / DSR / CD / RI status"),
        }

        let monitor = Arc::clone(self);
        let connection = Arc::clone(connection);
        let endpoint = Arc::clone(endpoint);
        *thread = Some(thread::spawn(move || monitor.run(&connection, &endpoint)));
    }

    fn run(&self, connection: &DeviceConnection, endpoint: &Arc<dyn UsbEndpoint>) {
        let mut frame = [0u8; STATUS_FRAME_LEN];
        while !self.stop.load(Ordering::Acquire) {
            match connection.bulk_transfer(endpoint, &mut frame, STATUS_POLL_TIMEOUT) {
                Ok(n) if n == STATUS_FRAME_LEN => {
                    self.status
                        .store(frame[STATUS_BYTE_INDEX], Ordering::Release);
                }
                Ok(0) => {}
                Ok(n) => {
                    *self.error.lock() = Some(SerialError::ShortStatusFrame {
                        expected: STATUS_FRAME_LEN,
                        actual: n,
                    });
                    return;
                }
                // Poll timeouts and transient failures: keep polling.
                Err(_) => {}
            }
        }
    }

    fn stop_and_join(&self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.thread.lock().take() {
            if handle.join().is_err() {
                warn!("status monitor thread panicked");
            }
        }
    }

    fn status(&self) -> u8 {
        self.status.load(Ordering::Acquire)
    }

    fn take_error(&self) -> Option<SerialError> {
        self.error.lock().take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use usbser_sim::SimDevice;

    fn sim_port() -> (Arc<SimDevice>, Pl2303Port) {
        let device = SimDevice::builder(0x067b, 0x2303)
            .max_packet_size_0(64)
            .interface(0, &[INTERRUPT_ENDPOINT, WRITE_ENDPOINT, READ_ENDPOINT])
            .build();
        let port = Pl2303Port::new(Arc::clone(&device) as Arc<dyn UsbDevice>, 0);
        (device, port)
    }

    #[test]
    fn buffer_resize_to_same_size_is_a_no_op() {
        let (_device, port) = sim_port();
        let before = port.read_buffer.lock().as_ptr();
        port.set_read_buffer_size(DEFAULT_READ_BUFFER_SIZE);
        assert_eq!(port.read_buffer.lock().as_ptr(), before);

        port.set_read_buffer_size(64);
        assert_eq!(port.read_buffer.lock().len(), 64);
    }

    #[test]
    fn write_buffer_resize_changes_capacity_only_when_different() {
        let (_device, port) = sim_port();
        port.set_write_buffer_size(DEFAULT_WRITE_BUFFER_SIZE);
        assert_eq!(port.write_buffer.lock().len(), DEFAULT_WRITE_BUFFER_SIZE);
        port.set_write_buffer_size(32);
        assert_eq!(port.write_buffer.lock().len(), 32);
    }

    #[test]
    fn subtype_detection_prefers_class_code() {
        let device = SimDevice::builder(0x067b, 0x2303)
            .device_class(0x02)
            .interface(0, &[0x81, 0x02, 0x83])
            .build();
        let port = Pl2303Port::new(device as Arc<dyn UsbDevice>, 0);
        assert_eq!(port.detect_device_type(), DeviceType::Type0);
    }

    #[test]
    fn subtype_detection_reads_max_packet_size() {
        let device = SimDevice::builder(0x067b, 0x2303)
            .max_packet_size_0(64)
            .interface(0, &[0x81, 0x02, 0x83])
            .build();
        let port = Pl2303Port::new(device as Arc<dyn UsbDevice>, 0);
        assert_eq!(port.detect_device_type(), DeviceType::Hx);

        let device = SimDevice::builder(0x067b, 0x2303)
            .max_packet_size_0(8)
            .device_class(0xff)
            .interface(0, &[0x81, 0x02, 0x83])
            .build();
        let port = Pl2303Port::new(device as Arc<dyn UsbDevice>, 0);
        assert_eq!(port.detect_device_type(), DeviceType::Type1);
    }
}
