//! Transport adapter over one bound USB device
//!
//! [`DeviceConnection`] is the only path drivers use to move bytes. It
//! normalizes every host stack failure into the opaque
//! [`TransferError`] sentinel, opens bulk pipes lazily and caches them
//! by endpoint address, and remembers which interfaces were claimed
//! through it so that [`close`](DeviceConnection::close) can release
//! everything in one best-effort sweep.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::descriptor::SetupPacket;
use crate::error::{TransferError, UsbError};
use crate::host::{UsbDevice, UsbEndpoint, UsbInterface, UsbPipe};

/// A claimed, transfer-ready handle to one USB device
///
/// Owned exclusively by an open serial port. Dropping the connection
/// without calling [`close`](Self::close) leaks claims on stacks that
/// do not clean up on handle death, so ports always close their
/// connection on every exit path.
pub struct DeviceConnection {
    device: Arc<dyn UsbDevice>,
    /// Opened pipes, keyed by endpoint address. Guarded so concurrent
    /// first uses of one endpoint cannot double-open its pipe.
    pipes: Mutex<HashMap<u8, Arc<dyn UsbPipe>>>,
    claimed: Mutex<Vec<Arc<dyn UsbInterface>>>,
}

impl DeviceConnection {
    /// Create a connection bound to `device`
    pub fn new(device: Arc<dyn UsbDevice>) -> Self {
        Self {
            device,
            pipes: Mutex::new(HashMap::new()),
            claimed: Mutex::new(Vec::new()),
        }
    }

    /// The device this connection is bound to
    pub fn device(&self) -> &Arc<dyn UsbDevice> {
        &self.device
    }

    /// Claim exclusive access to an interface
    ///
    /// With `force` set, a competing claim is detached first. Returns
    /// whether the claim succeeded; a successful claim is released
    /// again by [`release_interface`](Self::release_interface) or
    /// [`close`](Self::close).
    pub fn claim_interface(&self, interface: &Arc<dyn UsbInterface>, force: bool) -> bool {
        match interface.claim(force) {
            Ok(()) => {
                self.claimed.lock().push(Arc::clone(interface));
                true
            }
            Err(err) => {
                debug!(number = interface.number(), %err, "failed to claim interface");
                false
            }
        }
    }

    /// Release a previously claimed interface
    pub fn release_interface(&self, interface: &Arc<dyn UsbInterface>) -> bool {
        self.claimed
            .lock()
            .retain(|claimed| !Arc::ptr_eq(claimed, interface));
        match interface.release() {
            Ok(()) => true,
            Err(err) => {
                debug!(number = interface.number(), %err, "failed to release interface");
                false
            }
        }
    }

    /// Perform a control transfer on endpoint zero
    ///
    /// Direction follows `request_type`. Returns the number of bytes
    /// actually moved; every failure mode collapses to
    /// [`TransferError`].
    #[allow(clippy::too_many_arguments)]
    pub fn control_transfer(
        &self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        data: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, TransferError> {
        let setup = SetupPacket {
            request_type,
            request,
            value,
            index,
        };
        match self.device.submit_control(setup, data, timeout) {
            Ok(transferred) => Ok(transferred),
            Err(err) => {
                trace!(request, value, %err, "control transfer failed");
                Err(TransferError)
            }
        }
    }

    /// Perform a bulk or interrupt transfer on a data endpoint
    ///
    /// The endpoint's pipe is opened on first use and cached; a pipe
    /// that cannot be opened fails the transfer with the same sentinel
    /// as a failed submission.
    pub fn bulk_transfer(
        &self,
        endpoint: &Arc<dyn UsbEndpoint>,
        data: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, TransferError> {
        let pipe = match self.pipe_for(endpoint) {
            Ok(pipe) => pipe,
            Err(err) => {
                trace!(address = endpoint.address(), %err, "failed to open pipe");
                return Err(TransferError);
            }
        };
        match pipe.submit(data, timeout) {
            Ok(transferred) => Ok(transferred),
            Err(err) => {
                trace!(address = endpoint.address(), %err, "bulk transfer failed");
                Err(TransferError)
            }
        }
    }

    /// Close every pipe opened through this connection and release
    /// every interface claimed through it
    ///
    /// Cleanup is best effort: individual failures are logged and
    /// swallowed, and calling `close` again is a no-op.
    pub fn close(&self) {
        let pipes: Vec<_> = self.pipes.lock().drain().collect();
        for (address, pipe) in pipes {
            if let Err(err) = pipe.close() {
                debug!(address, %err, "failed to close pipe");
            }
        }
        let claimed: Vec<_> = std::mem::take(&mut *self.claimed.lock());
        for interface in claimed {
            if let Err(err) = interface.release() {
                warn!(number = interface.number(), %err, "failed to release interface");
            }
        }
    }

    fn pipe_for(&self, endpoint: &Arc<dyn UsbEndpoint>) -> Result<Arc<dyn UsbPipe>, UsbError> {
        let mut pipes = self.pipes.lock();
        if let Some(pipe) = pipes.get(&endpoint.address()) {
            return Ok(Arc::clone(pipe));
        }
        let pipe = endpoint.open_pipe()?;
        pipes.insert(endpoint.address(), Arc::clone(&pipe));
        Ok(pipe)
    }
}

impl std::fmt::Debug for DeviceConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let descriptor = self.device.descriptor();
        f.debug_struct("DeviceConnection")
            .field("vendor_id", &format_args!("{:#06x}", descriptor.vendor_id))
            .field("product_id", &format_args!("{:#06x}", descriptor.product_id))
            .field("open_pipes", &self.pipes.lock().len())
            .field("claimed_interfaces", &self.claimed.lock().len())
            .finish()
    }
}
