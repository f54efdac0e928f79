//! Simulated endpoints and pipes

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::trace;
use usbser_usb::descriptor::endpoint_is_input;
use usbser_usb::{UsbEndpoint, UsbError, UsbPipe};

/// A simulated endpoint
///
/// IN endpoints (address bit 0x80 set) serve frames queued with
/// [`queue_frame`](Self::queue_frame); an empty queue makes the transfer
/// sleep out its timeout and fail with [`UsbError::Timeout`], matching a
/// quiet hardware endpoint. OUT endpoints capture every chunk written
/// through them for later inspection.
pub struct SimEndpoint {
    address: u8,
    /// Self-reference so `open_pipe` can hand the pipe a shared handle
    this: Weak<SimEndpoint>,
    in_frames: Mutex<VecDeque<Vec<u8>>>,
    written: Mutex<Vec<Vec<u8>>>,
    /// Cap on bytes accepted per OUT transfer, for exercising partial
    /// progress. `None` means full progress.
    write_limit: Mutex<Option<usize>>,
    refuse_open: AtomicBool,
    fail_transfers: AtomicBool,
    opens: AtomicUsize,
    closes: AtomicUsize,
}

impl SimEndpoint {
    pub(crate) fn new(address: u8) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            address,
            this: this.clone(),
            in_frames: Mutex::new(VecDeque::new()),
            written: Mutex::new(Vec::new()),
            write_limit: Mutex::new(None),
            refuse_open: AtomicBool::new(false),
            fail_transfers: AtomicBool::new(false),
            opens: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
        })
    }

    /// Queue a frame to be served by the next IN transfer
    pub fn queue_frame(&self, frame: &[u8]) {
        self.in_frames.lock().push_back(frame.to_vec());
    }

    /// All chunks written through this endpoint, in order
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.written.lock().clone()
    }

    /// All written chunks flattened into one byte stream
    pub fn written_bytes(&self) -> Vec<u8> {
        self.written.lock().concat()
    }

    /// Cap the number of bytes accepted per OUT transfer
    pub fn set_write_limit(&self, limit: Option<usize>) {
        *self.write_limit.lock() = limit;
    }

    /// Make [`open_pipe`](UsbEndpoint::open_pipe) fail
    pub fn set_refuse_open(&self, refuse: bool) {
        self.refuse_open.store(refuse, Ordering::Release);
    }

    /// Make every transfer on this endpoint fail
    pub fn set_fail_transfers(&self, fail: bool) {
        self.fail_transfers.store(fail, Ordering::Release);
    }

    /// Number of times a pipe was opened on this endpoint
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::Acquire)
    }

    /// Number of times a pipe on this endpoint was closed
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::Acquire)
    }

    /// Number of frames still queued for IN transfers
    pub fn queued_frames(&self) -> usize {
        self.in_frames.lock().len()
    }
}

impl UsbEndpoint for SimEndpoint {
    fn address(&self) -> u8 {
        self.address
    }

    fn open_pipe(&self) -> Result<Arc<dyn UsbPipe>, UsbError> {
        if self.refuse_open.load(Ordering::Acquire) {
            return Err(UsbError::Host("pipe open refused".into()));
        }
        let endpoint = self.this.upgrade().ok_or(UsbError::Disconnected)?;
        self.opens.fetch_add(1, Ordering::AcqRel);
        trace!(address = self.address, "pipe opened");
        Ok(Arc::new(SimPipe {
            endpoint,
            closed: AtomicBool::new(false),
        }))
    }
}

/// An open pipe on a simulated endpoint
pub struct SimPipe {
    endpoint: Arc<SimEndpoint>,
    closed: AtomicBool,
}

impl UsbPipe for SimPipe {
    fn submit(&self, data: &mut [u8], timeout: Duration) -> Result<usize, UsbError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(UsbError::PipeNotOpen);
        }
        if self.endpoint.fail_transfers.load(Ordering::Acquire) {
            return Err(UsbError::Host("forced transfer failure".into()));
        }
        if endpoint_is_input(self.endpoint.address) {
            let frame = self.endpoint.in_frames.lock().pop_front();
            match frame {
                Some(frame) => {
                    let n = frame.len().min(data.len());
                    data[..n].copy_from_slice(&frame[..n]);
                    Ok(n)
                }
                None => {
                    // Nothing to deliver; behave like quiet hardware.
                    std::thread::sleep(timeout);
                    Err(UsbError::Timeout)
                }
            }
        } else {
            let limit = (*self.endpoint.write_limit.lock()).unwrap_or(data.len());
            let n = data.len().min(limit);
            self.endpoint.written.lock().push(data[..n].to_vec());
            Ok(n)
        }
    }

    fn close(&self) -> Result<(), UsbError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(UsbError::PipeNotOpen);
        }
        self.endpoint.closes.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}
