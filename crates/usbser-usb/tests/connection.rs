//! Integration tests for the device connection transport adapter
//!
//! These tests verify end-to-end behavior of [`DeviceConnection`]
//! against a simulated host stack:
//! - Lazy pipe opening and per-endpoint caching
//! - Interface claim bookkeeping and release on close
//! - Collapse of every host stack failure into the one sentinel

use std::sync::Arc;
use std::time::Duration;

use usbser_sim::SimDevice;
use usbser_usb::{request_type, DeviceConnection, TransferError, UsbDevice};

mod helpers {
    use super::*;

    pub const BULK_IN: u8 = 0x83;
    pub const BULK_OUT: u8 = 0x02;

    /// A device with one interface carrying a bulk pair
    pub fn device() -> Arc<SimDevice> {
        SimDevice::builder(0x067B, 0x2303)
            .interface(0, &[BULK_IN, BULK_OUT])
            .build()
    }

    pub fn connection(device: &Arc<SimDevice>) -> DeviceConnection {
        DeviceConnection::new(Arc::clone(device) as Arc<dyn UsbDevice>)
    }
}

mod pipe_tests {
    use super::*;

    #[test]
    fn pipe_is_opened_once_and_cached() {
        let device = helpers::device();
        let connection = helpers::connection(&device);
        let endpoint = device
            .interface(0)
            .and_then(|i| i.endpoint(helpers::BULK_OUT))
            .map(|e| e as Arc<dyn usbser_usb::UsbEndpoint>)
            .unwrap();

        let mut chunk = *b"ab";
        connection
            .bulk_transfer(&endpoint, &mut chunk, Duration::from_millis(10))
            .unwrap();
        let mut chunk = *b"cd";
        connection
            .bulk_transfer(&endpoint, &mut chunk, Duration::from_millis(10))
            .unwrap();

        let sim_endpoint = device.endpoint(helpers::BULK_OUT).unwrap();
        assert_eq!(sim_endpoint.open_count(), 1);
        assert_eq!(sim_endpoint.written_bytes(), b"abcd");
    }

    #[test]
    fn unopenable_pipe_fails_with_the_sentinel() {
        let device = helpers::device();
        let connection = helpers::connection(&device);
        let sim_endpoint = device.endpoint(helpers::BULK_IN).unwrap();
        sim_endpoint.set_refuse_open(true);
        let endpoint = sim_endpoint as Arc<dyn usbser_usb::UsbEndpoint>;

        let mut data = [0u8; 4];
        let result = connection.bulk_transfer(&endpoint, &mut data, Duration::from_millis(10));
        assert_eq!(result, Err(TransferError));

        // The refusal did not poison the cache: once the endpoint
        // recovers, the pipe opens normally.
        device.endpoint(helpers::BULK_IN).unwrap().set_refuse_open(false);
        device.endpoint(helpers::BULK_IN).unwrap().queue_frame(b"ok");
        let n = connection
            .bulk_transfer(&endpoint, &mut data, Duration::from_millis(10))
            .unwrap();
        assert_eq!(&data[..n], b"ok");
    }

    #[test]
    fn in_transfer_timeout_collapses_to_the_sentinel() {
        let device = helpers::device();
        let connection = helpers::connection(&device);
        let endpoint =
            device.endpoint(helpers::BULK_IN).unwrap() as Arc<dyn usbser_usb::UsbEndpoint>;

        let mut data = [0u8; 4];
        let result = connection.bulk_transfer(&endpoint, &mut data, Duration::from_millis(5));
        assert_eq!(result, Err(TransferError));
    }
}

mod control_tests {
    use super::*;

    #[test]
    fn control_transfer_reaches_the_device() {
        let device = helpers::device();
        let connection = helpers::connection(&device);

        let mut payload = [0x01, 0x02];
        let n = connection
            .control_transfer(
                request_type::DIR_OUT | request_type::TYPE_VENDOR,
                0x01,
                0x0404,
                1,
                &mut payload,
                Duration::from_millis(10),
            )
            .unwrap();
        assert_eq!(n, 2);

        let log = device.control_log();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].request, 0x01);
        assert_eq!(log[0].value, 0x0404);
        assert_eq!(log[0].index, 1);
        assert_eq!(log[0].data, vec![0x01, 0x02]);
    }

    #[test]
    fn failed_control_transfer_collapses_to_the_sentinel() {
        let device = helpers::device();
        let connection = helpers::connection(&device);
        device.set_fail_all_control(true);

        let mut data = [0u8; 1];
        let result = connection.control_transfer(
            request_type::DIR_IN | request_type::TYPE_VENDOR,
            0x01,
            0x8484,
            0,
            &mut data,
            Duration::from_millis(10),
        );
        assert_eq!(result, Err(TransferError));
    }
}

mod lifecycle_tests {
    use super::*;

    #[test]
    fn close_releases_claims_and_pipes() {
        let device = helpers::device();
        let connection = helpers::connection(&device);
        let interface = device.interface(0).unwrap();
        let dyn_interface = Arc::clone(&interface) as Arc<dyn usbser_usb::UsbInterface>;

        assert!(connection.claim_interface(&dyn_interface, false));
        assert!(interface.is_claimed());

        let endpoint =
            device.endpoint(helpers::BULK_OUT).unwrap() as Arc<dyn usbser_usb::UsbEndpoint>;
        let mut chunk = *b"x";
        connection
            .bulk_transfer(&endpoint, &mut chunk, Duration::from_millis(10))
            .unwrap();

        connection.close();
        assert!(!interface.is_claimed());
        let sim_endpoint = device.endpoint(helpers::BULK_OUT).unwrap();
        assert_eq!(sim_endpoint.close_count(), 1);

        // Closing twice is a no-op, not a double release.
        connection.close();
        assert_eq!(interface.release_count(), 1);
        assert_eq!(sim_endpoint.close_count(), 1);
    }

    #[test]
    fn forced_claim_detaches_a_competitor() {
        let device = helpers::device();
        let connection = helpers::connection(&device);
        let interface = device.interface(0).unwrap();
        let dyn_interface = Arc::clone(&interface) as Arc<dyn usbser_usb::UsbInterface>;
        interface.set_competing_claim(true);

        assert!(!connection.claim_interface(&dyn_interface, false));

        interface.set_competing_claim(true);
        assert!(connection.claim_interface(&dyn_interface, true));
        assert!(interface.is_claimed());
    }

    #[test]
    fn release_forgets_the_claim() {
        let device = helpers::device();
        let connection = helpers::connection(&device);
        let interface = device.interface(0).unwrap();
        let dyn_interface = Arc::clone(&interface) as Arc<dyn usbser_usb::UsbInterface>;

        assert!(connection.claim_interface(&dyn_interface, false));
        assert!(connection.release_interface(&dyn_interface));
        assert!(!interface.is_claimed());

        // close must not release the interface a second time
        connection.close();
        assert_eq!(interface.release_count(), 1);
    }
}
