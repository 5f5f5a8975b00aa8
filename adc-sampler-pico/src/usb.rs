//! USB CDC serial as the packet transport.

use adc_sampler::TransportSink;
use rp235x_hal as hal;
use usb_device::prelude::*;
use usb_device::UsbError;
use usbd_serial::SerialPort;

type Bus = hal::usb::UsbBus;

/// Owns the USB device and its serial class; the device has to be polled
/// at least every 10 ms or the host drops it.
pub struct UsbSink<'a> {
    device: UsbDevice<'a, Bus>,
    serial: SerialPort<'a, Bus>,
}

impl<'a> UsbSink<'a> {
    pub fn new(device: UsbDevice<'a, Bus>, serial: SerialPort<'a, Bus>) -> Self {
        Self { device, serial }
    }

    /// Services the bus and throws away anything the host sent.
    pub fn poll(&mut self) {
        if self.device.poll(&mut [&mut self.serial]) {
            let mut scratch = [0u8; 64];
            while let Ok(n) = self.serial.read(&mut scratch) {
                if n == 0 {
                    break;
                }
            }
        }
    }

    /// A host has the port open.
    pub fn connected(&self) -> bool {
        self.device.state() == UsbDeviceState::Configured && self.serial.dtr()
    }
}

impl TransportSink for UsbSink<'_> {
    type Error = UsbError;

    fn write(&mut self, bytes: &[u8]) -> nb::Result<usize, UsbError> {
        if !self.connected() {
            return Err(nb::Error::WouldBlock);
        }
        match self.serial.write(bytes) {
            Ok(n) => Ok(n),
            Err(UsbError::WouldBlock) => {
                // let the endpoint drain for the next attempt
                self.poll();
                Err(nb::Error::WouldBlock)
            }
            Err(e) => Err(nb::Error::Other(e)),
        }
    }

    fn writable(&self) -> Option<usize> {
        if self.connected() {
            None
        } else {
            Some(0)
        }
    }
}
