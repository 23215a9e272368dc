//! Shared references to native device records

use std::fmt;
use std::hash::{Hash, Hasher};
use std::mem::MaybeUninit;
use std::ptr::{self, NonNull};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::config_descriptor::ConfigDescriptor;
use crate::error::{Error, NativeError, Result, check};
use crate::ffi;
use crate::handle::OpenHandle;
use crate::session::{Context, wrap_descriptor};
use crate::types::Speed;

/// A reference to one device record of the native core.
///
/// Every `DeviceRef` holds one native reference: cloning calls
/// `libusb_ref_device`, dropping calls `libusb_unref_device`. Two
/// `DeviceRef`s are equal when they point to the same record.
pub struct DeviceRef {
    context: Arc<Context>,
    device: NonNull<ffi::libusb_device>,
}

// Native device records are refcounted atomically and their metadata is
// immutable.
unsafe impl Send for DeviceRef {}
unsafe impl Sync for DeviceRef {}

impl DeviceRef {
    /// Take a new native reference to `device`.
    ///
    /// # Safety
    ///
    /// `device` must be a live record of the native core belonging to `context`.
    pub(crate) unsafe fn new_ref(context: Arc<Context>, device: NonNull<ffi::libusb_device>) -> Self {
        // Safe because the caller guarantees the record is live.
        unsafe { ffi::libusb_ref_device(device.as_ptr()) };
        trace!("Referenced device {:p}", device);
        DeviceRef { context, device }
    }

    pub(crate) fn as_raw(&self) -> *mut ffi::libusb_device {
        self.device.as_ptr()
    }

    pub fn bus_number(&self) -> u8 {
        // Safe because 'self.device' is referenced.
        unsafe { ffi::libusb_get_bus_number(self.as_raw()) }
    }

    /// Port on the parent hub, 0 when unavailable.
    pub fn port_number(&self) -> u8 {
        // Safe because 'self.device' is referenced.
        unsafe { ffi::libusb_get_port_number(self.as_raw()) }
    }

    pub fn address(&self) -> u8 {
        // Safe because 'self.device' is referenced.
        unsafe { ffi::libusb_get_device_address(self.as_raw()) }
    }

    pub fn speed(&self) -> Speed {
        // Safe because 'self.device' is referenced.
        Speed::from_native(unsafe { ffi::libusb_get_device_speed(self.as_raw()) })
    }

    /// The hub this device is attached to, or `None` for a root hub.
    pub fn parent(&self) -> Option<DeviceRef> {
        // Safe because 'self.device' is referenced.
        let parent = NonNull::new(unsafe { ffi::libusb_get_parent(self.as_raw()) })?;
        // Safe because the native core keeps the parent of a referenced device alive.
        Some(unsafe { DeviceRef::new_ref(self.context.clone(), parent) })
    }

    /// `wMaxPacketSize` of `endpoint` in the active configuration.
    pub fn max_packet_size(&self, endpoint: u8) -> Result<usize> {
        // Safe because 'self.device' is referenced.
        let size = check(
            unsafe { ffi::libusb_get_max_packet_size(self.as_raw(), endpoint) },
            Error::Descriptor,
        )?;
        Ok(size as usize)
    }

    /// Bytes per service interval of `endpoint` in the active configuration,
    /// accounting for high-bandwidth multipliers.
    pub fn max_iso_packet_size(&self, endpoint: u8) -> Result<usize> {
        // Safe because 'self.device' is referenced.
        let size = check(
            unsafe { ffi::libusb_get_max_iso_packet_size(self.as_raw(), endpoint) },
            Error::Descriptor,
        )?;
        Ok(size as usize)
    }

    /// Read the device descriptor.
    pub fn device_descriptor(&self) -> Result<DeviceDescriptor> {
        let mut descriptor = MaybeUninit::<ffi::libusb_device_descriptor>::uninit();
        // Safe because 'descriptor' is large enough for the native core to fill.
        check(
            unsafe { ffi::libusb_get_device_descriptor(self.as_raw(), descriptor.as_mut_ptr()) },
            Error::Descriptor,
        )?;
        // Safe because a successful call initialised the descriptor.
        Ok(DeviceDescriptor {
            descriptor: unsafe { descriptor.assume_init() },
        })
    }

    /// Open the device for I/O.
    pub fn open(&self) -> Result<OpenHandle> {
        let mut handle: *mut ffi::libusb_device_handle = ptr::null_mut();
        // Safe because 'self.device' is referenced and '&mut handle' is valid.
        check(
            unsafe { ffi::libusb_open(self.as_raw(), &mut handle) },
            Error::Open,
        )?;
        let handle = NonNull::new(handle).ok_or_else(|| {
            Error::Open(NativeError::from_code(ffi::constants::LIBUSB_ERROR_OTHER))
        })?;

        debug!(
            "Opened device {:03}:{:03}",
            self.bus_number(),
            self.address()
        );
        // Safe because 'handle' was just opened and is owned by nobody else.
        Ok(unsafe { OpenHandle::from_raw(self.context.clone(), handle) })
    }

    /// Descriptor of the active configuration.
    pub fn active_config_descriptor(&self) -> Result<ConfigDescriptor> {
        let mut raw: *const ffi::libusb_config_descriptor = ptr::null();
        // Safe because 'self.device' is referenced and '&mut raw' is valid.
        let code = unsafe { ffi::libusb_get_active_config_descriptor(self.as_raw(), &mut raw) };
        wrap_descriptor(code, raw)
    }

    /// Descriptor of the configuration at `index` (0-based).
    pub fn config_descriptor(&self, index: u8) -> Result<ConfigDescriptor> {
        let mut raw: *const ffi::libusb_config_descriptor = ptr::null();
        // Safe because 'self.device' is referenced and '&mut raw' is valid.
        let code = unsafe { ffi::libusb_get_config_descriptor(self.as_raw(), index, &mut raw) };
        wrap_descriptor(code, raw)
    }

    /// Descriptor of the configuration whose `bConfigurationValue` is `value`.
    pub fn config_descriptor_by_value(&self, value: u8) -> Result<ConfigDescriptor> {
        let mut raw: *const ffi::libusb_config_descriptor = ptr::null();
        // Safe because 'self.device' is referenced and '&mut raw' is valid.
        let code =
            unsafe { ffi::libusb_get_config_descriptor_by_value(self.as_raw(), value, &mut raw) };
        wrap_descriptor(code, raw)
    }
}

impl Clone for DeviceRef {
    fn clone(&self) -> Self {
        // Safe because 'self' holds a reference, so the record is live.
        unsafe { DeviceRef::new_ref(self.context.clone(), self.device) }
    }

    fn clone_from(&mut self, source: &Self) {
        if self.device == source.device {
            return;
        }
        // Take the new reference before giving up the old one.
        *self = source.clone();
    }
}

impl Drop for DeviceRef {
    fn drop(&mut self) {
        trace!("Unreferencing device {:p}", self.device);
        // Safe because this DeviceRef owns one native reference.
        unsafe { ffi::libusb_unref_device(self.device.as_ptr()) };
    }
}

impl PartialEq for DeviceRef {
    fn eq(&self, other: &Self) -> bool {
        self.device == other.device
    }
}

impl Eq for DeviceRef {}

impl Hash for DeviceRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.device.hash(state);
    }
}

impl fmt::Debug for DeviceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceRef")
            .field("bus_number", &self.bus_number())
            .field("address", &self.address())
            .finish()
    }
}

/// Value copy of a device descriptor.
pub struct DeviceDescriptor {
    descriptor: ffi::libusb_device_descriptor,
}

impl Clone for DeviceDescriptor {
    fn clone(&self) -> Self {
        let d = &self.descriptor;
        DeviceDescriptor {
            descriptor: ffi::libusb_device_descriptor {
                bLength: d.bLength,
                bDescriptorType: d.bDescriptorType,
                bcdUSB: d.bcdUSB,
                bDeviceClass: d.bDeviceClass,
                bDeviceSubClass: d.bDeviceSubClass,
                bDeviceProtocol: d.bDeviceProtocol,
                bMaxPacketSize0: d.bMaxPacketSize0,
                idVendor: d.idVendor,
                idProduct: d.idProduct,
                bcdDevice: d.bcdDevice,
                iManufacturer: d.iManufacturer,
                iProduct: d.iProduct,
                iSerialNumber: d.iSerialNumber,
                bNumConfigurations: d.bNumConfigurations,
            },
        }
    }
}

impl DeviceDescriptor {
    pub fn vendor_id(&self) -> u16 {
        self.descriptor.idVendor
    }

    pub fn product_id(&self) -> u16 {
        self.descriptor.idProduct
    }

    /// Raw `bcdUSB`.
    pub fn usb_version(&self) -> u16 {
        self.descriptor.bcdUSB
    }

    /// Raw `bcdDevice`.
    pub fn device_version(&self) -> u16 {
        self.descriptor.bcdDevice
    }

    pub fn class_code(&self) -> u8 {
        self.descriptor.bDeviceClass
    }

    pub fn sub_class_code(&self) -> u8 {
        self.descriptor.bDeviceSubClass
    }

    pub fn protocol_code(&self) -> u8 {
        self.descriptor.bDeviceProtocol
    }

    /// `bMaxPacketSize0`.
    pub fn max_packet_size(&self) -> u8 {
        self.descriptor.bMaxPacketSize0
    }

    pub fn num_configurations(&self) -> u8 {
        self.descriptor.bNumConfigurations
    }

    pub fn manufacturer_string_index(&self) -> Option<u8> {
        string_index(self.descriptor.iManufacturer)
    }

    pub fn product_string_index(&self) -> Option<u8> {
        string_index(self.descriptor.iProduct)
    }

    pub fn serial_number_string_index(&self) -> Option<u8> {
        string_index(self.descriptor.iSerialNumber)
    }
}

impl fmt::Debug for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceDescriptor")
            .field("vendor_id", &format_args!("{:#06x}", self.vendor_id()))
            .field("product_id", &format_args!("{:#06x}", self.product_id()))
            .field("class_code", &self.class_code())
            .field("num_configurations", &self.num_configurations())
            .finish()
    }
}

fn string_index(index: u8) -> Option<u8> {
    match index {
        0 => None,
        n => Some(n),
    }
}
