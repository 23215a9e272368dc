//! Session: the root of enumeration
//!
//! A [`Session`] initialises one native USB context. Everything derived
//! from it (device lists, device references, open handles) holds a clone
//! of the same [`Context`] token, so the native context is torn down only
//! after the last derived object is gone.

use std::ffi::c_int;
use std::ptr::{self, NonNull};
use std::sync::Arc;

use tracing::{debug, info};

use crate::bos::{
    BosCapability, ContainerIdDescriptor, SsUsbDeviceCapabilityDescriptor,
    Usb20ExtensionDescriptor,
};
use crate::config_descriptor::{EndpointDescriptor, SsEndpointCompanionDescriptor};
use crate::descriptor::{Descriptor, DescriptorKind};
use crate::device_list::DeviceList;
use crate::error::{Error, NativeError, Result, check};
use crate::ffi;
use crate::handle::OpenHandle;
use crate::types::{Capability, LogLevel};

/// Owner of one native context pointer.
///
/// `libusb_exit` is called when the last clone of the token drops.
#[derive(Debug)]
pub(crate) struct Context {
    raw: NonNull<ffi::libusb_context>,
}

// The native context is internally synchronised.
unsafe impl Send for Context {}
unsafe impl Sync for Context {}

impl Context {
    pub(crate) fn as_raw(&self) -> *mut ffi::libusb_context {
        self.raw.as_ptr()
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        debug!("Tearing down USB context {:p}", self.raw);
        // Safe because 'self.raw' came from libusb_init and no derived object
        // outlives this token.
        unsafe { ffi::libusb_exit(self.raw.as_ptr()) };
    }
}

/// A USB session owning one native context.
///
/// Derived objects keep the native context alive on their own, so a
/// `Session` may be dropped before the devices, handles and lists it
/// produced.
#[derive(Debug)]
pub struct Session {
    context: Arc<Context>,
}

impl Session {
    /// Initialise a new native context.
    pub fn open() -> Result<Session> {
        let mut raw: *mut ffi::libusb_context = ptr::null_mut();
        // Safe because '&mut raw' points to valid memory on the stack.
        check(unsafe { ffi::libusb_init(&mut raw) }, Error::Init)?;
        let raw = NonNull::new(raw)
            .ok_or_else(|| Error::Init(NativeError::from_code(ffi::constants::LIBUSB_ERROR_OTHER)))?;

        info!("Initialised USB context {:p}", raw);
        Ok(Session {
            context: Arc::new(Context { raw }),
        })
    }

    /// Set the native core's log verbosity.
    ///
    /// The native core ignores this when it was built without logging or
    /// when the `LIBUSB_DEBUG` environment variable is set.
    pub fn set_log_level(&self, level: LogLevel) {
        debug!("Setting native log level to {:?}", level);
        // Safe because the context is valid.
        unsafe { ffi::libusb_set_debug(self.context.as_raw(), level.as_native()) };
    }

    /// Whether the native core supports `capability`.
    pub fn has_capability(&self, capability: Capability) -> bool {
        // Safe because the context is initialised.
        unsafe { ffi::libusb_has_capability(capability.as_native()) != 0 }
    }

    /// Enumerate the devices currently attached to the system.
    pub fn enumerate(&self) -> Result<DeviceList> {
        let mut list: *const *mut ffi::libusb_device = ptr::null();
        // Safe because the context is valid and '&mut list' points to valid memory.
        let count = unsafe { ffi::libusb_get_device_list(self.context.as_raw(), &mut list) };
        if count < 0 {
            return Err(Error::Enumeration(NativeError::from_code(count as c_int)));
        }

        debug!("Enumerated {} devices", count);
        // Safe because the native core returned 'count' referenced devices in 'list'.
        Ok(unsafe { DeviceList::from_raw(self.context.clone(), list, count as usize) })
    }

    /// Open the first device found with the given vendor and product IDs.
    ///
    /// When several attached devices share the IDs, which one is opened is
    /// unspecified.
    pub fn open_by_vendor_product(&self, vendor_id: u16, product_id: u16) -> Result<OpenHandle> {
        // Safe because the context is valid.
        let raw = unsafe {
            ffi::libusb_open_device_with_vid_pid(self.context.as_raw(), vendor_id, product_id)
        };
        let raw = NonNull::new(raw).ok_or(Error::NotFound {
            vendor_id,
            product_id,
        })?;

        debug!("Opened {:04x}:{:04x} by vendor/product", vendor_id, product_id);
        // Safe because 'raw' is a freshly opened handle owned by nobody else.
        Ok(unsafe { OpenHandle::from_raw(self.context.clone(), raw) })
    }

    /// SuperSpeed endpoint companion of `endpoint`.
    pub fn ss_endpoint_companion_descriptor(
        &self,
        endpoint: &EndpointDescriptor<'_>,
    ) -> Result<SsEndpointCompanionDescriptor> {
        let mut raw: *const ffi::libusb_ss_endpoint_companion_descriptor = ptr::null();
        // Safe because the endpoint belongs to a live config block and '&mut raw'
        // points to valid memory.
        let code = unsafe {
            ffi::libusb_get_ss_endpoint_companion_descriptor(
                self.context.as_raw(),
                endpoint.as_raw(),
                ptr::addr_of_mut!(raw).cast(),
            )
        };
        wrap_descriptor(code, raw)
    }

    /// USB 2.0 extension behind a BOS capability.
    pub fn usb_2_0_extension_descriptor(
        &self,
        capability: &BosCapability,
    ) -> Result<Usb20ExtensionDescriptor> {
        let mut raw: *const ffi::libusb_usb_2_0_extension_descriptor = ptr::null();
        // Safe because the capability belongs to a live BOS block.
        let code = unsafe {
            ffi::libusb_get_usb_2_0_extension_descriptor(
                self.context.as_raw(),
                capability.as_raw(),
                ptr::addr_of_mut!(raw).cast(),
            )
        };
        wrap_descriptor(code, raw)
    }

    /// SuperSpeed USB device capability behind a BOS capability.
    pub fn ss_usb_device_capability_descriptor(
        &self,
        capability: &BosCapability,
    ) -> Result<SsUsbDeviceCapabilityDescriptor> {
        let mut raw: *const ffi::libusb_ss_usb_device_capability_descriptor = ptr::null();
        // Safe because the capability belongs to a live BOS block.
        let code = unsafe {
            ffi::libusb_get_ss_usb_device_capability_descriptor(
                self.context.as_raw(),
                capability.as_raw(),
                ptr::addr_of_mut!(raw).cast(),
            )
        };
        wrap_descriptor(code, raw)
    }

    /// Container ID behind a BOS capability.
    pub fn container_id_descriptor(
        &self,
        capability: &BosCapability,
    ) -> Result<ContainerIdDescriptor> {
        let mut raw: *const ffi::libusb_container_id_descriptor = ptr::null();
        // Safe because the capability belongs to a live BOS block.
        let code = unsafe {
            ffi::libusb_get_container_id_descriptor(
                self.context.as_raw(),
                capability.as_raw(),
                ptr::addr_of_mut!(raw).cast(),
            )
        };
        wrap_descriptor(code, raw)
    }
}

/// Wrap the result of a native descriptor getter.
///
/// No wrapper is built, and nothing is allocated, when `code` is an error.
pub(crate) fn wrap_descriptor<K: DescriptorKind>(
    code: c_int,
    raw: *const K::Raw,
) -> Result<Descriptor<K>> {
    check(code, Error::Descriptor)?;
    // Safe because a successful getter hands us a block nobody else owns.
    unsafe { Descriptor::from_raw(raw) }
}
