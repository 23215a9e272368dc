//! Open device handles
//!
//! An [`OpenHandle`] exclusively owns one native open handle. All calls
//! here block the calling thread until the native core returns; none of
//! them are retried.

use std::ffi::c_int;
use std::fmt;
use std::ptr::{self, NonNull};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::bos::BosDescriptor;
use crate::device::DeviceRef;
use crate::error::{Error, NativeError, Result, check};
use crate::ffi;
use crate::session::{Context, wrap_descriptor};

/// Largest string descriptor payload.
const STRING_DESCRIPTOR_MAX: usize = 255;

/// An open I/O session on a device.
///
/// The native handle is closed exactly once, by [`OpenHandle::close`] or on
/// drop, whichever comes first. Calls on a closed handle fail with
/// [`Error::Closed`].
pub struct OpenHandle {
    context: Arc<Context>,
    handle: Option<NonNull<ffi::libusb_device_handle>>,
}

// Native handles may be used from any thread; closing needs '&mut self'.
unsafe impl Send for OpenHandle {}
unsafe impl Sync for OpenHandle {}

impl OpenHandle {
    /// # Safety
    ///
    /// `handle` must be freshly opened on `context` and owned by nobody else.
    pub(crate) unsafe fn from_raw(
        context: Arc<Context>,
        handle: NonNull<ffi::libusb_device_handle>,
    ) -> Self {
        OpenHandle {
            context,
            handle: Some(handle),
        }
    }

    fn as_raw(&self) -> Result<*mut ffi::libusb_device_handle> {
        self.handle.map(NonNull::as_ptr).ok_or(Error::Closed)
    }

    /// Whether the native handle has been closed.
    pub fn is_closed(&self) -> bool {
        self.handle.is_none()
    }

    /// A new reference to the device this handle was opened on.
    pub fn device(&self) -> Result<DeviceRef> {
        let handle = self.as_raw()?;
        // Safe because the handle is open. libusb_get_device does not take a
        // reference, so DeviceRef::new_ref takes one.
        let device = NonNull::new(unsafe { ffi::libusb_get_device(handle) }).ok_or_else(|| {
            Error::Io(NativeError::from_code(ffi::constants::LIBUSB_ERROR_NO_DEVICE))
        })?;
        // Safe because an open handle keeps its device record alive.
        Ok(unsafe { DeviceRef::new_ref(self.context.clone(), device) })
    }

    /// The active `bConfigurationValue`.
    ///
    /// Some devices report 0 while configured; 0 is returned as is. May
    /// block on a control transfer when the OS does not cache the value.
    pub fn configuration(&self) -> Result<u8> {
        let handle = self.as_raw()?;
        let mut config: c_int = 0;
        // Safe because the handle is open and '&mut config' is valid.
        check(
            unsafe { ffi::libusb_get_configuration(handle, &mut config) },
            Error::Config,
        )?;
        Ok(config as u8)
    }

    /// Select a configuration, or `None` for the unconfigured state.
    ///
    /// No interface may be claimed while the configuration changes.
    pub fn set_configuration(&self, config: Option<u8>) -> Result<()> {
        let handle = self.as_raw()?;
        let value = config.map_or(-1, c_int::from);
        // Safe because the handle is open.
        check(
            unsafe { ffi::libusb_set_configuration(handle, value) },
            Error::Config,
        )?;
        debug!("Set configuration {}", value);
        Ok(())
    }

    /// Claim an interface. Claiming an already claimed interface succeeds.
    pub fn claim_interface(&self, interface: u8) -> Result<()> {
        let handle = self.as_raw()?;
        // Safe because the handle is open.
        check(
            unsafe { ffi::libusb_claim_interface(handle, c_int::from(interface)) },
            Error::Io,
        )?;
        debug!("Claimed interface {}", interface);
        Ok(())
    }

    /// Release a claimed interface. Sends a SET_INTERFACE request and blocks.
    pub fn release_interface(&self, interface: u8) -> Result<()> {
        let handle = self.as_raw()?;
        // Safe because the handle is open.
        check(
            unsafe { ffi::libusb_release_interface(handle, c_int::from(interface)) },
            Error::Io,
        )?;
        debug!("Released interface {}", interface);
        Ok(())
    }

    pub fn set_interface_alt_setting(&self, interface: u8, setting: u8) -> Result<()> {
        let handle = self.as_raw()?;
        // Safe because the handle is open.
        check(
            unsafe {
                ffi::libusb_set_interface_alt_setting(
                    handle,
                    c_int::from(interface),
                    c_int::from(setting),
                )
            },
            Error::Io,
        )?;
        Ok(())
    }

    /// Clear the halt/stall condition of an endpoint.
    pub fn clear_halt(&self, endpoint: u8) -> Result<()> {
        let handle = self.as_raw()?;
        // Safe because the handle is open.
        check(
            unsafe { ffi::libusb_clear_halt(handle, endpoint) },
            Error::Io,
        )?;
        Ok(())
    }

    /// Port-reset the device.
    pub fn reset(&self) -> Result<()> {
        let handle = self.as_raw()?;
        // Safe because the handle is open.
        check(unsafe { ffi::libusb_reset_device(handle) }, Error::Io)?;
        debug!("Reset device");
        Ok(())
    }

    /// Whether a kernel driver is bound to `interface`.
    pub fn kernel_driver_active(&self, interface: u8) -> Result<bool> {
        let handle = self.as_raw()?;
        // Safe because the handle is open.
        let active = check(
            unsafe { ffi::libusb_kernel_driver_active(handle, c_int::from(interface)) },
            Error::Io,
        )?;
        Ok(active == 1)
    }

    pub fn detach_kernel_driver(&self, interface: u8) -> Result<()> {
        let handle = self.as_raw()?;
        // Safe because the handle is open.
        check(
            unsafe { ffi::libusb_detach_kernel_driver(handle, c_int::from(interface)) },
            Error::Io,
        )?;
        debug!("Detached kernel driver from interface {}", interface);
        Ok(())
    }

    pub fn attach_kernel_driver(&self, interface: u8) -> Result<()> {
        let handle = self.as_raw()?;
        // Safe because the handle is open.
        check(
            unsafe { ffi::libusb_attach_kernel_driver(handle, c_int::from(interface)) },
            Error::Io,
        )?;
        debug!("Attached kernel driver to interface {}", interface);
        Ok(())
    }

    /// Let the native core detach kernel drivers on claim and reattach them
    /// on release.
    ///
    /// Platforms without kernel driver control report `NOT_SUPPORTED`; that
    /// is logged and treated as success. Other failures are [`Error::Io`].
    pub fn set_auto_detach_kernel_driver(&self, enable: bool) -> Result<()> {
        let handle = self.as_raw()?;
        // Safe because the handle is open.
        let code =
            unsafe { ffi::libusb_set_auto_detach_kernel_driver(handle, c_int::from(enable)) };
        if code == ffi::constants::LIBUSB_ERROR_NOT_SUPPORTED {
            debug!("Auto-detach of kernel drivers not supported, ignoring");
            return Ok(());
        }
        check(code, Error::Io)?;
        Ok(())
    }

    /// Read the BOS descriptor. Blocks on a control transfer.
    pub fn bos_descriptor(&self) -> Result<BosDescriptor> {
        let handle = self.as_raw()?;
        let mut raw: *const ffi::libusb_bos_descriptor = ptr::null();
        // Safe because the handle is open and '&mut raw' is valid.
        let code = unsafe { ffi::libusb_get_bos_descriptor(handle, &mut raw) };
        wrap_descriptor(code, raw)
    }

    /// Read a string descriptor in the first language, as ASCII.
    pub fn read_string_descriptor_ascii(&self, index: u8) -> Result<String> {
        let handle = self.as_raw()?;
        let mut buf = vec![0u8; STRING_DESCRIPTOR_MAX];
        // Safe because 'buf' holds STRING_DESCRIPTOR_MAX bytes.
        let len = check(
            unsafe {
                ffi::libusb_get_string_descriptor_ascii(
                    handle,
                    index,
                    buf.as_mut_ptr(),
                    buf.len() as c_int,
                )
            },
            Error::Io,
        )?;
        buf.truncate(len as usize);
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Close the native handle. Later calls, and the drop, do nothing.
    pub fn close(&mut self) {
        if let Some(handle) = self.handle.take() {
            // Safe because 'handle' is open and was just taken out of 'self'.
            unsafe { ffi::libusb_close(handle.as_ptr()) };
            debug!("Closed device handle {:p}", handle);
        }
    }
}

impl Drop for OpenHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for OpenHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenHandle")
            .field("handle", &self.handle)
            .finish()
    }
}

/// Releases an interface claimed through [`OpenHandle::claim_interface`]
/// when dropped.
///
/// A failed release on drop is logged and otherwise ignored.
pub struct ClaimedInterface<'a> {
    handle: &'a OpenHandle,
    interface: u8,
}

impl<'a> ClaimedInterface<'a> {
    /// Claim `interface` on `handle` for the lifetime of the guard.
    pub fn claim(handle: &'a OpenHandle, interface: u8) -> Result<Self> {
        handle.claim_interface(interface)?;
        Ok(Self { handle, interface })
    }

    pub fn interface(&self) -> u8 {
        self.interface
    }

    /// Release now and report the outcome.
    pub fn release(self) -> Result<()> {
        let result = self.handle.release_interface(self.interface);
        std::mem::forget(self);
        result
    }
}

impl Drop for ClaimedInterface<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.handle.release_interface(self.interface) {
            warn!("Failed to release interface {}: {}", self.interface, e);
        }
    }
}
