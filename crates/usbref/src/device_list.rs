//! Forward-only list of enumerated devices

use std::fmt;
use std::ptr::NonNull;
use std::sync::Arc;

use tracing::trace;

use crate::device::DeviceRef;
use crate::ffi;
use crate::session::Context;

/// The result of one enumeration call.
///
/// The list owns the native device array and one native reference per
/// entry; both are surrendered in a single `libusb_free_device_list` call
/// when the list drops. Devices taken out with [`DeviceList::front`] or the
/// iterator carry their own references and stay valid afterwards.
///
/// The cursor only moves forward; a list cannot be restarted. As an
/// [`ExactSizeIterator`], `len()` counts the devices not yet stepped over,
/// so it agrees with [`DeviceList::is_empty`]. [`DeviceList::total`] is the
/// size of the whole enumeration.
pub struct DeviceList {
    context: Arc<Context>,
    list: *const *mut ffi::libusb_device,
    len: usize,
    cursor: usize,
}

// The list may move between threads. It is not Sync: the cursor is not
// synchronised.
unsafe impl Send for DeviceList {}

impl DeviceList {
    /// # Safety
    ///
    /// `list` must come from `libusb_get_device_list` on `context` and hold
    /// `len` referenced devices.
    pub(crate) unsafe fn from_raw(
        context: Arc<Context>,
        list: *const *mut ffi::libusb_device,
        len: usize,
    ) -> Self {
        DeviceList {
            context,
            list,
            len,
            cursor: 0,
        }
    }

    /// Total number of devices in the enumeration, whatever the cursor.
    pub fn total(&self) -> usize {
        self.len
    }

    /// Whether the cursor has passed the last device.
    pub fn is_empty(&self) -> bool {
        self.cursor >= self.len
    }

    /// Devices not yet stepped over.
    pub fn remaining(&self) -> usize {
        self.len.saturating_sub(self.cursor)
    }

    /// A new reference to the device under the cursor.
    ///
    /// Each call returns an independent reference; nothing is cached.
    pub fn front(&self) -> Option<DeviceRef> {
        if self.is_empty() {
            return None;
        }
        // Safe because 'cursor' < 'len' and the array holds 'len' entries.
        let device = unsafe { *self.list.add(self.cursor) };
        let device = NonNull::new(device)?;
        // Safe because the list holds a reference to every entry.
        Some(unsafe { DeviceRef::new_ref(self.context.clone(), device) })
    }

    /// Step past the device under the cursor.
    ///
    /// Advancing an exhausted list is a logic error.
    pub fn advance(&mut self) {
        debug_assert!(!self.is_empty(), "advance() on an exhausted DeviceList");
        if self.cursor < self.len {
            self.cursor += 1;
        }
    }
}

impl Iterator for DeviceList {
    type Item = DeviceRef;

    fn next(&mut self) -> Option<DeviceRef> {
        let device = self.front()?;
        self.advance();
        Some(device)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining();
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for DeviceList {}

impl Drop for DeviceList {
    fn drop(&mut self) {
        trace!("Freeing device list of {} entries", self.len);
        // Safe because 'self.list' came from libusb_get_device_list and is
        // freed only here. Passing 1 drops the list's reference on each entry.
        unsafe { ffi::libusb_free_device_list(self.list, 1) };
    }
}

impl fmt::Debug for DeviceList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceList")
            .field("len", &self.len)
            .field("cursor", &self.cursor)
            .finish()
    }
}
