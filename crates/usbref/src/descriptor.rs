//! Reference-counted native descriptor blocks
//!
//! The native core hands out descriptor blocks that must be returned with
//! a type-specific free function. [`Descriptor<K>`] owns one such block
//! behind an atomically counted, shared header. Clones share the block and
//! the counter; the block is freed once, when the last clone drops.
//!
//! The block is freed by `K::release`, chosen by the descriptor kind:
//!
//! | Kind | Native type | Released by |
//! |------|-------------|-------------|
//! | [`kind::Config`] | `libusb_config_descriptor` | `libusb_free_config_descriptor` |
//! | [`kind::Bos`] | `libusb_bos_descriptor` | `libusb_free_bos_descriptor` |
//! | [`kind::SsEndpointCompanion`] | `libusb_ss_endpoint_companion_descriptor` | `libusb_free_ss_endpoint_companion_descriptor` |
//! | [`kind::Usb20Extension`] | `libusb_usb_2_0_extension_descriptor` | `libusb_free_usb_2_0_extension_descriptor` |
//! | [`kind::SsUsbDeviceCapability`] | `libusb_ss_usb_device_capability_descriptor` | `libusb_free_ss_usb_device_capability_descriptor` |
//! | [`kind::ContainerId`] | `libusb_container_id_descriptor` | `libusb_free_container_id_descriptor` |

use std::alloc::{self, Layout};
use std::fmt;
use std::marker::PhantomData;
use std::ptr::NonNull;
use std::sync::atomic::{self, AtomicUsize, Ordering};

use tracing::trace;

use crate::error::{Error, Result};

/// Counts above this abort the process instead of overflowing.
const MAX_REFCOUNT: usize = isize::MAX as usize;

mod sealed {
    pub trait Sealed {}
}

/// A kind of native descriptor block: its raw type and release function.
pub trait DescriptorKind: sealed::Sealed + 'static {
    /// The native descriptor type.
    type Raw;

    /// Human readable name used in logs.
    const NAME: &'static str;

    /// Return the block to the native core.
    ///
    /// # Safety
    ///
    /// `raw` must come from the matching native getter and must not be used
    /// after this call.
    unsafe fn release(raw: *const Self::Raw);
}

/// Descriptor kinds.
pub mod kind {
    use super::{DescriptorKind, sealed::Sealed};
    use crate::ffi;

    macro_rules! descriptor_kind {
        ($(#[$meta:meta])* $name:ident, $raw:ident, $free:ident, $label:literal) => {
            $(#[$meta])*
            #[derive(Debug)]
            pub enum $name {}

            impl Sealed for $name {}

            impl DescriptorKind for $name {
                type Raw = ffi::$raw;
                const NAME: &'static str = $label;

                unsafe fn release(raw: *const ffi::$raw) {
                    // Safe because the caller hands over a block obtained from
                    // the matching getter.
                    unsafe { ffi::$free(raw.cast_mut()) }
                }
            }
        };
    }

    descriptor_kind!(
        /// Configuration descriptor.
        Config,
        libusb_config_descriptor,
        libusb_free_config_descriptor,
        "config"
    );
    descriptor_kind!(
        /// Binary device object store.
        Bos,
        libusb_bos_descriptor,
        libusb_free_bos_descriptor,
        "bos"
    );
    descriptor_kind!(
        /// SuperSpeed endpoint companion.
        SsEndpointCompanion,
        libusb_ss_endpoint_companion_descriptor,
        libusb_free_ss_endpoint_companion_descriptor,
        "ss endpoint companion"
    );
    descriptor_kind!(
        /// USB 2.0 extension capability.
        Usb20Extension,
        libusb_usb_2_0_extension_descriptor,
        libusb_free_usb_2_0_extension_descriptor,
        "usb 2.0 extension"
    );
    descriptor_kind!(
        /// SuperSpeed USB device capability.
        SsUsbDeviceCapability,
        libusb_ss_usb_device_capability_descriptor,
        libusb_free_ss_usb_device_capability_descriptor,
        "ss usb device capability"
    );
    descriptor_kind!(
        /// Container ID capability.
        ContainerId,
        libusb_container_id_descriptor,
        libusb_free_container_id_descriptor,
        "container id"
    );
}

struct Shared<K: DescriptorKind> {
    count: AtomicUsize,
    raw: NonNull<K::Raw>,
}

/// A shared, reference-counted native descriptor block.
pub struct Descriptor<K: DescriptorKind> {
    shared: NonNull<Shared<K>>,
    _marker: PhantomData<Shared<K>>,
}

// The block is never written after construction, the counter is atomic and
// the native free functions may be called from any thread.
unsafe impl<K: DescriptorKind> Send for Descriptor<K> {}
unsafe impl<K: DescriptorKind> Sync for Descriptor<K> {}

impl<K: DescriptorKind> Descriptor<K> {
    /// Take ownership of a block freshly returned by the native core.
    ///
    /// On failure the block has already been released.
    ///
    /// # Safety
    ///
    /// `raw` must be a block of kind `K` that nothing else owns.
    pub(crate) unsafe fn from_raw(raw: *const K::Raw) -> Result<Self> {
        let raw = NonNull::new(raw.cast_mut()).ok_or(Error::Allocation)?;

        let layout = Layout::new::<Shared<K>>();
        // Safe because Shared<K> is not zero sized.
        let shared = unsafe { alloc::alloc(layout) }.cast::<Shared<K>>();
        let Some(shared) = NonNull::new(shared) else {
            // Safe because the block is owned by us and not shared yet.
            unsafe { K::release(raw.as_ptr()) };
            return Err(Error::Allocation);
        };

        // Safe because 'shared' points to fresh memory with the layout of Shared<K>.
        unsafe {
            shared.as_ptr().write(Shared {
                count: AtomicUsize::new(1),
                raw,
            });
        }
        trace!("Acquired {} descriptor {:p}", K::NAME, raw);

        Ok(Self {
            shared,
            _marker: PhantomData,
        })
    }

    fn shared(&self) -> &Shared<K> {
        // Safe because the header lives until the last clone is dropped.
        unsafe { self.shared.as_ref() }
    }

    /// Pointer to the native block, valid while `self` lives.
    pub(crate) fn as_raw(&self) -> *const K::Raw {
        self.shared().raw.as_ptr()
    }

    /// Borrow the native block.
    pub(crate) fn raw(&self) -> &K::Raw {
        // Safe because the block is immutable and lives as long as `self`.
        unsafe { self.shared().raw.as_ref() }
    }

    /// Number of live clones sharing this block.
    pub fn strong_count(this: &Self) -> usize {
        this.shared().count.load(Ordering::Acquire)
    }

    /// Whether two wrappers share the same block.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        this.shared == other.shared
    }
}

impl<K: DescriptorKind> Clone for Descriptor<K> {
    fn clone(&self) -> Self {
        // A new reference can only be formed from an existing one, so
        // relaxed ordering is enough here.
        let old = self.shared().count.fetch_add(1, Ordering::Relaxed);
        if old > MAX_REFCOUNT {
            std::process::abort();
        }
        Self {
            shared: self.shared,
            _marker: PhantomData,
        }
    }
}

impl<K: DescriptorKind> Drop for Descriptor<K> {
    fn drop(&mut self) {
        if self.shared().count.fetch_sub(1, Ordering::Release) != 1 {
            return;
        }
        // Synchronizes with the release decrements of the other clones, so
        // their reads of the block happen before the free.
        atomic::fence(Ordering::Acquire);

        let raw = self.shared().raw;
        trace!("Releasing {} descriptor {:p}", K::NAME, raw);
        // Safe because this was the last reference to the header and the block.
        unsafe {
            K::release(raw.as_ptr());
            std::ptr::drop_in_place(self.shared.as_ptr());
            alloc::dealloc(self.shared.as_ptr().cast(), Layout::new::<Shared<K>>());
        }
    }
}

impl<K: DescriptorKind> PartialEq for Descriptor<K> {
    fn eq(&self, other: &Self) -> bool {
        Descriptor::ptr_eq(self, other)
    }
}

impl<K: DescriptorKind> Eq for Descriptor<K> {}

impl<K: DescriptorKind> fmt::Debug for Descriptor<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("kind", &K::NAME)
            .field("raw", &self.as_raw())
            .field("count", &Descriptor::strong_count(self))
            .finish()
    }
}
