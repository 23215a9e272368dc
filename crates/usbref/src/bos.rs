//! Binary device object store (BOS) and its device capabilities

use std::ptr;
use std::slice;

use crate::descriptor::{Descriptor, kind};
use crate::ffi;

/// A BOS descriptor block.
pub type BosDescriptor = Descriptor<kind::Bos>;

/// A USB 2.0 extension capability block.
pub type Usb20ExtensionDescriptor = Descriptor<kind::Usb20Extension>;

/// A SuperSpeed USB device capability block.
pub type SsUsbDeviceCapabilityDescriptor = Descriptor<kind::SsUsbDeviceCapability>;

/// A container ID capability block.
pub type ContainerIdDescriptor = Descriptor<kind::ContainerId>;

const BT_USB_2_0_EXTENSION: u8 = 0x02;
const BT_SS_USB_DEVICE_CAPABILITY: u8 = 0x03;
const BT_CONTAINER_ID: u8 = 0x04;

const USB_2_0_EXTENSION_LPM_SUPPORT: u32 = 1 << 1;

/// Device capability types (`bDevCapabilityType`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityType {
    Usb20Extension,
    SsUsbDeviceCapability,
    ContainerId,
    Other(u8),
}

impl From<u8> for CapabilityType {
    fn from(value: u8) -> Self {
        match value {
            BT_USB_2_0_EXTENSION => CapabilityType::Usb20Extension,
            BT_SS_USB_DEVICE_CAPABILITY => CapabilityType::SsUsbDeviceCapability,
            BT_CONTAINER_ID => CapabilityType::ContainerId,
            other => CapabilityType::Other(other),
        }
    }
}

/// Native layout of a BOS block: the fixed header followed by
/// `bNumDeviceCaps` capability pointers.
///
/// The binding declares the trailing array as inline capability structs, so
/// the block is always read through this header instead.
#[repr(C)]
#[allow(non_snake_case, dead_code)]
pub(crate) struct BosHeader {
    pub(crate) bLength: u8,
    pub(crate) bDescriptorType: u8,
    pub(crate) wTotalLength: u16,
    pub(crate) bNumDeviceCaps: u8,
    pub(crate) dev_capability: [*mut ffi::libusb_bos_dev_capability_descriptor; 0],
}

impl Descriptor<kind::Bos> {
    fn header(&self) -> *const BosHeader {
        self.as_raw().cast()
    }

    pub fn num_device_caps(&self) -> u8 {
        // Safe because the block starts with a BOS header and lives as long as `self`.
        unsafe { (*self.header()).bNumDeviceCaps }
    }

    /// Raw `wTotalLength`.
    pub fn total_length(&self) -> u16 {
        // Safe because the block starts with a BOS header and lives as long as `self`.
        unsafe { (*self.header()).wTotalLength }
    }

    fn capability_ptrs(&self) -> &[*mut ffi::libusb_bos_dev_capability_descriptor] {
        let header = self.header();
        // Safe because the native core allocates bNumDeviceCaps pointers
        // right after the header, inside the same block.
        unsafe {
            let caps = ptr::addr_of!((*header).dev_capability)
                .cast::<*mut ffi::libusb_bos_dev_capability_descriptor>();
            slice::from_raw_parts(caps, usize::from((*header).bNumDeviceCaps))
        }
    }

    /// Views of the device capabilities in this BOS block.
    ///
    /// Each view holds its own reference to the block, so it stays valid
    /// after this descriptor is dropped.
    pub fn capabilities(&self) -> impl Iterator<Item = BosCapability> + '_ {
        (0..self.capability_ptrs().len()).map(move |index| BosCapability {
            bos: self.clone(),
            index,
        })
    }
}

/// One device capability inside a BOS block.
#[derive(Clone, Debug)]
pub struct BosCapability {
    bos: BosDescriptor,
    index: usize,
}

impl BosCapability {
    fn raw(&self) -> &ffi::libusb_bos_dev_capability_descriptor {
        // Safe because the pointer belongs to the BOS block kept alive by 'self.bos'.
        unsafe { &*self.as_raw() }
    }

    pub(crate) fn as_raw(&self) -> *mut ffi::libusb_bos_dev_capability_descriptor {
        self.bos.capability_ptrs()[self.index]
    }

    /// Raw `bDevCapabilityType`.
    pub fn capability_type_code(&self) -> u8 {
        self.raw().bDevCapabilityType
    }

    pub fn capability_type(&self) -> CapabilityType {
        CapabilityType::from(self.capability_type_code())
    }

    /// The BOS block this view belongs to.
    pub fn bos(&self) -> &BosDescriptor {
        &self.bos
    }
}

impl Descriptor<kind::Usb20Extension> {
    /// Raw `bmAttributes`.
    pub fn attributes(&self) -> u32 {
        self.raw().bmAttributes
    }

    /// Whether the device supports link power management.
    pub fn supports_lpm(&self) -> bool {
        self.attributes() & USB_2_0_EXTENSION_LPM_SUPPORT != 0
    }
}

impl Descriptor<kind::SsUsbDeviceCapability> {
    pub fn attributes(&self) -> u8 {
        self.raw().bmAttributes
    }

    /// Bitmap of supported speeds (`wSpeedSupported`).
    pub fn speeds_supported(&self) -> u16 {
        self.raw().wSpeedSupported
    }

    /// Lowest speed with full functionality.
    pub fn functionality_support(&self) -> u8 {
        self.raw().bFunctionalitySupport
    }

    /// U1 exit latency in microseconds.
    pub fn u1_exit_latency(&self) -> u8 {
        self.raw().bU1DevExitLat
    }

    /// U2 exit latency in microseconds.
    pub fn u2_exit_latency(&self) -> u16 {
        u16::from(self.raw().bU2DevExitLat)
    }
}

impl Descriptor<kind::ContainerId> {
    /// The 128-bit container UUID.
    pub fn container_id(&self) -> [u8; 16] {
        self.raw().ContainerId
    }
}
