//! Configuration descriptors and the interface/endpoint views inside them

use std::ffi::c_int;
use std::slice;

use crate::descriptor::{Descriptor, kind};
use crate::ffi;
use crate::types::{Direction, TransferType};

/// A configuration descriptor block.
pub type ConfigDescriptor = Descriptor<kind::Config>;

/// A SuperSpeed endpoint companion descriptor block.
pub type SsEndpointCompanionDescriptor = Descriptor<kind::SsEndpointCompanion>;

const CONFIG_ATTRIBUTES_SELF_POWERED: u8 = 1 << 6;
const CONFIG_ATTRIBUTES_REMOTE_WAKEUP: u8 = 1 << 5;

const ENDPOINT_DESCRIPTOR_DIRECTION_MASK: u8 = 1 << 7;
const ENDPOINT_DESCRIPTOR_NUMBER_MASK: u8 = 0xf;
const ENDPOINT_DESCRIPTOR_ATTRIBUTES_TYPE_MASK: u8 = 0x3;

/// Build a slice from a native (pointer, count) pair, treating null or a
/// non-positive count as empty.
///
/// # Safety
///
/// When non-null, `ptr` must point to `len` initialised values that outlive `'a`.
unsafe fn native_slice<'a, T>(ptr: *const T, len: c_int) -> &'a [T] {
    if ptr.is_null() || len <= 0 {
        &[]
    } else {
        // Safe because of the function contract.
        unsafe { slice::from_raw_parts(ptr, len as usize) }
    }
}

impl Descriptor<kind::Config> {
    /// The configuration value (`bConfigurationValue`).
    pub fn number(&self) -> u8 {
        self.raw().bConfigurationValue
    }

    pub fn num_interfaces(&self) -> u8 {
        self.raw().bNumInterfaces
    }

    /// Raw `bmAttributes`.
    pub fn attributes(&self) -> u8 {
        self.raw().bmAttributes
    }

    pub fn self_powered(&self) -> bool {
        self.attributes() & CONFIG_ATTRIBUTES_SELF_POWERED != 0
    }

    pub fn remote_wakeup(&self) -> bool {
        self.attributes() & CONFIG_ATTRIBUTES_REMOTE_WAKEUP != 0
    }

    /// Raw `bMaxPower`, in 2mA units (8mA for SuperSpeed devices).
    pub fn max_power(&self) -> u8 {
        self.raw().bMaxPower
    }

    /// String descriptor index of the configuration name.
    pub fn description_string_index(&self) -> Option<u8> {
        match self.raw().iConfiguration {
            0 => None,
            n => Some(n),
        }
    }

    /// The interfaces of this configuration.
    pub fn interfaces(&self) -> impl Iterator<Item = Interface<'_>> {
        let raw = self.raw();
        // Safe because the native core sizes 'interface' by bNumInterfaces.
        let interfaces = unsafe { native_slice(raw.interface, c_int::from(raw.bNumInterfaces)) };
        interfaces.iter().map(|interface| Interface { interface })
    }
}

/// An interface and its alternate settings.
#[derive(Clone, Copy)]
pub struct Interface<'a> {
    interface: &'a ffi::libusb_interface,
}

impl<'a> Interface<'a> {
    /// Interface number, taken from the first alternate setting.
    pub fn number(&self) -> u8 {
        self.descriptors()
            .next()
            .map(|d| d.interface_number())
            .unwrap_or(0)
    }

    /// The alternate settings of this interface.
    pub fn descriptors(&self) -> impl Iterator<Item = InterfaceDescriptor<'a>> + use<'a> {
        // Safe because 'altsetting' holds num_altsetting entries owned by the config block.
        let settings =
            unsafe { native_slice(self.interface.altsetting, self.interface.num_altsetting) };
        settings.iter().map(|descriptor| InterfaceDescriptor { descriptor })
    }
}

/// One alternate setting of an interface.
#[derive(Clone, Copy)]
pub struct InterfaceDescriptor<'a> {
    descriptor: &'a ffi::libusb_interface_descriptor,
}

impl<'a> InterfaceDescriptor<'a> {
    pub fn interface_number(&self) -> u8 {
        self.descriptor.bInterfaceNumber
    }

    pub fn setting_number(&self) -> u8 {
        self.descriptor.bAlternateSetting
    }

    pub fn class_code(&self) -> u8 {
        self.descriptor.bInterfaceClass
    }

    pub fn sub_class_code(&self) -> u8 {
        self.descriptor.bInterfaceSubClass
    }

    pub fn protocol_code(&self) -> u8 {
        self.descriptor.bInterfaceProtocol
    }

    pub fn num_endpoints(&self) -> u8 {
        self.descriptor.bNumEndpoints
    }

    /// The endpoints of this alternate setting.
    pub fn endpoint_descriptors(&self) -> impl Iterator<Item = EndpointDescriptor<'a>> + use<'a> {
        // Safe because 'endpoint' holds bNumEndpoints entries owned by the config block.
        let endpoints = unsafe {
            native_slice(self.descriptor.endpoint, c_int::from(self.descriptor.bNumEndpoints))
        };
        endpoints.iter().map(|descriptor| EndpointDescriptor { descriptor })
    }
}

/// An endpoint descriptor inside a configuration block.
#[derive(Clone, Copy)]
pub struct EndpointDescriptor<'a> {
    descriptor: &'a ffi::libusb_endpoint_descriptor,
}

impl<'a> EndpointDescriptor<'a> {
    /// `bEndpointAddress`, direction bit included.
    pub fn address(&self) -> u8 {
        self.descriptor.bEndpointAddress
    }

    pub fn number(&self) -> u8 {
        self.descriptor.bEndpointAddress & ENDPOINT_DESCRIPTOR_NUMBER_MASK
    }

    pub fn direction(&self) -> Direction {
        if self.descriptor.bEndpointAddress & ENDPOINT_DESCRIPTOR_DIRECTION_MASK != 0 {
            Direction::In
        } else {
            Direction::Out
        }
    }

    pub fn transfer_type(&self) -> TransferType {
        match self.descriptor.bmAttributes & ENDPOINT_DESCRIPTOR_ATTRIBUTES_TYPE_MASK {
            0 => TransferType::Control,
            1 => TransferType::Isochronous,
            2 => TransferType::Bulk,
            _ => TransferType::Interrupt,
        }
    }

    /// Raw `wMaxPacketSize`.
    pub fn max_packet_size(&self) -> u16 {
        self.descriptor.wMaxPacketSize
    }

    pub fn interval(&self) -> u8 {
        self.descriptor.bInterval
    }

    pub(crate) fn as_raw(&self) -> *const ffi::libusb_endpoint_descriptor {
        self.descriptor
    }
}

impl Descriptor<kind::SsEndpointCompanion> {
    /// Packets the endpoint can send or receive per burst, minus one.
    pub fn max_burst(&self) -> u8 {
        self.raw().bMaxBurst
    }

    /// Raw `bmAttributes` (max streams for bulk, mult for isochronous).
    pub fn attributes(&self) -> u8 {
        self.raw().bmAttributes
    }

    /// Bytes moved per service interval, for periodic endpoints.
    pub fn bytes_per_interval(&self) -> u16 {
        self.raw().wBytesPerInterval
    }
}
