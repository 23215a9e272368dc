//! Reference-counted USB device access on top of libusb-1.0
//!
//! This crate wraps the native USB core's device and descriptor lifecycle:
//!
//! - [`Session`] owns one native context and enumerates devices.
//! - [`DeviceList`] is the forward-only result of one enumeration.
//! - [`DeviceRef`] is a shared reference to one native device record.
//! - [`OpenHandle`] exclusively owns one open handle.
//! - [`Descriptor<K>`] shares one native descriptor block between clones and
//!   frees it once, when the last clone drops.
//!
//! Every native release (unref, free, close, exit) happens in exactly one
//! `Drop` implementation, so it fires once on every exit path.
//!
//! ```no_run
//! use usbref::Session;
//!
//! # fn main() -> usbref::Result<()> {
//! let session = Session::open()?;
//! for device in session.enumerate()? {
//!     let descriptor = device.device_descriptor()?;
//!     println!(
//!         "Bus {:03} Device {:03}: {:04x}:{:04x}",
//!         device.bus_number(),
//!         device.address(),
//!         descriptor.vendor_id(),
//!         descriptor.product_id()
//!     );
//! }
//! # Ok(())
//! # }
//! ```

#[cfg(not(test))]
use libusb1_sys as ffi;

#[cfg(test)]
use fake_core as ffi;

pub mod bos;
pub mod config_descriptor;
pub mod descriptor;
pub mod device;
pub mod device_list;
pub mod error;
pub mod handle;
pub mod session;
pub mod types;

pub use bos::{
    BosCapability, BosDescriptor, CapabilityType, ContainerIdDescriptor,
    SsUsbDeviceCapabilityDescriptor, Usb20ExtensionDescriptor,
};
pub use config_descriptor::{
    ConfigDescriptor, EndpointDescriptor, Interface, InterfaceDescriptor,
    SsEndpointCompanionDescriptor,
};
pub use descriptor::{Descriptor, DescriptorKind, kind};
pub use device::{DeviceDescriptor, DeviceRef};
pub use device_list::DeviceList;
pub use error::{Error, NativeError, Result, Status};
pub use handle::{ClaimedInterface, OpenHandle};
pub use session::Session;
pub use types::{Capability, Direction, LogLevel, Speed, TransferType};
