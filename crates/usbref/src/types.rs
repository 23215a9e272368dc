//! Plain value types shared across the crate

use std::ffi::c_int;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ffi::constants::*;

/// Negotiated speed of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Speed {
    /// The OS doesn't report or know the device speed.
    Unknown,
    /// Low speed (1.5MBit/s).
    Low,
    /// Full speed (12MBit/s).
    Full,
    /// High speed (480MBit/s).
    High,
    /// Super speed (5000MBit/s).
    Super,
    /// Super speed plus (10000MBit/s).
    SuperPlus,
}

impl Speed {
    pub(crate) fn from_native(speed: c_int) -> Speed {
        match speed {
            LIBUSB_SPEED_LOW => Speed::Low,
            LIBUSB_SPEED_FULL => Speed::Full,
            LIBUSB_SPEED_HIGH => Speed::High,
            LIBUSB_SPEED_SUPER => Speed::Super,
            LIBUSB_SPEED_SUPER_PLUS => Speed::SuperPlus,
            _ => Speed::Unknown,
        }
    }
}

impl fmt::Display for Speed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Speed::Unknown => "unknown",
            Speed::Low => "1.5M",
            Speed::Full => "12M",
            Speed::High => "480M",
            Speed::Super => "5G",
            Speed::SuperPlus => "10G",
        };
        f.write_str(s)
    }
}

/// Verbosity of the native core's own diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[default]
    None,
    Error,
    Warning,
    Info,
    Debug,
}

impl LogLevel {
    pub(crate) fn as_native(self) -> c_int {
        match self {
            LogLevel::None => LIBUSB_LOG_LEVEL_NONE,
            LogLevel::Error => LIBUSB_LOG_LEVEL_ERROR,
            LogLevel::Warning => LIBUSB_LOG_LEVEL_WARNING,
            LogLevel::Info => LIBUSB_LOG_LEVEL_INFO,
            LogLevel::Debug => LIBUSB_LOG_LEVEL_DEBUG,
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "off" => Ok(LogLevel::None),
            "error" => Ok(LogLevel::Error),
            "warning" | "warn" => Ok(LogLevel::Warning),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            other => Err(format!(
                "invalid native log level '{}', must be one of: none, error, warning, info, debug",
                other
            )),
        }
    }
}

/// Optional features a native core build may or may not provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// The capability query itself is supported.
    HasCapability,
    /// Hotplug notifications are available.
    HasHotplug,
    /// HID devices can be accessed without detaching a kernel driver.
    HasHidAccess,
    /// Kernel drivers can be detached from interfaces.
    SupportsDetachKernelDriver,
}

impl Capability {
    pub(crate) fn as_native(self) -> u32 {
        match self {
            Capability::HasCapability => LIBUSB_CAP_HAS_CAPABILITY,
            Capability::HasHotplug => LIBUSB_CAP_HAS_HOTPLUG,
            Capability::HasHidAccess => LIBUSB_CAP_HAS_HID_ACCESS,
            Capability::SupportsDetachKernelDriver => LIBUSB_CAP_SUPPORTS_DETACH_KERNEL_DRIVER,
        }
    }
}

/// Direction of an endpoint, seen from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

/// Transfer type of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferType {
    Control,
    Isochronous,
    Bulk,
    Interrupt,
}
