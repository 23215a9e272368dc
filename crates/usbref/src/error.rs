//! Error types
//!
//! Every failure reported by the native core is a negative status code.
//! [`NativeError`] keeps that code together with the name the native core
//! gives it, and [`Error`] records which kind of operation failed.

use std::ffi::{CStr, c_int};
use std::fmt;

use thiserror::Error;

use crate::ffi;
use crate::ffi::constants::*;

/// A negative status code returned by the native core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeError {
    code: c_int,
    name: String,
}

impl NativeError {
    /// Wrap a native status code, looking up its name in the native core.
    pub(crate) fn from_code(code: c_int) -> Self {
        // Safe because libusb_error_name returns a pointer to a static, NUL
        // terminated string for every input, including unknown codes.
        let name = unsafe { CStr::from_ptr(ffi::libusb_error_name(code)) }
            .to_string_lossy()
            .into_owned();
        Self { code, name }
    }

    /// The raw native status code.
    pub fn code(&self) -> i32 {
        self.code
    }

    /// The native core's name for the code, e.g. `LIBUSB_ERROR_ACCESS`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Typed classification of the code.
    pub fn status(&self) -> Status {
        Status::from_code(self.code)
    }
}

impl fmt::Display for NativeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.code)
    }
}

/// Classification of native status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Io,
    InvalidParam,
    Access,
    NoDevice,
    NotFound,
    Busy,
    Timeout,
    Overflow,
    Pipe,
    Interrupted,
    NoMem,
    NotSupported,
    Other,
}

impl Status {
    fn from_code(code: c_int) -> Self {
        match code {
            LIBUSB_ERROR_IO => Status::Io,
            LIBUSB_ERROR_INVALID_PARAM => Status::InvalidParam,
            LIBUSB_ERROR_ACCESS => Status::Access,
            LIBUSB_ERROR_NO_DEVICE => Status::NoDevice,
            LIBUSB_ERROR_NOT_FOUND => Status::NotFound,
            LIBUSB_ERROR_BUSY => Status::Busy,
            LIBUSB_ERROR_TIMEOUT => Status::Timeout,
            LIBUSB_ERROR_OVERFLOW => Status::Overflow,
            LIBUSB_ERROR_PIPE => Status::Pipe,
            LIBUSB_ERROR_INTERRUPTED => Status::Interrupted,
            LIBUSB_ERROR_NO_MEM => Status::NoMem,
            LIBUSB_ERROR_NOT_SUPPORTED => Status::NotSupported,
            _ => Status::Other,
        }
    }
}

/// Errors returned by this crate
#[derive(Debug, Error)]
pub enum Error {
    /// Native context initialisation failed
    #[error("failed to initialise USB context: {0}")]
    Init(NativeError),

    /// Device enumeration reported a negative count
    #[error("failed to enumerate USB devices: {0}")]
    Enumeration(NativeError),

    /// No open-able device matched a vendor/product lookup
    #[error("no device found for {vendor_id:04x}:{product_id:04x}")]
    NotFound { vendor_id: u16, product_id: u16 },

    /// Opening a device failed
    #[error("failed to open device: {0}")]
    Open(NativeError),

    /// Reading or writing the active configuration failed
    #[error("configuration request failed: {0}")]
    Config(NativeError),

    /// An interface or endpoint level operation failed
    #[error("USB I/O error: {0}")]
    Io(NativeError),

    /// A descriptor query failed
    #[error("descriptor request failed: {0}")]
    Descriptor(NativeError),

    /// The shared counter of a descriptor wrapper could not be allocated
    #[error("failed to allocate descriptor reference count")]
    Allocation,

    /// The handle was already closed
    #[error("device handle is closed")]
    Closed,
}

impl Error {
    /// The native error behind this failure, if there is one.
    pub fn native(&self) -> Option<&NativeError> {
        match self {
            Error::Init(e)
            | Error::Enumeration(e)
            | Error::Open(e)
            | Error::Config(e)
            | Error::Io(e)
            | Error::Descriptor(e) => Some(e),
            Error::NotFound { .. } | Error::Allocation | Error::Closed => None,
        }
    }
}

/// Type alias for results of this crate
pub type Result<T> = std::result::Result<T, Error>;

/// Turns a native status code into `Ok(code)` or the error built by `wrap`.
pub(crate) fn check(code: c_int, wrap: fn(NativeError) -> Error) -> Result<c_int> {
    if code < 0 {
        Err(wrap(NativeError::from_code(code)))
    } else {
        Ok(code)
    }
}
