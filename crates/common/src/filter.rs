//! VID:PID device filters
//!
//! Filters use the format `0xVID:0xPID`, where either half may be `*`.
//! An empty filter set admits every device.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// One half of a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdPattern {
    Any,
    Exact(u16),
}

impl IdPattern {
    pub fn matches(&self, id: u16) -> bool {
        match self {
            IdPattern::Any => true,
            IdPattern::Exact(expected) => *expected == id,
        }
    }

    fn parse(filter: &str, part: &str, name: &str) -> Result<Self> {
        if part == "*" {
            return Ok(IdPattern::Any);
        }

        let invalid = |reason: String| Error::Filter {
            filter: filter.to_string(),
            reason,
        };

        let hex_part = part
            .strip_prefix("0x")
            .or_else(|| part.strip_prefix("0X"))
            .ok_or_else(|| invalid(format!("{} '{}' must start with '0x' (e.g., '0x1234')", name, part)))?;

        if hex_part.is_empty() || hex_part.len() > 4 {
            return Err(invalid(format!("{} '{}' hex part must be 1-4 digits", name, part)));
        }

        u16::from_str_radix(hex_part, 16)
            .map(IdPattern::Exact)
            .map_err(|_| invalid(format!("{} '{}' is not a valid hex number", name, part)))
    }
}

impl fmt::Display for IdPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdPattern::Any => write!(f, "*"),
            IdPattern::Exact(id) => write!(f, "0x{:04x}", id),
        }
    }
}

/// A parsed `VID:PID` filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceFilter {
    pub vendor: IdPattern,
    pub product: IdPattern,
}

impl DeviceFilter {
    /// A filter that admits every device.
    pub const ANY: DeviceFilter = DeviceFilter {
        vendor: IdPattern::Any,
        product: IdPattern::Any,
    };

    pub fn exact(vendor_id: u16, product_id: u16) -> Self {
        DeviceFilter {
            vendor: IdPattern::Exact(vendor_id),
            product: IdPattern::Exact(product_id),
        }
    }

    pub fn matches(&self, vendor_id: u16, product_id: u16) -> bool {
        self.vendor.matches(vendor_id) && self.product.matches(product_id)
    }

    /// Both IDs, when neither half is a wildcard.
    pub fn as_exact(&self) -> Option<(u16, u16)> {
        match (self.vendor, self.product) {
            (IdPattern::Exact(vid), IdPattern::Exact(pid)) => Some((vid, pid)),
            _ => None,
        }
    }
}

impl FromStr for DeviceFilter {
    type Err = Error;

    fn from_str(filter: &str) -> Result<Self> {
        if filter == "*" {
            return Ok(DeviceFilter::ANY);
        }

        let mut parts = filter.split(':');
        let (Some(vid), Some(pid), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(Error::Filter {
                filter: filter.to_string(),
                reason: "expected VID:PID (e.g., '0x1234:0x5678' or '0x1234:*')".to_string(),
            });
        };

        Ok(DeviceFilter {
            vendor: IdPattern::parse(filter, vid, "VID")?,
            product: IdPattern::parse(filter, pid, "PID")?,
        })
    }
}

impl TryFrom<String> for DeviceFilter {
    type Error = Error;

    fn try_from(filter: String) -> Result<Self> {
        filter.parse()
    }
}

impl From<DeviceFilter> for String {
    fn from(filter: DeviceFilter) -> Self {
        filter.to_string()
    }
}

impl fmt::Display for DeviceFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.vendor, self.product)
    }
}

/// Whether any filter admits the device; an empty set admits everything.
pub fn matches_any(filters: &[DeviceFilter], vendor_id: u16, product_id: u16) -> bool {
    filters.is_empty() || filters.iter().any(|f| f.matches(vendor_id, product_id))
}
