// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus device addressing

use std::{fmt, num::ParseIntError, str::FromStr};

/// Unit identifier
pub type UnitId = u8;

/// A single byte for addressing Modbus devices.
///
/// On serial buses this byte selects the physical device, on TCP/UDP it is
/// carried in the MBAP header and forwarded by gateways to the addressed
/// device behind them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Unit(pub UnitId);

impl Unit {
    /// The special address for sending a broadcast message to all
    /// connected Modbus devices at once. Broadcast messages are one-way
    /// and sent from the client to all servers, i.e. a request without
    /// a response.
    #[must_use]
    pub const fn broadcast() -> Self {
        Unit(0)
    }

    /// The minimum address of a single Modbus device.
    #[must_use]
    pub const fn min_device() -> Self {
        Unit(1)
    }

    /// The maximum address of a single Modbus device.
    #[must_use]
    pub const fn max_device() -> Self {
        Unit(247)
    }

    /// The reserved address for sending a message to a directly connected
    /// Modbus TCP device, i.e. if not forwarded through a gateway according
    /// to the unit identifier.
    ///
    /// [Modbus Messaging on TCP/IP Implementation Guide](http://www.modbus.org/docs/Modbus_Messaging_Implementation_Guide_V1_0b.pdf), page 23
    /// "On TCP/IP, the Modbus server is addressed using its IP address; therefore,
    /// the Modbus Unit Identifier is useless. The value 0xFF has to be used."
    #[must_use]
    pub const fn tcp_device() -> Self {
        Unit(255)
    }

    /// Check if the unit identifier is used for broadcasting.
    #[must_use]
    pub fn is_broadcast(self) -> bool {
        self == Self::broadcast()
    }

    /// Check if the unit identifier addresses a single device.
    #[must_use]
    pub fn is_single_device(self) -> bool {
        self >= Self::min_device() && self <= Self::max_device()
    }

    /// Check if the unit identifier is reserved.
    #[must_use]
    pub fn is_reserved(self) -> bool {
        self > Self::max_device()
    }
}

impl From<UnitId> for Unit {
    fn from(from: UnitId) -> Self {
        Unit(from)
    }
}

impl From<Unit> for UnitId {
    fn from(from: Unit) -> Self {
        from.0
    }
}

impl FromStr for Unit {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unit_id = match s.parse::<u8>() {
            Ok(unit_id) => Ok(unit_id),
            Err(err) => {
                if let Some(stripped) = s.strip_prefix("0x") {
                    u8::from_str_radix(stripped, 16)
                } else {
                    Err(err)
                }
            }
        }?;
        Ok(Unit(unit_id))
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:0>2X})", self.0, self.0)
    }
}

/// Stateful management of the currently addressed device.
///
/// A directly connected TCP device is addressed with the reserved
/// `Unit::tcp_device() = 0xFF` (the default), a device behind a gateway
/// by its assigned unit identifier.
pub trait UnitContext {
    /// Select the device addressed by all subsequent outgoing requests.
    fn set_unit(&mut self, unit: Unit);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_dec() {
        assert_eq!(Unit(0), Unit::from_str("0").unwrap());
        assert_eq!(Unit(123), Unit::from_str("123").unwrap());
        assert_eq!(Unit(255), Unit::from_str("255").unwrap());
        assert!(Unit::from_str("-1").is_err());
        assert!(Unit::from_str("256").is_err());
    }

    #[test]
    fn parse_hex() {
        assert_eq!(Unit(0), Unit::from_str("0x00").unwrap());
        assert_eq!(Unit(123), Unit::from_str("0x7b").unwrap());
        assert_eq!(Unit(123), Unit::from_str("0x7B").unwrap());
        assert_eq!(Unit(255), Unit::from_str("0xff").unwrap());
        assert!(Unit::from_str("0X00").is_err());
        assert!(Unit::from_str("0x100").is_err());
    }

    #[test]
    fn address_classes() {
        assert!(Unit(0).is_broadcast());
        assert!(!Unit(0).is_single_device());
        assert!(Unit(1).is_single_device());
        assert!(Unit(247).is_single_device());
        assert!(Unit(248).is_reserved());
        assert!(Unit::tcp_device().is_reserved());
    }

    #[test]
    fn format() {
        assert!(format!("{}", Unit(123)).contains("123"));
        assert!(format!("{}", Unit(0x7B)).contains("0x7B"));
        assert!(!format!("{}", Unit(0x7B)).contains("0x7b"));
    }
}
