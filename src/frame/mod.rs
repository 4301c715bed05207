// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

#[cfg(any(feature = "tcp", feature = "udp"))]
pub(crate) mod net;

use std::{error, fmt};

/// A Modbus protocol address is represented by 16 bit from `0` to `65535`.
///
/// This *protocol address* uses 0-based indexing, while the *coil address* or
/// *register address* is often specified as a number with 1-based indexing.
/// Please consult the specification of your devices if 1-based coil/register
/// addresses need to be converted to 0-based protocol addresses by subtracting 1.
pub type Address = u16;

/// A Coil represents a single bit.
///
/// - `true` is equivalent to `ON`, `1` and `0xFF00`.
/// - `false` is equivalent to `OFF`, `0` and `0x0000`.
pub type Coil = bool;

/// Modbus uses 16 bit for its data items (big-endian representation).
pub type Word = u16;

/// Number of items to process (`0` - `65535`).
pub type Quantity = u16;

/// Maximum number of coils per read request.
pub const MAX_READ_COIL_COUNT: Quantity = 0x07D0;

/// Maximum number of registers per read request.
pub const MAX_READ_REGISTER_COUNT: Quantity = 0x007D;

/// Maximum number of coils per write-multiple request.
pub const MAX_WRITE_COIL_COUNT: usize = 0x07B0;

/// Maximum number of registers per write-multiple request.
pub const MAX_WRITE_REGISTER_COUNT: usize = 0x007B;

/// A Modbus function code.
///
/// Only the eight standard read/write operations are supported. An unknown
/// function byte is rejected while decoding instead of being carried around
/// as an opaque variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FunctionCode {
    /// 01 (0x01) Read Coils
    ReadCoils,
    /// 02 (0x02) Read Discrete Inputs
    ReadDiscreteInputs,
    /// 03 (0x03) Read Holding Registers
    ReadHoldingRegisters,
    /// 04 (0x04) Read Input Registers
    ReadInputRegisters,
    /// 05 (0x05) Write Single Coil
    WriteSingleCoil,
    /// 06 (0x06) Write Single Register
    WriteSingleRegister,
    /// 15 (0x0F) Write Multiple Coils
    WriteMultipleCoils,
    /// 16 (0x10) Write Multiple Registers
    WriteMultipleRegisters,
}

impl FunctionCode {
    /// Create a new [`FunctionCode`] from an unsigned 8 bit integer.
    ///
    /// Returns `None` for undefined values.
    #[must_use]
    pub const fn new(value: u8) -> Option<Self> {
        let fn_code = match value {
            0x01 => Self::ReadCoils,
            0x02 => Self::ReadDiscreteInputs,
            0x03 => Self::ReadHoldingRegisters,
            0x04 => Self::ReadInputRegisters,
            0x05 => Self::WriteSingleCoil,
            0x06 => Self::WriteSingleRegister,
            0x0F => Self::WriteMultipleCoils,
            0x10 => Self::WriteMultipleRegisters,
            _ => return None,
        };
        Some(fn_code)
    }

    /// Get the underlying value of the [`FunctionCode`].
    #[must_use]
    pub const fn value(self) -> u8 {
        match self {
            Self::ReadCoils => 0x01,
            Self::ReadDiscreteInputs => 0x02,
            Self::ReadHoldingRegisters => 0x03,
            Self::ReadInputRegisters => 0x04,
            Self::WriteSingleCoil => 0x05,
            Self::WriteSingleRegister => 0x06,
            Self::WriteMultipleCoils => 0x0F,
            Self::WriteMultipleRegisters => 0x10,
        }
    }

    pub(crate) const fn name(self) -> &'static str {
        match self {
            Self::ReadCoils => "ReadCoils",
            Self::ReadDiscreteInputs => "ReadDiscreteInputs",
            Self::ReadHoldingRegisters => "ReadHoldingRegisters",
            Self::ReadInputRegisters => "ReadInputRegisters",
            Self::WriteSingleCoil => "WriteSingleCoil",
            Self::WriteSingleRegister => "WriteSingleRegister",
            Self::WriteMultipleCoils => "WriteMultipleCoils",
            Self::WriteMultipleRegisters => "WriteMultipleRegisters",
        }
    }
}

impl fmt::Display for FunctionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:0>2X})", self.name(), self.value())
    }
}

/// An exception reply sets this bit of the original function byte.
pub(crate) const EXCEPTION_BIT: u8 = 0x80;

/// Check if a function byte announces an exception response.
#[must_use]
pub(crate) const fn is_exception_fn_code(fn_code: u8) -> bool {
    fn_code >= EXCEPTION_BIT
}

/// A request represents a message from the client (master) to the server (slave).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    ReadCoils(Address, Quantity),
    ReadDiscreteInputs(Address, Quantity),
    ReadHoldingRegisters(Address, Quantity),
    ReadInputRegisters(Address, Quantity),
    WriteSingleCoil(Address, Coil),
    WriteSingleRegister(Address, Word),
    WriteMultipleCoils(Address, Vec<Coil>),
    WriteMultipleRegisters(Address, Vec<Word>),
}

impl Request {
    /// Get the [`FunctionCode`] of the [`Request`].
    #[must_use]
    pub const fn function_code(&self) -> FunctionCode {
        match self {
            Self::ReadCoils(_, _) => FunctionCode::ReadCoils,
            Self::ReadDiscreteInputs(_, _) => FunctionCode::ReadDiscreteInputs,
            Self::ReadHoldingRegisters(_, _) => FunctionCode::ReadHoldingRegisters,
            Self::ReadInputRegisters(_, _) => FunctionCode::ReadInputRegisters,
            Self::WriteSingleCoil(_, _) => FunctionCode::WriteSingleCoil,
            Self::WriteSingleRegister(_, _) => FunctionCode::WriteSingleRegister,
            Self::WriteMultipleCoils(_, _) => FunctionCode::WriteMultipleCoils,
            Self::WriteMultipleRegisters(_, _) => FunctionCode::WriteMultipleRegisters,
        }
    }

    /// Check the request against the per-function quantity limits.
    ///
    /// A zero or over-limit quantity is an `IllegalDataValue`, an address
    /// range running past `0x10000` an `IllegalDataAddress`. Clients reject
    /// such requests locally before touching the wire, servers answer them
    /// with the corresponding exception frame.
    pub fn validate(&self) -> std::result::Result<(), ExceptionCode> {
        match self {
            Self::ReadCoils(address, quantity) | Self::ReadDiscreteInputs(address, quantity) => {
                check_quantity(usize::from(*quantity), usize::from(MAX_READ_COIL_COUNT))?;
                check_address_range(*address, usize::from(*quantity))
            }
            Self::ReadHoldingRegisters(address, quantity)
            | Self::ReadInputRegisters(address, quantity) => {
                check_quantity(usize::from(*quantity), usize::from(MAX_READ_REGISTER_COUNT))?;
                check_address_range(*address, usize::from(*quantity))
            }
            Self::WriteSingleCoil(_, _) | Self::WriteSingleRegister(_, _) => Ok(()),
            Self::WriteMultipleCoils(address, coils) => {
                check_quantity(coils.len(), MAX_WRITE_COIL_COUNT)?;
                check_address_range(*address, coils.len())
            }
            Self::WriteMultipleRegisters(address, words) => {
                check_quantity(words.len(), MAX_WRITE_REGISTER_COUNT)?;
                check_address_range(*address, words.len())
            }
        }
    }
}

fn check_quantity(quantity: usize, max: usize) -> std::result::Result<(), ExceptionCode> {
    if quantity >= 1 && quantity <= max {
        Ok(())
    } else {
        Err(ExceptionCode::IllegalDataValue)
    }
}

fn check_address_range(address: Address, quantity: usize) -> std::result::Result<(), ExceptionCode> {
    if usize::from(address) + quantity <= 0x10000 {
        Ok(())
    } else {
        Err(ExceptionCode::IllegalDataAddress)
    }
}

/// The data of a successful request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    ReadCoils(Vec<Coil>),
    ReadDiscreteInputs(Vec<Coil>),
    ReadHoldingRegisters(Vec<Word>),
    ReadInputRegisters(Vec<Word>),
    WriteSingleCoil(Address, Coil),
    WriteSingleRegister(Address, Word),
    WriteMultipleCoils(Address, Quantity),
    WriteMultipleRegisters(Address, Quantity),
}

impl Response {
    /// Get the [`FunctionCode`] of the [`Response`].
    #[must_use]
    pub const fn function_code(&self) -> FunctionCode {
        match self {
            Self::ReadCoils(_) => FunctionCode::ReadCoils,
            Self::ReadDiscreteInputs(_) => FunctionCode::ReadDiscreteInputs,
            Self::ReadHoldingRegisters(_) => FunctionCode::ReadHoldingRegisters,
            Self::ReadInputRegisters(_) => FunctionCode::ReadInputRegisters,
            Self::WriteSingleCoil(_, _) => FunctionCode::WriteSingleCoil,
            Self::WriteSingleRegister(_, _) => FunctionCode::WriteSingleRegister,
            Self::WriteMultipleCoils(_, _) => FunctionCode::WriteMultipleCoils,
            Self::WriteMultipleRegisters(_, _) => FunctionCode::WriteMultipleRegisters,
        }
    }
}

/// A server (slave) exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExceptionCode {
    IllegalFunction = 0x01,
    IllegalDataAddress = 0x02,
    IllegalDataValue = 0x03,
    ServerDeviceFailure = 0x04,
    Acknowledge = 0x05,
    ServerDeviceBusy = 0x06,
    MemoryParityError = 0x08,
    GatewayPathUnavailable = 0x0A,
    GatewayTargetDevice = 0x0B,
}

impl ExceptionCode {
    pub(crate) const fn description(self) -> &'static str {
        match self {
            Self::IllegalFunction => "Illegal function",
            Self::IllegalDataAddress => "Illegal data address",
            Self::IllegalDataValue => "Illegal data value",
            Self::ServerDeviceFailure => "Server device failure",
            Self::Acknowledge => "Acknowledge",
            Self::ServerDeviceBusy => "Server device busy",
            Self::MemoryParityError => "Memory parity error",
            Self::GatewayPathUnavailable => "Gateway path unavailable",
            Self::GatewayTargetDevice => "Gateway target device failed to respond",
        }
    }

    /// Get the underlying value of the [`ExceptionCode`].
    #[must_use]
    pub const fn value(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for ExceptionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

impl error::Error for ExceptionCode {}

/// A server (slave) exception response.
///
/// The function field carries the raw byte of the request that failed so
/// that exception frames for undefined function codes can be represented
/// and echoed on the wire as `function | 0x80`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionResponse {
    pub function: u8,
    pub exception: ExceptionCode,
}

impl ExceptionResponse {
    pub(crate) const fn new(function: FunctionCode, exception: ExceptionCode) -> Self {
        Self {
            function: function.value(),
            exception,
        }
    }
}

impl fmt::Display for ExceptionResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Modbus function 0x{:0>2X}: {}",
            self.function, self.exception
        )
    }
}

impl error::Error for ExceptionResponse {}

/// Represents a message from the client (master) to the server (slave).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RequestPdu(pub(crate) Request);

impl From<Request> for RequestPdu {
    fn from(from: Request) -> Self {
        RequestPdu(from)
    }
}

impl From<RequestPdu> for Request {
    fn from(from: RequestPdu) -> Self {
        from.0
    }
}

/// Represents a message from the server (slave) to the client (master).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ResponsePdu(pub(crate) std::result::Result<Response, ExceptionResponse>);

impl From<Response> for ResponsePdu {
    fn from(from: Response) -> Self {
        ResponsePdu(Ok(from))
    }
}

impl From<ExceptionResponse> for ResponsePdu {
    fn from(from: ExceptionResponse) -> Self {
        ResponsePdu(Err(from))
    }
}

impl From<ResponsePdu> for std::result::Result<Response, ExceptionResponse> {
    fn from(from: ResponsePdu) -> Self {
        from.0
    }
}
