// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Library Error type

use thiserror::Error;

use crate::frame::ExceptionResponse;

/// A specialized [`Result`](std::result::Result) type for Modbus operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Modbus errors.
///
/// Every fallible operation of this crate reports one of these kinds.
/// Server exceptions are first-class errors: a request that the device
/// answered with an exception code fails with [`Error::Exception`].
#[derive(Debug, Error)]
pub enum Error {
    /// The server responded with (or a local check produced) a Modbus
    /// exception.
    #[error(transparent)]
    Exception(#[from] ExceptionResponse),

    /// The decoded function byte is not a known function code.
    #[error("invalid function code: 0x{0:0>2X}")]
    InvalidFunctionCode(u8),

    /// Structural parse failure, e.g. a mis-sized body or a byte count
    /// that contradicts the announced quantity.
    #[error("invalid packet: {0}")]
    InvalidPacket(&'static str),

    /// The MBAP length field is inconsistent with the received bytes.
    #[error("invalid MBAP length: length field {length} with {available} byte(s) available")]
    InvalidLength { length: usize, available: usize },

    /// The response does not belong to the request, i.e. the transaction
    /// id, unit id or echoed payload does not match.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// No response arrived within the configured response timeout.
    #[error("request timed out")]
    Timeout,

    /// The transport has been closed by the peer or by `disconnect`.
    #[error("transport closed")]
    TransportClosed,

    /// General I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
