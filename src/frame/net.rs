// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! MBAP framing types shared by the TCP and UDP transports.

use super::{RequestPdu, ResponsePdu};

use crate::unit::UnitId;

/// A 16 bit token echoed by the server, used to match replies to requests.
pub(crate) type TransactionId = u16;

/// The variable parts of an MBAP header.
///
/// The protocol identifier is the constant `0x0000` and the length field is
/// derived from the PDU, so neither is carried around explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Header {
    pub(crate) transaction_id: TransactionId,
    pub(crate) unit_id: UnitId,
}

/// A framed request: MBAP header plus request PDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RequestAdu {
    pub(crate) hdr: Header,
    pub(crate) pdu: RequestPdu,
}

/// A framed response: MBAP header plus response PDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ResponseAdu {
    pub(crate) hdr: Header,
    pub(crate) pdu: ResponsePdu,
}
