// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

#[cfg(feature = "tcp")]
pub(crate) mod tcp;

#[cfg(feature = "udp")]
pub(crate) mod udp;

use std::sync::atomic::{AtomicU16, Ordering};

use crate::{
    error::{Error, Result},
    frame::net::{Header, TransactionId},
};

/// Transaction identifier allocator.
///
/// One instance per connection. Identifiers are handed out strictly
/// increasing modulo 2^16, so concurrent callers always receive distinct
/// values as long as fewer than 2^16 requests are in flight.
#[derive(Debug)]
pub(crate) struct TransactionIds {
    last: AtomicU16,
}

impl TransactionIds {
    /// The counter starts at zero, so the first issued identifier is `1`.
    pub(crate) const fn new() -> Self {
        Self {
            last: AtomicU16::new(0),
        }
    }

    pub(crate) fn next_id(&self) -> TransactionId {
        self.last.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }
}

pub(crate) fn verify_response_header(req_hdr: &Header, rsp_hdr: &Header) -> Result<()> {
    if req_hdr != rsp_hdr {
        return Err(Error::UnexpectedResponse(format!(
            "header mismatch: request = {req_hdr:?}, response = {rsp_hdr:?}"
        )));
    }
    Ok(())
}
