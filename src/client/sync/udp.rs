// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! UDP client connections

use std::{net::SocketAddr, time::Duration};

use crate::{
    client::udp::connect_with as async_connect_with,
    error::Result,
    unit::Unit,
};

use super::Context;

const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Establish a direct connection to a Modbus UDP coupler.
pub fn connect(socket_addr: SocketAddr) -> Result<Context> {
    connect_unit(socket_addr, Unit::tcp_device())
}

/// Connect to a Modbus device, probably through a gateway that is
/// forwarding messages to/from the corresponding unit.
pub fn connect_unit(socket_addr: SocketAddr, unit: Unit) -> Result<Context> {
    connect_with(socket_addr, unit, DEFAULT_RESPONSE_TIMEOUT)
}

/// Connect with an explicit response timeout.
pub fn connect_with(
    socket_addr: SocketAddr,
    unit: Unit,
    response_timeout: Duration,
) -> Result<Context> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let async_ctx = runtime.block_on(async_connect_with(socket_addr, unit, response_timeout))?;
    Ok(Context {
        runtime,
        async_ctx,
        timeout: None,
    })
}
