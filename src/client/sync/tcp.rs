// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! TCP client connections

use std::net::SocketAddr;

use crate::{
    client::tcp::{connect_with as async_connect_with, ConnectOptions},
    error::Result,
    unit::Unit,
};

use super::Context;

/// Establish a direct connection to a Modbus TCP coupler.
pub fn connect(socket_addr: SocketAddr) -> Result<Context> {
    connect_unit(socket_addr, Unit::tcp_device())
}

/// Connect to a Modbus device, probably through a Modbus TCP gateway that
/// is forwarding messages to/from the corresponding unit.
pub fn connect_unit(socket_addr: SocketAddr, unit: Unit) -> Result<Context> {
    connect_with(socket_addr, unit, ConnectOptions::default())
}

/// Connect with explicit [`ConnectOptions`].
pub fn connect_with(
    socket_addr: SocketAddr,
    unit: Unit,
    options: ConnectOptions,
) -> Result<Context> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let async_ctx = runtime.block_on(async_connect_with(socket_addr, unit, options))?;
    Ok(Context {
        runtime,
        async_ctx,
        timeout: None,
    })
}
