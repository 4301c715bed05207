// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! UDP client connections
//!
//! One request datagram, one response datagram, no retransmission:
//! a lost datagram surfaces as a timeout and retrying is up to the caller.

use std::{
    net::{Ipv4Addr, Ipv6Addr, SocketAddr},
    time::Duration,
};

use tokio::net::UdpSocket;

use crate::{error::Result, unit::Unit};

use super::Context;

const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Establish a direct connection to a Modbus UDP coupler.
pub async fn connect(socket_addr: SocketAddr) -> Result<Context> {
    connect_unit(socket_addr, Unit::tcp_device()).await
}

/// Connect to a Modbus device, probably through a gateway that is
/// forwarding messages to/from the corresponding unit.
pub async fn connect_unit(socket_addr: SocketAddr, unit: Unit) -> Result<Context> {
    connect_with(socket_addr, unit, DEFAULT_RESPONSE_TIMEOUT).await
}

/// Connect with an explicit response timeout.
pub async fn connect_with(
    socket_addr: SocketAddr,
    unit: Unit,
    response_timeout: Duration,
) -> Result<Context> {
    let bind_addr: SocketAddr = if socket_addr.is_ipv4() {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    };
    let socket = UdpSocket::bind(bind_addr).await?;
    socket.connect(socket_addr).await?;
    Ok(attach_with(socket, unit, response_timeout))
}

/// Attach a new client context to an already connected socket.
pub fn attach_with(socket: UdpSocket, unit: Unit, response_timeout: Duration) -> Context {
    let client = crate::service::udp::Client::new(socket, unit, response_timeout);
    Context {
        client: Box::new(client),
    }
}
