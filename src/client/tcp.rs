// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! TCP client connections

use std::{fmt, net::SocketAddr, time::Duration};

use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
    time::timeout,
};

use crate::{
    error::{Error, Result},
    unit::Unit,
};

use super::Context;

/// Connection options for a Modbus TCP client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Per-request response timeout.
    pub response_timeout: Duration,

    /// Timeout for establishing the connection.
    pub dial_timeout: Duration,

    /// TCP keepalive time, `None` to leave keepalive disabled.
    pub keep_alive: Option<Duration>,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_secs(1),
            dial_timeout: Duration::from_secs(5),
            keep_alive: Some(Duration::from_secs(30)),
        }
    }
}

/// Establish a direct connection to a Modbus TCP coupler.
pub async fn connect(socket_addr: SocketAddr) -> Result<Context> {
    connect_unit(socket_addr, Unit::tcp_device()).await
}

/// Connect to a physical, broadcast, or custom Modbus device,
/// probably through a Modbus TCP gateway that is forwarding
/// messages to/from the corresponding unit.
pub async fn connect_unit(socket_addr: SocketAddr, unit: Unit) -> Result<Context> {
    connect_with(socket_addr, unit, ConnectOptions::default()).await
}

/// Connect with explicit [`ConnectOptions`].
///
/// Fails with [`Error::Timeout`] if no connection could be established
/// within the dial timeout.
pub async fn connect_with(
    socket_addr: SocketAddr,
    unit: Unit,
    options: ConnectOptions,
) -> Result<Context> {
    let transport = timeout(options.dial_timeout, TcpStream::connect(socket_addr))
        .await
        .map_err(|_elapsed| Error::Timeout)??;
    if let Some(keep_alive) = options.keep_alive {
        let sock_ref = socket2::SockRef::from(&transport);
        sock_ref.set_tcp_keepalive(&socket2::TcpKeepalive::new().with_time(keep_alive))?;
    }
    Ok(attach_with(transport, unit, options.response_timeout))
}

/// Attach a new client context to a direct transport connection.
pub fn attach<T>(transport: T) -> Context
where
    T: AsyncRead + AsyncWrite + Send + Unpin + fmt::Debug + 'static,
{
    attach_unit(transport, Unit::tcp_device())
}

/// Attach a new client context to a transport connection with the
/// default response timeout.
pub fn attach_unit<T>(transport: T, unit: Unit) -> Context
where
    T: AsyncRead + AsyncWrite + Send + Unpin + fmt::Debug + 'static,
{
    attach_with(transport, unit, ConnectOptions::default().response_timeout)
}

/// Attach a new client context to a transport connection.
pub fn attach_with<T>(transport: T, unit: Unit, response_timeout: Duration) -> Context
where
    T: AsyncRead + AsyncWrite + Send + Unpin + fmt::Debug + 'static,
{
    let client = crate::service::tcp::Client::new(transport, unit, response_timeout);
    Context {
        client: Box::new(client),
    }
}
