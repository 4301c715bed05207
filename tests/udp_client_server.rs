// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Single-datagram client/server round trips.

#![cfg(feature = "udp-server")]

use std::{net::SocketAddr, sync::Arc, time::Duration};

use tokio::net::UdpSocket;

use modbus_net::{
    client,
    prelude::*,
    server::{
        memory::{MemoryConfig, MemoryService},
        udp::Server,
    },
};

async fn spawn_server(service: Arc<MemoryService>) -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let server_addr = socket.local_addr().unwrap();
    let server = Server::new(socket);
    tokio::spawn(async move { server.serve(&service).await });
    tokio::time::sleep(Duration::from_millis(100)).await;
    server_addr
}

#[tokio::test]
async fn read_and_write_over_udp() -> anyhow::Result<()> {
    let service = Arc::new(MemoryService::default());
    service.set_input_registers(0x0000, &[0x0077]).unwrap();
    let server_addr = spawn_server(Arc::clone(&service)).await;

    let mut ctx = client::udp::connect(server_addr).await?;

    assert_eq!(ctx.read_input_registers(0x0000, 1).await?, [0x0077]);

    ctx.write_multiple_registers(0x0010, &[0x0004, 0x0002]).await?;
    assert_eq!(
        ctx.read_holding_registers(0x0010, 2).await?,
        [0x0004, 0x0002]
    );

    ctx.write_single_coil(0x0003, true).await?;
    assert_eq!(ctx.read_coils(0x0000, 4).await?, [false, false, false, true]);

    Ok(())
}

#[tokio::test]
async fn udp_exception_round_trip() -> anyhow::Result<()> {
    let service = Arc::new(MemoryService::new(MemoryConfig {
        coils: 8,
        discrete_inputs: 8,
        holding_registers: 8,
        input_registers: 8,
    }));
    let server_addr = spawn_server(service).await;

    let mut ctx = client::udp::connect(server_addr).await?;

    let err = ctx.read_holding_registers(8, 1).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Exception(ExceptionResponse {
            function: 0x03,
            exception: ExceptionCode::IllegalDataAddress,
        })
    ));

    // The next datagram exchange still works.
    assert_eq!(ctx.read_holding_registers(0, 1).await?, [0]);

    Ok(())
}

#[tokio::test]
async fn unanswered_request_times_out() -> anyhow::Result<()> {
    // Nobody listens on this socket.
    let blackhole = UdpSocket::bind("127.0.0.1:0").await?;
    let server_addr = blackhole.local_addr()?;

    let mut ctx =
        client::udp::connect_with(server_addr, Unit::tcp_device(), Duration::from_millis(50))
            .await?;
    let err = ctx.read_coils(0, 1).await.unwrap_err();
    assert!(matches!(err, Error::Timeout));

    Ok(())
}
