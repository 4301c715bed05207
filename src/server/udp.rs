// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus UDP server
//!
//! Each datagram carries exactly one MBAP frame. There is no connection
//! state: requests are answered to whatever peer address they came from,
//! and malformed datagrams are dropped without affecting other peers.

use std::io;

use bytes::BytesMut;
use tokio::net::UdpSocket;
use tokio_util::codec::{Decoder as _, Encoder as _};

use crate::{
    codec::net::{AduDecoder, ServerCodec, MAX_ADU_LEN},
    frame::{net::ResponseAdu, ExceptionCode, Request, Response},
    server::{io_error, respond_to, Service, Terminated},
};

/// A Modbus UDP server.
#[derive(Debug)]
pub struct Server {
    socket: UdpSocket,
}

impl Server {
    /// Attach the Modbus server to a bound UDP socket.
    #[must_use]
    pub fn new(socket: UdpSocket) -> Self {
        Self { socket }
    }

    /// The local address the server is bound to.
    pub fn local_addr(&self) -> io::Result<std::net::SocketAddr> {
        self.socket.local_addr()
    }

    /// Process one datagram after another.
    ///
    /// Only I/O errors on the socket are fatal; datagrams that cannot be
    /// decoded are logged and dropped.
    pub async fn serve<S>(&self, service: &S) -> io::Result<()>
    where
        S: Service<Request = Request, Response = Response, Exception = ExceptionCode> + Sync,
    {
        let mut buf = [0; MAX_ADU_LEN];
        loop {
            let (n, peer) = self.socket.recv_from(&mut buf).await?;

            let mut bytes = BytesMut::from(&buf[..n]);
            let (hdr, pdu_data) = match AduDecoder.decode(&mut bytes) {
                Ok(Some(decoded)) => decoded,
                Ok(None) => {
                    log::warn!("Dropping truncated datagram from {peer}");
                    continue;
                }
                Err(err) => {
                    log::warn!("Dropping malformed datagram from {peer}: {err}");
                    continue;
                }
            };

            let Some(pdu) = respond_to(service, pdu_data).await else {
                log::warn!("Dropping empty request PDU from {peer}");
                continue;
            };

            let mut rsp = BytesMut::with_capacity(MAX_ADU_LEN);
            ServerCodec::default()
                .encode(ResponseAdu { hdr, pdu }, &mut rsp)
                .map_err(io_error)?;
            self.socket.send_to(&rsp, peer).await?;
        }
    }

    /// Start a Modbus UDP server that is terminated by `abort_signal`.
    pub async fn serve_until<S, X>(self, service: &S, abort_signal: X) -> io::Result<Terminated>
    where
        S: Service<Request = Request, Response = Response, Exception = ExceptionCode> + Sync,
        X: std::future::Future<Output = ()> + Sync + Send + Unpin + 'static,
    {
        tokio::select! {
            res = self.serve(service) => res.map(|()| Terminated::Finished),
            () = abort_signal => {
                log::trace!("Shutdown signal received");
                Ok(Terminated::Aborted)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::server::memory::MemoryService;

    #[tokio::test]
    async fn serve_answers_datagrams() {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let server_addr = socket.local_addr().unwrap();
        let server = Server::new(socket);
        let server_task = tokio::spawn(async move {
            let service = MemoryService::default();
            server.serve(&service).await
        });

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.connect(server_addr).await.unwrap();
        client
            .send(&[
                0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x01, 0x04, 0x00, 0x00, 0x00, 0x01,
            ])
            .await
            .unwrap();
        let mut rsp = [0; MAX_ADU_LEN];
        let n = client.recv(&mut rsp).await.unwrap();
        assert_eq!(
            &rsp[..n],
            &[0x00, 0x01, 0x00, 0x00, 0x00, 0x05, 0x01, 0x04, 0x02, 0x00, 0x00]
        );

        // A malformed datagram is dropped and the server keeps going.
        client.send(&[0xFF]).await.unwrap();
        client
            .send(&[
                0x00, 0x02, 0x00, 0x00, 0x00, 0x06, 0x01, 0x04, 0x00, 0x00, 0x00, 0x01,
            ])
            .await
            .unwrap();
        let n = client.recv(&mut rsp).await.unwrap();
        assert_eq!(rsp[..2], [0x00, 0x02]);
        assert_eq!(n, 11);

        server_task.abort();
    }
}
