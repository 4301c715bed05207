// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus TCP server

use std::{future::Future, io, net::SocketAddr};

use futures_util::{sink::SinkExt as _, stream::StreamExt as _};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::{TcpListener, TcpStream},
    task::JoinSet,
};
use tokio_util::codec::Framed;

use crate::{
    codec::net::ServerCodec,
    frame::{net::ResponseAdu, ExceptionCode, Request, Response},
    server::{io_error, respond_to, Service, Terminated},
};

/// Accept a freshly connected client and build the service serving it.
///
/// A plain pass-through adapter between [`Server::serve`]'s `on_connected`
/// hook and a `new_service` factory that only cares about the peer address.
/// Returning `Ok(None)` from the factory rejects the connection.
pub fn accept_tcp_connection<S, NewService>(
    stream: TcpStream,
    socket_addr: SocketAddr,
    new_service: NewService,
) -> io::Result<Option<(S, TcpStream)>>
where
    NewService: Fn(SocketAddr) -> io::Result<Option<S>>,
{
    let service = new_service(socket_addr)?;
    Ok(service.map(|service| (service, stream)))
}

/// A Modbus TCP server.
///
/// The listener task accepts connections and spawns one task per
/// connection. Shutting down cancels all connection tasks and awaits
/// them, which closes the client sockets promptly.
#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
}

impl Server {
    /// Attach the Modbus server to a TCP socket server.
    #[must_use]
    pub fn new(listener: TcpListener) -> Self {
        Self { listener }
    }

    /// The local address the server is listening on.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Listen for incoming connections and start a Modbus TCP server task
    /// for each connection.
    ///
    /// `on_connected` is responsible for creating both the service and the
    /// transport layer of the connection; [`accept_tcp_connection`] covers
    /// the common case. `on_process_error` is invoked with the error that
    /// terminated a connection task.
    pub async fn serve<S, T, F, OnConnected, OnProcessError>(
        &self,
        on_connected: &OnConnected,
        on_process_error: OnProcessError,
    ) -> io::Result<()>
    where
        S: Service<Request = Request, Response = Response, Exception = ExceptionCode>
            + Send
            + Sync
            + 'static,
        T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
        F: Future<Output = io::Result<Option<(S, T)>>>,
        OnConnected: Fn(TcpStream, SocketAddr) -> F,
        OnProcessError: FnOnce(io::Error) + Clone + Send + 'static,
    {
        let mut connections = JoinSet::new();
        let result = serve_loop(
            &self.listener,
            &mut connections,
            on_connected,
            on_process_error,
        )
        .await;
        connections.shutdown().await;
        result
    }

    /// Start a Modbus TCP server that is terminated by `abort_signal`.
    ///
    /// On abort the listener stops accepting, all connection tasks are
    /// cancelled and awaited, and their sockets are closed.
    pub async fn serve_until<S, T, F, X, OnConnected, OnProcessError>(
        self,
        on_connected: &OnConnected,
        on_process_error: OnProcessError,
        abort_signal: X,
    ) -> io::Result<Terminated>
    where
        S: Service<Request = Request, Response = Response, Exception = ExceptionCode>
            + Send
            + Sync
            + 'static,
        T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
        F: Future<Output = io::Result<Option<(S, T)>>>,
        X: Future<Output = ()> + Sync + Send + Unpin + 'static,
        OnConnected: Fn(TcpStream, SocketAddr) -> F,
        OnProcessError: FnOnce(io::Error) + Clone + Send + 'static,
    {
        let mut connections = JoinSet::new();
        let result = tokio::select! {
            res = serve_loop(&self.listener, &mut connections, on_connected, on_process_error) => {
                res.map(|()| Terminated::Finished)
            }
            () = abort_signal => {
                log::trace!("Shutdown signal received");
                Ok(Terminated::Aborted)
            }
        };
        connections.shutdown().await;
        result
    }
}

async fn serve_loop<S, T, F, OnConnected, OnProcessError>(
    listener: &TcpListener,
    connections: &mut JoinSet<()>,
    on_connected: &OnConnected,
    on_process_error: OnProcessError,
) -> io::Result<()>
where
    S: Service<Request = Request, Response = Response, Exception = ExceptionCode>
        + Send
        + Sync
        + 'static,
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    F: Future<Output = io::Result<Option<(S, T)>>>,
    OnConnected: Fn(TcpStream, SocketAddr) -> F,
    OnProcessError: FnOnce(io::Error) + Clone + Send + 'static,
{
    loop {
        // Reap connection tasks that have run to completion.
        while connections.try_join_next().is_some() {}

        let (stream, socket_addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) if is_transient_accept_error(&err) => {
                log::warn!("Failed to accept connection: {err}");
                continue;
            }
            Err(err) => return Err(err),
        };
        log::debug!("Accepted connection from {socket_addr}");

        let Some((service, transport)) = on_connected(stream, socket_addr).await? else {
            log::debug!("Rejected connection from {socket_addr}");
            continue;
        };

        let on_process_error = on_process_error.clone();
        connections.spawn(async move {
            log::debug!("Processing requests from {socket_addr}");
            if let Err(err) = process(transport, service).await {
                on_process_error(err);
            }
        });
    }
}

fn is_transient_accept_error(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::TimedOut
            | io::ErrorKind::WouldBlock
    )
}

/// The request-response loop of a single connection.
///
/// Modbus-semantic failures are answered with exception frames and keep
/// the connection alive; transport failures terminate it. The response
/// frame echoes the transaction id and unit id of the request.
async fn process<S, T>(transport: T, service: S) -> io::Result<()>
where
    S: Service<Request = Request, Response = Response, Exception = ExceptionCode> + Send + Sync,
    T: AsyncRead + AsyncWrite + Unpin,
{
    let mut framed = Framed::new(transport, ServerCodec::default());

    loop {
        let Some(next) = framed.next().await else {
            log::debug!("Connection closed by peer");
            break;
        };
        // A framing error leaves the stream unsynchronized, there is no
        // way to recover except dropping the connection.
        let (hdr, pdu_data) = next.map_err(io_error)?;

        let Some(pdu) = respond_to(&service, pdu_data).await else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "empty request PDU",
            ));
        };

        framed
            .send(ResponseAdu { hdr, pdu })
            .await
            .map_err(io_error)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::future;

    use crate::server::memory::MemoryService;

    #[tokio::test]
    async fn process_answers_requests_and_stops_on_eof() {
        let (client_side, server_side) = tokio::io::duplex(1024);
        let service = MemoryService::default();
        let connection = tokio::spawn(process(server_side, service));

        use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
        let mut client_side = client_side;
        client_side
            .write_all(&[
                0x00, 0x02, 0x00, 0x00, 0x00, 0x06, 0x01, 0x03, 0x00, 0x00, 0x00, 0x02,
            ])
            .await
            .unwrap();
        let mut rsp = [0; 13];
        client_side.read_exact(&mut rsp).await.unwrap();
        assert_eq!(
            rsp,
            [0x00, 0x02, 0x00, 0x00, 0x00, 0x07, 0x01, 0x03, 0x04, 0x00, 0x00, 0x00, 0x00]
        );

        drop(client_side);
        connection.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn process_keeps_the_connection_after_an_exception() {
        let (client_side, server_side) = tokio::io::duplex(1024);
        let service = MemoryService::default();
        let _connection = tokio::spawn(process(server_side, service));

        use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
        let mut client_side = client_side;
        // Unknown function code 0x2B.
        client_side
            .write_all(&[0x00, 0x01, 0x00, 0x00, 0x00, 0x03, 0x01, 0x2B, 0x0E])
            .await
            .unwrap();
        let mut rsp = [0; 9];
        client_side.read_exact(&mut rsp).await.unwrap();
        assert_eq!(rsp, [0x00, 0x01, 0x00, 0x00, 0x00, 0x03, 0x01, 0xAB, 0x01]);

        // The connection is still usable afterwards.
        client_side
            .write_all(&[
                0x00, 0x02, 0x00, 0x00, 0x00, 0x06, 0x01, 0x01, 0x00, 0x00, 0x00, 0x01,
            ])
            .await
            .unwrap();
        let mut rsp = [0; 10];
        client_side.read_exact(&mut rsp).await.unwrap();
        assert_eq!(
            rsp,
            [0x00, 0x02, 0x00, 0x00, 0x00, 0x04, 0x01, 0x01, 0x01, 0x00]
        );
    }

    #[tokio::test]
    async fn out_of_range_read_is_answered_with_exception_frame() {
        let (client_side, server_side) = tokio::io::duplex(1024);
        let service = MemoryService::new(crate::server::memory::MemoryConfig {
            coils: 16,
            discrete_inputs: 16,
            holding_registers: 16,
            input_registers: 16,
        });
        let _connection = tokio::spawn(process(server_side, service));

        use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
        let mut client_side = client_side;
        client_side
            .write_all(&[
                0x00, 0x02, 0x00, 0x00, 0x00, 0x06, 0x01, 0x01, 0x00, 0x10, 0x00, 0x01,
            ])
            .await
            .unwrap();
        let mut rsp = [0; 9];
        client_side.read_exact(&mut rsp).await.unwrap();
        assert_eq!(rsp, [0x00, 0x02, 0x00, 0x00, 0x00, 0x03, 0x01, 0x81, 0x02]);
    }

    #[tokio::test]
    async fn process_service_future() {
        #[derive(Clone)]
        struct DummyService {
            response: Response,
        }

        impl Service for DummyService {
            type Request = Request;
            type Response = Response;
            type Exception = ExceptionCode;
            type Future = future::Ready<Result<Self::Response, Self::Exception>>;

            fn call(&self, _: Self::Request) -> Self::Future {
                future::ready(Ok(self.response.clone()))
            }
        }

        let service = DummyService {
            response: Response::ReadInputRegisters(vec![0x33]),
        };
        let rsp = service
            .call(Request::ReadInputRegisters(0, 1))
            .await
            .unwrap();
        assert_eq!(rsp, service.response);
    }
}
