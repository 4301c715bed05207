// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client transaction engine for stream transports.

use std::{fmt, time::Duration};

use futures_util::{sink::SinkExt as _, stream::StreamExt as _};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    time::timeout,
};
use tokio_util::codec::Framed;

use crate::{
    codec::net::ClientCodec,
    error::{Error, Result},
    frame::{
        net::{Header, RequestAdu},
        ExceptionResponse, Request, RequestPdu, Response, ResponsePdu,
    },
    service::{verify_response_header, TransactionIds},
    unit::{Unit, UnitContext, UnitId},
};

/// Modbus TCP client
#[derive(Debug)]
pub(crate) struct Client<T> {
    framed: Framed<T, ClientCodec>,
    unit_id: UnitId,
    transaction_ids: TransactionIds,
    response_timeout: Duration,
}

impl<T> Client<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    pub(crate) fn new(transport: T, unit: Unit, response_timeout: Duration) -> Self {
        let framed = Framed::new(transport, ClientCodec::default());
        Self {
            framed,
            unit_id: unit.into(),
            transaction_ids: TransactionIds::new(),
            response_timeout,
        }
    }

    fn next_request_hdr(&self) -> Header {
        Header {
            transaction_id: self.transaction_ids.next_id(),
            unit_id: self.unit_id,
        }
    }

    /// Issue a request and await the matching response.
    ///
    /// The argument is validated against the per-function limits before
    /// anything is written to the wire. A reply whose transaction id or
    /// unit id does not match the request fails with
    /// [`Error::UnexpectedResponse`]. Dropping the returned future cancels
    /// the wait without closing the connection; the read buffer is cleared
    /// before the next request, so a stale reply cannot be mistaken for
    /// the expected one.
    pub(crate) async fn call(&mut self, req: Request) -> Result<Response> {
        log::debug!("Call {req:?}");
        if let Err(exception) = req.validate() {
            return Err(ExceptionResponse::new(req.function_code(), exception).into());
        }
        let req_hdr = self.next_request_hdr();
        let req_adu = RequestAdu {
            hdr: req_hdr,
            pdu: RequestPdu(req.clone()),
        };

        self.framed.read_buffer_mut().clear();

        self.framed.send(req_adu).await?;
        let next = timeout(self.response_timeout, self.framed.next())
            .await
            .map_err(|_elapsed| Error::Timeout)?;
        let (rsp_hdr, pdu_data) = next.ok_or(Error::TransportClosed)??;

        verify_response_header(&req_hdr, &rsp_hdr)?;

        let ResponsePdu(result) = ResponsePdu::decode(&req, &pdu_data)?;
        result.map_err(Into::into)
    }

    pub(crate) async fn disconnect(&mut self) -> Result<()> {
        self.framed.close().await
    }
}

impl<T> UnitContext for Client<T> {
    fn set_unit(&mut self, unit: Unit) {
        self.unit_id = unit.into();
    }
}

#[async_trait::async_trait]
impl<T> crate::client::Client for Client<T>
where
    T: fmt::Debug + AsyncRead + AsyncWrite + Send + Unpin,
{
    async fn call(&mut self, req: Request) -> Result<Response> {
        Client::call(self, req).await
    }

    async fn disconnect(&mut self) -> Result<()> {
        Client::disconnect(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::io::{duplex, AsyncReadExt as _, AsyncWriteExt as _, DuplexStream};

    const RESPONSE_TIMEOUT: Duration = Duration::from_millis(100);

    fn connected_client() -> (Client<DuplexStream>, DuplexStream) {
        let (client_side, server_side) = duplex(1024);
        let client = Client::new(client_side, Unit(0x01), RESPONSE_TIMEOUT);
        (client, server_side)
    }

    async fn expect_request(server_side: &mut DuplexStream, expected: &[u8]) {
        let mut buf = vec![0; expected.len()];
        server_side.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf[..], expected);
    }

    #[tokio::test]
    async fn call_matches_response_by_header() {
        let (mut client, mut server_side) = connected_client();
        let call = tokio::spawn(async move {
            let rsp = client.call(Request::ReadHoldingRegisters(0x00, 2)).await;
            (client, rsp)
        });

        // First request carries transaction id 1.
        expect_request(
            &mut server_side,
            &[
                0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x01, 0x03, 0x00, 0x00, 0x00, 0x02,
            ],
        )
        .await;
        server_side
            .write_all(&[
                0x00, 0x01, 0x00, 0x00, 0x00, 0x07, 0x01, 0x03, 0x04, 0x00, 0x06, 0x00, 0x05,
            ])
            .await
            .unwrap();

        let (_client, rsp) = call.await.unwrap();
        assert_eq!(
            rsp.unwrap(),
            Response::ReadHoldingRegisters(vec![0x0006, 0x0005])
        );
    }

    #[tokio::test]
    async fn transaction_id_mismatch() {
        let (mut client, mut server_side) = connected_client();
        let call = tokio::spawn(async move { client.call(Request::ReadCoils(0x00, 1)).await });

        expect_request(
            &mut server_side,
            &[
                0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x01, 0x01, 0x00, 0x00, 0x00, 0x01,
            ],
        )
        .await;
        // Reply with transaction id 2 instead of 1.
        server_side
            .write_all(&[0x00, 0x02, 0x00, 0x00, 0x00, 0x04, 0x01, 0x01, 0x01, 0x01])
            .await
            .unwrap();

        let err = call.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::UnexpectedResponse(_)));
    }

    #[tokio::test]
    async fn unit_id_mismatch() {
        let (mut client, mut server_side) = connected_client();
        let call = tokio::spawn(async move { client.call(Request::ReadCoils(0x00, 1)).await });

        expect_request(
            &mut server_side,
            &[
                0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x01, 0x01, 0x00, 0x00, 0x00, 0x01,
            ],
        )
        .await;
        // Reply from unit 2 instead of 1.
        server_side
            .write_all(&[0x00, 0x01, 0x00, 0x00, 0x00, 0x04, 0x02, 0x01, 0x01, 0x01])
            .await
            .unwrap();

        let err = call.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::UnexpectedResponse(_)));
    }

    #[tokio::test]
    async fn response_timeout() {
        let (mut client, _server_side) = connected_client();
        let err = client
            .call(Request::ReadCoils(0x00, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout));
    }

    #[tokio::test]
    async fn closed_transport() {
        let (mut client, server_side) = connected_client();
        drop(server_side);
        let err = client
            .call(Request::ReadCoils(0x00, 1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::TransportClosed | Error::Io(_)
        ));
    }

    #[tokio::test]
    async fn invalid_request_is_rejected_locally() {
        let (mut client, mut server_side) = connected_client();
        let err = client
            .call(Request::ReadCoils(0x00, 0))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Exception(ExceptionResponse {
                function: 0x01,
                exception: crate::frame::ExceptionCode::IllegalDataValue,
            })
        ));

        // Nothing has been written to the wire.
        let mut buf = [0; 1];
        let read = timeout(Duration::from_millis(50), server_side.read(&mut buf)).await;
        assert!(read.is_err());
    }

    #[tokio::test]
    async fn exception_response_fails_the_call() {
        let (mut client, mut server_side) = connected_client();
        let call = tokio::spawn(async move { client.call(Request::ReadCoils(0xFFF0, 0x10)).await });

        expect_request(
            &mut server_side,
            &[
                0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x01, 0x01, 0xFF, 0xF0, 0x00, 0x10,
            ],
        )
        .await;
        server_side
            .write_all(&[0x00, 0x01, 0x00, 0x00, 0x00, 0x03, 0x01, 0x81, 0x02])
            .await
            .unwrap();

        let err = call.await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            Error::Exception(ExceptionResponse {
                function: 0x01,
                exception: crate::frame::ExceptionCode::IllegalDataAddress,
            })
        ));
    }
}
