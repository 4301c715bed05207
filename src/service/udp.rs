// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client transaction engine for the datagram transport.
//!
//! Modbus over UDP is a single-datagram variant of MBAP: one request
//! datagram, one response datagram, no retransmission. A lost datagram
//! surfaces as [`Error::Timeout`] and retrying is left to the caller.

use std::time::Duration;

use byteorder::{BigEndian, ByteOrder};
use bytes::BytesMut;
use tokio::{net::UdpSocket, time::timeout};
use tokio_util::codec::{Decoder as _, Encoder as _};

use crate::{
    codec::net::{AduDecoder, ClientCodec, MAX_ADU_LEN},
    error::{Error, Result},
    frame::{
        net::{Header, RequestAdu},
        ExceptionResponse, Request, RequestPdu, Response, ResponsePdu,
    },
    service::{verify_response_header, TransactionIds},
    unit::{Unit, UnitContext, UnitId},
};

/// Modbus UDP client
#[derive(Debug)]
pub(crate) struct Client {
    socket: UdpSocket,
    unit_id: UnitId,
    transaction_ids: TransactionIds,
    response_timeout: Duration,
}

impl Client {
    /// The socket must already be connected to the server address.
    pub(crate) fn new(socket: UdpSocket, unit: Unit, response_timeout: Duration) -> Self {
        Self {
            socket,
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

        let mut buf = BytesMut::with_capacity(MAX_ADU_LEN);
        ClientCodec::default().encode(req_adu, &mut buf)?;
        self.socket.send(&buf).await?;

        let mut rsp_buf = [0; MAX_ADU_LEN];
        let n = timeout(self.response_timeout, self.socket.recv(&mut rsp_buf))
            .await
            .map_err(|_elapsed| Error::Timeout)??;

        let mut rsp_bytes = BytesMut::from(&rsp_buf[..n]);
        let Some((rsp_hdr, pdu_data)) = AduDecoder.decode(&mut rsp_bytes)? else {
            // A datagram must carry one complete frame.
            let length = if n >= 6 {
                usize::from(BigEndian::read_u16(&rsp_buf[4..6]))
            } else {
                0
            };
            return Err(Error::InvalidLength {
                length,
                available: n,
            });
        };

        verify_response_header(&req_hdr, &rsp_hdr)?;

        let ResponsePdu(result) = ResponsePdu::decode(&req, &pdu_data)?;
        result.map_err(Into::into)
    }

    /// There is no connection to tear down, the socket is simply dropped.
    pub(crate) async fn disconnect(&mut self) -> Result<()> {
        Ok(())
    }
}

impl UnitContext for Client {
    fn set_unit(&mut self, unit: Unit) {
        self.unit_id = unit.into();
    }
}

#[async_trait::async_trait]
impl crate::client::Client for Client {
    async fn call(&mut self, req: Request) -> Result<Response> {
        Client::call(self, req).await
    }

    async fn disconnect(&mut self) -> Result<()> {
        Client::disconnect(self).await
    }
}
