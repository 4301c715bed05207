// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus servers

#[cfg(feature = "tcp-server")]
pub mod tcp;

#[cfg(feature = "udp-server")]
pub mod udp;

pub mod memory;

mod service;
pub use self::service::Service;

/// How a server loop has been terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminated {
    /// The server ran to completion.
    Finished,
    /// The abort signal fired and all connections have been shut down.
    Aborted,
}

#[cfg(any(feature = "tcp-server", feature = "udp-server"))]
pub(crate) use self::dispatch::{io_error, respond_to};

#[cfg(any(feature = "tcp-server", feature = "udp-server"))]
mod dispatch {
    use std::io;

    use bytes::Bytes;

    use crate::{
        error::Error,
        frame::{ExceptionCode, ExceptionResponse, Request, RequestPdu, Response, ResponsePdu},
    };

    use super::Service;

    /// Decode one request PDU, dispatch it and produce the response PDU.
    ///
    /// Modbus-semantic failures (unknown function, malformed body, count
    /// violations, handler exceptions) are answered with an exception frame
    /// echoing the original function byte with the 0x80 bit set. `None` is
    /// only returned for an empty PDU, which leaves nothing to echo.
    pub(crate) async fn respond_to<S>(service: &S, pdu_data: Bytes) -> Option<ResponsePdu>
    where
        S: Service<Request = Request, Response = Response, Exception = ExceptionCode> + Sync,
    {
        let raw_fn_code = *pdu_data.first()? & 0x7F;
        let rsp_pdu = match RequestPdu::try_from(pdu_data) {
            Ok(RequestPdu(req)) => {
                let function = req.function_code().value();
                if let Err(exception) = req.validate() {
                    log::debug!("Rejecting request with function code 0x{function:0>2X}: {exception}");
                    ResponsePdu(Err(ExceptionResponse {
                        function,
                        exception,
                    }))
                } else {
                    match service.call(req).await {
                        Ok(rsp) => ResponsePdu(Ok(rsp)),
                        Err(exception) => ResponsePdu(Err(ExceptionResponse {
                            function,
                            exception,
                        })),
                    }
                }
            }
            Err(Error::InvalidFunctionCode(fn_code)) => {
                log::warn!("Unknown function code: 0x{fn_code:0>2X}");
                ResponsePdu(Err(ExceptionResponse {
                    function: raw_fn_code,
                    exception: ExceptionCode::IllegalFunction,
                }))
            }
            Err(Error::Exception(rsp)) => ResponsePdu(Err(rsp)),
            Err(err) => {
                log::warn!("Failed to decode request: {err}");
                ResponsePdu(Err(ExceptionResponse {
                    function: raw_fn_code,
                    exception: ExceptionCode::IllegalDataValue,
                }))
            }
        };
        Some(rsp_pdu)
    }

    pub(crate) fn io_error(err: Error) -> io::Error {
        match err {
            Error::Io(err) => err,
            err => io::Error::new(io::ErrorKind::InvalidData, err),
        }
    }
}
