// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus clients

#[cfg(feature = "sync")]
#[cfg(any(feature = "tcp", feature = "udp"))]
pub mod sync;

#[cfg(feature = "tcp")]
pub mod tcp;

#[cfg(feature = "udp")]
pub mod udp;

use std::fmt;

use async_trait::async_trait;

use crate::{
    error::{Error, Result},
    frame::{Address, Coil, Quantity, Request, Response, Word},
    unit::{Unit, UnitContext},
};

/// A transport independent asynchronous client trait.
#[async_trait]
pub trait Client: UnitContext + fmt::Debug + Send {
    /// Invoke a Modbus operation and await the matching response.
    ///
    /// Dropping the returned future cancels the wait for the response
    /// without closing the connection.
    async fn call(&mut self, req: Request) -> Result<Response>;

    /// Disconnect the underlying transport.
    ///
    /// An in-flight read on the transport fails with
    /// [`Error::TransportClosed`] instead of blocking indefinitely.
    async fn disconnect(&mut self) -> Result<()>;
}

/// An asynchronous Modbus client context.
#[derive(Debug)]
pub struct Context {
    client: Box<dyn Client>,
}

impl Context {
    /// Invoke a Modbus operation and await the matching response.
    pub async fn call(&mut self, req: Request) -> Result<Response> {
        self.client.call(req).await
    }

    /// Disconnect the underlying transport.
    pub async fn disconnect(&mut self) -> Result<()> {
        self.client.disconnect().await
    }
}

impl From<Box<dyn Client>> for Context {
    fn from(client: Box<dyn Client>) -> Self {
        Self { client }
    }
}

impl From<Context> for Box<dyn Client> {
    fn from(from: Context) -> Self {
        from.client
    }
}

#[async_trait]
impl Client for Context {
    async fn call(&mut self, req: Request) -> Result<Response> {
        self.client.call(req).await
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.client.disconnect().await
    }
}

impl UnitContext for Context {
    fn set_unit(&mut self, unit: Unit) {
        self.client.set_unit(unit);
    }
}

/// An asynchronous Modbus reader.
#[async_trait]
pub trait Reader: Client {
    /// Read multiple coils (0x01)
    async fn read_coils(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Coil>>;

    /// Read multiple discrete inputs (0x02)
    async fn read_discrete_inputs(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Coil>>;

    /// Read multiple holding registers (0x03)
    async fn read_holding_registers(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Word>>;

    /// Read multiple input registers (0x04)
    async fn read_input_registers(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Word>>;
}

/// An asynchronous Modbus writer.
#[async_trait]
pub trait Writer: Client {
    /// Write a single coil (0x05)
    async fn write_single_coil(&mut self, addr: Address, coil: Coil) -> Result<()>;

    /// Write a single holding register (0x06)
    async fn write_single_register(&mut self, addr: Address, word: Word) -> Result<()>;

    /// Write multiple coils (0x0F)
    async fn write_multiple_coils(&mut self, addr: Address, coils: &[Coil]) -> Result<()>;

    /// Write multiple holding registers (0x10)
    async fn write_multiple_registers(&mut self, addr: Address, words: &[Word]) -> Result<()>;
}

fn unexpected_rsp(req: &Request, rsp: &Response) -> Error {
    Error::UnexpectedResponse(format!(
        "request {} answered with {}",
        req.function_code(),
        rsp.function_code()
    ))
}

fn echo_mismatch(rsp: &Response) -> Error {
    Error::UnexpectedResponse(format!(
        "response {} does not echo the request",
        rsp.function_code()
    ))
}

#[async_trait]
impl Reader for Context {
    async fn read_coils(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Coil>> {
        let req = Request::ReadCoils(addr, cnt);
        match self.client.call(req.clone()).await? {
            Response::ReadCoils(coils) => {
                debug_assert_eq!(coils.len(), usize::from(cnt));
                Ok(coils)
            }
            rsp => Err(unexpected_rsp(&req, &rsp)),
        }
    }

    async fn read_discrete_inputs(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Coil>> {
        let req = Request::ReadDiscreteInputs(addr, cnt);
        match self.client.call(req.clone()).await? {
            Response::ReadDiscreteInputs(inputs) => {
                debug_assert_eq!(inputs.len(), usize::from(cnt));
                Ok(inputs)
            }
            rsp => Err(unexpected_rsp(&req, &rsp)),
        }
    }

    async fn read_holding_registers(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Word>> {
        let req = Request::ReadHoldingRegisters(addr, cnt);
        match self.client.call(req.clone()).await? {
            Response::ReadHoldingRegisters(words) => {
                debug_assert_eq!(words.len(), usize::from(cnt));
                Ok(words)
            }
            rsp => Err(unexpected_rsp(&req, &rsp)),
        }
    }

    async fn read_input_registers(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Word>> {
        let req = Request::ReadInputRegisters(addr, cnt);
        match self.client.call(req.clone()).await? {
            Response::ReadInputRegisters(words) => {
                debug_assert_eq!(words.len(), usize::from(cnt));
                Ok(words)
            }
            rsp => Err(unexpected_rsp(&req, &rsp)),
        }
    }
}

#[async_trait]
impl Writer for Context {
    async fn write_single_coil(&mut self, addr: Address, coil: Coil) -> Result<()> {
        let req = Request::WriteSingleCoil(addr, coil);
        match self.client.call(req.clone()).await? {
            Response::WriteSingleCoil(rsp_addr, rsp_coil) => {
                if rsp_addr != addr || rsp_coil != coil {
                    return Err(echo_mismatch(&Response::WriteSingleCoil(rsp_addr, rsp_coil)));
                }
                Ok(())
            }
            rsp => Err(unexpected_rsp(&req, &rsp)),
        }
    }

    async fn write_single_register(&mut self, addr: Address, word: Word) -> Result<()> {
        let req = Request::WriteSingleRegister(addr, word);
        match self.client.call(req.clone()).await? {
            Response::WriteSingleRegister(rsp_addr, rsp_word) => {
                if rsp_addr != addr || rsp_word != word {
                    return Err(echo_mismatch(&Response::WriteSingleRegister(
                        rsp_addr, rsp_word,
                    )));
                }
                Ok(())
            }
            rsp => Err(unexpected_rsp(&req, &rsp)),
        }
    }

    async fn write_multiple_coils(&mut self, addr: Address, coils: &[Coil]) -> Result<()> {
        let cnt = coils.len();
        let req = Request::WriteMultipleCoils(addr, coils.to_vec());
        match self.client.call(req.clone()).await? {
            Response::WriteMultipleCoils(rsp_addr, rsp_cnt) => {
                if rsp_addr != addr || usize::from(rsp_cnt) != cnt {
                    return Err(echo_mismatch(&Response::WriteMultipleCoils(
                        rsp_addr, rsp_cnt,
                    )));
                }
                Ok(())
            }
            rsp => Err(unexpected_rsp(&req, &rsp)),
        }
    }

    async fn write_multiple_registers(&mut self, addr: Address, words: &[Word]) -> Result<()> {
        let cnt = words.len();
        let req = Request::WriteMultipleRegisters(addr, words.to_vec());
        match self.client.call(req.clone()).await? {
            Response::WriteMultipleRegisters(rsp_addr, rsp_cnt) => {
                if rsp_addr != addr || usize::from(rsp_cnt) != cnt {
                    return Err(echo_mismatch(&Response::WriteMultipleRegisters(
                        rsp_addr, rsp_cnt,
                    )));
                }
                Ok(())
            }
            rsp => Err(unexpected_rsp(&req, &rsp)),
        }
    }
}
