// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Synchronous Modbus client
//!
//! A blocking facade over the asynchronous client for applications that do
//! not run their own executor. Each context owns a single-threaded runtime.

#[cfg(feature = "tcp")]
pub mod tcp;

#[cfg(feature = "udp")]
pub mod udp;

use std::{future::Future, time::Duration};

use futures_util::future::Either;

use crate::{
    error::{Error, Result},
    frame::{Address, Coil, Quantity, Request, Response, Word},
    unit::{Unit, UnitContext},
};

use super::{Context as AsyncContext, Reader as AsyncReader, Writer as AsyncWriter};

fn block_on_with_timeout<T>(
    runtime: &tokio::runtime::Runtime,
    timeout: Option<Duration>,
    task: impl Future<Output = Result<T>>,
) -> Result<T> {
    let task = if let Some(duration) = timeout {
        Either::Left(async move {
            tokio::time::timeout(duration, task)
                .await
                .unwrap_or_else(|_elapsed| Err(Error::Timeout))
        })
    } else {
        Either::Right(task)
    };
    runtime.block_on(task)
}

/// A transport independent synchronous client trait.
pub trait Client: UnitContext {
    fn call(&mut self, req: Request) -> Result<Response>;
}

/// A transport independent synchronous reader trait.
///
/// The synchronous counterpart of the asynchronous [`Reader`](`crate::client::Reader`) trait.
pub trait Reader: Client {
    fn read_coils(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Coil>>;
    fn read_discrete_inputs(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Coil>>;
    fn read_holding_registers(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Word>>;
    fn read_input_registers(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Word>>;
}

/// A transport independent synchronous writer trait.
///
/// The synchronous counterpart of the asynchronous [`Writer`](`crate::client::Writer`) trait.
pub trait Writer: Client {
    fn write_single_coil(&mut self, addr: Address, coil: Coil) -> Result<()>;
    fn write_single_register(&mut self, addr: Address, word: Word) -> Result<()>;
    fn write_multiple_coils(&mut self, addr: Address, coils: &[Coil]) -> Result<()>;
    fn write_multiple_registers(&mut self, addr: Address, words: &[Word]) -> Result<()>;
}

/// A synchronous Modbus client context.
#[derive(Debug)]
pub struct Context {
    runtime: tokio::runtime::Runtime,
    async_ctx: AsyncContext,
    timeout: Option<Duration>,
}

impl Context {
    /// Returns the current timeout.
    ///
    /// This is an additional timeout around each whole blocking operation,
    /// independent of the response timeout of the underlying connection.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Sets a timeout duration for all subsequent operations.
    ///
    /// The timeout is disabled by passing `None`.
    pub fn set_timeout(&mut self, duration: impl Into<Option<Duration>>) {
        self.timeout = duration.into();
    }

    /// Disables the timeout for all subsequent operations.
    pub fn reset_timeout(&mut self) {
        self.timeout = None;
    }

    /// Disconnect the underlying transport and drop the context.
    pub fn disconnect(mut self) -> Result<()> {
        let Self {
            ref runtime,
            ref mut async_ctx,
            timeout,
        } = self;
        block_on_with_timeout(runtime, timeout, async_ctx.disconnect())
    }
}

impl Client for Context {
    fn call(&mut self, req: Request) -> Result<Response> {
        block_on_with_timeout(&self.runtime, self.timeout, self.async_ctx.call(req))
    }
}

impl UnitContext for Context {
    fn set_unit(&mut self, unit: Unit) {
        self.async_ctx.set_unit(unit);
    }
}

impl Reader for Context {
    fn read_coils(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Coil>> {
        block_on_with_timeout(
            &self.runtime,
            self.timeout,
            self.async_ctx.read_coils(addr, cnt),
        )
    }

    fn read_discrete_inputs(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Coil>> {
        block_on_with_timeout(
            &self.runtime,
            self.timeout,
            self.async_ctx.read_discrete_inputs(addr, cnt),
        )
    }

    fn read_holding_registers(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Word>> {
        block_on_with_timeout(
            &self.runtime,
            self.timeout,
            self.async_ctx.read_holding_registers(addr, cnt),
        )
    }

    fn read_input_registers(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Word>> {
        block_on_with_timeout(
            &self.runtime,
            self.timeout,
            self.async_ctx.read_input_registers(addr, cnt),
        )
    }
}

impl Writer for Context {
    fn write_single_coil(&mut self, addr: Address, coil: Coil) -> Result<()> {
        block_on_with_timeout(
            &self.runtime,
            self.timeout,
            self.async_ctx.write_single_coil(addr, coil),
        )
    }

    fn write_single_register(&mut self, addr: Address, word: Word) -> Result<()> {
        block_on_with_timeout(
            &self.runtime,
            self.timeout,
            self.async_ctx.write_single_register(addr, word),
        )
    }

    fn write_multiple_coils(&mut self, addr: Address, coils: &[Coil]) -> Result<()> {
        block_on_with_timeout(
            &self.runtime,
            self.timeout,
            self.async_ctx.write_multiple_coils(addr, coils),
        )
    }

    fn write_multiple_registers(&mut self, addr: Address, words: &[Word]) -> Result<()> {
        block_on_with_timeout(
            &self.runtime,
            self.timeout,
            self.async_ctx.write_multiple_registers(addr, words),
        )
    }
}
