// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Default in-memory data model.

use std::{
    future,
    sync::{Mutex, MutexGuard},
};

use crate::frame::{Address, Coil, ExceptionCode, Quantity, Request, Response, Word};

use super::Service;

/// Region sizes of the in-memory data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryConfig {
    pub coils: usize,
    pub discrete_inputs: usize,
    pub holding_registers: usize,
    pub input_registers: usize,
}

impl MemoryConfig {
    /// Default number of addressable items per region.
    pub const DEFAULT_REGION_SIZE: usize = 65535;
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            coils: Self::DEFAULT_REGION_SIZE,
            discrete_inputs: Self::DEFAULT_REGION_SIZE,
            holding_registers: Self::DEFAULT_REGION_SIZE,
            input_registers: Self::DEFAULT_REGION_SIZE,
        }
    }
}

#[derive(Debug)]
struct Regions {
    coils: Vec<Coil>,
    discrete_inputs: Vec<Coil>,
    holding_registers: Vec<Word>,
    input_registers: Vec<Word>,
}

/// A [`Service`] backed by four plain in-memory regions.
///
/// Every read and write validates `address + quantity` against the region
/// size and answers out-of-range access with an `IllegalDataAddress`
/// exception. Requests are serialised by a single mutex, i.e. individual
/// calls are atomic but no ordering across calls is guaranteed.
///
/// Discrete inputs and input registers are read-only on the wire and can
/// be fed through the seed methods, e.g. from a data acquisition task.
#[derive(Debug)]
pub struct MemoryService {
    regions: Mutex<Regions>,
}

impl MemoryService {
    #[must_use]
    pub fn new(config: MemoryConfig) -> Self {
        let MemoryConfig {
            coils,
            discrete_inputs,
            holding_registers,
            input_registers,
        } = config;
        Self {
            regions: Mutex::new(Regions {
                coils: vec![false; coils],
                discrete_inputs: vec![false; discrete_inputs],
                holding_registers: vec![0; holding_registers],
                input_registers: vec![0; input_registers],
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Regions>, ExceptionCode> {
        // A poisoned lock means a handler panicked mid-write.
        self.regions
            .lock()
            .map_err(|_poisoned| ExceptionCode::ServerDeviceFailure)
    }

    /// Seed a range of coils.
    pub fn set_coils(&self, address: Address, values: &[Coil]) -> Result<(), ExceptionCode> {
        let mut regions = self.lock()?;
        let start = checked_range(address, values.len(), regions.coils.len())?;
        regions.coils[start..start + values.len()].copy_from_slice(values);
        Ok(())
    }

    /// Seed a range of discrete inputs.
    pub fn set_discrete_inputs(
        &self,
        address: Address,
        values: &[Coil],
    ) -> Result<(), ExceptionCode> {
        let mut regions = self.lock()?;
        let start = checked_range(address, values.len(), regions.discrete_inputs.len())?;
        regions.discrete_inputs[start..start + values.len()].copy_from_slice(values);
        Ok(())
    }

    /// Seed a range of holding registers.
    pub fn set_holding_registers(
        &self,
        address: Address,
        values: &[Word],
    ) -> Result<(), ExceptionCode> {
        let mut regions = self.lock()?;
        let start = checked_range(address, values.len(), regions.holding_registers.len())?;
        regions.holding_registers[start..start + values.len()].copy_from_slice(values);
        Ok(())
    }

    /// Seed a range of input registers.
    pub fn set_input_registers(
        &self,
        address: Address,
        values: &[Word],
    ) -> Result<(), ExceptionCode> {
        let mut regions = self.lock()?;
        let start = checked_range(address, values.len(), regions.input_registers.len())?;
        regions.input_registers[start..start + values.len()].copy_from_slice(values);
        Ok(())
    }

    /// Read back a range of coils.
    pub fn coils(&self, address: Address, quantity: Quantity) -> Result<Vec<Coil>, ExceptionCode> {
        let regions = self.lock()?;
        let start = checked_range(address, quantity.into(), regions.coils.len())?;
        Ok(regions.coils[start..start + usize::from(quantity)].to_vec())
    }

    /// Read back a range of holding registers.
    pub fn holding_registers(
        &self,
        address: Address,
        quantity: Quantity,
    ) -> Result<Vec<Word>, ExceptionCode> {
        let regions = self.lock()?;
        let start = checked_range(address, quantity.into(), regions.holding_registers.len())?;
        Ok(regions.holding_registers[start..start + usize::from(quantity)].to_vec())
    }

    fn handle(&self, req: Request) -> Result<Response, ExceptionCode> {
        let mut regions = self.lock()?;
        match req {
            Request::ReadCoils(address, quantity) => {
                let start = checked_range(address, quantity.into(), regions.coils.len())?;
                Ok(Response::ReadCoils(
                    regions.coils[start..start + usize::from(quantity)].to_vec(),
                ))
            }
            Request::ReadDiscreteInputs(address, quantity) => {
                let start = checked_range(address, quantity.into(), regions.discrete_inputs.len())?;
                Ok(Response::ReadDiscreteInputs(
                    regions.discrete_inputs[start..start + usize::from(quantity)].to_vec(),
                ))
            }
            Request::ReadHoldingRegisters(address, quantity) => {
                let start =
                    checked_range(address, quantity.into(), regions.holding_registers.len())?;
                Ok(Response::ReadHoldingRegisters(
                    regions.holding_registers[start..start + usize::from(quantity)].to_vec(),
                ))
            }
            Request::ReadInputRegisters(address, quantity) => {
                let start = checked_range(address, quantity.into(), regions.input_registers.len())?;
                Ok(Response::ReadInputRegisters(
                    regions.input_registers[start..start + usize::from(quantity)].to_vec(),
                ))
            }
            Request::WriteSingleCoil(address, coil) => {
                let start = checked_range(address, 1, regions.coils.len())?;
                regions.coils[start] = coil;
                Ok(Response::WriteSingleCoil(address, coil))
            }
            Request::WriteSingleRegister(address, word) => {
                let start = checked_range(address, 1, regions.holding_registers.len())?;
                regions.holding_registers[start] = word;
                Ok(Response::WriteSingleRegister(address, word))
            }
            Request::WriteMultipleCoils(address, coils) => {
                let start = checked_range(address, coils.len(), regions.coils.len())?;
                regions.coils[start..start + coils.len()].copy_from_slice(&coils);
                Ok(Response::WriteMultipleCoils(address, quantity_of(&coils)))
            }
            Request::WriteMultipleRegisters(address, words) => {
                let start = checked_range(address, words.len(), regions.holding_registers.len())?;
                regions.holding_registers[start..start + words.len()].copy_from_slice(&words);
                Ok(Response::WriteMultipleRegisters(
                    address,
                    quantity_of(&words),
                ))
            }
        }
    }
}

impl Default for MemoryService {
    fn default() -> Self {
        Self::new(MemoryConfig::default())
    }
}

impl Service for MemoryService {
    type Request = Request;
    type Response = Response;
    type Exception = ExceptionCode;
    type Future = future::Ready<Result<Self::Response, Self::Exception>>;

    fn call(&self, req: Self::Request) -> Self::Future {
        future::ready(self.handle(req))
    }
}

fn checked_range(
    address: Address,
    quantity: usize,
    size: usize,
) -> Result<usize, ExceptionCode> {
    let start = usize::from(address);
    if start + quantity <= size {
        Ok(start)
    } else {
        Err(ExceptionCode::IllegalDataAddress)
    }
}

#[allow(clippy::cast_possible_truncation)]
fn quantity_of<T>(items: &[T]) -> Quantity {
    debug_assert!(items.len() <= usize::from(Quantity::MAX));
    items.len() as Quantity
}
