// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! PDU codec: operation values to body bytes and back.

#[cfg(any(feature = "tcp", feature = "udp"))]
pub(crate) mod net;

use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt};
use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    error::{Error, Result},
    frame::{
        is_exception_fn_code, Coil, ExceptionCode, ExceptionResponse, FunctionCode, Quantity,
        Request, RequestPdu, Response, ResponsePdu, EXCEPTION_BIT,
    },
};

/// Maximum size of an encoded PDU (function code plus body).
#[cfg(any(feature = "tcp", feature = "udp"))]
pub(crate) const MAX_PDU_LEN: usize = 253;

impl From<Request> for Bytes {
    fn from(req: Request) -> Bytes {
        let cnt = request_byte_count(&req);
        let mut data = BytesMut::with_capacity(cnt);
        data.put_u8(req.function_code().value());
        use crate::frame::Request::*;
        match req {
            ReadCoils(address, quantity)
            | ReadDiscreteInputs(address, quantity)
            | ReadHoldingRegisters(address, quantity)
            | ReadInputRegisters(address, quantity) => {
                data.put_u16(address);
                data.put_u16(quantity);
            }
            WriteSingleCoil(address, state) => {
                data.put_u16(address);
                data.put_u16(bool_to_coil(state));
            }
            WriteSingleRegister(address, word) => {
                data.put_u16(address);
                data.put_u16(word);
            }
            WriteMultipleCoils(address, coils) => {
                data.put_u16(address);
                data.put_u16(u16_len(coils.len()));
                let packed_coils = pack_coils(&coils);
                data.put_u8(u8_len(packed_coils.len()));
                for b in packed_coils {
                    data.put_u8(b);
                }
            }
            WriteMultipleRegisters(address, words) => {
                data.put_u16(address);
                data.put_u16(u16_len(words.len()));
                data.put_u8(u8_len(words.len() * 2));
                for w in words {
                    data.put_u16(w);
                }
            }
        }
        data.freeze()
    }
}

impl From<RequestPdu> for Bytes {
    fn from(pdu: RequestPdu) -> Bytes {
        pdu.0.into()
    }
}

impl From<Response> for Bytes {
    fn from(rsp: Response) -> Bytes {
        let cnt = response_byte_count(&rsp);
        let mut data = BytesMut::with_capacity(cnt);
        data.put_u8(rsp.function_code().value());
        use crate::frame::Response::*;
        match rsp {
            ReadCoils(coils) | ReadDiscreteInputs(coils) => {
                let packed_coils = pack_coils(&coils);
                data.put_u8(u8_len(packed_coils.len()));
                for b in packed_coils {
                    data.put_u8(b);
                }
            }
            ReadHoldingRegisters(registers) | ReadInputRegisters(registers) => {
                data.put_u8(u8_len(registers.len() * 2));
                for r in registers {
                    data.put_u16(r);
                }
            }
            WriteSingleCoil(address, state) => {
                data.put_u16(address);
                data.put_u16(bool_to_coil(state));
            }
            WriteSingleRegister(address, word) => {
                data.put_u16(address);
                data.put_u16(word);
            }
            WriteMultipleCoils(address, quantity) | WriteMultipleRegisters(address, quantity) => {
                data.put_u16(address);
                data.put_u16(quantity);
            }
        }
        data.freeze()
    }
}

impl From<ExceptionResponse> for Bytes {
    fn from(ex: ExceptionResponse) -> Bytes {
        let mut data = BytesMut::with_capacity(2);
        debug_assert!(!is_exception_fn_code(ex.function));
        data.put_u8(ex.function | EXCEPTION_BIT);
        data.put_u8(ex.exception.value());
        data.freeze()
    }
}

impl From<ResponsePdu> for Bytes {
    fn from(pdu: ResponsePdu) -> Bytes {
        pdu.0.map_or_else(Into::into, Into::into)
    }
}

impl TryFrom<u8> for ExceptionCode {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self> {
        use crate::frame::ExceptionCode::*;
        let ex = match code {
            0x01 => IllegalFunction,
            0x02 => IllegalDataAddress,
            0x03 => IllegalDataValue,
            0x04 => ServerDeviceFailure,
            0x05 => Acknowledge,
            0x06 => ServerDeviceBusy,
            0x08 => MemoryParityError,
            0x0A => GatewayPathUnavailable,
            0x0B => GatewayTargetDevice,
            _ => return Err(Error::InvalidPacket("undefined exception code")),
        };
        Ok(ex)
    }
}

impl TryFrom<Bytes> for Request {
    type Error = Error;

    /// Strict request decoding for the server side: the body must have
    /// exactly the length implied by the function code and the announced
    /// counts.
    fn try_from(bytes: Bytes) -> Result<Self> {
        use crate::frame::Request::*;
        if bytes.is_empty() {
            return Err(Error::InvalidPacket("empty PDU"));
        }
        let mut rdr = Cursor::new(&bytes);
        let fn_code = rdr.read_u8()?;
        let Some(function) = FunctionCode::new(fn_code) else {
            return Err(Error::InvalidFunctionCode(fn_code));
        };
        let req = match function {
            FunctionCode::ReadCoils
            | FunctionCode::ReadDiscreteInputs
            | FunctionCode::ReadHoldingRegisters
            | FunctionCode::ReadInputRegisters => {
                check_len(&bytes, 5)?;
                let address = rdr.read_u16::<BigEndian>()?;
                let quantity = rdr.read_u16::<BigEndian>()?;
                match function {
                    FunctionCode::ReadCoils => ReadCoils(address, quantity),
                    FunctionCode::ReadDiscreteInputs => ReadDiscreteInputs(address, quantity),
                    FunctionCode::ReadHoldingRegisters => ReadHoldingRegisters(address, quantity),
                    _ => ReadInputRegisters(address, quantity),
                }
            }
            FunctionCode::WriteSingleCoil => {
                check_len(&bytes, 5)?;
                let address = rdr.read_u16::<BigEndian>()?;
                let coil = coil_to_bool(rdr.read_u16::<BigEndian>()?).map_err(|_| {
                    Error::Exception(ExceptionResponse::new(
                        FunctionCode::WriteSingleCoil,
                        ExceptionCode::IllegalDataValue,
                    ))
                })?;
                WriteSingleCoil(address, coil)
            }
            FunctionCode::WriteSingleRegister => {
                check_len(&bytes, 5)?;
                WriteSingleRegister(rdr.read_u16::<BigEndian>()?, rdr.read_u16::<BigEndian>()?)
            }
            FunctionCode::WriteMultipleCoils => {
                if bytes.len() < 6 {
                    return Err(Error::InvalidPacket("truncated write request"));
                }
                let address = rdr.read_u16::<BigEndian>()?;
                let quantity = rdr.read_u16::<BigEndian>()?;
                let byte_count = rdr.read_u8()?;
                if usize::from(byte_count) != packed_coils_len(usize::from(quantity)) {
                    return Err(Error::InvalidPacket("byte count contradicts quantity"));
                }
                check_len(&bytes, 6 + usize::from(byte_count))?;
                WriteMultipleCoils(address, unpack_coils(&bytes[6..], quantity))
            }
            FunctionCode::WriteMultipleRegisters => {
                if bytes.len() < 6 {
                    return Err(Error::InvalidPacket("truncated write request"));
                }
                let address = rdr.read_u16::<BigEndian>()?;
                let quantity = rdr.read_u16::<BigEndian>()?;
                let byte_count = rdr.read_u8()?;
                if usize::from(byte_count) != usize::from(quantity) * 2 {
                    return Err(Error::InvalidPacket("byte count contradicts quantity"));
                }
                check_len(&bytes, 6 + usize::from(byte_count))?;
                let mut words = Vec::with_capacity(usize::from(quantity));
                for _ in 0..quantity {
                    words.push(rdr.read_u16::<BigEndian>()?);
                }
                WriteMultipleRegisters(address, words)
            }
        };
        Ok(req)
    }
}

impl TryFrom<Bytes> for RequestPdu {
    type Error = Error;

    fn try_from(bytes: Bytes) -> Result<Self> {
        let pdu = Request::try_from(bytes)?.into();
        Ok(pdu)
    }
}

impl ResponsePdu {
    /// Decode a response body.
    ///
    /// The originating request serves as the decoding hint: a coil response
    /// only announces whole bytes, so the requested quantity determines how
    /// many of the unpacked bits are payload and how many are padding. The
    /// byte count on the wire must match the quantity exactly.
    ///
    /// The exception bit of the function byte is checked uniformly before
    /// anything else, so every function code can carry every exception code.
    pub(crate) fn decode(req: &Request, bytes: &Bytes) -> Result<Self> {
        use crate::frame::Request::*;
        if bytes.is_empty() {
            return Err(Error::InvalidPacket("empty PDU"));
        }
        let mut rdr = Cursor::new(bytes);
        let fn_code = rdr.read_u8()?;
        if is_exception_fn_code(fn_code) {
            check_len(bytes, 2)?;
            let exception = ExceptionCode::try_from(rdr.read_u8()?)?;
            return Ok(ExceptionResponse {
                function: fn_code - EXCEPTION_BIT,
                exception,
            }
            .into());
        }
        if fn_code != req.function_code().value() {
            return Err(Error::UnexpectedResponse(format!(
                "function code mismatch: request = {}, response = 0x{fn_code:0>2X}",
                req.function_code()
            )));
        }
        let rsp = match req {
            ReadCoils(_, quantity) | ReadDiscreteInputs(_, quantity) => {
                let byte_count = rdr.read_u8()?;
                if usize::from(byte_count) != packed_coils_len(usize::from(*quantity)) {
                    return Err(Error::InvalidPacket("byte count contradicts quantity"));
                }
                check_len(bytes, 2 + usize::from(byte_count))?;
                let coils = unpack_coils(&bytes[2..], *quantity);
                if matches!(req, ReadCoils(_, _)) {
                    Response::ReadCoils(coils)
                } else {
                    Response::ReadDiscreteInputs(coils)
                }
            }
            ReadHoldingRegisters(_, quantity) | ReadInputRegisters(_, quantity) => {
                let byte_count = rdr.read_u8()?;
                if usize::from(byte_count) != usize::from(*quantity) * 2 {
                    return Err(Error::InvalidPacket("byte count contradicts quantity"));
                }
                check_len(bytes, 2 + usize::from(byte_count))?;
                let mut words = Vec::with_capacity(usize::from(*quantity));
                for _ in 0..*quantity {
                    words.push(rdr.read_u16::<BigEndian>()?);
                }
                if matches!(req, ReadHoldingRegisters(_, _)) {
                    Response::ReadHoldingRegisters(words)
                } else {
                    Response::ReadInputRegisters(words)
                }
            }
            WriteSingleCoil(_, _) => {
                check_len(bytes, 5)?;
                let address = rdr.read_u16::<BigEndian>()?;
                let coil = coil_to_bool(rdr.read_u16::<BigEndian>()?).map_err(|_| {
                    Error::Exception(ExceptionResponse::new(
                        FunctionCode::WriteSingleCoil,
                        ExceptionCode::IllegalDataValue,
                    ))
                })?;
                Response::WriteSingleCoil(address, coil)
            }
            WriteSingleRegister(_, _) => {
                check_len(bytes, 5)?;
                Response::WriteSingleRegister(
                    rdr.read_u16::<BigEndian>()?,
                    rdr.read_u16::<BigEndian>()?,
                )
            }
            WriteMultipleCoils(_, _) => {
                check_len(bytes, 5)?;
                Response::WriteMultipleCoils(
                    rdr.read_u16::<BigEndian>()?,
                    rdr.read_u16::<BigEndian>()?,
                )
            }
            WriteMultipleRegisters(_, _) => {
                check_len(bytes, 5)?;
                Response::WriteMultipleRegisters(
                    rdr.read_u16::<BigEndian>()?,
                    rdr.read_u16::<BigEndian>()?,
                )
            }
        };
        Ok(rsp.into())
    }
}

fn check_len(bytes: &Bytes, expected: usize) -> Result<()> {
    if bytes.len() == expected {
        Ok(())
    } else {
        Err(Error::InvalidPacket("unexpected PDU length"))
    }
}

pub(crate) fn bool_to_coil(state: bool) -> u16 {
    if state {
        0xFF00
    } else {
        0x0000
    }
}

pub(crate) fn coil_to_bool(coil: u16) -> Result<bool> {
    match coil {
        0xFF00 => Ok(true),
        0x0000 => Ok(false),
        _ => Err(Error::InvalidPacket("invalid coil value")),
    }
}

pub(crate) fn packed_coils_len(bitcount: usize) -> usize {
    (bitcount + 7) / 8
}

/// Pack coils into a byte vector, LSB first within each byte.
fn pack_coils(coils: &[Coil]) -> Vec<u8> {
    let mut res = vec![0; packed_coils_len(coils.len())];
    for (i, b) in coils.iter().enumerate() {
        let v = u8::from(*b);
        res[i / 8] |= v << (i % 8);
    }
    res
}

/// Unpack `count` coils, discarding the padding bits of the last byte.
fn unpack_coils(bytes: &[u8], count: Quantity) -> Vec<Coil> {
    let mut res = Vec::with_capacity(count.into());
    for i in 0..usize::from(count) {
        res.push((bytes[i / 8] >> (i % 8)) & 0b1 > 0);
    }
    res
}

#[allow(clippy::cast_possible_truncation)]
fn u8_len(len: usize) -> u8 {
    debug_assert!(len <= usize::from(u8::MAX));
    len as u8
}

#[allow(clippy::cast_possible_truncation)]
fn u16_len(len: usize) -> u16 {
    debug_assert!(len <= usize::from(u16::MAX));
    len as u16
}

fn request_byte_count(req: &Request) -> usize {
    use crate::frame::Request::*;
    match *req {
        ReadCoils(_, _)
        | ReadDiscreteInputs(_, _)
        | ReadHoldingRegisters(_, _)
        | ReadInputRegisters(_, _)
        | WriteSingleCoil(_, _)
        | WriteSingleRegister(_, _) => 5,
        WriteMultipleCoils(_, ref coils) => 6 + packed_coils_len(coils.len()),
        WriteMultipleRegisters(_, ref words) => 6 + words.len() * 2,
    }
}

fn response_byte_count(rsp: &Response) -> usize {
    use crate::frame::Response::*;
    match *rsp {
        ReadCoils(ref coils) | ReadDiscreteInputs(ref coils) => 2 + packed_coils_len(coils.len()),
        ReadHoldingRegisters(ref words) | ReadInputRegisters(ref words) => 2 + words.len() * 2,
        WriteSingleCoil(_, _)
        | WriteSingleRegister(_, _)
        | WriteMultipleCoils(_, _)
        | WriteMultipleRegisters(_, _) => 5,
    }
}
