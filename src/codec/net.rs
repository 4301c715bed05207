// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! MBAP framing codec shared by the TCP and UDP transports.

use byteorder::{BigEndian, ByteOrder};
use bytes::{BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::{
    error::{Error, Result},
    frame::net::{Header, RequestAdu, ResponseAdu},
};

use super::MAX_PDU_LEN;

const HEADER_LEN: usize = 7;

const PROTOCOL_ID: u16 = 0x0000;

/// Maximum size of a framed message: header plus maximum PDU.
pub(crate) const MAX_ADU_LEN: usize = HEADER_LEN + MAX_PDU_LEN;

/// Incremental MBAP header parser.
///
/// The length field is authoritative: the decoder never consumes bytes
/// beyond the announced frame, so back-to-back frames and arbitrary TCP
/// segmentation are handled exactly.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct AduDecoder;

impl Decoder for AduDecoder {
    type Item = (Header, Bytes);
    type Error = Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<(Header, Bytes)>> {
        if buf.len() < HEADER_LEN {
            return Ok(None);
        }

        let len = usize::from(BigEndian::read_u16(&buf[4..6]));
        if len == 0 {
            return Err(Error::InvalidLength {
                length: 0,
                available: buf.len(),
            });
        }
        // len counts the unit id byte plus the PDU
        let pdu_len = len - 1;
        if pdu_len > MAX_PDU_LEN {
            return Err(Error::InvalidPacket("PDU exceeds maximum length"));
        }
        if buf.len() < HEADER_LEN + pdu_len {
            return Ok(None);
        }

        let header_data = buf.split_to(HEADER_LEN);

        let protocol_id = BigEndian::read_u16(&header_data[2..4]);
        if protocol_id != PROTOCOL_ID {
            return Err(Error::InvalidPacket("invalid protocol identifier"));
        }

        let transaction_id = BigEndian::read_u16(&header_data[0..2]);
        let unit_id = header_data[6];

        let header = Header {
            transaction_id,
            unit_id,
        };

        let pdu_data = buf.split_to(pdu_len).freeze();

        Ok(Some((header, pdu_data)))
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct ClientCodec {
    pub(crate) decoder: AduDecoder,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct ServerCodec {
    pub(crate) decoder: AduDecoder,
}

impl Decoder for ClientCodec {
    type Item = (Header, Bytes);
    type Error = Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<(Header, Bytes)>> {
        self.decoder.decode(buf)
    }
}

impl Decoder for ServerCodec {
    type Item = (Header, Bytes);
    type Error = Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<(Header, Bytes)>> {
        self.decoder.decode(buf)
    }
}

fn encode_adu(hdr: Header, pdu_data: &Bytes, buf: &mut BytesMut) {
    debug_assert!(pdu_data.len() <= MAX_PDU_LEN);
    buf.reserve(pdu_data.len() + HEADER_LEN);
    buf.put_u16(hdr.transaction_id);
    buf.put_u16(PROTOCOL_ID);
    buf.put_u16(u16_len(pdu_data.len() + 1));
    buf.put_u8(hdr.unit_id);
    buf.put_slice(pdu_data);
}

impl Encoder<RequestAdu> for ClientCodec {
    type Error = Error;

    fn encode(&mut self, adu: RequestAdu, buf: &mut BytesMut) -> Result<()> {
        let RequestAdu { hdr, pdu } = adu;
        let pdu_data: Bytes = pdu.into();
        encode_adu(hdr, &pdu_data, buf);
        Ok(())
    }
}

impl Encoder<ResponseAdu> for ServerCodec {
    type Error = Error;

    fn encode(&mut self, adu: ResponseAdu, buf: &mut BytesMut) -> Result<()> {
        let ResponseAdu { hdr, pdu } = adu;
        let pdu_data: Bytes = pdu.into();
        encode_adu(hdr, &pdu_data, buf);
        Ok(())
    }
}

#[allow(clippy::cast_possible_truncation)]
fn u16_len(len: usize) -> u16 {
    debug_assert!(len <= usize::from(u16::MAX));
    len as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{
        net::TransactionId, ExceptionCode, ExceptionResponse, Request, Response, ResponsePdu,
    };
    use crate::unit::UnitId;

    const TRANSACTION_ID: TransactionId = 0x1001;
    const UNIT_ID: UnitId = 0xFE;

    fn encode_request(hdr: Header, req: Request) -> BytesMut {
        let mut buf = BytesMut::new();
        ClientCodec::default()
            .encode(
                RequestAdu {
                    hdr,
                    pdu: req.into(),
                },
                &mut buf,
            )
            .unwrap();
        buf
    }

    fn encode_response(hdr: Header, pdu: ResponsePdu) -> BytesMut {
        let mut buf = BytesMut::new();
        ServerCodec::default()
            .encode(ResponseAdu { hdr, pdu }, &mut buf)
            .unwrap();
        buf
    }

    #[test]
    fn decode_header_fragment() {
        let mut codec = ClientCodec::default();
        let mut buf = BytesMut::from(&[0x00, 0x11, 0x00, 0x00, 0x00, 0x00][..]);
        let res = codec.decode(&mut buf).unwrap();
        assert!(res.is_none());
        assert_eq!(buf.len(), 6);
    }

    #[test]
    fn decode_partly_received_message() {
        let mut codec = ClientCodec::default();
        let mut buf = BytesMut::from(
            &[
                0x10, 0x01, // transaction id
                0x00, 0x00, // protocol id
                0x00, 0x03, // length
                UNIT_ID, 0x02, // function code
            ][..],
        );
        let res = codec.decode(&mut buf).unwrap();
        assert!(res.is_none());
        assert_eq!(buf.len(), 8);
    }

    #[test]
    fn decode_zero_length() {
        let mut codec = ClientCodec::default();
        let mut buf = BytesMut::from(
            &[0x10, 0x01, 0x00, 0x00, 0x00, 0x00, UNIT_ID, 0x01][..],
        );
        let err = codec.decode(&mut buf).unwrap_err();
        assert!(matches!(err, Error::InvalidLength { length: 0, .. }));
    }

    #[test]
    fn decode_oversized_length() {
        let mut codec = ClientCodec::default();
        // length = 0xFF (254 PDU bytes) exceeds the 253 byte PDU limit
        let mut buf = BytesMut::from(
            &[0x10, 0x01, 0x00, 0x00, 0x00, 0xFF, UNIT_ID][..],
        );
        let err = codec.decode(&mut buf).unwrap_err();
        assert!(matches!(err, Error::InvalidPacket(_)));
    }

    #[test]
    fn decode_with_invalid_protocol_id() {
        let mut codec = ClientCodec::default();
        let mut buf = BytesMut::from(
            &[
                0x10, 0x01, // transaction id
                0x33, 0x12, // protocol id
                0x00, 0x03, // length
                UNIT_ID,
            ][..],
        );
        buf.extend_from_slice(&[0x82, 0x03]);
        let err = codec.decode(&mut buf).unwrap_err();
        assert!(matches!(err, Error::InvalidPacket(_)));
    }

    #[test]
    fn decode_exception_message() {
        let mut codec = ClientCodec::default();
        let mut buf = BytesMut::from(
            &[
                0x10, 0x01, // transaction id
                0x00, 0x00, // protocol id
                0x00, 0x03, // length
                UNIT_ID, //
                0x82, // exception = 0x80 + 0x02
                0x03, //
                0x00, // one byte of the next frame
            ][..],
        );

        let (hdr, pdu_data) = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(hdr.transaction_id, TRANSACTION_ID);
        assert_eq!(hdr.unit_id, UNIT_ID);
        assert_eq!(buf.len(), 1);

        let req = Request::ReadDiscreteInputs(0x00, 1);
        let ResponsePdu(rsp) = ResponsePdu::decode(&req, &pdu_data).unwrap();
        assert_eq!(
            rsp,
            Err(ExceptionResponse {
                function: 0x02,
                exception: ExceptionCode::IllegalDataValue,
            })
        );
    }

    #[test]
    fn decode_back_to_back_frames() {
        let mut codec = ServerCodec::default();
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[
            0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x01, 0x01, 0x00, 0x0A, 0x00, 0x0D,
        ]);
        buf.extend_from_slice(&[
            0x00, 0x02, 0x00, 0x00, 0x00, 0x06, 0x01, 0x03, 0x00, 0x00, 0x00, 0x02,
        ]);

        let (hdr, pdu) = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(hdr.transaction_id, 0x0001);
        assert_eq!(Request::try_from(pdu).unwrap(), Request::ReadCoils(0x0A, 13));

        let (hdr, pdu) = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(hdr.transaction_id, 0x0002);
        assert_eq!(
            Request::try_from(pdu).unwrap(),
            Request::ReadHoldingRegisters(0x00, 2)
        );

        assert!(buf.is_empty());
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn encode_header_invariants() {
        let buf = encode_request(
            Header {
                transaction_id: TRANSACTION_ID,
                unit_id: UNIT_ID,
            },
            Request::ReadInputRegisters(0x23, 5),
        );
        assert_eq!(buf[0], 0x10);
        assert_eq!(buf[1], 0x01);
        // protocol id always zero
        assert_eq!(&buf[2..4], &[0x00, 0x00]);
        // length = 1 + PDU size
        assert_eq!(&buf[4..6], &[0x00, 0x06]);
        assert_eq!(buf[6], UNIT_ID);
        assert_eq!(buf.len(), HEADER_LEN + 5);
    }

    // Wire-level scenarios with literal bytes.
    mod scenarios {
        use super::*;

        fn hdr() -> Header {
            Header {
                transaction_id: 0x0002,
                unit_id: 0x01,
            }
        }

        fn decode_single(raw: &[u8]) -> (Header, Bytes) {
            let mut buf = BytesMut::from(raw);
            let decoded = AduDecoder.decode(&mut buf).unwrap().unwrap();
            assert!(buf.is_empty());
            decoded
        }

        #[test]
        fn read_coils() {
            let req = Request::ReadCoils(0x000A, 0x000D);
            let raw = [
                0x00, 0x02, 0x00, 0x00, 0x00, 0x06, 0x01, 0x01, 0x00, 0x0A, 0x00, 0x0D,
            ];
            assert_eq!(&encode_request(hdr(), req.clone())[..], &raw);

            let (header, pdu) = decode_single(&raw);
            assert_eq!(header, hdr());
            assert_eq!(Request::try_from(pdu).unwrap(), req);

            let coils = vec![
                false, true, false, true, false, false, false, false, //
                true, false, false, false, true,
            ];
            let rsp = Response::ReadCoils(coils);
            let raw = [
                0x00, 0x02, 0x00, 0x00, 0x00, 0x05, 0x01, 0x01, 0x02, 0x0A, 0x11,
            ];
            assert_eq!(&encode_response(hdr(), rsp.clone().into())[..], &raw);

            let (header, pdu) = decode_single(&raw);
            assert_eq!(header, hdr());
            assert_eq!(ResponsePdu::decode(&req, &pdu).unwrap(), rsp.into());
        }

        #[test]
        fn read_holding_registers() {
            let req = Request::ReadHoldingRegisters(0x0000, 2);
            let raw = [
                0x00, 0x02, 0x00, 0x00, 0x00, 0x06, 0x01, 0x03, 0x00, 0x00, 0x00, 0x02,
            ];
            assert_eq!(&encode_request(hdr(), req.clone())[..], &raw);

            let rsp = Response::ReadHoldingRegisters(vec![0x0006, 0x0005]);
            let raw = [
                0x00, 0x02, 0x00, 0x00, 0x00, 0x07, 0x01, 0x03, 0x04, 0x00, 0x06, 0x00, 0x05,
            ];
            assert_eq!(&encode_response(hdr(), rsp.clone().into())[..], &raw);

            let (header, pdu) = decode_single(&raw);
            assert_eq!(header, hdr());
            assert_eq!(ResponsePdu::decode(&req, &pdu).unwrap(), rsp.into());
        }

        #[test]
        fn write_single_coil() {
            let req = Request::WriteSingleCoil(0x000A, true);
            let raw = [
                0x00, 0x02, 0x00, 0x00, 0x00, 0x06, 0x01, 0x05, 0x00, 0x0A, 0xFF, 0x00,
            ];
            assert_eq!(&encode_request(hdr(), req.clone())[..], &raw);

            // The response is a verbatim echo of the request.
            let rsp = Response::WriteSingleCoil(0x000A, true);
            assert_eq!(&encode_response(hdr(), rsp.clone().into())[..], &raw);

            let (header, pdu) = decode_single(&raw);
            assert_eq!(header, hdr());
            assert_eq!(ResponsePdu::decode(&req, &pdu).unwrap(), rsp.into());
        }

        #[test]
        fn write_multiple_coils() {
            let coils = vec![
                true, false, false, false, false, false, false, false, // 0x01
                true, true, false, false, false, false, false, true, // 0x83
                true, true, true, false, false, false, false, false, // 0x07
            ];
            let req = Request::WriteMultipleCoils(0x0000, coils);
            let raw = [
                0x00, 0x02, 0x00, 0x00, 0x00, 0x0A, 0x01, 0x0F, 0x00, 0x00, 0x00, 0x18, 0x03,
                0x01, 0x83, 0x07,
            ];
            assert_eq!(&encode_request(hdr(), req.clone())[..], &raw);

            let (header, pdu) = decode_single(&raw);
            assert_eq!(header, hdr());
            assert_eq!(Request::try_from(pdu).unwrap(), req);

            let rsp = Response::WriteMultipleCoils(0x0000, 0x18);
            let raw = [
                0x00, 0x02, 0x00, 0x00, 0x00, 0x06, 0x01, 0x0F, 0x00, 0x00, 0x00, 0x18,
            ];
            assert_eq!(&encode_response(hdr(), rsp.clone().into())[..], &raw);
            let (_, pdu) = decode_single(&raw);
            assert_eq!(ResponsePdu::decode(&req, &pdu).unwrap(), rsp.into());
        }

        #[test]
        fn write_multiple_registers() {
            let req = Request::WriteMultipleRegisters(0x0000, vec![0x0004, 0x0002]);
            let raw = [
                0x00, 0x02, 0x00, 0x00, 0x00, 0x0B, 0x01, 0x10, 0x00, 0x00, 0x00, 0x02, 0x04,
                0x00, 0x04, 0x00, 0x02,
            ];
            assert_eq!(&encode_request(hdr(), req.clone())[..], &raw);

            let (header, pdu) = decode_single(&raw);
            assert_eq!(header, hdr());
            assert_eq!(Request::try_from(pdu).unwrap(), req);

            let rsp = Response::WriteMultipleRegisters(0x0000, 2);
            let raw = [
                0x00, 0x02, 0x00, 0x00, 0x00, 0x06, 0x01, 0x10, 0x00, 0x00, 0x00, 0x02,
            ];
            assert_eq!(&encode_response(hdr(), rsp.clone().into())[..], &raw);
        }

        #[test]
        fn read_coils_exception() {
            let ex = ExceptionResponse {
                function: 0x01,
                exception: ExceptionCode::IllegalDataAddress,
            };
            let raw = [0x00, 0x02, 0x00, 0x00, 0x00, 0x03, 0x01, 0x81, 0x02];
            assert_eq!(&encode_response(hdr(), ex.into())[..], &raw);

            let (header, pdu) = decode_single(&raw);
            assert_eq!(header, hdr());
            let req = Request::ReadCoils(0xFFF0, 0x20);
            assert_eq!(ResponsePdu::decode(&req, &pdu).unwrap(), ex.into());
        }
    }
}
