// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(rust_2018_idioms)]
#![warn(rust_2021_compatibility)]
#![warn(missing_debug_implementations)]
#![warn(unreachable_pub)]
#![cfg_attr(not(test), warn(unsafe_code))]
#![warn(clippy::all)]
#![warn(clippy::cast_lossless)]
#![warn(clippy::explicit_deref_methods)]
#![warn(clippy::explicit_into_iter_loop)]
#![warn(clippy::explicit_iter_loop)]
#![cfg_attr(not(test), warn(clippy::panic_in_result_fn))]
#![cfg_attr(not(test), warn(clippy::cast_possible_truncation))]
#![warn(rustdoc::broken_intra_doc_links)]
#![doc = include_str!("../README.md")]

pub mod prelude;

#[cfg(any(feature = "tcp", feature = "udp"))]
pub mod client;

pub mod unit;

#[cfg(feature = "server")]
pub mod server;

mod codec;
mod error;
mod frame;

#[cfg(any(feature = "tcp", feature = "udp"))]
mod service;

pub use crate::{
    error::{Error, Result},
    frame::{
        Address, Coil, ExceptionCode, ExceptionResponse, FunctionCode, Quantity, Request,
        Response, Word, MAX_READ_COIL_COUNT, MAX_READ_REGISTER_COUNT, MAX_WRITE_COIL_COUNT,
        MAX_WRITE_REGISTER_COUNT,
    },
    unit::{Unit, UnitId},
};
