// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types

///////////////////////////////////////////////////////////////////
/// Modules
///////////////////////////////////////////////////////////////////
#[cfg(any(feature = "tcp", feature = "udp"))]
pub use crate::client;

#[allow(missing_docs)]
#[cfg(all(feature = "sync", any(feature = "tcp", feature = "udp")))]
pub mod sync {
    pub use crate::client::sync::*;
}

#[allow(missing_docs)]
#[cfg(feature = "tcp")]
pub mod tcp {
    pub use crate::client::tcp::*;

    #[cfg(feature = "tcp-server")]
    pub use crate::server::tcp::*;
}

#[allow(missing_docs)]
#[cfg(feature = "udp")]
pub mod udp {
    pub use crate::client::udp::*;

    #[cfg(feature = "udp-server")]
    pub use crate::server::udp::*;
}

#[cfg(feature = "server")]
pub use crate::server;

///////////////////////////////////////////////////////////////////
/// Structs
///////////////////////////////////////////////////////////////////
pub use crate::error::{Error, Result};
pub use crate::frame::{ExceptionCode, ExceptionResponse, FunctionCode, Request, Response};
pub use crate::unit::{Unit, UnitId};

///////////////////////////////////////////////////////////////////
/// Traits
///////////////////////////////////////////////////////////////////
#[cfg(any(feature = "tcp", feature = "udp"))]
pub use crate::client::{Client, Reader, Writer};

#[cfg(all(feature = "sync", any(feature = "tcp", feature = "udp")))]
pub use crate::client::sync::Client as SyncClient;

#[cfg(all(feature = "sync", any(feature = "tcp", feature = "udp")))]
pub use crate::client::sync::Reader as SyncReader;

#[cfg(all(feature = "sync", any(feature = "tcp", feature = "udp")))]
pub use crate::client::sync::Writer as SyncWriter;

pub use crate::unit::UnitContext;
