// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::future::Future;

/// A Modbus server service.
///
/// Protocol-level failures travel through the `Exception` channel and are
/// serialised into exception frames by the server loop. Infrastructural
/// failures (I/O, poisoned state) must not be smuggled through it; either
/// report [`ServerDeviceFailure`](crate::ExceptionCode::ServerDeviceFailure)
/// or panic and let the connection task die.
pub trait Service {
    /// Requests handled by the service.
    type Request;

    /// Responses given by the service.
    type Response;

    /// Protocol failures produced by the service.
    type Exception;

    /// The future response value.
    type Future: Future<Output = Result<Self::Response, Self::Exception>> + Send;

    /// Process the request and return the response asynchronously.
    fn call(&self, req: Self::Request) -> Self::Future;
}

impl<S: Service + ?Sized> Service for std::sync::Arc<S> {
    type Request = S::Request;
    type Response = S::Response;
    type Exception = S::Exception;
    type Future = S::Future;

    fn call(&self, req: Self::Request) -> Self::Future {
        (**self).call(req)
    }
}

impl<S: Service + ?Sized> Service for Box<S> {
    type Request = S::Request;
    type Response = S::Response;
    type Exception = S::Exception;
    type Future = S::Future;

    fn call(&self, req: Self::Request) -> Self::Future {
        (**self).call(req)
    }
}
