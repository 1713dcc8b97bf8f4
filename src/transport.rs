//! Transport-level success classification
//!
//! Adapters that guard a request/response call decide which transport
//! outcomes signal downstream unhealth. The predicates here encode the two
//! conventional policies: for HTTP-style transports, 2xx-3xx responses are
//! successes; for RPC-style transports, client-side error codes are
//! successes as well, since a wrong request says nothing about the health of
//! the downstream.

use crate::classifier::{FailureContext, SuccessClassifier};
use std::error::Error;
use std::fmt;

/// HTTP-style success predicate: 2xx and 3xx status codes
pub fn is_http_success(status: u16) -> bool {
    (200..400).contains(&status)
}

/// RPC-style status codes, in the conventional numbering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcCode {
    Ok,
    Canceled,
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    ResourceExhausted,
    Unauthenticated,
    Internal,
    Unavailable,
}

/// RPC-style success predicate.
///
/// Codes denoting a client-side mistake (bad argument, missing resource,
/// failed auth) are successes; codes denoting server-side trouble are
/// failures.
pub fn is_rpc_success(code: RpcCode) -> bool {
    matches!(
        code,
        RpcCode::Ok
            | RpcCode::Canceled
            | RpcCode::InvalidArgument
            | RpcCode::NotFound
            | RpcCode::AlreadyExists
            | RpcCode::PermissionDenied
            | RpcCode::Unauthenticated
    )
}

/// Failure value carrying an HTTP response status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpError {
    pub status: u16,
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "http status {}", self.status)
    }
}

impl Error for HttpError {}

/// Classifier for [`HttpError`] failure values: only server-side statuses
/// (5xx) count as failures. Failure values of any other type count.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpStatusClassifier;

impl SuccessClassifier for HttpStatusClassifier {
    fn is_success(&self, ctx: &FailureContext<'_>) -> bool {
        ctx.failure
            .downcast_ref::<HttpError>()
            .map(|e| e.status < 500)
            .unwrap_or(false)
    }
}
