//! Unary command adapter.
//!
//! Wraps a single-shot RPC as either a bare completion ([`command`]) or a
//! decoded value ([`query`]). The embedded result code is always checked
//! before anything else in the response is looked at.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::Error;
use crate::result::{Outcome, ReportedResult, ResultCode};

/// Issue a command and succeed only if the server reports success.
///
/// `result` extracts the embedded result message from the response.
pub async fn command<M, R, F>(
    method: &'static str,
    timeout: Duration,
    call: F,
    result: impl FnOnce(&M) -> Option<ReportedResult>,
) -> Result<(), Error<R>>
where
    F: Future<Output = Result<tonic::Response<M>, tonic::Status>>,
    R: ResultCode,
{
    let reply = send(method, timeout, call).await?;
    check(method, result(&reply))
}

/// Issue a read-style call and decode its payload.
///
/// `decode` only runs once the result code has been checked as success.
pub async fn query<M, T, R, F>(
    method: &'static str,
    timeout: Duration,
    call: F,
    result: impl FnOnce(&M) -> Option<ReportedResult>,
    decode: impl FnOnce(M) -> Result<T, Error<R>>,
) -> Result<T, Error<R>>
where
    F: Future<Output = Result<tonic::Response<M>, tonic::Status>>,
    R: ResultCode,
{
    let reply = send(method, timeout, call).await?;
    check(method, result(&reply))?;
    decode(reply)
}

async fn send<M, R, F>(method: &'static str, timeout: Duration, call: F) -> Result<M, Error<R>>
where
    F: Future<Output = Result<tonic::Response<M>, tonic::Status>>,
    R: ResultCode,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(Ok(response)) => Ok(response.into_inner()),
        Ok(Err(status)) => {
            warn!(method, code = ?status.code(), message = status.message(), "RPC call failed");
            Err(status.into())
        }
        Err(_) => {
            warn!(method, timeout_ms = timeout.as_millis(), "RPC call timed out");
            Err(Error::Timeout(timeout))
        }
    }
}

fn check<R: ResultCode>(
    method: &'static str,
    reported: Option<ReportedResult>,
) -> Result<(), Error<R>> {
    let reported = reported
        .ok_or_else(|| Error::Internal(format!("{method} response carried no result")))?;
    let result = R::from_code(reported.code);
    match result.outcome() {
        Outcome::Success => Ok(()),
        // `Next` has no meaning on a one-shot reply.
        Outcome::Next | Outcome::Failure => {
            debug!(method, %result, message = %reported.message, "RPC reported failure");
            Err(Error::Protocol {
                result,
                message: reported.message,
            })
        }
    }
}
