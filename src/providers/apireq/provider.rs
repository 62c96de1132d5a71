//! Conversions between Reqwest API errors and provider error types

use crate::providers::apireq::{ReqwestError, ReqwestErrorKind};
use crate::providers::{Error, ErrorKind};

impl From<ReqwestError> for Error {
    fn from(value: ReqwestError) -> Self {
        let kind: ErrorKind = match &value.kind() {
            ReqwestErrorKind::ConnectFailed => ErrorKind::Connection,
            ReqwestErrorKind::DecodingFailed | ReqwestErrorKind::RedirectPolicyViolated => {
                ErrorKind::UnexpectedResponse
            }
            ReqwestErrorKind::TimedOut => ErrorKind::TimedOut,
            ReqwestErrorKind::UnknownReqwestError => ErrorKind::UnspecifiedError,
        };

        Error::from_source(kind, Box::new(value))
    }
}
