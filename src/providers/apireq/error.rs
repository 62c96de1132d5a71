//! Wrapper around Reqwest's error type so transport failures can be matched exhaustively

use std::error::Error as StdError;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorKind {
    ConnectFailed,
    DecodingFailed,
    RedirectPolicyViolated,
    TimedOut,
    UnknownReqwestError,
}

impl ErrorKind {
    fn of(err: &reqwest::Error) -> ErrorKind {
        if err.is_decode() {
            ErrorKind::DecodingFailed
        } else if err.is_timeout() {
            ErrorKind::TimedOut
        } else if err.is_redirect() {
            ErrorKind::RedirectPolicyViolated
        } else if err.is_connect() {
            ErrorKind::ConnectFailed
        } else {
            ErrorKind::UnknownReqwestError
        }
    }
}

#[derive(Debug)]
pub(crate) struct Error {
    kind: ErrorKind,
    source: reqwest::Error,
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error {
            kind: ErrorKind::of(&err),
            source: err,
        }
    }
}

impl Error {
    pub(crate) fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match &self.kind {
            ErrorKind::ConnectFailed => "connection failed",
            ErrorKind::DecodingFailed => "decoding failed",
            ErrorKind::RedirectPolicyViolated => "redirect policy violated",
            ErrorKind::TimedOut => "timed out",
            ErrorKind::UnknownReqwestError => "request failed",
        };

        match self.source.url() {
            Some(url) => write!(f, "{} ({})", what, url),
            None => write!(f, "{}", what),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers;

    #[tokio::test]
    async fn connection_refused_maps_to_connection() {
        // Nothing listens on port 9 of the loopback interface.
        let err = reqwest::Client::new()
            .get("http://127.0.0.1:9/")
            .send()
            .await
            .expect_err("request to a closed port should fail");

        let err = Error::from(err);

        assert_eq!(err.kind(), ErrorKind::ConnectFailed);

        let err: providers::Error = err.into();

        assert_eq!(err.kind(), providers::ErrorKind::Connection);
    }
}
