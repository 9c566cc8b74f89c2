//! Error type for URN resolution.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::error;
use std::fmt::{Display, Formatter};

//------------ Error ---------------------------------------------------------

/// Error type for URN resolution sessions.
///
/// Every error is terminal for the session that produced it; none are
/// retried internally. Whether an error is reported back to the original
/// requester depends on [`reports_not_found`][Error::reports_not_found].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Error {
    /// The URN lacks the authority/path separator.
    MalformedUrn,

    /// The resolution service has no mapping for this URN.
    ///
    /// This covers both a non-success reply status and a reply that
    /// contained zero mirror URLs.
    ResolutionNotFound,

    /// The resolution-service reply had no parseable header block.
    MalformedFetchResponse,

    /// The resolution-service fetch was aborted.
    FetchAborted,

    /// Reading from the resolution-service fetch failed.
    ReadFailure,
}

impl Error {
    /// Whether this error is surfaced as a not-found response.
    ///
    /// Errors for which this returns `false` are silent at this layer;
    /// the request layer's own timeout policy covers them.
    pub fn reports_not_found(&self) -> bool {
        match self {
            Error::MalformedUrn => true,
            Error::ResolutionNotFound => true,
            Error::MalformedFetchResponse => true,
            Error::FetchAborted => false,
            Error::ReadFailure => false,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            Error::MalformedUrn => {
                write!(f, "URN lacks an authority/path separator")
            }
            Error::ResolutionNotFound => {
                write!(f, "resolution service has no mapping for this URN")
            }
            Error::MalformedFetchResponse => {
                write!(f, "resolution-service reply has no header block")
            }
            Error::FetchAborted => {
                write!(f, "resolution-service fetch was aborted")
            }
            Error::ReadFailure => {
                write!(f, "error reading from resolution-service fetch")
            }
        }
    }
}

impl error::Error for Error {}
