//! The output side of a resolution session.
//!
//! The surrounding request layer hands each session a sink to write its
//! result into. A session either delivers one complete redirect response
//! or reports the URN as not found; aborted or failed fetches produce
//! neither, leaving timeout handling to the request layer.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use crate::request::UrnRequest;
use crate::response::Response;

//------------ ResponseSink --------------------------------------------------

/// The destination a resolution session writes its result to.
pub trait ResponseSink {
    /// Delivers the complete redirect response.
    ///
    /// Called at most once per session, with the fully built response, so
    /// the sink's readers never observe a partial write.
    fn deliver(&mut self, response: Response);

    /// Reports that `url` could not be resolved.
    ///
    /// Carries the original request so the request layer can render its
    /// error page against it.
    fn not_found(&mut self, request: &UrnRequest, url: &str);
}
