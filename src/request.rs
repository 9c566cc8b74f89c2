//! The URN request model.
//!
//! A [`UrnRequest`] is the inbound request whose URN needs resolving. The
//! surrounding request layer owns it; a resolution session only holds a
//! shared reference for its lifetime. From the URN the session derives the
//! [`ResolutionRequest`], the sub-request sent to the resolution service.
//! The derivation is deterministic so that two sessions resolving the same
//! URN authority and path share one fetch key.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use crate::error::Error;

/// The well-known path of the N2L resolution service.
const RESOLUTION_PATH: &str = "/uri-res/N2L";

//------------ UrnRequest ----------------------------------------------------

/// A request for a URN that needs resolving into a concrete URL.
#[derive(Clone, Debug)]
pub struct UrnRequest {
    /// The full request URL, e.g. `urn:cid:foo@bar`.
    url: String,
}

impl UrnRequest {
    /// Creates a request from the full URN URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// Returns the full request URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the URN with the leading `urn:` scheme stripped.
    pub fn urn_path(&self) -> &str {
        let url = self.url.as_str();
        if url.len() >= 4 && url[..4].eq_ignore_ascii_case("urn:") {
            &url[4..]
        } else {
            url
        }
    }

    /// Derives the URL of the resolution-service fetch for this URN.
    ///
    /// The URN's path must contain a `':'` separating the authority from
    /// the path suffix; the resolution URL is then
    /// `http://<authority>/uri-res/N2L?<path-suffix>`. Fails with
    /// [`Error::MalformedUrn`] if the separator is absent.
    pub fn resolution_url(&self) -> Result<String, Error> {
        let path = self.urn_path();
        let (authority, suffix) =
            path.split_once(':').ok_or(Error::MalformedUrn)?;
        Ok(format!("http://{}{}?{}", authority, RESOLUTION_PATH, suffix))
    }
}

//------------ ResolutionRequest ---------------------------------------------

/// The sub-request dispatched to the resolution service.
#[derive(Clone, Debug)]
pub struct ResolutionRequest {
    /// The derived resolution-service URL.
    url: String,
}

impl ResolutionRequest {
    /// Creates a request for the given resolution-service URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// Returns the resolution-service URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the request method. The resolution fetch is always a GET.
    pub fn method(&self) -> &'static str {
        "GET"
    }

    /// Returns the serialized request headers.
    pub fn headers(&self) -> &'static str {
        "Accept: */*\r\n\r\n"
    }
}

//============ Test ==========================================================
