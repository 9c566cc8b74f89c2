//! The resolution session and its streaming fetch reader.
//!
//! Resolving a URN consists of five steps:
//! 1) Deriving the resolution-service URL from the URN,
//! 2) Joining (or starting) the fetch of the mirror list,
//! 3) Consuming the fetch's output one page at a time until it is
//!    terminal,
//! 4) Parsing and ranking the mirror list, and
//! 5) Delivering the redirect response to the original requester.
//!
//! The [`Resolver`] owns the shared pieces: the fetch registry, the page
//! pool, the latency database, and the dispatcher that hands new fetches
//! to the resolution service. One call to [`Resolver::resolve`] drives one
//! session from start to terminal state. Sessions for the same URN
//! authority and path share a single fetch; each holds one reference to it
//! and gives that reference back on every terminal path, successful or
//! not.
//!
//! Reading the fetch is an async loop with one outstanding read at a
//! time. Every read borrows a fresh page from the pool and returns it when
//! the iteration ends, whichever branch the iteration leaves through.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use bytes::BytesMut;
use tracing::{debug, trace};

use crate::error::Error;
use crate::mirror::MirrorList;
use crate::netdb::RttDatabase;
use crate::request::{ResolutionRequest, UrnRequest};
use crate::response::Response;
use crate::select::find_min_rtt;
use crate::store::fetch::{FetchHandle, FetchRegistry, FetchState, FetchWriter};
use crate::store::page::PagePool;
use crate::store::sink::ResponseSink;

//------------ Config --------------------------------------------------------

/// Configuration for a resolver.
#[derive(Clone, Debug)]
pub struct Config {
    /// The server name used in response attribution.
    server_name: String,

    /// The server version used in response attribution.
    server_version: String,

    /// The local hostname used in response attribution.
    hostname: String,
}

impl Config {
    /// Creates a new, default config.
    pub fn new() -> Self {
        Default::default()
    }

    /// Returns the server name used in response attribution.
    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    /// Sets the server name used in response attribution.
    pub fn set_server_name(&mut self, name: impl Into<String>) {
        self.server_name = name.into()
    }

    /// Returns the server version used in response attribution.
    pub fn server_version(&self) -> &str {
        &self.server_version
    }

    /// Sets the server version used in response attribution.
    pub fn set_server_version(&mut self, version: impl Into<String>) {
        self.server_version = version.into()
    }

    /// Returns the local hostname used in response attribution.
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Sets the local hostname used in response attribution.
    pub fn set_hostname(&mut self, hostname: impl Into<String>) {
        self.hostname = hostname.into()
    }

    /// Returns the attribution line for generated pages.
    pub fn generated_by(&self) -> String {
        format!(
            "{}/{}@{}",
            self.server_name, self.server_version, self.hostname
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_name: env!("CARGO_PKG_NAME").into(),
            server_version: env!("CARGO_PKG_VERSION").into(),
            hostname: "localhost".into(),
        }
    }
}

//------------ Dispatch ------------------------------------------------------

/// Hands a newly created fetch to the resolution service.
///
/// Called once per fetch entry, when the first session joins it. The
/// implementation performs the actual retrieval and fills the entry
/// through the writer: `append` for each piece of data, then exactly one
/// terminal call. The resolver never awaits the dispatch itself; progress
/// arrives through the fetch entry.
pub trait Dispatch {
    /// Starts the fetch for `request`, producing into `writer`.
    fn dispatch(&self, request: ResolutionRequest, writer: FetchWriter);
}

//------------ Resolver ------------------------------------------------------

/// Shared state for resolving URNs into mirror redirects.
pub struct Resolver {
    /// The configuration.
    config: Config,

    /// In-flight resolution fetches, keyed by resolution URL.
    registry: FetchRegistry,

    /// The pool chunk buffers are drawn from.
    pool: PagePool,

    /// The network latency database.
    netdb: Arc<dyn RttDatabase + Send + Sync>,

    /// The dispatcher for new resolution fetches.
    dispatch: Arc<dyn Dispatch + Send + Sync>,
}

impl Resolver {
    /// Creates a resolver with default configuration.
    pub fn new(
        netdb: Arc<dyn RttDatabase + Send + Sync>,
        dispatch: Arc<dyn Dispatch + Send + Sync>,
    ) -> Self {
        Self::with_config(netdb, dispatch, Default::default())
    }

    /// Creates a resolver with the given configuration.
    pub fn with_config(
        netdb: Arc<dyn RttDatabase + Send + Sync>,
        dispatch: Arc<dyn Dispatch + Send + Sync>,
        config: Config,
    ) -> Self {
        Self {
            config,
            registry: FetchRegistry::new(),
            pool: PagePool::new(),
            netdb,
            dispatch,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the registry of in-flight resolution fetches.
    pub fn registry(&self) -> &FetchRegistry {
        &self.registry
    }

    /// Returns the page pool.
    pub fn pool(&self) -> &PagePool {
        &self.pool
    }

    /// Resolves one URN request, writing the outcome into `sink`.
    ///
    /// A resolvable URN produces a single redirect response listing the
    /// mirrors. A URN without the authority/path separator, a non-success
    /// reply from the resolution service, and an empty mirror list each
    /// produce a structured not-found. An aborted or failed fetch
    /// produces nothing; the request layer's timeout policy covers it.
    pub async fn resolve(
        &self,
        request: Arc<UrnRequest>,
        sink: &mut dyn ResponseSink,
    ) {
        debug!(url = request.url(), "resolving urn");
        let session = match Session::begin(self, request.clone()) {
            Ok(session) => session,
            Err(err) => {
                debug!(url = request.url(), %err, "rejecting urn");
                sink.not_found(&request, request.url());
                return;
            }
        };
        session.run(sink).await
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("netdb", &format_args!("_"))
            .field("dispatch", &format_args!("_"))
            .finish()
    }
}

//------------ Session -------------------------------------------------------

/// One URN request tied to its in-flight resolution fetch.
struct Session<'a> {
    /// The resolver the session runs under.
    resolver: &'a Resolver,

    /// The request being resolved. Shared with the request layer.
    request: Arc<UrnRequest>,

    /// The session's reference to the resolution fetch.
    fetch: FetchHandle,
}

impl<'a> Session<'a> {
    /// Starts a session by joining the resolution fetch for the URN.
    ///
    /// Fails with [`Error::MalformedUrn`] without creating a fetch if the
    /// URN lacks the authority/path separator. Otherwise the session owns
    /// one reference to the (possibly shared) fetch entry; a fresh entry
    /// is dispatched to the resolution service before this returns.
    fn begin(
        resolver: &'a Resolver,
        request: Arc<UrnRequest>,
    ) -> Result<Self, Error> {
        let urlres = request.resolution_url()?;
        trace!(
            url = request.url(),
            urlres = urlres.as_str(),
            "starting resolution fetch"
        );
        let (fetch, writer) = resolver.registry.join(&urlres);
        if let Some(writer) = writer {
            resolver
                .dispatch
                .dispatch(ResolutionRequest::new(urlres), writer);
        }
        Ok(Session {
            resolver,
            request,
            fetch,
        })
    }

    /// Drives the session to a terminal state.
    ///
    /// Whatever the outcome, the fetch reference is released exactly
    /// once before this returns.
    async fn run(self, sink: &mut dyn ResponseSink) {
        match self.read_reply().await {
            Ok(response) => sink.deliver(response),
            Err(err) if err.reports_not_found() => {
                sink.not_found(&self.request, self.request.url());
            }
            Err(err) => {
                trace!(url = self.request.url(), %err, "resolution abandoned");
            }
        }
        self.fetch.release();
    }

    /// Reads the resolution reply to completion and builds the response.
    ///
    /// One read is outstanding at any time; each chunk is appended to the
    /// accumulator and the next read starts at the accumulated offset.
    /// The page borrowed for a chunk goes back to the pool when the
    /// iteration ends, on the success path and on all failure paths
    /// alike.
    async fn read_reply(&self) -> Result<Response, Error> {
        let entry = self.fetch.entry();
        let mut reply = BytesMut::new();
        loop {
            let mut page = self.resolver.pool.get();
            let (state, size) = entry
                .read(reply.len(), &mut page)
                .await
                .map_err(|_| Error::ReadFailure)?;
            trace!(size, ?state, "resolution reply chunk");
            if state == FetchState::Aborted {
                return Err(Error::FetchAborted);
            }
            if size == 0 {
                // A fetch that completed after its final bytes were
                // already consumed reports one empty Ok chunk; that is
                // end of stream. An empty stream stays a read failure.
                if state == FetchState::Ok && !reply.is_empty() {
                    return self.process_reply(&reply);
                }
                return Err(Error::ReadFailure);
            }
            reply.extend_from_slice(&page[..size]);
            if state == FetchState::Ok {
                return self.process_reply(&reply);
            }
        }
    }

    /// Turns the complete resolution reply into the redirect response.
    fn process_reply(&self, reply: &[u8]) -> Result<Response, Error> {
        let Some(body_start) = headers_end(reply) else {
            debug!(
                url = self.request.url(),
                "no end-of-headers in resolution reply"
            );
            return Err(Error::MalformedFetchResponse);
        };
        let status = reply_status(&reply[..body_start]);
        trace!(status, "resolution reply status");
        if status != 200 {
            return Err(Error::ResolutionNotFound);
        }
        let body = String::from_utf8_lossy(&reply[body_start..]);
        if let Cow::Owned(_) = &body {
            debug!(
                url = self.request.url(),
                "invalid utf-8 in resolution reply body"
            );
        }
        let urls = MirrorList::parse(body.trim_start());
        if urls.is_empty() {
            debug!(url = self.request.url(), "unknown urn");
            return Err(Error::ResolutionNotFound);
        }
        let best = find_min_rtt(&urls, &*self.resolver.netdb);
        Ok(Response::redirect(
            self.request.url(),
            &urls,
            best.map(|best| best.url),
            &self.resolver.config.generated_by(),
        ))
    }
}

//------------ Reply parsing helpers -----------------------------------------

/// Returns the offset just past the reply's header block, if it has one.
///
/// The header block ends at an empty line; both CRLF and bare LF line
/// endings are accepted.
fn headers_end(reply: &[u8]) -> Option<usize> {
    let mut i = 0;
    while i < reply.len() {
        if reply[i] == b'\n' {
            if reply.get(i + 1) == Some(&b'\n') {
                return Some(i + 2);
            }
            if reply.get(i + 1) == Some(&b'\r')
                && reply.get(i + 2) == Some(&b'\n')
            {
                return Some(i + 3);
            }
        }
        i += 1;
    }
    None
}

/// Parses the numeric status out of the reply's status line.
///
/// Returns zero if the status line does not parse; zero never equals a
/// success status, so a garbled status line reads as a failed resolution.
fn reply_status(header: &[u8]) -> u16 {
    let line = header
        .split(|&b| b == b'\r' || b == b'\n')
        .next()
        .unwrap_or(&[]);
    String::from_utf8_lossy(line)
        .split_whitespace()
        .nth(1)
        .and_then(|status| status.parse().ok())
        .unwrap_or(0)
}

//============ Test ==========================================================
