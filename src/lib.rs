//! Asynchronous URN resolution for caching proxies.
//!
//! A URN names a resource without saying where to get it. This crate
//! resolves such a name into a concrete, reachable location: it fetches a
//! line-delimited list of candidate mirror URLs from an N2L resolution
//! service, ranks the candidates by the network round-trip time a latency
//! database has on record for their hosts, and answers the original
//! request with a temporary redirect listing every mirror and recommending
//! the fastest one.
//!
//! The crate is the resolution core of a larger proxy, not a proxy itself.
//! The surrounding system supplies the collaborators through narrow
//! interfaces: a [`Dispatch`][resolve::Dispatch] implementation performs
//! the actual retrieval of the mirror list, an
//! [`RttDatabase`][netdb::RttDatabase] supplies latency measurements, and
//! a [`ResponseSink`][store::sink::ResponseSink] receives the result.
//! There is no CLI, no configuration file, and no persisted state.
//!
//! # Modules
//!
//! * [resolve] drives a resolution session: it derives the resolution
//!   URL from the URN, joins or starts the mirror-list fetch, consumes it
//!   incrementally, and delivers the final response.
//! * [store] holds the fetch entry shared between sessions resolving the
//!   same URN, the page buffers chunked reads go through, and the output
//!   sink interface.
//! * [mirror] parses the mirror list and [select] ranks it.
//! * [request], [response], [netdb], and [error] round out the data
//!   model.
//!
//! # Resolving a URN
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use urnres::request::UrnRequest;
//! # use urnres::resolve::Resolver;
//! # async fn _test(
//! #     netdb: Arc<dyn urnres::netdb::RttDatabase + Send + Sync>,
//! #     dispatch: Arc<dyn urnres::resolve::Dispatch + Send + Sync>,
//! #     sink: &mut dyn urnres::store::ResponseSink,
//! # ) {
//! let resolver = Resolver::new(netdb, dispatch);
//! let request = Arc::new(UrnRequest::new("urn:cid:foo@bar"));
//! resolver.resolve(request, sink).await;
//! # }
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod mirror;
pub mod netdb;
pub mod request;
pub mod resolve;
pub mod response;
pub mod select;
pub mod store;

pub use self::error::Error;
pub use self::resolve::{Config, Dispatch, Resolver};
