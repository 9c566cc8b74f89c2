//! Object-store facilities the resolution core builds on.
//!
//! The core consumes the surrounding proxy's object store through three
//! narrow pieces: page buffers for chunked reads ([`page`]), the shared,
//! reference-counted entry for an in-flight resolution-service fetch
//! ([`fetch`]), and the sink a session's final response goes to ([`sink`]).
//! Storage placement, caching policy and eviction stay with the proxy.

pub mod fetch;
pub mod page;
pub mod sink;

pub use self::fetch::{
    FetchEntry, FetchHandle, FetchRegistry, FetchState, FetchWriter,
};
pub use self::page::{Page, PagePool, PAGE_SIZE};
pub use self::sink::ResponseSink;
