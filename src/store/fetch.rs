//! The shared resolution-service fetch entry.
//!
//! Every URN that resolves to the same resolution-service URL shares one
//! in-flight fetch. The [`FetchRegistry`] keys entries by that URL and
//! reference-counts them: each session joining a fetch acquires one
//! reference and must release it exactly once on every terminal path.
//! [`FetchHandle::release`] does that explicitly and a `Drop` impl backs
//! it up, so an early return cannot leak a reference.
//!
//! The resolution service fills the entry through a [`FetchWriter`]:
//! `append` while the fetch is pending, then exactly one of `complete`,
//! `abort` or `fail`. Readers consume the entry one page at a time with
//! [`FetchEntry::read`], which suspends while the fetch is pending and no
//! bytes beyond the requested offset exist yet. Chunks are therefore
//! delivered strictly in offset order per reader, and all readers observe
//! the same byte stream.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::collections::HashMap;
use std::error;
use std::fmt::{Display, Formatter};
use std::mem;
use std::sync::Arc;

use bytes::BytesMut;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::trace;

use super::page::Page;

//------------ FetchState ----------------------------------------------------

/// The lifecycle state of a fetch entry.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FetchState {
    /// The fetch is still producing data.
    Pending,

    /// The fetch completed successfully.
    Ok,

    /// The fetch was aborted.
    Aborted,
}

//------------ ReadError -----------------------------------------------------

/// Reading a chunk from a fetch entry failed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ReadError;

impl Display for ReadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "error reading from fetch entry")
    }
}

impl error::Error for ReadError {}

//------------ FetchEntry ----------------------------------------------------

/// One in-flight or completed resolution-service fetch.
#[derive(Debug)]
pub struct FetchEntry {
    /// The resolution-service URL this entry was created for.
    url: String,

    /// The accumulated bytes and lifecycle state.
    body: Mutex<FetchBody>,

    /// Signals readers whenever the body changes.
    progress: Notify,
}

/// The mutable interior of a [`FetchEntry`].
#[derive(Debug)]
struct FetchBody {
    /// Bytes produced by the fetch so far.
    data: BytesMut,

    /// Whether the fetch is pending, complete, or aborted.
    state: FetchState,

    /// Set when the fetch reported a read error.
    failed: bool,
}

impl Default for FetchBody {
    fn default() -> Self {
        Self {
            data: BytesMut::new(),
            state: FetchState::Pending,
            failed: false,
        }
    }
}

impl FetchBody {
    /// Returns the current lifecycle state.
    fn state(&self) -> FetchState {
        self.state
    }
}

impl FetchEntry {
    /// Creates a new, pending entry for the given resolution URL.
    fn new(url: &str) -> Self {
        Self {
            url: url.to_owned(),
            body: Default::default(),
            progress: Notify::new(),
        }
    }

    /// Returns the resolution-service URL of this entry.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Reads one chunk starting at `offset` into `page`.
    ///
    /// Suspends while the fetch is pending and has not yet produced bytes
    /// beyond `offset`. On return the state is [`FetchState::Ok`] only if
    /// this chunk exhausts the completed stream; a completed fetch with
    /// more data left still reports [`FetchState::Pending`] so the caller
    /// keeps reading in offset order. A zero length is only returned in a
    /// terminal state.
    pub async fn read(
        &self,
        offset: usize,
        page: &mut Page,
    ) -> Result<(FetchState, usize), ReadError> {
        loop {
            let notified = self.progress.notified();
            {
                let body = self.body.lock();
                if body.failed {
                    return Err(ReadError);
                }
                if body.state() == FetchState::Aborted {
                    return Ok((FetchState::Aborted, 0));
                }
                let avail = body.data.len().saturating_sub(offset);
                if avail > 0 {
                    let n = avail.min(page.len());
                    page[..n].copy_from_slice(&body.data[offset..offset + n]);
                    let state = if body.state() == FetchState::Ok
                        && offset + n == body.data.len()
                    {
                        FetchState::Ok
                    } else {
                        FetchState::Pending
                    };
                    return Ok((state, n));
                }
                if body.state() == FetchState::Ok {
                    return Ok((FetchState::Ok, 0));
                }
            }
            notified.await;
        }
    }
}

//------------ FetchWriter ---------------------------------------------------

/// The producing side of a fetch entry.
///
/// Held by the resolution-service transport. Dropping the writer without
/// reaching a terminal state aborts the entry so that readers never wait
/// on a fetch nobody is filling anymore.
#[derive(Debug)]
pub struct FetchWriter {
    /// The entry being filled.
    entry: Arc<FetchEntry>,
}

impl FetchWriter {
    /// Appends bytes to the entry. Ignored once the entry is terminal.
    pub fn append(&self, bytes: &[u8]) {
        let mut body = self.entry.body.lock();
        if body.state() != FetchState::Pending {
            return;
        }
        body.data.extend_from_slice(bytes);
        drop(body);
        self.entry.progress.notify_waiters();
    }

    /// Marks the entry complete.
    pub fn complete(self) {
        self.finish(FetchState::Ok, false);
    }

    /// Marks the entry aborted.
    pub fn abort(self) {
        self.finish(FetchState::Aborted, false);
    }

    /// Marks the entry as having hit a read error.
    pub fn fail(self) {
        self.finish(FetchState::Ok, true);
    }

    /// Moves the entry into a terminal state and wakes readers.
    fn finish(&self, state: FetchState, failed: bool) {
        let mut body = self.entry.body.lock();
        if body.state() != FetchState::Pending {
            return;
        }
        body.state = state;
        body.failed = failed;
        drop(body);
        self.entry.progress.notify_waiters();
    }
}

impl Drop for FetchWriter {
    fn drop(&mut self) {
        self.finish(FetchState::Aborted, false);
    }
}

//------------ FetchRegistry -------------------------------------------------

/// The registry of in-flight fetches, keyed by resolution URL.
#[derive(Clone, Debug, Default)]
pub struct FetchRegistry {
    /// The shared registry state.
    inner: Arc<RegistryInner>,
}

/// The shared state of a [`FetchRegistry`].
#[derive(Debug, Default)]
struct RegistryInner {
    /// Entries by resolution URL, with their reference counts.
    entries: Mutex<HashMap<String, Slot>>,
}

/// A registered fetch entry and its reference count.
#[derive(Debug)]
struct Slot {
    /// The entry.
    entry: Arc<FetchEntry>,

    /// The number of handles currently attached.
    refs: usize,
}

impl FetchRegistry {
    /// Creates a new, empty registry.
    pub fn new() -> Self {
        Default::default()
    }

    /// Joins the fetch for `url`, creating it if necessary.
    ///
    /// Attaches to an existing in-flight fetch if one is registered under
    /// `url`; otherwise registers a new entry. The returned writer is
    /// `Some` exactly when the entry is new, in which case the caller must
    /// dispatch the fetch to the resolution service. Either way the caller
    /// owns one reference to the entry.
    pub fn join(&self, url: &str) -> (FetchHandle, Option<FetchWriter>) {
        let mut entries = self.inner.entries.lock();
        let (entry, writer) = match entries.get_mut(url) {
            Some(slot) => {
                trace!(url, refs = slot.refs + 1, "joining existing fetch");
                slot.refs += 1;
                (slot.entry.clone(), None)
            }
            None => {
                trace!(url, "creating fetch");
                let entry = Arc::new(FetchEntry::new(url));
                entries.insert(
                    url.to_owned(),
                    Slot {
                        entry: entry.clone(),
                        refs: 1,
                    },
                );
                let writer = FetchWriter {
                    entry: entry.clone(),
                };
                (entry, Some(writer))
            }
        };
        drop(entries);
        let handle = FetchHandle {
            registry: self.inner.clone(),
            entry,
            released: false,
        };
        (handle, writer)
    }

    /// Returns the reference count of the fetch for `url`, zero if absent.
    pub fn refs(&self, url: &str) -> usize {
        self.inner
            .entries
            .lock()
            .get(url)
            .map_or(0, |slot| slot.refs)
    }

    /// Returns the number of registered fetches.
    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    /// Returns whether no fetches are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

//------------ FetchHandle ---------------------------------------------------

/// One session's reference to a registered fetch entry.
#[derive(Debug)]
pub struct FetchHandle {
    /// The registry the reference is counted in.
    registry: Arc<RegistryInner>,

    /// The referenced entry.
    entry: Arc<FetchEntry>,

    /// Whether the reference was already given back.
    released: bool,
}

impl FetchHandle {
    /// Returns the referenced entry.
    pub fn entry(&self) -> &FetchEntry {
        &self.entry
    }

    /// Releases the reference.
    ///
    /// The last reference removes the entry from the registry. Dropping
    /// the handle has the same effect; this method only makes the release
    /// point explicit in session code.
    pub fn release(self) {
        // Drop does the work.
    }

    /// Gives the reference back to the registry, once.
    fn release_impl(&mut self) {
        if mem::replace(&mut self.released, true) {
            return;
        }
        let mut entries = self.registry.entries.lock();
        if let Some(slot) = entries.get_mut(self.entry.url()) {
            slot.refs -= 1;
            if slot.refs == 0 {
                trace!(url = self.entry.url(), "releasing last fetch ref");
                entries.remove(self.entry.url());
            }
        }
    }
}

impl Drop for FetchHandle {
    fn drop(&mut self) {
        self.release_impl()
    }
}

//============ Test ==========================================================
