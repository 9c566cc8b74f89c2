//! Fixed-size chunk buffers.
//!
//! The streaming fetch reader consumes its fetch one page at a time. Pages
//! come from a [`PagePool`] and return to it when dropped, so every exit
//! path of the read loop releases its page exactly once. The pool counts
//! checkouts and returns; tests use the counters to verify that no path
//! leaks a page.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// The size of one page. Also the fixed chunk size of fetch reads.
pub const PAGE_SIZE: usize = 4096;

//------------ PagePool ------------------------------------------------------

/// A pool of fixed-size page buffers.
#[derive(Clone, Debug, Default)]
pub struct PagePool {
    /// The shared pool state.
    inner: Arc<PoolInner>,
}

/// The shared state of a [`PagePool`].
#[derive(Debug, Default)]
struct PoolInner {
    /// Returned pages available for reuse.
    free: Mutex<Vec<Box<[u8; PAGE_SIZE]>>>,

    /// Total number of pages handed out.
    acquired: AtomicUsize,

    /// Total number of pages returned.
    released: AtomicUsize,
}

impl PagePool {
    /// Creates a new, empty pool.
    pub fn new() -> Self {
        Default::default()
    }

    /// Checks out a page, reusing a returned one if available.
    pub fn get(&self) -> Page {
        let buf = self
            .inner
            .free
            .lock()
            .pop()
            .unwrap_or_else(|| Box::new([0; PAGE_SIZE]));
        self.inner.acquired.fetch_add(1, Ordering::Relaxed);
        Page {
            buf: Some(buf),
            pool: self.inner.clone(),
        }
    }

    /// Returns the total number of pages handed out so far.
    pub fn acquired(&self) -> usize {
        self.inner.acquired.load(Ordering::Relaxed)
    }

    /// Returns the total number of pages returned so far.
    pub fn released(&self) -> usize {
        self.inner.released.load(Ordering::Relaxed)
    }

    /// Returns the number of pages currently checked out.
    pub fn outstanding(&self) -> usize {
        self.acquired() - self.released()
    }
}

//------------ Page ----------------------------------------------------------

/// One checked-out page. Returns to its pool on drop.
#[derive(Debug)]
pub struct Page {
    /// The buffer; `None` only transiently during drop.
    buf: Option<Box<[u8; PAGE_SIZE]>>,

    /// The pool this page returns to.
    pool: Arc<PoolInner>,
}

impl Deref for Page {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.buf.as_ref().expect("page buffer present").as_slice()
    }
}

impl DerefMut for Page {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.buf.as_mut().expect("page buffer present").as_mut_slice()
    }
}

impl Drop for Page {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.free.lock().push(buf);
        }
        self.pool.released.fetch_add(1, Ordering::Relaxed);
    }
}

//============ Test ==========================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn accounting() {
        let pool = PagePool::new();
        let a = pool.get();
        let b = pool.get();
        assert_eq!(pool.acquired(), 2);
        assert_eq!(pool.outstanding(), 2);
        drop(a);
        drop(b);
        assert_eq!(pool.released(), 2);
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn reuse() {
        let pool = PagePool::new();
        drop(pool.get());
        let _page = pool.get();
        assert_eq!(pool.inner.free.lock().len(), 0);
        assert_eq!(pool.acquired(), 2);
    }

    #[test]
    fn page_is_writable() {
        let pool = PagePool::new();
        let mut page = pool.get();
        assert_eq!(page.len(), PAGE_SIZE);
        page[..4].copy_from_slice(b"abcd");
        assert_eq!(&page[..4], b"abcd");
    }
}
