//! The mirror list returned by the resolution service.
//!
//! A successful resolution reply carries a line-delimited list of mirror
//! URLs in its body. [`MirrorList::parse`] turns that text into an ordered
//! list of candidates. The list is built once per completed fetch and is
//! immutable afterwards.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use tracing::trace;

//------------ MirrorList ----------------------------------------------------

/// An ordered list of candidate mirror URLs.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct MirrorList {
    /// The candidate URLs in source order.
    urls: Vec<String>,
}

impl MirrorList {
    /// Parses line-delimited text into a mirror list.
    ///
    /// Both `'\r'` and `'\n'` act as delimiters; consecutive delimiters
    /// collapse and leading or trailing delimiters are ignored. Source
    /// order is preserved. Text containing only delimiters yields an empty
    /// list; the caller treats that as an unknown URN.
    pub fn parse(text: &str) -> Self {
        let urls = text
            .split(&['\r', '\n'][..])
            .filter(|token| !token.is_empty())
            .map(|token| {
                trace!(token, "mirror list entry");
                token.to_owned()
            })
            .collect();
        Self { urls }
    }

    /// Returns whether the list has no candidates.
    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    /// Returns the number of candidates.
    pub fn len(&self) -> usize {
        self.urls.len()
    }

    /// Returns an iterator over the candidate URLs in source order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.urls.iter().map(String::as_str)
    }
}

//============ Test ==========================================================
