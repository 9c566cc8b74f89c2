//! Building the redirect response.
//!
//! A successful resolution answers the original request with a temporary
//! redirect: an HTML page listing every mirror as a link, plus a
//! `Location` header naming the mirror with the lowest round-trip time
//! when one is known. The response is built in full before it is handed
//! to the sink, so the entry is finalized atomically from the caller's
//! perspective.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::fmt::Write;

use bytes::Bytes;

use crate::mirror::MirrorList;

//------------ Response ------------------------------------------------------

/// A complete response ready for delivery to the output sink.
#[derive(Clone, Debug)]
pub struct Response {
    /// The numeric response status.
    status: u16,

    /// The reason phrase of the status line.
    reason: &'static str,

    /// The response headers, in emission order.
    headers: Vec<(&'static str, String)>,

    /// The response body.
    body: Bytes,
}

impl Response {
    /// Builds the mirror-choice redirect for a resolved URN.
    ///
    /// The body lists every mirror in source order; `best` adds a
    /// `Location` header but never changes the body. `generated_by` is the
    /// attribution placed in the page footer.
    pub fn redirect(
        original_url: &str,
        mirrors: &MirrorList,
        best: Option<&str>,
        generated_by: &str,
    ) -> Self {
        let mut page = String::new();
        write!(
            &mut page,
            "<TITLE>Select URL for {}</TITLE>\n\
             <H2>Select URL for {}</H2>\n\
             <UL>\n",
            original_url, original_url
        )
        .expect("writing to a string");
        for mirror in mirrors.iter() {
            write!(
                &mut page,
                "<LI><A HREF=\"{}\">{}</A>\n",
                mirror, mirror
            )
            .expect("writing to a string");
        }
        write!(
            &mut page,
            "</UL><HR>\n<ADDRESS>\nGenerated by {}\n</ADDRESS>\n",
            generated_by
        )
        .expect("writing to a string");

        let body = Bytes::from(page.into_bytes());
        let mut headers = vec![
            ("Content-Type", String::from("text/html")),
            ("Content-Length", body.len().to_string()),
        ];
        if let Some(best) = best {
            headers.push(("Location", best.to_owned()));
        }
        Self {
            status: 302,
            reason: "Moved Temporarily",
            headers,
            body,
        }
    }

    /// Returns the numeric response status.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Returns the reason phrase of the status line.
    pub fn reason(&self) -> &str {
        self.reason
    }

    /// Returns the response headers in emission order.
    pub fn headers(&self) -> &[(&'static str, String)] {
        &self.headers
    }

    /// Returns the value of the named header, if present.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(hdr, _)| hdr.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Returns the response body.
    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

//============ Test ==========================================================
