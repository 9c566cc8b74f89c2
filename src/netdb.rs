//! Interface to the network latency database.
//!
//! The proxy keeps a database of measured round-trip times keyed by
//! hostname. This core only consumes it: the mirror selector looks up the
//! RTT of each candidate host and, for hosts without a measurement yet,
//! asks the database to start a probe. The probe is fire-and-forget; its
//! result only matters for later selection rounds.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::time::Duration;

//------------ RttDatabase ---------------------------------------------------

/// Access to measured network round-trip times, keyed by hostname.
pub trait RttDatabase {
    /// Returns the measured round-trip time for `host`.
    ///
    /// `None` means no measurement exists yet. On the wire the database
    /// uses a zero sentinel for this; the trait maps it to `None`.
    fn rtt(&self, host: &str) -> Option<Duration>;

    /// Starts an asynchronous probe of `host`.
    ///
    /// Fire-and-forget: the caller never awaits the result.
    fn probe(&self, host: &str);
}

impl<T: RttDatabase + ?Sized> RttDatabase for &T {
    fn rtt(&self, host: &str) -> Option<Duration> {
        (**self).rtt(host)
    }

    fn probe(&self, host: &str) {
        (**self).probe(host)
    }
}
