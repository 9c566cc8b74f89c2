//! Selecting the best mirror by round-trip time.
//!
//! Candidates are ranked by the round-trip time the latency database has
//! on record for their host. Hosts without a measurement are probed as a
//! side effect and skipped for the current round; an unparseable candidate
//! URL is skipped as well and never fails the selection. Finding no ranked
//! candidate at all is a normal outcome: the caller still offers the full
//! mirror list, just without a recommended default.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::collections::HashSet;
use std::time::Duration;

use tracing::{debug, trace};
use url::Url;

use crate::mirror::MirrorList;
use crate::netdb::RttDatabase;

//------------ BestMirror ----------------------------------------------------

/// The winning candidate of one selection round.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BestMirror<'a> {
    /// The candidate URL.
    pub url: &'a str,

    /// Its measured round-trip time.
    pub rtt: Duration,
}

//------------ find_min_rtt --------------------------------------------------

/// Returns the candidate with the lowest known round-trip time.
///
/// Every distinct host without a measurement is probed exactly once per
/// round, however many candidates name it.
///
/// On equal round-trip times the first candidate encountered wins; later
/// candidates with an equal value do not replace it. This first-seen-wins
/// tie-break is deliberate policy, not an artifact of iteration order.
pub fn find_min_rtt<'a>(
    urls: &'a MirrorList,
    netdb: &dyn RttDatabase,
) -> Option<BestMirror<'a>> {
    let mut min: Option<BestMirror<'a>> = None;
    let mut probed: HashSet<String> = HashSet::new();
    for candidate in urls.iter() {
        let Ok(parsed) = Url::parse(candidate) else {
            trace!(candidate, "skipping unparseable mirror URL");
            continue;
        };
        let Some(host) = parsed.host_str() else {
            trace!(candidate, "skipping mirror URL without a host");
            continue;
        };
        match netdb.rtt(host) {
            None => {
                // One probe per distinct host per selection round, even
                // when several candidates share the host.
                if probed.insert(host.to_owned()) {
                    trace!(host, "pinging");
                    netdb.probe(host);
                }
            }
            Some(rtt) => {
                trace!(host, ?rtt, "candidate rtt");
                if min.map_or(true, |best| rtt < best.rtt) {
                    min = Some(BestMirror {
                        url: candidate,
                        rtt,
                    });
                }
            }
        }
    }
    match min {
        Some(best) => {
            debug!(url = best.url, rtt = ?best.rtt, "selected mirror");
        }
        None => debug!("no mirror with a known rtt"),
    }
    min
}

//============ Test ==========================================================
