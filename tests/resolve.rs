//! End-to-end tests of the resolution session.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use urnres::netdb::RttDatabase;
use urnres::request::{ResolutionRequest, UrnRequest};
use urnres::resolve::{Dispatch, Resolver};
use urnres::response::Response;
use urnres::store::{FetchWriter, ResponseSink};

//------------ Test doubles --------------------------------------------------

/// A static latency table that records probes.
#[derive(Default)]
struct NetDb {
    rtts: HashMap<String, Duration>,
    probed: Mutex<Vec<String>>,
}

impl NetDb {
    fn new(rtts: &[(&str, u64)]) -> Self {
        Self {
            rtts: rtts
                .iter()
                .map(|(host, ms)| {
                    (host.to_string(), Duration::from_millis(*ms))
                })
                .collect(),
            probed: Default::default(),
        }
    }
}

impl RttDatabase for NetDb {
    fn rtt(&self, host: &str) -> Option<Duration> {
        self.rtts.get(host).copied()
    }

    fn probe(&self, host: &str) {
        self.probed.lock().unwrap().push(host.to_owned());
    }
}

/// How a scripted resolution service finishes its fetch.
#[derive(Clone, Copy)]
enum Outcome {
    Complete,
    Abort,
    Fail,
}

/// A resolution service that replies with a fixed byte string.
struct Service {
    reply: Vec<u8>,
    outcome: Outcome,
    requests: Mutex<Vec<ResolutionRequest>>,
}

impl Service {
    fn replying(reply: impl Into<Vec<u8>>) -> Self {
        Self::new(reply, Outcome::Complete)
    }

    fn new(reply: impl Into<Vec<u8>>, outcome: Outcome) -> Self {
        Self {
            reply: reply.into(),
            outcome,
            requests: Default::default(),
        }
    }

    fn request_urls(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|request| request.url().to_owned())
            .collect()
    }
}

impl Dispatch for Service {
    fn dispatch(&self, request: ResolutionRequest, writer: FetchWriter) {
        self.requests.lock().unwrap().push(request);
        writer.append(&self.reply);
        match self.outcome {
            Outcome::Complete => writer.complete(),
            Outcome::Abort => writer.abort(),
            Outcome::Fail => writer.fail(),
        }
    }
}

/// A resolution service that parks the writer for the test to drive.
#[derive(Default)]
struct Manual {
    writer: Mutex<Option<FetchWriter>>,
    requests: Mutex<Vec<ResolutionRequest>>,
}

impl Dispatch for Manual {
    fn dispatch(&self, request: ResolutionRequest, writer: FetchWriter) {
        self.requests.lock().unwrap().push(request);
        *self.writer.lock().unwrap() = Some(writer);
    }
}

/// A sink recording everything a session writes.
#[derive(Default)]
struct Sink {
    delivered: Vec<Response>,
    missing: Vec<String>,
}

impl ResponseSink for Sink {
    fn deliver(&mut self, response: Response) {
        self.delivered.push(response);
    }

    fn not_found(&mut self, _request: &UrnRequest, url: &str) {
        self.missing.push(url.to_owned());
    }
}

fn ok_reply(body: &str) -> Vec<u8> {
    format!(
        "HTTP/1.0 200 OK\r\nContent-Type: text/plain\r\n\r\n{}",
        body
    )
    .into_bytes()
}

//------------ Tests ---------------------------------------------------------

#[tokio::test]
async fn malformed_urn_creates_no_fetch() {
    let service = Arc::new(Service::replying(ok_reply("")));
    let resolver =
        Resolver::new(Arc::new(NetDb::default()), service.clone());
    let mut sink = Sink::default();

    let request = Arc::new(UrnRequest::new("urn:nocolon"));
    resolver.resolve(request.clone(), &mut sink).await;

    assert!(sink.delivered.is_empty());
    assert_eq!(sink.missing, ["urn:nocolon"]);
    assert!(service.request_urls().is_empty());
    assert!(resolver.registry().is_empty());
    assert_eq!(resolver.pool().acquired(), 0);
}

#[tokio::test]
async fn redirects_to_fastest_mirror() {
    let netdb = Arc::new(NetDb::new(&[("a", 50), ("b", 30)]));
    let service = Arc::new(Service::replying(ok_reply(
        "http://a/x\r\nhttp://b/y\r\n",
    )));
    let resolver = Resolver::new(netdb, service.clone());
    let mut sink = Sink::default();

    let request = Arc::new(UrnRequest::new("urn:cid:foo@bar"));
    resolver.resolve(request, &mut sink).await;

    let requests = service.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url(), "http://cid/uri-res/N2L?foo@bar");
    assert_eq!(requests[0].method(), "GET");
    assert_eq!(requests[0].headers(), "Accept: */*\r\n\r\n");
    drop(requests);

    assert!(sink.missing.is_empty());
    let response = &sink.delivered[0];
    assert_eq!(response.status(), 302);
    assert_eq!(response.header("Location"), Some("http://b/y"));
    let body = std::str::from_utf8(response.body()).unwrap();
    let a = body.find("http://a/x").unwrap();
    let b = body.find("http://b/y").unwrap();
    assert!(a < b);
    assert_eq!(
        response.header("Content-Length").unwrap(),
        response.body().len().to_string()
    );

    assert!(resolver.registry().is_empty());
    assert_eq!(resolver.pool().outstanding(), 0);
}

#[tokio::test]
async fn tie_break_prefers_first_candidate() {
    let netdb = Arc::new(NetDb::new(&[("u1", 50), ("u2", 30), ("u3", 30)]));
    let service = Arc::new(Service::replying(ok_reply(
        "http://u1/\r\nhttp://u2/\r\nhttp://u3/\r\n",
    )));
    let resolver = Resolver::new(netdb, service);
    let mut sink = Sink::default();

    let request = Arc::new(UrnRequest::new("urn:cid:foo"));
    resolver.resolve(request, &mut sink).await;

    assert_eq!(sink.delivered[0].header("Location"), Some("http://u2/"));
}

#[tokio::test]
async fn unknown_hosts_mean_no_location() {
    let netdb = Arc::new(NetDb::default());
    let service = Arc::new(Service::replying(ok_reply(
        "http://a/x\r\nhttp://b/y\r\n",
    )));
    let resolver = Resolver::new(netdb.clone(), service);
    let mut sink = Sink::default();

    let request = Arc::new(UrnRequest::new("urn:cid:foo"));
    resolver.resolve(request, &mut sink).await;

    let response = &sink.delivered[0];
    assert_eq!(response.header("Location"), None);
    let body = std::str::from_utf8(response.body()).unwrap();
    assert!(body.contains("http://a/x"));
    assert!(body.contains("http://b/y"));
    assert_eq!(*netdb.probed.lock().unwrap(), ["a", "b"]);
}

#[tokio::test]
async fn chunk_boundaries_do_not_matter() {
    let netdb = Arc::new(NetDb::new(&[("m", 10)]));
    let manual = Arc::new(Manual::default());
    let resolver = Resolver::new(netdb, manual.clone());
    let mut sink = Sink::default();

    let request = Arc::new(UrnRequest::new("urn:cid:foo"));
    let resolve = resolver.resolve(request, &mut sink);

    // Deliver the reply in pieces that split the status line, the header
    // terminator and a URL.
    let chunks: [&[u8]; 4] = [
        b"HTTP/1.0 2",
        b"00 OK\r\nServer: test\r",
        b"\n\r\nhttp://m/a\r\nhttp",
        b"://m/b\r\n",
    ];
    let driver = async {
        let writer = loop {
            if let Some(writer) = manual.writer.lock().unwrap().take() {
                break writer;
            }
            tokio::task::yield_now().await;
        };
        for chunk in chunks {
            writer.append(chunk);
            tokio::task::yield_now().await;
        }
        writer.complete();
    };
    tokio::join!(resolve, driver);

    let response = &sink.delivered[0];
    assert_eq!(response.header("Location"), Some("http://m/a"));
    let body = std::str::from_utf8(response.body()).unwrap();
    assert!(body.contains("<A HREF=\"http://m/a\">"));
    assert!(body.contains("<A HREF=\"http://m/b\">"));
    assert!(resolver.registry().is_empty());
    assert_eq!(resolver.pool().outstanding(), 0);
}

#[tokio::test]
async fn reply_larger_than_one_page() {
    let urls: Vec<String> =
        (0..500).map(|i| format!("http://host{}/p", i)).collect();
    let body = urls.join("\r\n");
    assert!(body.len() > 2 * 4096);
    let service = Arc::new(Service::replying(ok_reply(&body)));
    let resolver = Resolver::new(Arc::new(NetDb::default()), service);
    let mut sink = Sink::default();

    let request = Arc::new(UrnRequest::new("urn:cid:foo"));
    resolver.resolve(request, &mut sink).await;

    let response = &sink.delivered[0];
    let page = std::str::from_utf8(response.body()).unwrap();
    let first = page.find("<A HREF=\"http://host0/p\">").unwrap();
    let last = page.find("<A HREF=\"http://host499/p\">").unwrap();
    assert!(first < last);
    assert!(resolver.pool().acquired() >= 2);
    assert_eq!(resolver.pool().outstanding(), 0);
}

#[tokio::test]
async fn non_success_status_is_not_found() {
    let service = Arc::new(Service::replying(
        "HTTP/1.0 404 Not Found\r\n\r\n".as_bytes().to_vec(),
    ));
    let resolver = Resolver::new(Arc::new(NetDb::default()), service);
    let mut sink = Sink::default();

    let request = Arc::new(UrnRequest::new("urn:cid:foo"));
    resolver.resolve(request, &mut sink).await;

    assert!(sink.delivered.is_empty());
    assert_eq!(sink.missing, ["urn:cid:foo"]);
    assert!(resolver.registry().is_empty());
    assert_eq!(resolver.pool().outstanding(), 0);
}

#[tokio::test]
async fn missing_header_terminator_is_not_found() {
    let service =
        Arc::new(Service::replying(b"HTTP/1.0 200 OK\r\ntruncated".to_vec()));
    let resolver = Resolver::new(Arc::new(NetDb::default()), service);
    let mut sink = Sink::default();

    let request = Arc::new(UrnRequest::new("urn:cid:foo"));
    resolver.resolve(request, &mut sink).await;

    assert!(sink.delivered.is_empty());
    assert_eq!(sink.missing, ["urn:cid:foo"]);
    assert!(resolver.registry().is_empty());
    assert_eq!(resolver.pool().outstanding(), 0);
}

#[tokio::test]
async fn empty_mirror_list_is_not_found() {
    let service = Arc::new(Service::replying(ok_reply("\r\n\r\n")));
    let resolver = Resolver::new(Arc::new(NetDb::default()), service);
    let mut sink = Sink::default();

    let request = Arc::new(UrnRequest::new("urn:cid:foo"));
    resolver.resolve(request, &mut sink).await;

    assert!(sink.delivered.is_empty());
    assert_eq!(sink.missing, ["urn:cid:foo"]);
}

#[tokio::test]
async fn aborted_fetch_writes_nothing() {
    let service = Arc::new(Service::new(
        ok_reply("http://a/x\r\n"),
        Outcome::Abort,
    ));
    let resolver = Resolver::new(Arc::new(NetDb::default()), service);
    let mut sink = Sink::default();

    let request = Arc::new(UrnRequest::new("urn:cid:foo"));
    resolver.resolve(request.clone(), &mut sink).await;

    assert!(sink.delivered.is_empty());
    assert!(sink.missing.is_empty());
    assert_eq!(
        resolver
            .registry()
            .refs(&request.resolution_url().unwrap()),
        0
    );
    assert!(resolver.registry().is_empty());
    assert_eq!(resolver.pool().outstanding(), 0);
    assert_eq!(resolver.pool().released(), resolver.pool().acquired());
}

#[tokio::test]
async fn failed_read_writes_nothing() {
    let service =
        Arc::new(Service::new(b"partial".to_vec(), Outcome::Fail));
    let resolver = Resolver::new(Arc::new(NetDb::default()), service);
    let mut sink = Sink::default();

    let request = Arc::new(UrnRequest::new("urn:cid:foo"));
    resolver.resolve(request, &mut sink).await;

    assert!(sink.delivered.is_empty());
    assert!(sink.missing.is_empty());
    assert!(resolver.registry().is_empty());
    assert_eq!(resolver.pool().outstanding(), 0);
}

#[tokio::test]
async fn empty_reply_writes_nothing() {
    let service = Arc::new(Service::replying(Vec::new()));
    let resolver = Resolver::new(Arc::new(NetDb::default()), service);
    let mut sink = Sink::default();

    let request = Arc::new(UrnRequest::new("urn:cid:foo"));
    resolver.resolve(request, &mut sink).await;

    assert!(sink.delivered.is_empty());
    assert!(sink.missing.is_empty());
    assert!(resolver.registry().is_empty());
    assert_eq!(resolver.pool().outstanding(), 0);
}

#[tokio::test]
async fn invalid_utf8_in_reply_is_tolerated() {
    let mut reply = ok_reply("http://ok/x\r\n");
    reply.extend_from_slice(b"http://b\xadad/y\r\n");
    let service = Arc::new(Service::replying(reply));
    let netdb = Arc::new(NetDb::new(&[("ok", 10)]));
    let resolver = Resolver::new(netdb, service);
    let mut sink = Sink::default();

    let request = Arc::new(UrnRequest::new("urn:cid:foo"));
    resolver.resolve(request, &mut sink).await;

    // The garbled candidate is skipped; the well-formed one still wins.
    assert!(sink.missing.is_empty());
    let response = &sink.delivered[0];
    assert_eq!(response.header("Location"), Some("http://ok/x"));
    let body = std::str::from_utf8(response.body()).unwrap();
    assert!(body.contains("<A HREF=\"http://ok/x\">"));
}

#[tokio::test]
async fn concurrent_sessions_share_one_fetch() {
    let netdb = Arc::new(NetDb::new(&[("m", 10)]));
    let manual = Arc::new(Manual::default());
    let resolver = Resolver::new(netdb, manual.clone());
    let mut first_sink = Sink::default();
    let mut second_sink = Sink::default();

    let request = Arc::new(UrnRequest::new("urn:cid:foo"));
    let urlres = request.resolution_url().unwrap();
    let first = resolver.resolve(request.clone(), &mut first_sink);
    let second = resolver.resolve(request.clone(), &mut second_sink);

    let registry = resolver.registry().clone();
    let driver = async {
        let writer = loop {
            if registry.refs(&urlres) == 2 {
                break manual.writer.lock().unwrap().take().unwrap();
            }
            tokio::task::yield_now().await;
        };
        writer.append(&ok_reply("http://m/a\r\n"));
        writer.complete();
    };
    tokio::join!(first, second, driver);

    assert_eq!(manual.requests.lock().unwrap().len(), 1);
    assert_eq!(
        first_sink.delivered[0].header("Location"),
        Some("http://m/a")
    );
    assert_eq!(
        second_sink.delivered[0].header("Location"),
        Some("http://m/a")
    );
    assert!(resolver.registry().is_empty());
    assert_eq!(resolver.pool().outstanding(), 0);
}
