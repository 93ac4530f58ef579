#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bls_sync_core::config::{FetchConfig, SyncConfig};
use bls_sync_core::contract::{HttpResponse, MockHttpTransport, TransportError};
use bls_sync_core::fetch::{Fetcher, RetryPolicy};

pub const BASE_URL: &str = "https://download.example.gov/pub/time.series/pr/";

pub fn ok(body: &[u8]) -> Result<HttpResponse, TransportError> {
    Ok(HttpResponse {
        status: 200,
        body: body.to_vec(),
    })
}

pub fn status(code: u16) -> Result<HttpResponse, TransportError> {
    Ok(HttpResponse {
        status: code,
        body: Vec::new(),
    })
}

pub type Script = Vec<(String, Vec<Result<HttpResponse, TransportError>>)>;

/// Transport that answers each URL from a queue; the last response for a URL
/// repeats once the queue is down to one.
pub fn scripted_transport(script: Script) -> (MockHttpTransport, Arc<Mutex<Vec<String>>>) {
    let routes: HashMap<String, VecDeque<Result<HttpResponse, TransportError>>> = script
        .into_iter()
        .map(|(url, responses)| (url, responses.into_iter().collect()))
        .collect();
    let routes = Arc::new(Mutex::new(routes));
    let calls = Arc::new(Mutex::new(Vec::new()));
    let calls_log = calls.clone();

    let mut transport = MockHttpTransport::new();
    transport.expect_get().returning(move |url: &str| {
        calls_log.lock().unwrap().push(url.to_string());
        let mut routes = routes.lock().unwrap();
        let queue = routes
            .get_mut(url)
            .unwrap_or_else(|| panic!("unexpected request for {url}"));
        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue.front().cloned().unwrap()
        }
    });
    (transport, calls)
}

pub fn fast_fetcher(transport: MockHttpTransport) -> Fetcher<MockHttpTransport> {
    Fetcher::with_policy(
        transport,
        Duration::ZERO,
        RetryPolicy {
            max_attempts: 4,
            backoff: Duration::ZERO,
        },
    )
}

pub fn test_config(delete_missing: bool) -> SyncConfig {
    let mut config = SyncConfig::new("test-bucket", "/bls/pr/");
    config.base_url = BASE_URL.to_string();
    config.delete_missing = delete_missing;
    config.fetch = FetchConfig {
        rate_limit: Duration::ZERO,
        backoff: Duration::ZERO,
        ..FetchConfig::default()
    };
    config
}

pub fn file_url(name: &str) -> String {
    format!("{BASE_URL}{name}")
}

/// IIS-style listing with a parent link, a subdirectory and the given files.
pub fn iis_listing(files: &[(&str, u64)]) -> String {
    let mut html = String::from(
        "<html><head><title>download.example.gov - /pub/time.series/pr/</title></head><body>\
         <H1>download.example.gov - /pub/time.series/pr/</H1><hr>\n\n<pre>\
         <A HREF=\"/pub/time.series/\">[To Parent Directory]</A><br><br>",
    );
    for (name, size) in files {
        html.push_str(&format!(
            " 1/3/2024  8:30 AM {size:>12} <A HREF=\"/pub/time.series/pr/{name}\">{name}</A><br>"
        ));
    }
    html.push_str(
        "12/12/2023 10:00 AM        &lt;dir&gt; <A HREF=\"/pub/time.series/pr/archive/\">archive</A><br>\
         </pre><hr></body></html>",
    );
    html
}
