// Fetcher tests against local mock servers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use httptest::{all_of, cycle, matchers::*, responders::*, Expectation, Server};

use super::*;
use crate::config::Cookie;
use crate::error_handling::ErrorType;

fn test_config() -> Config {
    Config {
        fetch_timeout: Duration::from_secs(5),
        retry_initial_delay_ms: 10,
        ..Config::default()
    }
}

fn test_fetcher(config: &Config) -> (Fetcher, Arc<ProcessingStats>) {
    let stats = Arc::new(ProcessingStats::new());
    let request = ArchivalRequest::default();
    let fetcher = Fetcher::new(&request, config, Arc::clone(&stats)).expect("client builds");
    (fetcher, stats)
}

#[tokio::test]
async fn test_fetch_success_captures_response() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/a.png")).respond_with(
            status_code(200)
                .insert_header("Content-Type", "image/png")
                .body("PNGDATA"),
        ),
    );
    let (fetcher, _) = test_fetcher(&test_config());
    let url = server.url_str("/a.png");

    let result = fetcher.fetch(&url).await;
    assert!(result.is_success());
    assert_eq!(result.status, Some(200));
    assert_eq!(result.mime_type().as_deref(), Some("image/png"));
    assert_eq!(result.body.as_deref(), Some(&b"PNGDATA"[..]));
    assert_eq!(result.requested_url, url);
    assert_eq!(result.final_url, url);
    assert!(result
        .headers
        .iter()
        .any(|(name, value)| name == "content-type" && value == "image/png"));
}

#[tokio::test]
async fn test_fetch_deduplicates_concurrent_requests() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/shared.css"))
            .times(1)
            .respond_with(
                delay_and_then(
                    Duration::from_millis(50),
                    status_code(200)
                        .insert_header("Content-Type", "text/css")
                        .body("body{}"),
                ),
            ),
    );
    let (fetcher, stats) = test_fetcher(&test_config());
    let url = server.url_str("/shared.css");

    let results = fetcher
        .fetch_all(&[url.clone(), url.clone(), url.clone()])
        .await;
    assert_eq!(results.len(), 3);
    assert!(Arc::ptr_eq(&results[0], &results[1]));
    assert!(Arc::ptr_eq(&results[1], &results[2]));
    assert_eq!(fetcher.network_requests(), 1);
    assert_eq!(stats.get_info_count(InfoType::DuplicateReference), 2);

    // Later requests are served from the cache too
    let again = fetcher.fetch(&url).await;
    assert!(Arc::ptr_eq(&again, &results[0]));
    assert_eq!(fetcher.network_requests(), 1);
}

#[tokio::test]
async fn test_fetch_all_preserves_input_order() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/slow"))
            .respond_with(delay_and_then(Duration::from_millis(100), status_code(200).body("slow"))),
    );
    server.expect(
        Expectation::matching(request::method_path("GET", "/fast"))
            .respond_with(status_code(200).body("fast")),
    );
    let (fetcher, _) = test_fetcher(&test_config());
    let urls = vec![server.url_str("/slow"), server.url_str("/fast")];

    let results = fetcher.fetch_all(&urls).await;
    assert_eq!(results[0].requested_url, urls[0]);
    assert_eq!(results[1].requested_url, urls[1]);
    assert_eq!(results[0].body_text().as_deref(), Some("slow"));
}

#[tokio::test]
async fn test_fetch_all_respects_concurrency_limit() {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let server = Server::run();
    let responder = {
        let in_flight = Arc::clone(&in_flight);
        let peak = Arc::clone(&peak);
        move || {
            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(100));
            in_flight.fetch_sub(1, Ordering::SeqCst);
            status_code(200).body("item")
        }
    };
    server.expect(
        Expectation::matching(request::method_path("GET", matches("^/item/[0-9]$")))
            .times(6)
            .respond_with(responder),
    );

    let request = ArchivalRequest {
        max_concurrent_download: 2,
        ..ArchivalRequest::default()
    };
    let fetcher = Fetcher::new(&request, &test_config(), Arc::new(ProcessingStats::new()))
        .expect("client builds");
    let urls: Vec<String> = (0..6).map(|i| server.url_str(&format!("/item/{i}"))).collect();

    let started = std::time::Instant::now();
    let results = fetcher.fetch_all(&urls).await;
    assert!(results.iter().all(|result| result.is_success()));
    assert_eq!(fetcher.network_requests(), 6);
    let peak = peak.load(Ordering::SeqCst);
    assert!((1..=2).contains(&peak), "peak in-flight requests was {peak}");
    // Six requests through two slots take at least three rounds
    assert!(started.elapsed() >= Duration::from_millis(300));
}

#[tokio::test]
async fn test_fetch_not_found_is_not_retried() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/missing.png"))
            .times(1)
            .respond_with(status_code(404).body("nope")),
    );
    let (fetcher, stats) = test_fetcher(&test_config());

    let result = fetcher.fetch(&server.url_str("/missing.png")).await;
    assert!(!result.is_success());
    assert_eq!(result.status, Some(404));
    assert_eq!(result.error, Some(ResourceFetchError::Status(404)));
    assert_eq!(result.body.as_deref(), Some(&b"nope"[..]));
    assert_eq!(stats.get_error_count(ErrorType::HttpRequestNotFound), 1);
    assert_eq!(stats.get_info_count(InfoType::FetchRetried), 0);
}

#[tokio::test]
async fn test_fetch_server_error_is_retried() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/flaky"))
            .times(3)
            .respond_with(status_code(500)),
    );
    let (fetcher, stats) = test_fetcher(&test_config());

    let result = fetcher.fetch(&server.url_str("/flaky")).await;
    assert_eq!(result.status, Some(500));
    assert_eq!(result.error, Some(ResourceFetchError::Status(500)));
    assert_eq!(stats.get_info_count(InfoType::FetchRetried), 2);
    assert_eq!(stats.get_error_count(ErrorType::HttpRequestServerError), 1);
    assert_eq!(fetcher.network_requests(), 1);
}

#[tokio::test]
async fn test_fetch_recovers_after_transient_error() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/recovering"))
            .times(2)
            .respond_with(cycle![status_code(503), status_code(200).body("ok")]),
    );
    let (fetcher, stats) = test_fetcher(&test_config());

    let result = fetcher.fetch(&server.url_str("/recovering")).await;
    assert!(result.is_success());
    assert_eq!(result.body_text().as_deref(), Some("ok"));
    assert_eq!(stats.total_errors(), 0);
}

#[tokio::test]
async fn test_fetch_connection_refused() {
    let (fetcher, stats) = test_fetcher(&test_config());

    let result = fetcher.fetch("http://127.0.0.1:1/unreachable.png").await;
    assert!(result.status.is_none());
    assert!(matches!(result.error, Some(ResourceFetchError::Connect(_))));
    assert!(result.body.is_none());
    assert_eq!(stats.get_error_count(ErrorType::HttpRequestConnectError), 1);
    assert_eq!(stats.get_info_count(InfoType::FetchRetried), 2);
}

#[tokio::test]
async fn test_fetch_attempt_timeout() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/hang"))
            .times(1)
            .respond_with(delay_and_then(Duration::from_millis(500), status_code(200))),
    );
    let config = Config {
        fetch_timeout: Duration::from_millis(50),
        retry_max_attempts: 1,
        ..test_config()
    };
    let (fetcher, stats) = test_fetcher(&config);

    let result = fetcher.fetch(&server.url_str("/hang")).await;
    assert_eq!(result.error, Some(ResourceFetchError::Timeout));
    assert_eq!(stats.get_error_count(ErrorType::HttpRequestTimeoutError), 1);
}

#[tokio::test]
async fn test_fetch_rejects_oversized_body() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/big.bin"))
            .times(1)
            .respond_with(status_code(200).body(vec![b'x'; 1024])),
    );
    let config = Config {
        max_resource_size: 100,
        ..test_config()
    };
    let (fetcher, stats) = test_fetcher(&config);

    let result = fetcher.fetch(&server.url_str("/big.bin")).await;
    assert_eq!(result.error, Some(ResourceFetchError::TooLarge { limit: 100 }));
    assert!(result.body.is_none());
    assert_eq!(stats.get_error_count(ErrorType::ResourceTooLarge), 1);
}

#[tokio::test]
async fn test_fetch_sends_configured_headers() {
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/page"),
            request::headers(contains(("user-agent", "archiver-test/2.0"))),
            request::headers(contains(("x-trace", "abc"))),
            request::headers(contains(("cookie", "session=42; theme=dark"))),
        ])
        .respond_with(status_code(200)),
    );
    let mut request = ArchivalRequest {
        user_agent: "archiver-test/2.0".to_string(),
        cookies: vec![Cookie::new("session", "42"), Cookie::new("theme", "dark")],
        ..ArchivalRequest::default()
    };
    request
        .extra_headers
        .insert("X-Trace".to_string(), "abc".to_string());
    let fetcher = Fetcher::new(&request, &test_config(), Arc::new(ProcessingStats::new()))
        .expect("client builds");

    let result = fetcher.fetch(&server.url_str("/page")).await;
    assert!(result.is_success());
    assert!(result
        .request_headers
        .iter()
        .any(|(name, value)| name == "Cookie" && value == "session=42; theme=dark"));
}

#[tokio::test]
async fn test_fetch_follows_redirects() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/old.png")).respond_with(
            status_code(301).insert_header("Location", server.url_str("/new.png").as_str()),
        ),
    );
    server.expect(
        Expectation::matching(request::method_path("GET", "/new.png"))
            .respond_with(status_code(200).body("moved")),
    );
    let (fetcher, _) = test_fetcher(&test_config());

    let result = fetcher.fetch(&server.url_str("/old.png")).await;
    assert!(result.is_success());
    assert_eq!(result.final_url, server.url_str("/new.png"));
    assert_eq!(result.requested_url, server.url_str("/old.png"));
}

#[tokio::test]
async fn test_fetch_all_until_deadline_cancels_pending() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/quick"))
            .respond_with(status_code(200).body("quick")),
    );
    server.expect(
        Expectation::matching(request::method_path("GET", "/stuck"))
            .respond_with(delay_and_then(Duration::from_secs(1), status_code(200))),
    );
    let (fetcher, stats) = test_fetcher(&test_config());
    let urls = vec![server.url_str("/quick"), server.url_str("/stuck")];

    // Let the quick fetch finish before the deadline hits
    let deadline = Instant::now() + Duration::from_millis(300);
    let batch = fetcher.fetch_all_until(&urls, Some(deadline)).await;

    assert!(batch.timed_out);
    assert!(batch.results[0].is_success());
    assert_eq!(batch.results[1].error, Some(ResourceFetchError::Cancelled));
    assert_eq!(stats.get_error_count(ErrorType::FetchCancelled), 1);
}

#[tokio::test]
async fn test_fetch_all_without_deadline_does_not_time_out() {
    let (fetcher, _) = test_fetcher(&test_config());
    let batch = fetcher.fetch_all_until(&[], None).await;
    assert!(!batch.timed_out);
    assert!(batch.results.is_empty());
}
