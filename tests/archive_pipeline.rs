//! End-to-end tests of the archival pipeline against a mock HTTP server.
//!
//! Every test runs the full pipeline (fetch, discover, rewrite, WARC) and
//! inspects the archive it produced. No real network access is needed.

use std::time::Duration;

use httptest::{all_of, matchers::*, responders::*, Expectation, Server};
use tempfile::TempDir;

use page_warc::rewrite::data_uri;
use page_warc::warc::{parse_records, read_archive, ParsedRecord};
use page_warc::{
    capture, new_archive_with, ArchivalRequest, ArchiveError, Config, Cookie, WarningType,
};

const PNG: &[u8] = b"\x89PNG\r\n\x1a\nfake image";

fn test_config() -> Config {
    Config {
        retry_initial_delay_ms: 10,
        compress: false,
        ..Default::default()
    }
}

fn request_for(url: &str) -> ArchivalRequest {
    ArchivalRequest {
        url: url.to_string(),
        ..Default::default()
    }
}

fn html(body: &str) -> ResponseBuilder<String> {
    status_code(200)
        .insert_header("Content-Type", "text/html; charset=utf-8")
        .body(body.to_string())
}

fn record_types(records: &[ParsedRecord]) -> Vec<&str> {
    records
        .iter()
        .map(|record| record.record_type().unwrap_or("?"))
        .collect()
}

/// The response record archived for `url`.
fn response_for<'a>(records: &'a [ParsedRecord], url: &str) -> &'a ParsedRecord {
    records
        .iter()
        .find(|record| record.record_type() == Some("response") && record.target_uri() == Some(url))
        .unwrap_or_else(|| panic!("no response record for {url}"))
}

fn archived_page(records: &[ParsedRecord]) -> String {
    let resource = records.last().expect("archive is not empty");
    assert_eq!(resource.record_type(), Some("resource"));
    String::from_utf8(resource.block.clone()).expect("page is utf-8")
}

#[tokio::test]
async fn test_single_image_page() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/"))
            .respond_with(html(r#"<html><body><h1>Hi</h1><img src="/a.png"></body></html>"#)),
    );
    server.expect(
        Expectation::matching(request::method_path("GET", "/a.png")).respond_with(
            status_code(200)
                .insert_header("Content-Type", "image/png")
                .body(PNG),
        ),
    );

    let dir = TempDir::new().expect("tempdir");
    let output = dir.path().join("page");
    let root_url = format!("http://{}/", server.addr());
    let report = new_archive_with(
        &request_for(&root_url),
        output.to_str().expect("utf-8 path"),
        &test_config(),
    )
    .await
    .expect("archive should be written");

    assert_eq!(report.output_path, dir.path().join("page.warc"));
    assert_eq!(report.url, root_url);
    assert_eq!(report.resources_discovered, 1);
    assert_eq!(report.fetched, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(report.network_requests, 2);
    assert!(!report.degraded);

    let data = std::fs::read(&report.output_path).expect("archive exists");
    let records = parse_records(&data).expect("valid WARC");
    assert_eq!(
        record_types(&records),
        ["warcinfo", "request", "response", "request", "response", "resource"]
    );
    assert_eq!(records[2].target_uri(), Some(root_url.as_str()));
    assert_eq!(records[2].http_status(), Some(200));

    let image_url = format!("{root_url}a.png");
    let image = response_for(&records, &image_url);
    assert_eq!(image.http_status(), Some(200));
    assert_eq!(image.http_body(), Some(PNG));
    assert!(image.header("WARC-Payload-Digest").is_some_and(|d| d.starts_with("sha256:")));

    let page = archived_page(&records);
    assert!(page.contains(&data_uri("image/png", PNG)));
    assert!(page.contains("<h1>Hi</h1>"));
    assert_eq!(
        records[5].header("WARC-Refers-To"),
        records[2].header("WARC-Record-ID")
    );
}

#[tokio::test]
async fn test_failed_resources_are_still_archived() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/")).respond_with(html(
            r#"<html><body>
                <img src="/missing.png">
                <img src="http://127.0.0.1:1/refused.png">
                <img src="/ok.png">
            </body></html>"#,
        )),
    );
    server.expect(
        Expectation::matching(request::method_path("GET", "/missing.png"))
            .respond_with(status_code(404).body("not here")),
    );
    server.expect(
        Expectation::matching(request::method_path("GET", "/ok.png")).respond_with(
            status_code(200)
                .insert_header("Content-Type", "image/png")
                .body(PNG),
        ),
    );

    let root_url = format!("http://{}/", server.addr());
    let page = capture(&request_for(&root_url), &test_config())
        .await
        .expect("resource failures are not fatal");
    assert_eq!(page.fetched, 1);
    assert_eq!(page.failed, 2);

    let mut data = Vec::new();
    page.write_to(&mut data).expect("write to memory");
    let records = parse_records(&data).expect("valid WARC");
    assert_eq!(records.len(), 1 + 2 * 4 + 1);

    let missing_url = format!("{root_url}missing.png");
    let missing = response_for(&records, &missing_url);
    assert_eq!(missing.http_status(), Some(404));
    assert_eq!(missing.http_body(), Some(b"not here".as_slice()));
    assert_eq!(missing.header("WARC-Fetch-Error"), Some("HTTP status 404"));

    let refused = response_for(&records, "http://127.0.0.1:1/refused.png");
    assert_eq!(refused.http_status(), Some(502));
    assert!(refused.header("WARC-Fetch-Error").is_some());

    // Failed references keep their absolute URL
    let html = archived_page(&records);
    assert!(html.contains(&format!(r#"src="{missing_url}""#)));
    assert!(html.contains(r#"src="http://127.0.0.1:1/refused.png""#));
    assert!(html.contains(&data_uri("image/png", PNG)));
}

#[tokio::test]
async fn test_root_failure_leaves_no_file() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/gone"))
            .respond_with(status_code(404).body("gone")),
    );
    server.expect(
        Expectation::matching(request::method_path("GET", "/data.json")).respond_with(
            status_code(200)
                .insert_header("Content-Type", "application/json")
                .body("{}"),
        ),
    );

    let dir = TempDir::new().expect("tempdir");
    let output = dir.path().join("page");
    let output = output.to_str().expect("utf-8 path");

    let result = new_archive_with(
        &request_for(&format!("http://{}/gone", server.addr())),
        output,
        &test_config(),
    )
    .await;
    assert!(matches!(
        result,
        Err(ArchiveError::RootStatus { status: 404, .. })
    ));

    let result = new_archive_with(
        &request_for(&format!("http://{}/data.json", server.addr())),
        output,
        &test_config(),
    )
    .await;
    assert!(matches!(result, Err(ArchiveError::NotHtml { .. })));

    let result = new_archive_with(
        &request_for("http://127.0.0.1:1/"),
        output,
        &test_config(),
    )
    .await;
    assert!(matches!(result, Err(ArchiveError::RootFetch { .. })));

    let result = new_archive_with(
        &request_for("mailto:someone@example.com"),
        output,
        &test_config(),
    )
    .await;
    assert!(matches!(result, Err(ArchiveError::InvalidUrl { .. })));

    assert_eq!(std::fs::read_dir(dir.path()).expect("list").count(), 0);
}

#[tokio::test]
async fn test_stylesheet_imports_are_followed_and_cycles_broken() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/")).respond_with(html(
            r#"<html><head><link rel="stylesheet" href="/css/a.css"></head><body></body></html>"#,
        )),
    );
    server.expect(
        Expectation::matching(request::method_path("GET", "/css/a.css")).respond_with(
            status_code(200)
                .insert_header("Content-Type", "text/css")
                .body(r#"@import "b.css"; body{background:url(bg.png)}"#),
        ),
    );
    server.expect(
        Expectation::matching(request::method_path("GET", "/css/b.css")).respond_with(
            status_code(200)
                .insert_header("Content-Type", "text/css")
                .body(r#"@import "a.css"; p{background:url(/img/p.png)}"#),
        ),
    );
    for path in ["/css/bg.png", "/img/p.png"] {
        server.expect(
            Expectation::matching(request::method_path("GET", path)).respond_with(
                status_code(200)
                    .insert_header("Content-Type", "image/png")
                    .body(PNG),
            ),
        );
    }

    let root_url = format!("http://{}/", server.addr());
    let page = capture(&request_for(&root_url), &test_config())
        .await
        .expect("capture");

    assert_eq!(page.resources_discovered, 4);
    assert_eq!(page.fetched, 4);
    assert_eq!(page.stats.get_warning_count(WarningType::CssImportCycle), 1);
    let targets: Vec<&str> = page
        .records
        .iter()
        .filter(|record| record.record_type.to_string() == "request")
        .filter_map(|record| record.target_uri.as_deref())
        .collect();
    assert_eq!(
        targets,
        [
            root_url.clone(),
            format!("{root_url}css/a.css"),
            format!("{root_url}css/b.css"),
            format!("{root_url}css/bg.png"),
            format!("{root_url}img/p.png"),
        ]
    );

    let image = data_uri("image/png", PNG);
    let b = format!(
        r#"@import url("{root_url}css/a.css"); p{{background:url("{image}")}}"#
    );
    let a = format!(
        r#"@import url("{}"); body{{background:url("{image}")}}"#,
        data_uri("text/css", b.as_bytes())
    );
    assert!(page
        .html
        .contains(&format!(r#"href="{}""#, data_uri("text/css", a.as_bytes()))));
}

#[tokio::test]
async fn test_each_distinct_url_is_fetched_once() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/")).respond_with(html(
            r#"<html><head><link rel="stylesheet" href="/s.css"></head><body>
                <img src="/a.png">
                <img src="/a.png#again" srcset="/a.png 2x">
                <div style="background:url('a.png?utm_source=feed')"></div>
            </body></html>"#,
        )),
    );
    server.expect(
        Expectation::matching(request::method_path("GET", "/s.css"))
            .times(1)
            .respond_with(
                status_code(200)
                    .insert_header("Content-Type", "text/css")
                    .body("div{background:url(a.png)}"),
            ),
    );
    server.expect(
        Expectation::matching(request::method_path("GET", "/a.png"))
            .times(1)
            .respond_with(
                status_code(200)
                    .insert_header("Content-Type", "image/png")
                    .body(PNG),
            ),
    );

    let root_url = format!("http://{}/", server.addr());
    let page = capture(&request_for(&root_url), &test_config())
        .await
        .expect("capture");

    assert_eq!(page.network_requests, 3);
    assert_eq!(page.resources_discovered, 2);
    // warcinfo, three exchanges, rewritten page
    assert_eq!(page.records.len(), 1 + 2 * 3 + 1);
    assert!(!page.html.contains("a.png"));
}

#[tokio::test]
async fn test_run_timeout_produces_degraded_archive() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/"))
            .respond_with(html(r#"<html><body><img src="/slow.png"></body></html>"#)),
    );
    server.expect(
        Expectation::matching(request::method_path("GET", "/slow.png")).respond_with(
            delay_and_then(Duration::from_secs(3), status_code(200).body(PNG)),
        ),
    );

    let config = Config {
        run_timeout: Duration::from_millis(500),
        ..test_config()
    };
    let root_url = format!("http://{}/", server.addr());
    let page = capture(&request_for(&root_url), &config)
        .await
        .expect("a timed out run still captures");

    assert!(page.degraded);
    assert_eq!(page.failed, 1);

    let mut data = Vec::new();
    page.write_to(&mut data).expect("write to memory");
    let records = parse_records(&data).expect("valid WARC");
    let info = String::from_utf8_lossy(&records[0].block).into_owned();
    assert!(info.contains("degraded: true"));

    let slow = response_for(&records, &format!("{root_url}slow.png"));
    assert_eq!(slow.http_status(), Some(504));
    assert_eq!(
        slow.header("WARC-Fetch-Error"),
        Some("cancelled by run timeout")
    );
}

#[tokio::test]
async fn test_compressed_output() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/"))
            .respond_with(html("<html><body><p>plain page</p></body></html>")),
    );

    let dir = TempDir::new().expect("tempdir");
    let output = dir.path().join("page");
    let config = Config {
        compress: true,
        ..test_config()
    };
    let report = new_archive_with(
        &request_for(&format!("http://{}/", server.addr())),
        output.to_str().expect("utf-8 path"),
        &config,
    )
    .await
    .expect("archive");

    assert_eq!(report.output_path, dir.path().join("page.warc.gz"));
    let data = std::fs::read(&report.output_path).expect("archive exists");
    assert!(data.starts_with(&[0x1f, 0x8b]));
    let records = read_archive(&data).expect("valid WARC.gz");
    assert_eq!(
        record_types(&records),
        ["warcinfo", "request", "response", "resource"]
    );
    assert!(archived_page(&records).contains("plain page"));
}

#[tokio::test]
async fn test_strip_scripts_skips_script_fetches() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/")).respond_with(html(
            r#"<html><head><script src="/app.js"></script></head>
            <body><p>content</p><img src="/pixel.gif" width="1" height="1"></body></html>"#,
        )),
    );

    let config = Config {
        strip_scripts: true,
        ..test_config()
    };
    let page = capture(
        &request_for(&format!("http://{}/", server.addr())),
        &config,
    )
    .await
    .expect("capture");

    assert_eq!(page.resources_discovered, 0);
    assert!(!page.html.contains("<script"));
    assert!(!page.html.contains("pixel.gif"));
    assert!(page.html.contains("<p>content</p>"));
}

fn expect_with_credentials(
    server: &Server,
    path: &'static str,
    responder: impl Responder + 'static,
) {
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", path),
            request::headers(contains(("cookie", "session=abc; theme=dark"))),
            request::headers(contains(("x-archive", "yes"))),
        ])
        .respond_with(responder),
    );
}

#[tokio::test]
async fn test_configured_headers_and_cookies_are_sent() {
    let server = Server::run();
    expect_with_credentials(
        &server,
        "/",
        html(r#"<html><body><img src="/a.png"></body></html>"#),
    );
    expect_with_credentials(
        &server,
        "/a.png",
        status_code(200)
            .insert_header("Content-Type", "image/png")
            .body(PNG),
    );

    let mut request = request_for(&format!("http://{}/", server.addr()));
    request.cookies = vec![Cookie::new("session", "abc"), Cookie::new("theme", "dark")];
    request
        .extra_headers
        .insert("X-Archive".to_string(), "yes".to_string());

    let page = capture(&request, &test_config()).await.expect("capture");
    let request_block = String::from_utf8_lossy(&page.records[1].block).into_owned();
    assert!(request_block.contains("Cookie: session=abc; theme=dark\r\n"));
    assert!(request_block.contains("X-Archive: yes\r\n"));
}

#[tokio::test]
async fn test_legacy_charset_page_is_transcoded() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/")).respond_with(
            status_code(200)
                .insert_header("Content-Type", "text/html; charset=windows-1252")
                .body(
                    &b"<html><head><meta charset=\"windows-1252\"></head><body><p>caf\xe9 \x93quoted\x94</p></body></html>"[..],
                ),
        ),
    );

    let page = capture(
        &request_for(&format!("http://{}/", server.addr())),
        &test_config(),
    )
    .await
    .expect("capture");

    assert!(page.html.contains("<p>caf\u{e9} \u{201c}quoted\u{201d}</p>"));
    assert!(page.html.contains(r#"<meta charset="utf-8"/>"#));
    assert!(!page.html.contains('\u{fffd}'));

    let mut data = Vec::new();
    page.write_to(&mut data).expect("write to memory");
    let records = parse_records(&data).expect("valid WARC");
    assert!(archived_page(&records).contains("caf\u{e9}"));
    // The response record keeps the bytes as served
    let root = &records[2];
    assert!(root
        .http_body()
        .is_some_and(|body| body.windows(4).any(|w| w == b"caf\xe9")));
}

#[tokio::test]
async fn test_import_chain_stops_at_depth_limit() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/")).respond_with(html(
            r#"<html><head><link rel="stylesheet" href="/css/s0.css"></head><body></body></html>"#,
        )),
    );
    for (path, body) in [
        ("/css/s0.css", r#"@import "s1.css"; .a{color:red}"#),
        ("/css/s1.css", r#"@import "s2.css"; .b{color:green}"#),
        ("/css/s2.css", r#"@import "s3.css"; .c{color:blue}"#),
    ] {
        server.expect(
            Expectation::matching(request::method_path("GET", path))
                .times(1)
                .respond_with(
                    status_code(200)
                        .insert_header("Content-Type", "text/css")
                        .body(body),
                ),
        );
    }
    server.expect(
        Expectation::matching(request::method_path("GET", "/css/s3.css"))
            .times(0)
            .respond_with(status_code(200).body(".d{}")),
    );

    let config = Config {
        max_css_depth: 2,
        ..test_config()
    };
    let root_url = format!("http://{}/", server.addr());
    let page = capture(&request_for(&root_url), &config)
        .await
        .expect("capture");

    assert_eq!(page.resources_discovered, 3);
    assert_eq!(page.fetched, 3);
    assert_eq!(
        page.stats.get_warning_count(WarningType::CssImportDepthLimit),
        1
    );
    let too_deep = format!("{root_url}css/s3.css");
    assert!(!page
        .records
        .iter()
        .any(|record| record.target_uri.as_deref() == Some(too_deep.as_str())));

    // The deepest sheet still names the unfetched import by absolute URL
    let s2 = format!(r#"@import url("{too_deep}"); .c{{color:blue}}"#);
    let s1 = format!(
        r#"@import url("{}"); .b{{color:green}}"#,
        data_uri("text/css", s2.as_bytes())
    );
    let s0 = format!(
        r#"@import url("{}"); .a{{color:red}}"#,
        data_uri("text/css", s1.as_bytes())
    );
    assert!(page
        .html
        .contains(&format!(r#"href="{}""#, data_uri("text/css", s0.as_bytes()))));
}

#[tokio::test]
async fn test_redirected_root_is_archived_once() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/"))
            .times(1)
            .respond_with(
                status_code(301).insert_header("Location", server.url_str("/home").as_str()),
            ),
    );
    server.expect(
        Expectation::matching(request::method_path("GET", "/home"))
            .times(1)
            .respond_with(html(
                r#"<html><body><iframe src="/home#main"></iframe><img src="/a.png"></body></html>"#,
            )),
    );
    server.expect(
        Expectation::matching(request::method_path("GET", "/a.png"))
            .times(1)
            .respond_with(
                status_code(200)
                    .insert_header("Content-Type", "image/png")
                    .body(PNG),
            ),
    );

    let root_url = format!("http://{}/", server.addr());
    let page = capture(&request_for(&root_url), &test_config())
        .await
        .expect("capture");

    assert_eq!(page.resources_discovered, 1);
    assert_eq!(page.network_requests, 2);
    assert_eq!(page.records.len(), 1 + 2 * 2 + 1);
    assert!(page.html.contains(&data_uri("image/png", PNG)));
}
