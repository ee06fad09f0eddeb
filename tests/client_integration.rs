//! End-to-end tests for the AFLUX client against a local mock server.
//!
//! The client is blocking, so each test drives wiremock on a private tokio
//! runtime and issues the client calls from the test thread itself.

use std::sync::Once;
use std::time::{Duration, Instant};

use aflux::{AfluxClient, AfluxError, RetryPolicy};
use serde_json::json;
use tokio::runtime::Runtime;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Installs the test subscriber once per binary; `RUST_LOG` selects what
/// the retry/request paths emit while tests run.
fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .init();
    });
}

fn runtime() -> Runtime {
    init_tracing();
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap()
}

fn start_server(rt: &Runtime) -> MockServer {
    rt.block_on(MockServer::start())
}

fn mount(rt: &Runtime, server: &MockServer, mock: Mock) {
    rt.block_on(mock.mount(server));
}

fn api_client(server: &MockServer, max_retries: Option<u32>) -> AfluxClient {
    AfluxClient::with_base_url(max_retries, format!("{}/API/aflux/?", server.uri())).unwrap()
}

/// A retry policy with delays short enough for tests.
fn fast_policy(max_retries: u32) -> RetryPolicy {
    RetryPolicy::new(
        max_retries,
        Duration::from_millis(10),
        Duration::from_secs(5),
        2.0,
    )
}

fn received_queries(rt: &Runtime, server: &MockServer) -> Vec<String> {
    rt.block_on(server.received_requests())
        .unwrap_or_default()
        .iter()
        .map(|r| r.url.query().unwrap_or_default().to_string())
        .collect()
}

#[test]
fn test_request_returns_parsed_json() {
    let rt = runtime();
    let server = start_server(&rt);
    mount(
        &rt,
        &server,
        Mock::given(method("GET")).and(path("/API/aflux/")).respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{"auid": "aflow:fc0e1b", "natoms": 3}])),
        ),
    );

    let client = api_client(&server, None);
    let response = client.request("natoms(3) ", None, None, false).unwrap();

    assert_eq!(response[0]["natoms"], json!(3));
}

#[test]
fn test_request_appends_default_paging_directive() {
    let rt = runtime();
    let server = start_server(&rt);
    mount(
        &rt,
        &server,
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([]))),
    );

    let client = api_client(&server, None);
    client.request("natoms(3) ", None, None, false).unwrap();

    let queries = received_queries(&rt, &server);
    assert_eq!(queries.len(), 1);
    assert!(
        queries[0].ends_with("$paging(0)format(json)"),
        "got query: {}",
        queries[0]
    );
    assert!(queries[0].contains("natoms(3)"), "got query: {}", queries[0]);
}

#[test]
fn test_request_appends_chunked_paging_directive() {
    let rt = runtime();
    let server = start_server(&rt);
    mount(
        &rt,
        &server,
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([]))),
    );

    let client = api_client(&server, None);
    client.request("natoms(3) ", None, Some(5), false).unwrap();
    client.request("natoms(3) ", Some(2), Some(64), false).unwrap();

    let queries = received_queries(&rt, &server);
    assert!(queries[0].ends_with("$paging(0,5)format(json)"), "got: {}", queries[0]);
    assert!(queries[1].ends_with("$paging(2,64)format(json)"), "got: {}", queries[1]);
}

#[test]
fn test_request_without_directives_uses_matchbook_verbatim() {
    let rt = runtime();
    let server = start_server(&rt);
    mount(
        &rt,
        &server,
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([]))),
    );

    let client = api_client(&server, None);
    client.request("natoms(3) ", None, None, true).unwrap();

    // The URL parser strips the matchbook's trailing space (it sits at
    // the very end of the URL); no directive suffix follows it.
    let queries = received_queries(&rt, &server);
    assert_eq!(queries[0], "natoms(3)");
}

#[test]
fn test_invalid_arguments_fail_before_any_network_call() {
    let rt = runtime();
    let server = start_server(&rt);
    mount(
        &rt,
        &server,
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(0),
    );

    let client = api_client(&server, None);

    for result in [
        client.request("natoms(3) ", None, Some(0), false),
        client.request("natoms(3) ", Some(-1), None, false),
        client.request("species(Si),whatever", None, None, false),
    ] {
        assert!(matches!(result, Err(AfluxError::InvalidArgument { .. })));
    }

    assert!(received_queries(&rt, &server).is_empty());
}

#[test]
fn test_non_success_status_is_an_http_error() {
    let rt = runtime();
    let server = start_server(&rt);
    mount(
        &rt,
        &server,
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(404)),
    );

    let client = api_client(&server, None);
    let result = client.request("natoms(3) ", None, None, false);

    match result {
        Err(AfluxError::HttpStatus { status, .. }) => assert_eq!(status, 404),
        other => panic!("expected HttpStatus, got: {other:?}"),
    }
    assert_eq!(received_queries(&rt, &server).len(), 1);
}

#[test]
fn test_non_json_body_is_a_decode_error() {
    let rt = runtime();
    let server = start_server(&rt);
    mount(
        &rt,
        &server,
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json at all")),
    );

    let client = api_client(&server, None);
    let result = client.request("natoms(3) ", None, None, false);
    assert!(matches!(result, Err(AfluxError::Decode { .. })));
}

#[test]
fn test_retrying_client_recovers_from_transient_statuses() {
    let rt = runtime();
    let server = start_server(&rt);
    mount(
        &rt,
        &server,
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2),
    );
    mount(
        &rt,
        &server,
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([]))),
    );

    let client = AfluxClient::with_retry_policy(
        Some(fast_policy(3)),
        format!("{}/API/aflux/?", server.uri()),
    )
    .unwrap();

    let response = client.request("natoms(3) ", None, None, false).unwrap();
    assert_eq!(response, json!([]));
    assert_eq!(received_queries(&rt, &server).len(), 3);
}

#[test]
fn test_retrying_client_surfaces_failure_once_budget_is_spent() {
    let rt = runtime();
    let server = start_server(&rt);
    mount(
        &rt,
        &server,
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(503)),
    );

    let client = AfluxClient::with_retry_policy(
        Some(fast_policy(2)),
        format!("{}/API/aflux/?", server.uri()),
    )
    .unwrap();

    let result = client.request("natoms(3) ", None, None, false);
    match result {
        Err(AfluxError::HttpStatus { status, .. }) => assert_eq!(status, 503),
        other => panic!("expected HttpStatus, got: {other:?}"),
    }
    // Initial attempt plus two retries.
    assert_eq!(received_queries(&rt, &server).len(), 3);
}

#[test]
fn test_retrying_client_does_not_retry_404() {
    let rt = runtime();
    let server = start_server(&rt);
    mount(
        &rt,
        &server,
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(404)),
    );

    let client = AfluxClient::with_retry_policy(
        Some(fast_policy(5)),
        format!("{}/API/aflux/?", server.uri()),
    )
    .unwrap();

    assert!(client.request("natoms(3) ", None, None, false).is_err());
    assert_eq!(received_queries(&rt, &server).len(), 1);
}

#[test]
fn test_no_retry_client_fails_on_first_transient_status() {
    let rt = runtime();
    let server = start_server(&rt);
    mount(
        &rt,
        &server,
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(503)),
    );

    let client = api_client(&server, None);
    assert!(client.request("natoms(3) ", None, None, false).is_err());
    assert_eq!(received_queries(&rt, &server).len(), 1);
}

#[test]
fn test_retry_after_header_overrides_backoff() {
    let rt = runtime();
    let server = start_server(&rt);
    mount(
        &rt,
        &server,
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
            .up_to_n_times(1),
    );
    mount(
        &rt,
        &server,
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([]))),
    );

    let client = AfluxClient::with_retry_policy(
        Some(fast_policy(2)),
        format!("{}/API/aflux/?", server.uri()),
    )
    .unwrap();

    let started = Instant::now();
    client.request("natoms(3) ", None, None, false).unwrap();
    let elapsed = started.elapsed();

    // The fast policy would back off ~10ms (+ up to 500ms jitter); the
    // full second proves the Retry-After header was honored instead.
    assert!(elapsed >= Duration::from_secs(1), "elapsed: {elapsed:?}");
    assert_eq!(received_queries(&rt, &server).len(), 2);
}

#[test]
fn test_general_help_joins_server_lines() {
    let rt = runtime();
    let server = start_server(&rt);
    mount(
        &rt,
        &server,
        Mock::given(method("GET")).respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!(["AFLUX: the LUX of AFLOW", "usage: ..."])),
        ),
    );

    let client = api_client(&server, None);
    client.help(None).unwrap();

    // General help carries no directives at all.
    let queries = received_queries(&rt, &server);
    assert_eq!(queries[0], "");
}

#[test]
fn test_keyword_help_formats_server_payload() {
    let rt = runtime();
    let server = start_server(&rt);
    mount(
        &rt,
        &server,
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(200).set_body_json(json!({
            // The keyword passes validation only with whitespace attached,
            // and the lookup key must match it exactly.
            "Egap ": {
                "description": "electronic band gap",
                "units": "eV",
                "status": "production",
                "__comment__": ["computed with standard settings"]
            }
        }))),
    );

    let client = api_client(&server, None);
    client.help(Some("Egap ")).unwrap();

    let queries = received_queries(&rt, &server);
    assert_eq!(queries[0], "help(Egap%20)");
}

#[test]
fn test_keyword_help_downgrades_http_failure_to_a_notice() {
    let rt = runtime();
    let server = start_server(&rt);
    mount(
        &rt,
        &server,
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(404)),
    );

    let client = api_client(&server, None);
    // Prints a notice and succeeds instead of surfacing the 404.
    client.help(Some("Egap ")).unwrap();
}

#[test]
fn test_client_teardown_is_clean_after_a_failed_call() {
    let rt = runtime();
    let server = start_server(&rt);
    mount(
        &rt,
        &server,
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(500)),
    );

    let client = api_client(&server, None);
    let result = client.request("natoms(3) ", None, None, false);
    assert!(result.is_err());

    // Dropping the client releases the session; ownership makes a second
    // release unrepresentable.
    drop(client);
}
