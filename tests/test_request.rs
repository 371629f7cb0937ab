use std::time::Duration;

use holdfast::http::request::{AbortSignal, Method, RequestBuilder};

#[test]
fn test_request_header_lookup_ignores_case() {
    let req = RequestBuilder::new()
        .method(Method::GET)
        .path("/")
        .header("Content-Type", "application/json")
        .build()
        .unwrap();

    assert_eq!(req.header("content-type"), Some("application/json"));
    assert_eq!(req.header("Missing"), None);
}

#[test]
fn test_request_route_and_query() {
    let req = RequestBuilder::new()
        .method(Method::GET)
        .path("/poll?work=1500&interval=25&note=a%20b")
        .build()
        .unwrap();

    assert_eq!(req.route(), "/poll");
    assert_eq!(req.query_millis("work"), Some(1500));
    assert_eq!(req.query_millis("interval"), Some(25));
    assert_eq!(req.query("note").as_deref(), Some("a b"));
    assert_eq!(req.query("missing"), None);
    assert_eq!(req.query_millis("note"), None);
}

#[test]
fn test_request_builder_requires_method_and_path() {
    assert_eq!(RequestBuilder::new().path("/").build().unwrap_err(), "method missing");
    assert_eq!(
        RequestBuilder::new().method(Method::GET).build().unwrap_err(),
        "path missing"
    );
    let req = RequestBuilder::new().method(Method::PUT).path("/x").build().unwrap();
    assert_eq!(req.version, "HTTP/1.1");
    assert_eq!(req.method.as_str(), "PUT");
}

#[test]
fn test_request_method_from_string() {
    assert_eq!(Method::from_str("GET"), Some(Method::GET));
    assert_eq!(Method::from_str("PATCH"), Some(Method::PATCH));
    assert_eq!(Method::from_str("get"), None);
}

#[tokio::test]
async fn test_abort_signal_fires() {
    let (aborter, signal) = AbortSignal::pair();
    let observer = signal.clone();
    assert!(!signal.is_aborted());

    let waiter = tokio::spawn(async move { observer.aborted().await });
    aborter.abort();
    waiter.await.unwrap();
    assert!(signal.is_aborted());
}

#[tokio::test]
async fn test_dropped_aborter_never_fires() {
    let (aborter, signal) = AbortSignal::pair();
    drop(aborter);

    let res = tokio::time::timeout(Duration::from_millis(20), signal.aborted()).await;
    assert!(res.is_err());
    assert!(!AbortSignal::never().is_aborted());
}
