//! Default rendering of completion values.

mod common;

use bytes::Bytes;
use common::Harness;
use holdfast::{Outcome, Payload};
use serde::Serialize;

async fn render(payload: Payload) -> common::Written {
    let mut h = Harness::new("/render");
    let mut delay = h.delay();
    delay.end(Outcome::Value(payload)).unwrap();
    drop(delay);
    h.finish().await
}

#[tokio::test]
async fn test_empty_payload_ends_without_body() {
    let written = render(Payload::Empty).await;
    assert_eq!(written.status, 200);
    assert!(written.body.is_empty());

    let written = render(None::<String>.into()).await;
    assert!(written.body.is_empty());
}

#[tokio::test]
async fn test_bytes_and_text_render_identically() {
    let text = render(Payload::from("héllo wörld")).await;
    let bytes = render(Payload::from(Bytes::from("héllo wörld".as_bytes().to_vec()))).await;
    let vec = render(Payload::from("héllo wörld".as_bytes().to_vec())).await;

    assert_eq!(text.body, bytes.body);
    assert_eq!(text.body, vec.body);
    assert_eq!(text.body_str(), "héllo wörld");
}

#[derive(Serialize)]
struct Report {
    id: u32,
    tags: Vec<&'static str>,
    score: Option<f64>,
}

#[tokio::test]
async fn test_json_payload_round_trips() {
    let report = Report {
        id: 7,
        tags: vec!["a", "b"],
        score: Some(0.5),
    };
    let mut h = Harness::new("/render");
    let mut delay = h.delay();
    delay.json();
    delay.end(Outcome::Value(Payload::json(&report).unwrap())).unwrap();
    drop(delay);

    let written = h.finish().await;
    assert_eq!(written.headers.get("Content-Type").unwrap(), "application/json");
    let parsed: serde_json::Value = serde_json::from_slice(&written.body).unwrap();
    assert_eq!(parsed, serde_json::to_value(&report).unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_json_tolerates_leading_heartbeat() {
    let mut h = Harness::new("/render");
    let mut delay = h.delay();
    delay.json();
    let completion = delay
        .start(Some(std::time::Duration::from_millis(10)), None, None)
        .unwrap();
    let run = tokio::spawn(delay.run());

    tokio::time::sleep(std::time::Duration::from_millis(45)).await;
    completion.done(serde_json::json!({ "items": [1, 2, 3] }));
    run.await.unwrap().unwrap();

    let written = h.finish().await;
    assert!(written.body.starts_with(b"   {"));
    let parsed: serde_json::Value = serde_json::from_slice(&written.body).unwrap();
    assert_eq!(parsed["items"][2], 3);
}

#[tokio::test]
async fn test_stream_payload_is_piped() {
    let source: &'static [u8] = b"line one\nline two\n";
    let written = render(Payload::stream(source)).await;
    assert_eq!(written.body, source);
}

#[tokio::test]
async fn test_done_observer_takes_stream() {
    let mut h = Harness::new("/render");
    let mut delay = h.delay();
    delay.on_done(|ctx, payload| {
        ctx.response.write("prefix:");
        match payload.take() {
            Payload::Stream(reader) => {
                ctx.response.pipe(reader);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    });
    delay
        .end(Outcome::value(Payload::stream(&b"streamed"[..])))
        .unwrap();
    drop(delay);

    assert_eq!(h.finish().await.body_str(), "prefix:streamed");
}
