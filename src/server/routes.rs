//! Demo routes exercising both delay modes.
//!
//! - `GET /` answers immediately.
//! - `GET /wait?work=ms&timeout=ms` holds the response without keepalive
//!   traffic; on timeout a "cancel" observer answers 202 with a JSON note.
//! - `GET /poll?work=ms&interval=ms` streams heartbeats until the simulated
//!   job completes, then renders a JSON result.

use std::time::Duration;

use serde::Serialize;

use crate::config::DelayConfig;
use crate::delay::{DelayedResponse, Payload};
use crate::http::request::{Incoming, Method};
use crate::http::response::{Outgoing, Response, ResponseBuilder, StatusCode};

#[derive(Debug, Serialize)]
struct JobResult {
    done: bool,
    worked_ms: u64,
}

async fn simulated_job(work: Duration) -> anyhow::Result<Payload> {
    tokio::time::sleep(work).await;
    Ok(Payload::json(&JobResult {
        done: true,
        worked_ms: work.as_millis() as u64,
    })?)
}

/// Serves one request to completion.
pub async fn handle(incoming: Incoming, response: Outgoing, cfg: &DelayConfig) -> anyhow::Result<()> {
    if incoming.request.method != Method::GET {
        response.send(
            ResponseBuilder::new(StatusCode::MethodNotAllowed)
                .body(b"405 Method Not Allowed".to_vec())
                .build(),
        );
        return Ok(());
    }

    let route = incoming.request.route().to_string();
    match route.as_str() {
        "/" => {
            response.send(Response::ok("holdfast\n"));
            Ok(())
        }
        "/wait" => wait_route(incoming, response, cfg).await,
        "/poll" => poll_route(incoming, response, cfg).await,
        _ => {
            response.send(Response::not_found());
            Ok(())
        }
    }
}

async fn wait_route(incoming: Incoming, response: Outgoing, cfg: &DelayConfig) -> anyhow::Result<()> {
    let work = Duration::from_millis(incoming.request.query_millis("work").unwrap_or(0));
    let timeout = incoming
        .request
        .query_millis("timeout")
        .map(Duration::from_millis)
        .or(cfg.timeout());

    let mut delay = DelayedResponse::new(incoming, response);
    delay.json().on_cancel(|ctx| {
        ctx.response.write(r#"{"status":"pending"}"#);
        ctx.response.end();
    });

    let completion = delay.wait(timeout)?;
    completion.settle(simulated_job(work));
    delay.run().await
}

async fn poll_route(incoming: Incoming, response: Outgoing, cfg: &DelayConfig) -> anyhow::Result<()> {
    let work = Duration::from_millis(incoming.request.query_millis("work").unwrap_or(0));
    let interval = incoming
        .request
        .query_millis("interval")
        .map(Duration::from_millis)
        .unwrap_or(cfg.interval());

    let mut delay = DelayedResponse::builder()
        .request(incoming)
        .response(response)
        .heartbeat(cfg.heartbeat_byte())
        .build()?;
    delay.json().on_error(|ctx, err| {
        let body = serde_json::json!({ "error": err.to_string() });
        ctx.response.write(body.to_string());
        ctx.response.end();
    });

    let completion = delay.start(Some(interval), cfg.initial_delay(), cfg.timeout())?;
    completion.settle(simulated_job(work));
    delay.run().await
}
