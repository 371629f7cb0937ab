//! Shared helpers for the delayed-response tests.

#![allow(dead_code)]

use std::collections::HashMap;

use holdfast::DelayedResponse;
use holdfast::http::request::{AbortSignal, Aborter, Incoming, Method, RequestBuilder};
use holdfast::http::response::Outgoing;
use holdfast::http::writer::ResponseWriter;
use tokio::task::JoinHandle;

/// A response as it went over the wire.
#[derive(Debug)]
pub struct Written {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl Written {
    pub fn body_str(&self) -> &str {
        std::str::from_utf8(&self.body).unwrap()
    }
}

pub fn parse_written(raw: &[u8]) -> Written {
    let split = raw
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("response head");
    let head = std::str::from_utf8(&raw[..split]).unwrap();
    let mut lines = head.split("\r\n");
    let status = lines
        .next()
        .unwrap()
        .split_whitespace()
        .nth(1)
        .unwrap()
        .parse()
        .unwrap();
    let headers = lines
        .map(|l| {
            let (k, v) = l.split_once(':').unwrap();
            (k.trim().to_string(), v.trim().to_string())
        })
        .collect();
    Written {
        status,
        headers,
        body: raw[split + 4..].to_vec(),
    }
}

/// One request/response pair with the writer running in the background.
pub struct Harness {
    pub aborter: Aborter,
    pub incoming: Option<Incoming>,
    pub response: Option<Outgoing>,
    writer: JoinHandle<Vec<u8>>,
}

impl Harness {
    pub fn new(path: &str) -> Self {
        let request = RequestBuilder::new()
            .method(Method::GET)
            .path(path)
            .build()
            .unwrap();
        let (aborter, signal) = AbortSignal::pair();
        let (response, frames) = Outgoing::channel();
        let writer = tokio::spawn(async move {
            let mut out = Vec::new();
            ResponseWriter::new(frames)
                .write_to_stream(&mut out)
                .await
                .unwrap();
            out
        });
        Self {
            aborter,
            incoming: Some(Incoming::new(request, signal)),
            response: Some(response),
            writer,
        }
    }

    /// Builds a controller over this pair; the harness keeps no response
    /// handle so the writer finishes once the controller is done.
    pub fn delay(&mut self) -> DelayedResponse {
        DelayedResponse::new(self.incoming.take().unwrap(), self.response.take().unwrap())
    }

    /// Waits for the writer and parses what it produced.
    pub async fn finish(self) -> Written {
        drop(self.response);
        let raw = self.writer.await.unwrap();
        parse_written(&raw)
    }
}
