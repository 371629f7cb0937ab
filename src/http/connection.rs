use std::convert::Infallible;
use std::sync::Arc;

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::config::DelayConfig;
use crate::http::parser::{ParseError, parse_http_request};
use crate::http::request::{AbortSignal, Incoming, Request};
use crate::http::response::{Outgoing, Response};
use crate::http::writer::ResponseWriter;
use crate::server::routes;

/// One client connection.
///
/// Responses may be held open for a long time and are delimited by closing
/// the connection, so every connection serves exactly one request.
pub struct Connection {
    stream: TcpStream,
    buffer: BytesMut,
    state: ConnectionState,
    cfg: Arc<DelayConfig>,
}

pub enum ConnectionState {
    Reading,
    Serving(Request),
    Rejecting(Response),
    Closed,
}

impl Connection {
    pub fn new(stream: TcpStream, cfg: Arc<DelayConfig>) -> Self {
        Self {
            stream,
            buffer: BytesMut::with_capacity(4096),
            state: ConnectionState::Reading,
            cfg,
        }
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        loop {
            match std::mem::replace(&mut self.state, ConnectionState::Closed) {
                ConnectionState::Reading => {
                    self.state = match self.read_request().await {
                        Ok(Some(req)) => ConnectionState::Serving(req),
                        Ok(None) => ConnectionState::Closed,
                        Err(e) => {
                            tracing::debug!(error = ?e, "rejecting malformed request");
                            ConnectionState::Rejecting(Response::bad_request())
                        }
                    };
                }

                ConnectionState::Serving(req) => {
                    self.serve(req).await?;
                }

                ConnectionState::Rejecting(response) => {
                    let (outgoing, frames) = Outgoing::channel();
                    outgoing.send(response);
                    drop(outgoing);
                    ResponseWriter::new(frames)
                        .write_to_stream(&mut self.stream)
                        .await?;
                }

                ConnectionState::Closed => break,
            }
        }

        let _ = self.stream.shutdown().await;
        Ok(())
    }

    pub async fn read_request(&mut self) -> Result<Option<Request>, ParseError> {
        loop {
            match parse_http_request(&self.buffer) {
                Ok((request, consumed)) => {
                    self.buffer.advance(consumed);
                    return Ok(Some(request));
                }
                Err(ParseError::Incomplete) => {}
                Err(e) => return Err(e),
            }

            match self.stream.read_buf(&mut self.buffer).await {
                Ok(0) | Err(_) => return Ok(None),
                Ok(_) => {}
            }
        }
    }

    /// Runs the routed handler against the response writer while watching
    /// the read side for the client going away.
    async fn serve(&mut self, request: Request) -> anyhow::Result<()> {
        let method = request.method.as_str();
        let path = request.path.clone();
        tracing::info!(method, path = %path, "serving request");

        let (aborter, signal) = AbortSignal::pair();
        let (response, frames) = Outgoing::channel();
        let mut writer = ResponseWriter::new(frames);
        let cfg = self.cfg.clone();
        let (mut rd, mut wr) = self.stream.split();

        let handled = async move {
            let fallback = response.clone();
            let res = routes::handle(Incoming::new(request, signal), response, &cfg).await;
            if let Err(e) = &res {
                tracing::error!(error = %e, "handler failed");
                fallback.end();
            }
            res
        };

        let peer = async {
            let mut scratch = [0u8; 512];
            loop {
                match rd.read(&mut scratch).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {}
                }
            }
            tracing::debug!("peer closed its side");
            aborter.abort();
            std::future::pending::<Infallible>().await
        };

        let exchange = async { tokio::join!(handled, writer.write_to_stream(&mut wr)) };

        let (handled, written) = tokio::select! {
            out = exchange => out,
            never = peer => match never {},
        };

        tracing::info!(path = %path, body_bytes = writer.body_len(), "response finished");
        written?;
        if handled.is_err() {
            tracing::debug!(path = %path, "connection closed after handler failure");
        }
        Ok(())
    }
}
