//! Minimal HTTP/1.1 transport.
//!
//! This is the collaborator a [`DelayedResponse`](crate::delay::DelayedResponse)
//! sits on: a request with an abort notification, and a response handle that
//! queues status, headers and body frames for a writer.
//!
//! - **`connection`**: per-connection state machine
//! - **`parser`**: parses a request head and body from a byte buffer
//! - **`request`**: request representation, abort signal
//! - **`response`**: status codes, buffered responses, the `Outgoing` handle
//! - **`writer`**: drains response frames into a socket
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌─────────────┐
//!        │   Reading   │ ← wait for a complete request
//!        └──────┬──────┘
//!     parsed    │      malformed
//!        ┌──────┴─────────────┐
//!        ▼                    ▼
//!  ┌────────────┐      ┌────────────┐
//!  │  Serving   │      │ Rejecting  │ ← 400
//!  └─────┬──────┘      └─────┬──────┘
//!        │ handler + writer   │
//!        │ + peer watcher     │
//!        └─────────┬──────────┘
//!                  ▼
//!            ┌──────────┐
//!            │  Closed  │
//!            └──────────┘
//! ```
//!
//! The body of a held response has no known length, so it is delimited by
//! closing the connection; there is no keep-alive.

pub mod connection;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;
