//! Holdfast - delayed HTTP responses with keepalive heartbeats
//!
//! Holds an in-flight response open until a long-running operation
//! finishes, optionally writing a heartbeat byte so proxies and load
//! balancers do not close the idle connection.

pub mod config;
pub mod delay;
pub mod error;
pub mod http;
pub mod server;

pub use delay::{Completion, DelayedResponse, Outcome, Payload};
pub use error::DelayError;
