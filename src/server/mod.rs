//! Demo server: accept loop and routes.

pub mod listener;
pub mod routes;
