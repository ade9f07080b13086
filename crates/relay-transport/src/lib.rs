//! # relay-transport
//!
//! The streaming transport path: raw HTTP bytes in, JSON-RPC outcomes out.
//!
//! - [`sse`]: chunk-tolerant reassembly of Server-Sent Events into
//!   [`sse::FramedEvent`]s, plus the [`sse::framed_events`] stream adapter
//! - [`extract`]: promotion of framed events to JSON-RPC envelopes and
//!   resolution of a request id against a stream of them
//! - [`client`]: [`client::RpcClient`], the reqwest call path that composes
//!   the two
//!
//! ## Crate Position
//!
//! Depends on `relay-core` for envelope and error types. Used by callers
//! that speak JSON-RPC over HTTP with optional SSE streaming.

#![deny(unsafe_code)]

pub mod client;
pub mod extract;
pub mod sse;
