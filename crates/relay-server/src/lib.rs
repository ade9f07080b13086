//! # relay-server
//!
//! Request admission and RPC routing for the relay bridge.
//!
//! - [`origin`]: Origin / DNS-rebinding gate, a pure header-inspection
//!   decision plus an axum middleware wrapper that answers rejections with
//!   a 403 JSON-RPC error body
//! - [`auth`]: bearer-token middleware backed by the session store's
//!   constant-time validation path
//! - [`server`]: router assembly and the listener lifecycle
//!
//! ## Crate Position
//!
//! Depends on `relay-core` for envelope types and error bodies and on
//! `relay-session` for the store the bearer check consults. The RPC methods
//! themselves are supplied by the embedding application via [`RpcHandler`].
//!
//! [`RpcHandler`]: server::RpcHandler

#![deny(unsafe_code)]

pub mod auth;
pub mod origin;
pub mod server;

pub use origin::{OriginConfig, validate_origin};
pub use server::{AppState, RelayServer, RpcHandler, ServerConfig, ServerHandle};
