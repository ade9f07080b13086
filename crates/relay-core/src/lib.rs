//! # relay-core
//!
//! Foundation types for the Relay transport and security layer.
//!
//! This crate provides the shared vocabulary the other relay crates depend on:
//!
//! - **Branded IDs**: [`ids::SessionId`] as a newtype over a hex token
//! - **JSON-RPC envelopes**: [`rpc::Envelope`], [`rpc::RpcError`], error-code constants
//! - **Errors**: [`errors::TransportError`], [`errors::SessionError`],
//!   [`errors::GateRejection`] hierarchies via `thiserror`
//! - **Security**: [`security`] token generation, constant-time comparison,
//!   PKCE pairs, and secret-wrapped access tokens
//! - **Logging**: [`logging::init_subscriber`] tracing bootstrap
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by all other relay crates.

#![deny(unsafe_code)]

pub mod errors;
pub mod ids;
pub mod logging;
pub mod rpc;
pub mod security;
