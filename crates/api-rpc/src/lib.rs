//! JSON-RPC API Layer
//!
//! Exposes the queue engine to out-of-process callers (UI shells, the CLI)
//! as JSON-RPC 2.0 over localhost TCP.

pub mod error;
pub mod handler;
pub mod server;
pub mod types;

pub use server::{RpcServer, RpcServerConfig};
