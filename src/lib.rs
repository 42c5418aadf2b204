//! svcwatch — service resource monitoring agent with local IPC.
//!
//! Provides:
//! - `collector` — service directory resolution and per-process metric sampling
//! - `history` — bounded per-service time series of metric samples
//! - `protocol` — request/response wire types (newline-delimited JSON)
//! - `dispatch` — command dispatcher serving the protocol against live state
//! - `server` — single-client Unix socket channel server
//! - `engine` — monitoring engine wiring (lifecycle, sampling loop)
//! - `config` — engine configuration

pub mod collector;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod history;
pub mod protocol;
pub mod server;
