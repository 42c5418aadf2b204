//! Service and process metrics collection for Linux.
//!
//! This module resolves systemd services to their backing processes and
//! samples per-process CPU, memory, and uptime from the `/proc` filesystem,
//! with support for mocking so tests run without a real system.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      Sampling pass                           │
//! │  ┌──────────────────────┐   ┌───────────────────────────┐   │
//! │  │   CgroupDirectory    │   │      ProcessSampler        │   │
//! │  │  - system.slice/*    │   │  - /proc/[pid]/stat        │   │
//! │  │  - cgroup.procs      │   │  - /proc/[pid]/status      │   │
//! │  │  - cgroup.freeze     │   │  - /proc/uptime            │   │
//! │  └──────────┬───────────┘   └─────────────┬──────────────┘   │
//! │             └──────────────┬──────────────┘                  │
//! │                     ┌──────▼──────┐                          │
//! │                     │  FileSystem │ (trait)                  │
//! │                     └──────┬──────┘                          │
//! └────────────────────────────┼─────────────────────────────────┘
//!                              │
//!                   ┌──────────┴──────────┐
//!            ┌──────▼──────┐       ┌──────▼──────┐
//!            │   RealFs    │       │   MockFs    │
//!            │ (Linux)     │       │ (Testing)   │
//!            └─────────────┘       └─────────────┘
//! ```

pub mod directory;
pub mod mock;
pub mod parser;
pub mod sampler;
pub mod traits;

pub use directory::{CgroupDirectory, ServiceDirectory, ServiceStatus};
pub use mock::{MockDirectory, MockFs};
pub use sampler::{ProcessMetrics, ProcessSampler};
pub use traits::{FileSystem, RealFs};
