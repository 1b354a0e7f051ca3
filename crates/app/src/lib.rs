//! # pasd-app
//!
//! Application layer: use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters implement (driven/outbound ports):
//!   - `Backend`: read, write and execute by attribute or command name
//!   - `RegisterBus`: raw register reads and writes on a physical bus
//! - Define the **driving/inbound** use-case layer both transports call:
//!   - `AttributeService`: name reads, command execution, register-span reads and writes
//! - Provide `BusBackend`, a `Backend` built on any `RegisterBus` via the read planner
//! - Provide the client-side `RetryPolicy`
//!
//! ## Dependency rule
//! Depends on `pasd-domain` only (plus `tokio::time` for backoff).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod ports;
pub mod retry;
pub mod services;
