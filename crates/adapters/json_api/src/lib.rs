//! # pasd-adapter-json
//!
//! JSON transport: one request document per line, one envelope back.
//!
//! ## Responsibilities
//! - Decode request bytes (UTF-8, then JSON) and validate them against the request schema
//! - Dispatch reads and command executions to the [`AttributeService`](pasd_app::services::AttributeService)
//! - Encode success and error envelopes with an RFC 3339 timestamp
//! - Serve TCP connections, and offer a matching line client
//!
//! Requests are independent: nothing carries over from one line to the next,
//! and a malformed line is answered with an error envelope like any other.
//!
//! ## Dependency rule
//! Same as other adapters: depends on `pasd-app` and `pasd-domain`.

pub mod client;
pub mod error;
pub mod protocol;
pub mod server;

pub use client::JsonClient;
pub use error::JsonApiError;
pub use server::JsonApi;
