//! # pasd-domain
//!
//! Pure register/attribute model of the PaSD field bus: one FNDH hub and up
//! to 24 smartboxes.
//!
//! ## Responsibilities
//! - Foundational types: device identity and topology, attribute values, the error taxonomy
//! - **Conversions** between raw register words and engineering values
//! - The **catalogue**: every named attribute bound to its register range
//! - The **port-status** word codec
//! - The **planner** that coalesces attribute reads into minimal register spans
//! - **Commands** and the register writes that carry them
//!
//! ## Dependency rule
//! This crate has **no internal dependencies** and performs no IO.
//! Backends and transports are described as traits in `pasd-app` (ports).

pub mod error;
pub mod value;

pub mod catalogue;
pub mod command;
pub mod conversion;
pub mod device;
pub mod planner;
pub mod port_status;
