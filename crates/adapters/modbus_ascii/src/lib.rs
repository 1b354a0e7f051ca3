//! # pasd-adapter-modbus
//!
//! Modbus ASCII transport for the attribute catalogue.
//!
//! ## Responsibilities
//! - Frame codec: `:` + hex(unit, PDU, LRC) + CRLF
//! - PDU codec for read holding registers (0x03), write single register
//!   (0x06) and write multiple registers (0x10), plus exception replies
//! - [`ModbusServer`]: answers register requests through the
//!   [`AttributeService`](pasd_app::services::AttributeService), unit 0 being
//!   the hub and unit N smartbox N
//! - [`ModbusClient`]: a [`RegisterBus`](pasd_app::ports::RegisterBus) over
//!   TCP, for the bus backend
//!
//! ## Dependency rule
//! Same as other adapters: depends on `pasd-app` and `pasd-domain`.

pub mod client;
pub mod config;
pub mod error;
pub mod frame;
pub mod pdu;
pub mod server;

pub use client::ModbusClient;
pub use config::ModbusClientConfig;
pub use error::ModbusError;
pub use server::ModbusServer;
