//! Application services: the use-case layer.

pub mod attribute_service;
pub mod bus_backend;

pub use attribute_service::AttributeService;
pub use bus_backend::BusBackend;
