//! # pasd-adapter-simulator
//!
//! A [`Backend`](pasd_app::ports::Backend) with no hardware behind it.
//!
//! ## Responsibilities
//! - Hold one register image per configured device, seeded with plausible values
//! - Decode reads and encode writes through the shared catalogue
//! - Apply commands to the image the way the firmware reports them back
//!
//! Only the register-visible effect of a command is modelled; there is no
//! electrical simulation.
//!
//! ## Dependency rule
//! Same as other adapters: depends on `pasd-app` and `pasd-domain`.

mod registers;
mod simulator;

pub use simulator::Simulator;
