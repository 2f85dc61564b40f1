//! # Hybrid Simulation Experimental Control
//!
//! Facade over the workspace crates plus the pieces an application needs
//! around them: session configuration, logging, and a step driver.
//!
//! ## Crate Structure
//!
//! - **`hsim_core`**: response kinds, sizing, filters, the control and site
//!   contracts, and the error taxonomy.
//! - **`hsim_transport`**: vector channels over TCP, the hardware signal bus
//!   contract, and in-memory test doubles.
//! - **`hsim_control`**: the `SimFEAdapter` and `xPCtarget` controller
//!   families and their factories.
//! - **`hsim_registry`**: tag-indexed ownership of filters, controls and
//!   sites.
//! - **`config`**: session files loaded with Figment.
//! - **`logging`**: tracing subscriber setup.
//! - **`driver`**: a sinusoidal displacement history for exercising a site.

pub mod config;
pub mod driver;
pub mod logging;

pub use hsim_control as control;
pub use hsim_core as core;
pub use hsim_registry as registry;
pub use hsim_transport as transport;

pub use config::{ConfigError, SessionConfig};
pub use driver::{run_sinusoid, RunSummary, Sinusoid, StepRecord};
pub use logging::{LogFormat, LoggingConfig};
