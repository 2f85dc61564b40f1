//! Core types and traits for hybrid simulation experimental control.
//!
//! - [`response`]: response kinds and per-kind argument sets
//! - [`size`]: channel counts per kind
//! - [`filter`]: scalar filters and filter tables
//! - [`control`]: the [`ExperimentalControl`](control::ExperimentalControl) contract
//! - [`site`]: the [`ExperimentalSite`](site::ExperimentalSite) contract
//! - [`factory`]: configuration-driven controller construction
//! - [`error`]: error taxonomy

pub mod control;
pub mod error;
pub mod factory;
pub mod filter;
pub mod response;
pub mod site;
pub mod size;

/// Caller-assigned integer identifier, unique within a registry namespace.
pub type Tag = i32;

pub use control::{ControlCore, ControllerState, ExperimentalControl};
pub use error::{ControlError, ErrorCategory, Namespace, RegistryError, TransportError};
pub use factory::{ControlFactory, FilterLookup};
pub use filter::{FilterSpec, FilterTable, SharedFilter, SignalFilter};
pub use response::{DaqResponse, KindMap, ResponseKind, ResponseQuery, TrialResponse};
pub use site::ExperimentalSite;
pub use size::SizeSpec;
