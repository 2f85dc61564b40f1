//! Hardware signal bus abstraction.
//!
//! A real-time target exposes tunable block parameters and observable
//! signals by name. Names are resolved once to [`BusAddress`]es; every later
//! read and write goes through the address. Implementations check the vendor
//! last-error state after each call and report it as
//! [`TransportError::Hardware`].

use hsim_core::TransportError;
use std::fmt;

/// Resolved parameter or signal index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BusAddress(pub i32);

impl fmt::Display for BusAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Named address space of a real-time target.
pub trait SignalBus: Send {
    /// Name of the loaded application.
    fn app_name(&mut self) -> Result<String, TransportError>;

    /// Unload the current application.
    fn unload_app(&mut self) -> Result<(), TransportError>;

    /// Load application `name` from directory `path`.
    fn load_app(&mut self, path: &str, name: &str) -> Result<(), TransportError>;

    /// Start the loaded application.
    fn start_app(&mut self) -> Result<(), TransportError>;

    /// Stop the running application.
    fn stop_app(&mut self) -> Result<(), TransportError>;

    /// Sample time of the application in seconds.
    fn sample_time(&mut self) -> Result<f64, TransportError>;

    /// Stop time of the application in seconds.
    fn stop_time(&mut self) -> Result<f64, TransportError>;

    /// Resolve a block parameter.
    fn param_index(&mut self, block: &str, param: &str) -> Result<BusAddress, TransportError>;

    /// Resolve a signal.
    fn signal_index(&mut self, name: &str) -> Result<BusAddress, TransportError>;

    /// Write a parameter.
    fn set_param(&mut self, addr: BusAddress, values: &[f64]) -> Result<(), TransportError>;

    /// Read one signal.
    fn signal(&mut self, addr: BusAddress) -> Result<f64, TransportError>;

    /// Read several signals into `out` (same length as `addrs`).
    fn signals(&mut self, addrs: &[BusAddress], out: &mut [f64]) -> Result<(), TransportError>;

    /// Close the connection and release the vendor API. Idempotent.
    fn close(&mut self);
}
