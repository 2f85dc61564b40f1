//! Experimental control families.
//!
//! # Families
//!
//! - [`SimFeAdapter`] - remote simulation adapter element over a
//!   [`VectorChannel`](hsim_transport::VectorChannel), usually TCP
//! - [`XpcTarget`] - xPC real-time target driven through a
//!   [`SignalBus`](hsim_transport::SignalBus) with a new-target handshake
//!
//! Both are built from configuration by the factories in [`factory`]. With
//! `mock = true` they run against the in-process peers from
//! [`hsim_transport::mock`].
//!
//! # Example
//!
//! ```
//! use hsim_control::SimFeAdapter;
//! use hsim_core::{DaqResponse, ExperimentalControl, ResponseKind, SizeSpec, TrialResponse};
//! use hsim_transport::mock::ElasticPeer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (channel, _peer) = ElasticPeer::spawn(2.0)?;
//! let mut control = SimFeAdapter::with_data_size(1, Box::new(channel), 8);
//!
//! let trial = SizeSpec::new().with(ResponseKind::Displacement, 1);
//! let daq = trial.with(ResponseKind::Force, 1);
//! control.set_size(trial, daq)?;
//! control.setup()?;
//!
//! control.set_trial_response(&TrialResponse::new().disp(&[0.25]))?;
//! let mut force = [0.0];
//! control.get_daq_response(&mut DaqResponse::new().force(&mut force))?;
//! assert_eq!(force, [0.5]);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
//!
//! # Hardware
//!
//! The real xPC Target API is linked only with the `xpc-sdk` feature.

pub mod confirm;
pub mod factory;
pub mod handshake;
pub mod sim_fe_adapter;
pub mod xpc_target;

#[cfg(feature = "xpc-sdk")]
pub mod xpc_api;

pub use confirm::{auto_proceed, Confirm, InitDecision, InitPrompt};
pub use factory::{SimFeAdapterConfig, SimFeAdapterFactory, XpcTargetConfig, XpcTargetFactory};
pub use handshake::PollPolicy;
pub use sim_fe_adapter::SimFeAdapter;
pub use xpc_target::{TargetType, XpcTarget, XpcTargetOptions};

#[cfg(feature = "xpc-sdk")]
pub use xpc_api::XpcApiBus;
