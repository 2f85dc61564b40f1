//! Experimental sites.
//!
//! A site binds a structural model's degrees of freedom to a controller. The
//! analysis driver talks only to sites; each site forwards to the controller
//! it owns.

use crate::error::ControlError;
use crate::response::{DaqResponse, TrialResponse};
use crate::size::SizeSpec;
use crate::Tag;
use std::fmt;

/// Per-step interface the analysis driver uses.
///
/// For each step: [`set_trial_response`](Self::set_trial_response), then
/// [`get_daq_response`](Self::get_daq_response), then
/// [`commit_state`](Self::commit_state) once the step is accepted.
pub trait ExperimentalSite: fmt::Debug + fmt::Display + Send {
    /// Caller-assigned tag.
    fn tag(&self) -> Tag;

    /// Site family name.
    fn family(&self) -> &'static str;

    /// Negotiate sizing with the underlying controller.
    fn set_size(&mut self, trial: SizeSpec, daq: SizeSpec) -> Result<(), ControlError>;

    /// Sizing, once negotiated.
    fn sizes(&self) -> Option<(SizeSpec, SizeSpec)>;

    /// Bind buffers and perform the controller handshake.
    fn setup(&mut self) -> Result<(), ControlError>;

    /// Forward trial vectors.
    fn set_trial_response(&mut self, trial: &TrialResponse<'_>) -> Result<(), ControlError>;

    /// Fetch measured vectors.
    fn get_daq_response(&mut self, daq: &mut DaqResponse<'_>) -> Result<(), ControlError>;

    /// Commit the accepted step.
    fn commit_state(&mut self) -> Result<(), ControlError>;
}
