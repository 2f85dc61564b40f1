//! Site that drives a controller in the same process.

use hsim_core::{
    ControlError, DaqResponse, ExperimentalControl, ExperimentalSite, ResponseQuery, SizeSpec, Tag,
    TrialResponse,
};
use std::fmt;
use tracing::{debug, info};

/// Family name used in configuration.
pub const FAMILY: &str = "LocalSite";

/// Site owning a controller, normally a [`get_copy`](ExperimentalControl::get_copy)
/// of a registered control so both share one physical link.
#[derive(Debug)]
pub struct LocalSite {
    tag: Tag,
    control: Box<dyn ExperimentalControl>,
}

impl LocalSite {
    /// Site `tag` forwarding to `control`.
    #[must_use]
    pub fn new(tag: Tag, control: Box<dyn ExperimentalControl>) -> Self {
        debug!(tag, control = control.tag(), family = control.family(), "local site created");
        Self { tag, control }
    }

    /// The controller this site drives.
    #[must_use]
    pub fn control(&self) -> &dyn ExperimentalControl {
        self.control.as_ref()
    }

    /// Most recent target or measured values of the controller.
    #[must_use]
    pub fn response(&self, query: ResponseQuery) -> Option<Vec<f64>> {
        self.control.response(query)
    }
}

impl ExperimentalSite for LocalSite {
    fn tag(&self) -> Tag {
        self.tag
    }

    fn family(&self) -> &'static str {
        FAMILY
    }

    fn set_size(&mut self, trial: SizeSpec, daq: SizeSpec) -> Result<(), ControlError> {
        self.control.set_size(trial, daq)
    }

    fn sizes(&self) -> Option<(SizeSpec, SizeSpec)> {
        self.control.core().sizes()
    }

    fn setup(&mut self) -> Result<(), ControlError> {
        self.control.setup()?;
        info!(tag = self.tag, control = self.control.tag(), "local site ready");
        Ok(())
    }

    fn set_trial_response(&mut self, trial: &TrialResponse<'_>) -> Result<(), ControlError> {
        self.control.set_trial_response(trial)
    }

    fn get_daq_response(&mut self, daq: &mut DaqResponse<'_>) -> Result<(), ControlError> {
        self.control.get_daq_response(daq)
    }

    fn commit_state(&mut self) -> Result<(), ControlError> {
        self.control.commit_state()
    }
}

impl fmt::Display for LocalSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Experimental Site: {}", self.tag)?;
        writeln!(f, "  type: {FAMILY}")?;
        write!(f, "{}", self.control)
    }
}
