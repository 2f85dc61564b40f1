//! The experimental control contract.
//!
//! An [`ExperimentalControl`] turns one controller family (TCP adapter,
//! real-time target, ...) into a uniform synchronous request/response
//! interface:
//!
//! ```text
//! new ──► Unconfigured ──set_size──► Configured ──setup──► Running ─┐
//!                                        ▲                   │  ▲   │ set_trial_response
//!                                        └──── get_copy ─────┘  └───┘ get_daq_response
//!
//!            any link failure ──► Terminated (link released)
//! ```
//!
//! Families keep their own buffers and link, and share bookkeeping through
//! [`ControlCore`] by composition.

use crate::error::ControlError;
use crate::filter::{self, FilterTable, SharedFilter};
use crate::response::{DaqResponse, ResponseKind, ResponseQuery, TrialResponse};
use crate::size::SizeSpec;
use crate::Tag;
use std::fmt;

/// Lifecycle state of a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// Constructed with a live link, no sizing yet.
    Unconfigured,
    /// Sizing accepted, buffers not bound.
    Configured,
    /// Buffers bound and handshake done.
    Running,
    /// Link released after a failure or teardown.
    Terminated,
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ControllerState::Unconfigured => "unconfigured",
            ControllerState::Configured => "configured",
            ControllerState::Running => "running",
            ControllerState::Terminated => "terminated",
        };
        write!(f, "{}", label)
    }
}

/// Bookkeeping shared by every controller family.
#[derive(Debug, Clone)]
pub struct ControlCore {
    tag: Tag,
    family: &'static str,
    sizes: Option<(SizeSpec, SizeSpec)>,
    ctrl_filters: FilterTable,
    daq_filters: FilterTable,
    state: ControllerState,
}

impl ControlCore {
    /// Fresh, unsized core.
    #[must_use]
    pub fn new(tag: Tag, family: &'static str) -> Self {
        Self {
            tag,
            family,
            sizes: None,
            ctrl_filters: FilterTable::default(),
            daq_filters: FilterTable::default(),
            state: ControllerState::Unconfigured,
        }
    }

    /// Caller-assigned tag.
    #[must_use]
    pub fn tag(&self) -> Tag {
        self.tag
    }

    /// Family name.
    #[must_use]
    pub fn family(&self) -> &'static str {
        self.family
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Overwrite the state.
    pub fn set_state(&mut self, state: ControllerState) {
        self.state = state;
    }

    /// Negotiated `(trial, daq)` sizes.
    #[must_use]
    pub fn sizes(&self) -> Option<(SizeSpec, SizeSpec)> {
        self.sizes
    }

    /// Outgoing filters.
    #[must_use]
    pub fn ctrl_filters(&self) -> &FilterTable {
        &self.ctrl_filters
    }

    /// Incoming filters.
    #[must_use]
    pub fn daq_filters(&self) -> &FilterTable {
        &self.daq_filters
    }

    /// Set or clear the outgoing filter for `kind`.
    pub fn set_ctrl_filter(&mut self, kind: ResponseKind, filter: Option<SharedFilter>) {
        self.ctrl_filters[kind] = filter;
    }

    /// Set or clear the incoming filter for `kind`.
    pub fn set_daq_filter(&mut self, kind: ResponseKind, filter: Option<SharedFilter>) {
        self.daq_filters[kind] = filter;
    }

    /// Store sizing once, after `predicate` accepts it.
    ///
    /// Sizing is permanent: a second call fails with
    /// [`ControlError::InvalidState`]. A rejected combination leaves the core
    /// unsized so the caller may retry.
    pub fn accept_sizes(
        &mut self,
        trial: SizeSpec,
        daq: SizeSpec,
        predicate: impl FnOnce(&SizeSpec, &SizeSpec) -> Result<(), String>,
    ) -> Result<(), ControlError> {
        if self.state != ControllerState::Unconfigured || self.sizes.is_some() {
            return Err(ControlError::InvalidState {
                operation: "set_size",
                state: self.state,
            });
        }
        predicate(&trial, &daq).map_err(|reason| ControlError::UnsupportedSize {
            family: self.family,
            reason,
        })?;
        self.sizes = Some((trial, daq));
        self.state = ControllerState::Configured;
        Ok(())
    }

    /// Sizes, if the controller may run `setup`.
    pub fn require_sized(&self, operation: &'static str) -> Result<(SizeSpec, SizeSpec), ControlError> {
        match (self.state, self.sizes) {
            (ControllerState::Configured | ControllerState::Running, Some(sizes)) => Ok(sizes),
            (state, _) => Err(ControlError::InvalidState { operation, state }),
        }
    }

    /// Sizes, if the controller is running.
    pub fn require_running(&self, operation: &'static str) -> Result<(SizeSpec, SizeSpec), ControlError> {
        match (self.state, self.sizes) {
            (ControllerState::Running, Some(sizes)) => Ok(sizes),
            (state, _) => Err(ControlError::InvalidState { operation, state }),
        }
    }

    /// Copy caller `input` into `target`, applying the outgoing filter.
    pub fn write_trial(
        &self,
        kind: ResponseKind,
        input: &[f64],
        target: &mut [f64],
    ) -> Result<(), ControlError> {
        check_len(kind, target.len(), input.len())?;
        target.copy_from_slice(input);
        filter::apply(&self.ctrl_filters, kind, target);
        Ok(())
    }

    /// Apply the incoming filter for `kind` to freshly acquired values.
    pub fn filter_measured(&self, kind: ResponseKind, measured: &mut [f64]) {
        filter::apply(&self.daq_filters, kind, measured);
    }

    /// Copy into every requested output of `daq` from `measured(kind)`.
    ///
    /// Kinds without a measured vector are left untouched.
    pub fn read_daq<'m>(
        &self,
        daq: &mut DaqResponse<'_>,
        mut measured: impl FnMut(ResponseKind) -> Option<&'m [f64]>,
    ) -> Result<(), ControlError> {
        for kind in ResponseKind::ALL {
            let Some(out) = daq.get_mut(kind) else {
                continue;
            };
            match measured(kind) {
                Some(values) => {
                    check_len(kind, values.len(), out.len())?;
                    out.copy_from_slice(values);
                }
                None => tracing::trace!(tag = self.tag, %kind, "no measured values for requested kind"),
            }
        }
        Ok(())
    }

    /// Core for a shallow clone: same sizing and filters, buffers not yet bound.
    #[must_use]
    pub fn for_copy(&self) -> Self {
        let mut core = self.clone();
        if core.state == ControllerState::Running {
            core.state = ControllerState::Configured;
        }
        core
    }

    /// Common header of `Display` output.
    pub fn describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ExperimentalControl: {}", self.tag)?;
        writeln!(f, "  type: {}", self.family)?;
        writeln!(f, "  state: {}", self.state)?;
        if let Some((trial, daq)) = &self.sizes {
            writeln!(f, "  trial sizes: {trial}")?;
            writeln!(f, "  daq sizes: {daq}")?;
        }
        filter::describe_table(f, "ctrl", &self.ctrl_filters)?;
        filter::describe_table(f, "daq", &self.daq_filters)
    }
}

fn check_len(kind: ResponseKind, expected: usize, actual: usize) -> Result<(), ControlError> {
    if expected == actual {
        Ok(())
    } else {
        Err(ControlError::SizeMismatch {
            kind,
            expected,
            actual,
        })
    }
}

/// Uniform contract over every controller family.
///
/// Calls are blocking and not cancellable. A controller is not meant to be
/// driven from several threads at once; wrap it in a mutex if it is shared.
pub trait ExperimentalControl: fmt::Debug + fmt::Display + Send {
    /// Shared bookkeeping.
    fn core(&self) -> &ControlCore;

    /// Shared bookkeeping, mutably.
    fn core_mut(&mut self) -> &mut ControlCore;

    /// Caller-assigned tag.
    fn tag(&self) -> Tag {
        self.core().tag()
    }

    /// Family name.
    fn family(&self) -> &'static str {
        self.core().family()
    }

    /// Lifecycle state.
    fn state(&self) -> ControllerState {
        self.core().state()
    }

    /// Trial sizing, once negotiated.
    fn trial_sizes(&self) -> Option<SizeSpec> {
        self.core().sizes().map(|(trial, _)| trial)
    }

    /// Daq sizing, once negotiated.
    fn daq_sizes(&self) -> Option<SizeSpec> {
        self.core().sizes().map(|(_, daq)| daq)
    }

    /// Set or clear the outgoing filter for `kind`.
    fn set_ctrl_filter(&mut self, kind: ResponseKind, filter: Option<SharedFilter>) {
        self.core_mut().set_ctrl_filter(kind, filter);
    }

    /// Set or clear the incoming filter for `kind`.
    fn set_daq_filter(&mut self, kind: ResponseKind, filter: Option<SharedFilter>) {
        self.core_mut().set_daq_filter(kind, filter);
    }

    /// Validate and store the permanent sizing. Sends nothing.
    fn set_size(&mut self, trial: SizeSpec, daq: SizeSpec) -> Result<(), ControlError>;

    /// Bind buffers and perform the one-time handshake. Re-running it
    /// re-allocates buffers from scratch.
    fn setup(&mut self) -> Result<(), ControlError>;

    /// Load supplied trial vectors and push them to the controller.
    fn set_trial_response(&mut self, trial: &TrialResponse<'_>) -> Result<(), ControlError>;

    /// Pull fresh measurements and copy them into the requested outputs.
    fn get_daq_response(&mut self, daq: &mut DaqResponse<'_>) -> Result<(), ControlError>;

    /// Commit point after a step is accepted.
    fn commit_state(&mut self) -> Result<(), ControlError> {
        Ok(())
    }

    /// Independent controller sharing this one's physical link.
    fn get_copy(&self) -> Box<dyn ExperimentalControl>;

    /// Last target or measured vector for recording, if the family tracks it.
    fn response(&self, _query: ResponseQuery) -> Option<Vec<f64>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Linear;
    use std::sync::Arc;

    fn sized() -> ControlCore {
        let mut core = ControlCore::new(1, "Test");
        core.accept_sizes(
            SizeSpec::new().with(ResponseKind::Displacement, 2),
            SizeSpec::new().with(ResponseKind::Force, 2),
            |_, _| Ok(()),
        )
        .unwrap();
        core
    }

    #[test]
    fn sizing_is_permanent() {
        let mut core = sized();
        assert_eq!(core.state(), ControllerState::Configured);
        let err = core
            .accept_sizes(SizeSpec::new(), SizeSpec::new(), |_, _| Ok(()))
            .unwrap_err();
        assert!(matches!(err, ControlError::InvalidState { .. }));
    }

    #[test]
    fn rejected_sizes_leave_core_unsized() {
        let mut core = ControlCore::new(1, "Test");
        let err = core
            .accept_sizes(SizeSpec::new(), SizeSpec::new(), |_, _| Err("no".into()))
            .unwrap_err();
        assert!(matches!(err, ControlError::UnsupportedSize { family: "Test", .. }));
        assert_eq!(core.state(), ControllerState::Unconfigured);
        assert!(core.sizes().is_none());
    }

    #[test]
    fn running_is_required_for_exchange() {
        let core = sized();
        assert!(core.require_sized("setup").is_ok());
        assert!(matches!(
            core.require_running("set_trial_response"),
            Err(ControlError::InvalidState {
                state: ControllerState::Configured,
                ..
            })
        ));
    }

    #[test]
    fn write_trial_filters_and_checks_length() {
        let mut core = sized();
        core.set_ctrl_filter(
            ResponseKind::Displacement,
            Some(Arc::new(Linear { gain: 10.0, offset: 0.0 })),
        );
        let mut target = [0.0; 2];
        core.write_trial(ResponseKind::Displacement, &[1.0, 2.0], &mut target)
            .unwrap();
        assert_eq!(target, [10.0, 20.0]);
        let err = core
            .write_trial(ResponseKind::Displacement, &[1.0], &mut target)
            .unwrap_err();
        assert!(matches!(
            err,
            ControlError::SizeMismatch {
                expected: 2,
                actual: 1,
                ..
            }
        ));
    }

    #[test]
    fn copy_of_running_core_needs_setup() {
        let mut core = sized();
        core.set_state(ControllerState::Running);
        assert_eq!(core.for_copy().state(), ControllerState::Configured);
        assert_eq!(core.for_copy().sizes(), core.sizes());
    }
}
