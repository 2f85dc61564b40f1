//! Operator confirmation during target setup.
//!
//! Target setup pauses twice for the operator: once before starting the
//! application (controller offsets must be zero), and once per initial
//! measurement. The decision is delegated to a [`Confirm`] callback so the
//! protocol code never reads from a console itself.

use std::fmt;
use std::sync::Arc;

/// What the operator is being asked.
#[derive(Debug, Clone, PartialEq)]
pub enum InitPrompt {
    /// Controller offsets must be zero before the application starts.
    ZeroOffsets,
    /// Initial readings after the first handshake.
    InitialReadings {
        /// Measured displacements.
        disp: Vec<f64>,
        /// Measured forces.
        force: Vec<f64>,
    },
}

impl fmt::Display for InitPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitPrompt::ZeroOffsets => {
                write!(f, "Make sure that offset values of controller are set to ZERO")
            }
            InitPrompt::InitialReadings { disp, force } => {
                write!(f, "Initial values of DAQ are: dspDaq = {disp:?}, frcDaq = {force:?}")
            }
        }
    }
}

/// Operator decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitDecision {
    /// Continue.
    Proceed,
    /// Repeat the initial measurement. Treated as `Proceed` for
    /// [`InitPrompt::ZeroOffsets`].
    Repeat,
    /// Abort setup and release the target.
    Cancel,
}

/// Confirmation callback shared by a controller and its copies.
pub type Confirm = Arc<dyn Fn(&InitPrompt) -> InitDecision + Send + Sync>;

/// Callback that always proceeds, for unattended runs.
#[must_use]
pub fn auto_proceed() -> Confirm {
    Arc::new(|prompt| {
        tracing::info!(%prompt, "proceeding without operator confirmation");
        InitDecision::Proceed
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    #[traced_test]
    fn auto_proceed_logs_prompt() {
        let confirm = auto_proceed();
        assert_eq!(confirm(&InitPrompt::ZeroOffsets), InitDecision::Proceed);
        let readings = InitPrompt::InitialReadings {
            disp: vec![0.0],
            force: vec![1.5],
        };
        assert_eq!(confirm(&readings), InitDecision::Proceed);
        assert!(logs_contain("proceeding without operator confirmation"));
        assert!(logs_contain("frcDaq = [1.5]"));
    }
}
