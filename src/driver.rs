//! Step driver standing in for the analysis program.
//!
//! Drives a sinusoidal displacement history through a site, one analysis
//! step at a time: `set_trial_response`, `get_daq_response`, then
//! `commit_state`.

use hsim_core::{ControlError, ControllerState, DaqResponse, ExperimentalSite, ResponseKind, TrialResponse};
use hsim_registry::SharedSite;
use std::f64::consts::PI;
use tracing::{debug, info};

/// Parameters of a sinusoidal displacement history.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sinusoid {
    /// Number of analysis steps.
    pub steps: usize,
    /// Peak displacement.
    pub amplitude: f64,
    /// Steps per cycle.
    pub period: usize,
}

impl Sinusoid {
    /// Target displacement at step `k`.
    #[must_use]
    pub fn target(&self, k: usize) -> f64 {
        if self.period == 0 {
            return 0.0;
        }
        self.amplitude * (2.0 * PI * k as f64 / self.period as f64).sin()
    }
}

/// Measured values of one step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepRecord {
    /// Step index, starting at 1.
    pub step: usize,
    /// Target displacement sent to every trial channel.
    pub target: f64,
    /// Measured displacements.
    pub disp: Vec<f64>,
    /// Measured forces.
    pub force: Vec<f64>,
}

/// Result of a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    /// Every completed step, in order.
    pub records: Vec<StepRecord>,
}

impl RunSummary {
    /// Largest absolute measured force.
    #[must_use]
    pub fn peak_force(&self) -> f64 {
        self.records
            .iter()
            .flat_map(|r| r.force.iter())
            .fold(0.0, |peak, f| f.abs().max(peak))
    }
}

/// Set up `site` and drive `history` through it.
///
/// The site must already be sized with displacement trial channels.
pub fn run_sinusoid(site: &SharedSite, history: &Sinusoid) -> Result<RunSummary, ControlError> {
    let mut site = site.lock();
    let (trial, daq) = site.sizes().ok_or(ControlError::InvalidState {
        operation: "run",
        state: ControllerState::Unconfigured,
    })?;
    let trial_disp = trial.get(ResponseKind::Displacement);
    if trial_disp == 0 {
        return Err(ControlError::Configuration(format!(
            "site {} has no displacement trial channels",
            site.tag()
        )));
    }

    site.setup()?;
    info!(
        site = site.tag(),
        steps = history.steps,
        amplitude = history.amplitude,
        period = history.period,
        "driving site"
    );

    let mut summary = RunSummary::default();
    let mut target = vec![0.0; trial_disp];
    let mut disp = vec![0.0; daq.get(ResponseKind::Displacement)];
    let mut force = vec![0.0; daq.get(ResponseKind::Force)];

    for step in 1..=history.steps {
        let value = history.target(step);
        target.fill(value);
        site.set_trial_response(&TrialResponse::new().disp(&target))?;

        let mut request = DaqResponse::new();
        if !disp.is_empty() {
            request = request.disp(&mut disp);
        }
        if !force.is_empty() {
            request = request.force(&mut force);
        }
        site.get_daq_response(&mut request)?;
        site.commit_state()?;

        debug!(step, target = value, ?disp, ?force, "step committed");
        summary.records.push(StepRecord {
            step,
            target: value,
            disp: disp.clone(),
            force: force.clone(),
        });
    }

    info!(site = site.tag(), steps = summary.records.len(), peak_force = summary.peak_force(), "run complete");
    Ok(summary)
}
