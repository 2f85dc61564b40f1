//! xPC real-time target controller.
//!
//! Commands are written into block parameters of the hybrid-control
//! application running on the target; measurements are read from its
//! signals. Each `control` performs a two-phase handshake:
//!
//! ```text
//! write targDsp [targVel] [targAcc]
//! newTarget = 1  ──► wait switchPC == 1
//! newTarget = 0  ──► wait switchPC == 0
//! ```
//!
//! and each `acquire` waits for `atTarget == 1` before reading `measDsp` and
//! `measFrc`. Waits block without a timeout.
//!
//! Copies made with [`get_copy`](ExperimentalControl::get_copy) share the
//! target connection. The application is stopped and the connection closed
//! when the last copy is dropped, or immediately on a link failure.

use crate::confirm::{self, Confirm, InitDecision, InitPrompt};
use crate::handshake::{wait_for_flag, PollPolicy};
use hsim_core::control::ControlCore;
use hsim_core::{
    ControlError, ControllerState, DaqResponse, ExperimentalControl, ResponseKind, ResponseQuery,
    SizeSpec, Tag, TransportError, TrialResponse,
};
use hsim_transport::{BusAddress, SignalBus};
use parking_lot::Mutex;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Family name used in configuration.
pub const FAMILY: &str = "xPCtarget";

const BLOCK_NEW_TARGET: &str = "xPC HC/newTarget";
const BLOCK_TARG_DISP: &str = "xPC HC/targDsp";
const BLOCK_TARG_VEL: &str = "xPC HC/targVel";
const BLOCK_TARG_ACCEL: &str = "xPC HC/targAcc";
const SIGNAL_SWITCH: &str = "xPC HC/switchPC";
const SIGNAL_AT_TARGET: &str = "xPC HC/atTarget";
const SIGNAL_MEAS_DISP: &str = "xPC HC/measDsp";
const SIGNAL_MEAS_FORCE: &str = "xPC HC/measFrc";
const PARAM_VALUE: &str = "Value";

/// Which trial kinds the target application accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "u8")]
pub enum TargetType {
    /// Displacement only.
    Disp = 1,
    /// Displacement and velocity.
    DispVel = 2,
    /// Displacement, velocity and acceleration.
    DispVelAccel = 3,
}

impl TargetType {
    /// Trial kinds the application takes, in order.
    #[must_use]
    pub fn trial_kinds(self) -> &'static [ResponseKind] {
        static KINDS: [ResponseKind; 3] = [
            ResponseKind::Displacement,
            ResponseKind::Velocity,
            ResponseKind::Acceleration,
        ];
        &KINDS[..self as usize]
    }

    fn accepts(self, kind: ResponseKind) -> bool {
        self.trial_kinds().contains(&kind)
    }
}

impl TryFrom<u8> for TargetType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(TargetType::Disp),
            2 => Ok(TargetType::DispVel),
            3 => Ok(TargetType::DispVelAccel),
            other => Err(format!("target type must be 1, 2 or 3, got {other}")),
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TargetType::Disp => "disp",
            TargetType::DispVel => "disp+vel",
            TargetType::DispVelAccel => "disp+vel+accel",
        };
        write!(f, "{}", label)
    }
}

/// Construction parameters.
#[derive(Clone)]
pub struct XpcTargetOptions {
    /// Accepted trial kinds.
    pub target_type: TargetType,
    /// Target address, for display.
    pub ip_address: String,
    /// Target port, for display.
    pub ip_port: String,
    /// Application to run on the target.
    pub app_name: String,
    /// Directory the application is loaded from when not already loaded.
    pub app_path: String,
    /// Pause after starting the application.
    pub settle: Duration,
    /// Behaviour between handshake polls.
    pub poll: PollPolicy,
    /// Operator confirmation during setup.
    pub confirm: Confirm,
}

impl XpcTargetOptions {
    /// Options with defaults for everything but the application.
    pub fn new(target_type: TargetType, app_name: impl Into<String>, app_path: impl Into<String>) -> Self {
        Self {
            target_type,
            ip_address: "192.168.2.20".to_string(),
            ip_port: "22222".to_string(),
            app_name: app_name.into(),
            app_path: app_path.into(),
            settle: Duration::from_secs(1),
            poll: PollPolicy::default(),
            confirm: confirm::auto_proceed(),
        }
    }
}

impl fmt::Debug for XpcTargetOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XpcTargetOptions")
            .field("target_type", &self.target_type)
            .field("ip_address", &self.ip_address)
            .field("ip_port", &self.ip_port)
            .field("app_name", &self.app_name)
            .field("app_path", &self.app_path)
            .field("settle", &self.settle)
            .field("poll", &self.poll)
            .finish_non_exhaustive()
    }
}

/// The target connection, shared between copies.
struct TargetLink {
    bus: Mutex<Option<Box<dyn SignalBus>>>,
    endpoint: String,
}

impl TargetLink {
    fn with_bus<T>(
        &self,
        f: impl FnOnce(&mut dyn SignalBus) -> Result<T, TransportError>,
    ) -> Result<T, TransportError> {
        let mut guard = self.bus.lock();
        let bus = guard.as_mut().ok_or(TransportError::Closed)?;
        f(&mut **bus)
    }

    /// Close the port without stopping the application.
    fn release(&self) {
        if let Some(mut bus) = self.bus.lock().take() {
            bus.close();
            debug!(endpoint = %self.endpoint, "target connection closed");
        }
    }

    fn is_open(&self) -> bool {
        self.bus.lock().is_some()
    }
}

impl Drop for TargetLink {
    fn drop(&mut self) {
        if let Some(mut bus) = self.bus.get_mut().take() {
            match bus.stop_app() {
                Ok(()) => info!(endpoint = %self.endpoint, "target application stopped"),
                Err(err) => warn!(endpoint = %self.endpoint, error = %err, "failed to stop target application"),
            }
            bus.close();
        }
    }
}

impl fmt::Debug for TargetLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetLink")
            .field("endpoint", &self.endpoint)
            .field("open", &self.is_open())
            .finish()
    }
}

/// Parameter and signal indices resolved during setup.
#[derive(Debug, Clone)]
struct BusIds {
    new_target: BusAddress,
    switch_pc: BusAddress,
    at_target: BusAddress,
    targ: Vec<(ResponseKind, BusAddress)>,
    meas_disp: Vec<BusAddress>,
    meas_force: Vec<BusAddress>,
}

/// Name of measured channel `index` of `count` under `stem`.
///
/// A single channel uses the bare name; several are suffixed `/s1`, `/s2`, ...
#[must_use]
pub fn measured_signal_name(stem: &str, index: usize, count: usize) -> String {
    if count == 1 {
        stem.to_string()
    } else {
        format!("{}/s{}", stem, index + 1)
    }
}

fn resolve_ids(
    bus: &mut dyn SignalBus,
    target_type: TargetType,
    trial: &SizeSpec,
    daq: &SizeSpec,
) -> Result<BusIds, TransportError> {
    let new_target = bus.param_index(BLOCK_NEW_TARGET, PARAM_VALUE)?;
    let switch_pc = bus.signal_index(SIGNAL_SWITCH)?;
    let at_target = bus.signal_index(SIGNAL_AT_TARGET)?;

    let mut targ = Vec::new();
    for &kind in target_type.trial_kinds() {
        if !trial.has(kind) {
            continue;
        }
        let block = match kind {
            ResponseKind::Displacement => BLOCK_TARG_DISP,
            ResponseKind::Velocity => BLOCK_TARG_VEL,
            _ => BLOCK_TARG_ACCEL,
        };
        targ.push((kind, bus.param_index(block, PARAM_VALUE)?));
    }

    let mut resolve = |stem: &str, count: usize| -> Result<Vec<BusAddress>, TransportError> {
        (0..count)
            .map(|i| bus.signal_index(&measured_signal_name(stem, i, count)))
            .collect()
    };
    let meas_disp = resolve(SIGNAL_MEAS_DISP, daq.get(ResponseKind::Displacement))?;
    let meas_force = resolve(SIGNAL_MEAS_FORCE, daq.get(ResponseKind::Force))?;

    Ok(BusIds {
        new_target,
        switch_pc,
        at_target,
        targ,
        meas_disp,
        meas_force,
    })
}

/// Controller for an xPC real-time target.
#[derive(Debug)]
pub struct XpcTarget {
    core: ControlCore,
    options: XpcTargetOptions,
    link: Arc<TargetLink>,
    targ_disp: Vec<f64>,
    targ_vel: Vec<f64>,
    targ_accel: Vec<f64>,
    meas_disp: Vec<f64>,
    meas_force: Vec<f64>,
    ids: Option<BusIds>,
}

impl XpcTarget {
    /// Bring up the target application on an open bus.
    ///
    /// Loads `app_name` from `app_path` unless it is already the loaded
    /// application, then starts it, waits `settle`, and stops it again so it
    /// is ready for [`setup`](ExperimentalControl::setup). On failure the bus
    /// is closed before the error is returned.
    pub fn connect(tag: Tag, options: XpcTargetOptions, mut bus: Box<dyn SignalBus>) -> Result<Self, ControlError> {
        let endpoint = format!("{}:{}", options.ip_address, options.ip_port);
        info!(tag, %endpoint, "target connection opened");

        if let Err((operation, source)) = bring_up(bus.as_mut(), &options) {
            bus.close();
            return Err(ControlError::Transport {
                family: FAMILY,
                operation,
                source,
            });
        }

        Ok(Self {
            core: ControlCore::new(tag, FAMILY),
            options,
            link: Arc::new(TargetLink {
                bus: Mutex::new(Some(bus)),
                endpoint,
            }),
            targ_disp: Vec::new(),
            targ_vel: Vec::new(),
            targ_accel: Vec::new(),
            meas_disp: Vec::new(),
            meas_force: Vec::new(),
            ids: None,
        })
    }

    /// Accepted trial kinds.
    #[must_use]
    pub fn target_type(&self) -> TargetType {
        self.options.target_type
    }

    /// Push target vectors and complete the new-target handshake.
    pub fn control(&mut self) -> Result<(), ControlError> {
        self.core.require_running("control")?;
        self.push_targets()
    }

    /// Wait for the actuator to reach its target and read measurements.
    pub fn acquire(&mut self) -> Result<(), ControlError> {
        self.core.require_running("acquire")?;
        self.pull_measurements()
    }

    fn push_targets(&mut self) -> Result<(), ControlError> {
        let Some(ids) = &self.ids else {
            return Err(ControlError::InvalidState {
                operation: "control",
                state: self.core.state(),
            });
        };
        let poll = self.options.poll;
        let targets = [
            (ResponseKind::Displacement, &self.targ_disp),
            (ResponseKind::Velocity, &self.targ_vel),
            (ResponseKind::Acceleration, &self.targ_accel),
        ];
        let result = self.link.with_bus(|bus| {
            for (kind, addr) in &ids.targ {
                if let Some((_, values)) = targets.iter().find(|(k, _)| k == kind) {
                    bus.set_param(*addr, values)?;
                }
            }
            bus.set_param(ids.new_target, &[1.0])?;
            let rise = wait_for_flag(bus, ids.switch_pc, true, poll)?;
            bus.set_param(ids.new_target, &[0.0])?;
            let fall = wait_for_flag(bus, ids.switch_pc, false, poll)?;
            Ok((rise, fall))
        });
        let (rise, fall) = self.check("control", result)?;
        debug!(tag = self.core.tag(), rise, fall, "new target handshake complete");
        Ok(())
    }

    fn pull_measurements(&mut self) -> Result<(), ControlError> {
        let Some(ids) = &self.ids else {
            return Err(ControlError::InvalidState {
                operation: "acquire",
                state: self.core.state(),
            });
        };
        let poll = self.options.poll;
        let (disp, force) = (&mut self.meas_disp, &mut self.meas_force);
        let result = self.link.with_bus(|bus| {
            wait_for_flag(bus, ids.at_target, true, poll)?;
            if !ids.meas_disp.is_empty() {
                bus.signals(&ids.meas_disp, disp)?;
            }
            if !ids.meas_force.is_empty() {
                bus.signals(&ids.meas_force, force)?;
            }
            Ok(())
        });
        self.check("acquire", result)
    }

    /// Map a link failure to a terminated controller.
    fn check<T>(&mut self, operation: &'static str, result: Result<T, TransportError>) -> Result<T, ControlError> {
        result.map_err(|source| {
            warn!(tag = self.core.tag(), operation, error = %source, "target link failed, releasing");
            self.terminate();
            ControlError::Transport {
                family: FAMILY,
                operation,
                source,
            }
        })
    }

    fn terminate(&mut self) {
        self.link.release();
        self.core.set_state(ControllerState::Terminated);
    }

    fn ask(&self, prompt: &InitPrompt) -> InitDecision {
        (self.options.confirm)(prompt)
    }

    fn target_ref(&self, kind: ResponseKind) -> Option<&[f64]> {
        match kind {
            ResponseKind::Displacement => Some(&self.targ_disp),
            ResponseKind::Velocity => Some(&self.targ_vel),
            ResponseKind::Acceleration => Some(&self.targ_accel),
            _ => None,
        }
    }

    fn measured_ref(&self, kind: ResponseKind) -> Option<&[f64]> {
        match kind {
            ResponseKind::Displacement => Some(&self.meas_disp),
            ResponseKind::Force => Some(&self.meas_force),
            _ => None,
        }
    }
}

fn bring_up(bus: &mut dyn SignalBus, options: &XpcTargetOptions) -> Result<(), (&'static str, TransportError)> {
    let current = bus.app_name().map_err(|e| ("get_app_name", e))?;
    if current != options.app_name {
        bus.unload_app().map_err(|e| ("unload_app", e))?;
        bus.load_app(&options.app_path, &options.app_name)
            .map_err(|e| ("load_app", e))?;
        info!(app = %options.app_name, path = %options.app_path, "loaded target application");
    }
    bus.start_app().map_err(|e| ("start_app", e))?;
    std::thread::sleep(options.settle);
    bus.stop_app().map_err(|e| ("stop_app", e))?;

    let sample_time = bus.sample_time().map_err(|e| ("get_sample_time", e))?;
    let stop_time = bus.stop_time().map_err(|e| ("get_stop_time", e))?;
    info!(
        app = %options.app_name,
        sample_time,
        stop_time,
        "target application loaded and stopped"
    );
    Ok(())
}

impl ExperimentalControl for XpcTarget {
    fn core(&self) -> &ControlCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ControlCore {
        &mut self.core
    }

    fn set_size(&mut self, trial: SizeSpec, daq: SizeSpec) -> Result<(), ControlError> {
        let target_type = self.options.target_type;
        self.core.accept_sizes(trial, daq, |trial, daq| {
            for &kind in target_type.trial_kinds() {
                if !trial.has(kind) {
                    return Err(format!(
                        "target type {target_type} needs {kind} trial channels"
                    ));
                }
            }
            if !daq.has(ResponseKind::Displacement) && !daq.has(ResponseKind::Force) {
                return Err("daq sizes need displacement or force channels".to_string());
            }
            Ok(())
        })?;
        for (kind, _) in trial.active().filter(|(kind, _)| !target_type.accepts(*kind)) {
            warn!(tag = self.core.tag(), %kind, "{FAMILY} ({target_type}) ignores {kind} trial channels");
        }
        for kind in [ResponseKind::Velocity, ResponseKind::Acceleration, ResponseKind::Time] {
            if daq.has(kind) {
                warn!(tag = self.core.tag(), %kind, "{FAMILY} ignores {kind} daq channels");
            }
        }
        Ok(())
    }

    fn setup(&mut self) -> Result<(), ControlError> {
        let (trial, daq) = self.core.require_sized("setup")?;
        let target_type = self.options.target_type;
        let zeroed = |kind: ResponseKind, sizes: &SizeSpec| vec![0.0; sizes.get(kind)];
        self.targ_disp = zeroed(ResponseKind::Displacement, &trial);
        self.targ_vel = if target_type.accepts(ResponseKind::Velocity) {
            zeroed(ResponseKind::Velocity, &trial)
        } else {
            Vec::new()
        };
        self.targ_accel = if target_type.accepts(ResponseKind::Acceleration) {
            zeroed(ResponseKind::Acceleration, &trial)
        } else {
            Vec::new()
        };
        self.meas_disp = zeroed(ResponseKind::Displacement, &daq);
        self.meas_force = zeroed(ResponseKind::Force, &daq);

        let resolved = self
            .link
            .with_bus(|bus| resolve_ids(bus, target_type, &trial, &daq));
        self.ids = Some(self.check("setup", resolved)?);
        debug!("{}", self);

        if self.ask(&InitPrompt::ZeroOffsets) == InitDecision::Cancel {
            info!(tag = self.core.tag(), "setup cancelled before start");
            self.terminate();
            return Err(ControlError::Cancelled);
        }

        let started = self.link.with_bus(|bus| bus.start_app());
        self.check("start_app", started)?;
        std::thread::sleep(self.options.settle);

        loop {
            self.push_targets()?;
            self.pull_measurements()?;
            let prompt = InitPrompt::InitialReadings {
                disp: self.meas_disp.clone(),
                force: self.meas_force.clone(),
            };
            match self.ask(&prompt) {
                InitDecision::Proceed => break,
                InitDecision::Repeat => debug!(tag = self.core.tag(), "repeating initial measurement"),
                InitDecision::Cancel => {
                    info!(tag = self.core.tag(), "setup cancelled after initial measurement");
                    self.terminate();
                    return Err(ControlError::Cancelled);
                }
            }
        }

        self.core.set_state(ControllerState::Running);
        info!(tag = self.core.tag(), endpoint = %self.link.endpoint, %trial, %daq, "xPC target running");
        Ok(())
    }

    fn set_trial_response(&mut self, trial: &TrialResponse<'_>) -> Result<(), ControlError> {
        self.core.require_running("set_trial_response")?;
        let target_type = self.options.target_type;
        for (kind, values) in trial.supplied() {
            if !target_type.accepts(kind) {
                debug!(tag = self.core.tag(), %kind, "trial values not sent by {FAMILY}");
                continue;
            }
            let target = match kind {
                ResponseKind::Displacement => &mut self.targ_disp,
                ResponseKind::Velocity => &mut self.targ_vel,
                ResponseKind::Acceleration => &mut self.targ_accel,
                _ => continue,
            };
            self.core.write_trial(kind, values, target)?;
        }
        self.control()
    }

    fn get_daq_response(&mut self, daq: &mut DaqResponse<'_>) -> Result<(), ControlError> {
        self.core.require_running("get_daq_response")?;
        self.acquire()?;
        self.core.filter_measured(ResponseKind::Displacement, &mut self.meas_disp);
        self.core.filter_measured(ResponseKind::Force, &mut self.meas_force);
        let (disp, force) = (&self.meas_disp, &self.meas_force);
        self.core.read_daq(daq, |kind| match kind {
            ResponseKind::Displacement if !disp.is_empty() => Some(disp.as_slice()),
            ResponseKind::Force if !force.is_empty() => Some(force.as_slice()),
            _ => None,
        })
    }

    fn get_copy(&self) -> Box<dyn ExperimentalControl> {
        Box::new(XpcTarget {
            core: self.core.for_copy(),
            options: self.options.clone(),
            link: Arc::clone(&self.link),
            targ_disp: Vec::new(),
            targ_vel: Vec::new(),
            targ_accel: Vec::new(),
            meas_disp: Vec::new(),
            meas_force: Vec::new(),
            ids: None,
        })
    }

    fn response(&self, query: ResponseQuery) -> Option<Vec<f64>> {
        self.ids.as_ref()?;
        let values = match query {
            ResponseQuery::Target(kind) => self.target_ref(kind)?,
            ResponseQuery::Measured(kind) => self.measured_ref(kind)?,
        };
        Some(values.to_vec())
    }
}

impl fmt::Display for XpcTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.core.describe(f)?;
        writeln!(f, "  target type: {}", self.options.target_type)?;
        writeln!(f, "  ip address: {}", self.options.ip_address)?;
        writeln!(f, "  ip port: {}", self.options.ip_port)?;
        writeln!(f, "  app name: {}", self.options.app_name)?;
        writeln!(f, "  app path: {}", self.options.app_path)
    }
}
