//! Simulated real-time target.
//!
//! Models the hybrid-control application running on a target machine:
//!
//! - parameters `xPC HC/newTarget`, `xPC HC/targDsp`, `xPC HC/targVel`,
//!   `xPC HC/targAcc`
//! - signals `xPC HC/switchPC`, `xPC HC/atTarget` and the measured channels
//!   `xPC HC/measDsp`, `xPC HC/measFrc` (suffixed `/s1`, `/s2`, ... when a
//!   kind has more than one channel)
//!
//! Each signal read advances the real-time loop by one sample. While the
//! application runs, `switchPC` follows `newTarget` after `lag` samples; on
//! the rising edge the actuator moves to the commanded displacement and
//! `atTarget` drops, on the falling edge `atTarget` rises again. Measured
//! force is `stiffness * displacement` per channel.
//!
//! The handle is cheap to clone; clones observe the same target, so a test
//! can keep one to inspect [`TargetEvent`]s after handing another to a
//! controller.

use crate::bus::{BusAddress, SignalBus};
use hsim_core::TransportError;
use parking_lot::Mutex;
use std::sync::Arc;

const NEW_TARGET: i32 = 0;
const TARG_DISP: i32 = 1;
const TARG_VEL: i32 = 2;
const TARG_ACCEL: i32 = 3;
const SWITCH_PC: i32 = 10;
const AT_TARGET: i32 = 11;
const MEAS_DISP_BASE: i32 = 100;
const MEAS_FORCE_BASE: i32 = 200;

/// Lifecycle calls observed by the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetEvent {
    /// Application unloaded.
    Unloaded,
    /// Application loaded from `path`.
    Loaded {
        /// Directory.
        path: String,
        /// Application name.
        name: String,
    },
    /// Application started.
    Started,
    /// Application stopped.
    Stopped,
    /// Connection closed.
    Closed,
}

#[derive(Debug)]
struct TargetState {
    app_name: String,
    running: bool,
    closed: bool,
    lag: u32,
    pending: u32,
    stuck_switch: bool,
    fail_after_reads: Option<u64>,
    reads: u64,
    channels: Option<(usize, usize)>,
    stiffness: f64,
    new_target: f64,
    switch_pc: f64,
    at_target: f64,
    targ_disp: Vec<f64>,
    targ_vel: Vec<f64>,
    targ_accel: Vec<f64>,
    meas_disp: Vec<f64>,
    events: Vec<TargetEvent>,
    handshakes: usize,
}

/// Shared handle to a simulated target.
#[derive(Debug, Clone)]
pub struct SimulatedTarget {
    state: Arc<Mutex<TargetState>>,
}

impl SimulatedTarget {
    /// Target with `app_name` loaded and stopped.
    #[must_use]
    pub fn new(app_name: &str) -> Self {
        Self {
            state: Arc::new(Mutex::new(TargetState {
                app_name: app_name.to_string(),
                running: false,
                closed: false,
                lag: 0,
                pending: 0,
                stuck_switch: false,
                fail_after_reads: None,
                reads: 0,
                channels: None,
                stiffness: 1.0,
                new_target: 0.0,
                switch_pc: 0.0,
                at_target: 1.0,
                targ_disp: Vec::new(),
                targ_vel: Vec::new(),
                targ_accel: Vec::new(),
                meas_disp: Vec::new(),
                events: Vec::new(),
                handshakes: 0,
            })),
        }
    }

    /// Restrict measured signals to exactly `disp` and `force` channels, with
    /// the unsuffixed name used only for a single channel.
    #[must_use]
    pub fn with_channels(self, disp: usize, force: usize) -> Self {
        self.state.lock().channels = Some((disp, force));
        self
    }

    /// Specimen stiffness relating displacement to force.
    #[must_use]
    pub fn with_stiffness(self, stiffness: f64) -> Self {
        self.state.lock().stiffness = stiffness;
        self
    }

    /// Samples between a `newTarget` change and the matching `switchPC` edge.
    #[must_use]
    pub fn with_lag(self, samples: u32) -> Self {
        self.state.lock().lag = samples;
        self
    }

    /// Freeze `switchPC` so the handshake never completes.
    pub fn stick_switch(&self, stuck: bool) {
        self.state.lock().stuck_switch = stuck;
    }

    /// Report a hardware error once `reads` more signal reads have happened.
    pub fn fail_after_reads(&self, reads: u64) {
        let mut state = self.state.lock();
        state.fail_after_reads = Some(state.reads + reads);
    }

    /// Lifecycle calls observed so far.
    #[must_use]
    pub fn events(&self) -> Vec<TargetEvent> {
        self.state.lock().events.clone()
    }

    /// Completed new-target handshakes (falling edges of `switchPC`).
    #[must_use]
    pub fn handshakes(&self) -> usize {
        self.state.lock().handshakes
    }

    /// Displacement most recently written to `targDsp`.
    #[must_use]
    pub fn target_disp(&self) -> Vec<f64> {
        self.state.lock().targ_disp.clone()
    }

    /// Velocity most recently written to `targVel`.
    #[must_use]
    pub fn target_vel(&self) -> Vec<f64> {
        self.state.lock().targ_vel.clone()
    }

    /// Acceleration most recently written to `targAcc`.
    #[must_use]
    pub fn target_accel(&self) -> Vec<f64> {
        self.state.lock().targ_accel.clone()
    }

    /// Whether the application is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }
}

impl TargetState {
    fn check_open(&self, operation: &str) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Hardware {
                operation: operation.to_string(),
                code: -1,
                message: "port is closed".to_string(),
            });
        }
        Ok(())
    }

    /// One sample of the real-time loop.
    fn tick(&mut self) {
        if !self.running || self.stuck_switch {
            return;
        }
        let want = self.new_target >= 0.5;
        let has = self.switch_pc >= 0.5;
        if want == has {
            self.pending = 0;
            return;
        }
        if self.pending < self.lag {
            self.pending += 1;
            return;
        }
        self.pending = 0;
        if want {
            self.switch_pc = 1.0;
            self.at_target = 0.0;
            self.meas_disp = self.targ_disp.clone();
        } else {
            self.switch_pc = 0.0;
            self.at_target = 1.0;
            self.handshakes += 1;
        }
    }

    fn read(&mut self, addr: BusAddress) -> Result<f64, TransportError> {
        self.check_open("xPCGetSignal")?;
        self.reads += 1;
        if let Some(limit) = self.fail_after_reads {
            if self.reads > limit {
                return Err(TransportError::Hardware {
                    operation: "xPCGetSignal".to_string(),
                    code: 5,
                    message: "simulated link failure".to_string(),
                });
            }
        }
        self.tick();
        let value = match addr.0 {
            SWITCH_PC => self.switch_pc,
            AT_TARGET => self.at_target,
            a if (MEAS_DISP_BASE..MEAS_FORCE_BASE).contains(&a) => {
                let i = (a - MEAS_DISP_BASE) as usize;
                self.meas_disp.get(i).copied().unwrap_or(0.0)
            }
            a if a >= MEAS_FORCE_BASE => {
                let i = (a - MEAS_FORCE_BASE) as usize;
                self.stiffness * self.meas_disp.get(i).copied().unwrap_or(0.0)
            }
            other => {
                return Err(TransportError::Hardware {
                    operation: "xPCGetSignal".to_string(),
                    code: 2,
                    message: format!("invalid signal index {other}"),
                })
            }
        };
        Ok(value)
    }

    fn measured_index(&self, name: &str, stem: &str, count: Option<usize>) -> Option<usize> {
        let rest = name.strip_prefix(stem)?;
        let index = if rest.is_empty() {
            0
        } else {
            let n: usize = rest.strip_prefix("/s")?.parse().ok()?;
            n.checked_sub(1)?
        };
        match count {
            None => Some(index),
            Some(1) if rest.is_empty() => Some(0),
            Some(n) if n > 1 && !rest.is_empty() && index < n => Some(index),
            Some(_) => None,
        }
    }
}

fn not_found(operation: &str, name: &str) -> TransportError {
    TransportError::Hardware {
        operation: operation.to_string(),
        code: 1,
        message: format!("'{name}' not found"),
    }
}

impl SignalBus for SimulatedTarget {
    fn app_name(&mut self) -> Result<String, TransportError> {
        let state = self.state.lock();
        state.check_open("xPCGetAppName")?;
        Ok(state.app_name.clone())
    }

    fn unload_app(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        state.check_open("xPCUnloadApp")?;
        state.running = false;
        state.app_name = "loader".to_string();
        state.events.push(TargetEvent::Unloaded);
        Ok(())
    }

    fn load_app(&mut self, path: &str, name: &str) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        state.check_open("xPCLoadApp")?;
        state.app_name = name.to_string();
        state.events.push(TargetEvent::Loaded {
            path: path.to_string(),
            name: name.to_string(),
        });
        Ok(())
    }

    fn start_app(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        state.check_open("xPCStartApp")?;
        state.running = true;
        state.events.push(TargetEvent::Started);
        Ok(())
    }

    fn stop_app(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        state.check_open("xPCStopApp")?;
        state.running = false;
        state.events.push(TargetEvent::Stopped);
        Ok(())
    }

    fn sample_time(&mut self) -> Result<f64, TransportError> {
        self.state.lock().check_open("xPCGetSampleTime")?;
        Ok(0.001)
    }

    fn stop_time(&mut self) -> Result<f64, TransportError> {
        self.state.lock().check_open("xPCGetStopTime")?;
        Ok(f64::INFINITY)
    }

    fn param_index(&mut self, block: &str, param: &str) -> Result<BusAddress, TransportError> {
        self.state.lock().check_open("xPCGetParamIdx")?;
        if param != "Value" {
            return Err(not_found("xPCGetParamIdx", param));
        }
        let index = match block {
            "xPC HC/newTarget" => NEW_TARGET,
            "xPC HC/targDsp" => TARG_DISP,
            "xPC HC/targVel" => TARG_VEL,
            "xPC HC/targAcc" => TARG_ACCEL,
            other => return Err(not_found("xPCGetParamIdx", other)),
        };
        Ok(BusAddress(index))
    }

    fn signal_index(&mut self, name: &str) -> Result<BusAddress, TransportError> {
        let state = self.state.lock();
        state.check_open("xPCGetSignalIdx")?;
        let (disp_count, force_count) = match state.channels {
            Some((d, f)) => (Some(d), Some(f)),
            None => (None, None),
        };
        let index = match name {
            "xPC HC/switchPC" => SWITCH_PC,
            "xPC HC/atTarget" => AT_TARGET,
            _ => {
                if let Some(i) = state.measured_index(name, "xPC HC/measDsp", disp_count) {
                    MEAS_DISP_BASE + i as i32
                } else if let Some(i) = state.measured_index(name, "xPC HC/measFrc", force_count) {
                    MEAS_FORCE_BASE + i as i32
                } else {
                    return Err(not_found("xPCGetSignalIdx", name));
                }
            }
        };
        Ok(BusAddress(index))
    }

    fn set_param(&mut self, addr: BusAddress, values: &[f64]) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        state.check_open("xPCSetParam")?;
        match addr.0 {
            NEW_TARGET => state.new_target = values.first().copied().unwrap_or(0.0),
            TARG_DISP => state.targ_disp = values.to_vec(),
            TARG_VEL => state.targ_vel = values.to_vec(),
            TARG_ACCEL => state.targ_accel = values.to_vec(),
            other => {
                return Err(TransportError::Hardware {
                    operation: "xPCSetParam".to_string(),
                    code: 3,
                    message: format!("invalid parameter index {other}"),
                })
            }
        }
        Ok(())
    }

    fn signal(&mut self, addr: BusAddress) -> Result<f64, TransportError> {
        self.state.lock().read(addr)
    }

    fn signals(&mut self, addrs: &[BusAddress], out: &mut [f64]) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        for (addr, value) in addrs.iter().zip(out.iter_mut()) {
            *value = state.read(*addr)?;
        }
        Ok(())
    }

    fn close(&mut self) {
        let mut state = self.state.lock();
        if !state.closed {
            state.closed = true;
            state.running = false;
            state.events.push(TargetEvent::Closed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handshake(bus: &mut SimulatedTarget) -> (Vec<f64>, Vec<f64>) {
        let new_target = bus.param_index("xPC HC/newTarget", "Value").unwrap();
        let switch = bus.signal_index("xPC HC/switchPC").unwrap();
        bus.set_param(new_target, &[1.0]).unwrap();
        let mut seen = vec![bus.signal(switch).unwrap()];
        while seen.last() != Some(&1.0) {
            seen.push(bus.signal(switch).unwrap());
        }
        bus.set_param(new_target, &[0.0]).unwrap();
        let mut after = vec![bus.signal(switch).unwrap()];
        while after.last() != Some(&0.0) {
            after.push(bus.signal(switch).unwrap());
        }
        (seen, after)
    }

    #[test]
    fn switch_follows_new_target_after_lag() {
        let mut bus = SimulatedTarget::new("hc").with_lag(2);
        bus.start_app().unwrap();
        let (rise, fall) = handshake(&mut bus);
        assert_eq!(rise, vec![0.0, 0.0, 1.0]);
        assert_eq!(fall, vec![1.0, 1.0, 0.0]);
        assert_eq!(bus.handshakes(), 1);
    }

    #[test]
    fn stopped_application_never_switches() {
        let mut bus = SimulatedTarget::new("hc");
        let new_target = bus.param_index("xPC HC/newTarget", "Value").unwrap();
        let switch = bus.signal_index("xPC HC/switchPC").unwrap();
        bus.set_param(new_target, &[1.0]).unwrap();
        for _ in 0..10 {
            assert_eq!(bus.signal(switch).unwrap(), 0.0);
        }
    }

    #[test]
    fn measured_force_tracks_commanded_displacement() {
        let mut bus = SimulatedTarget::new("hc").with_stiffness(4.0);
        bus.start_app().unwrap();
        let targ = bus.param_index("xPC HC/targDsp", "Value").unwrap();
        bus.set_param(targ, &[0.25, 0.5]).unwrap();
        handshake(&mut bus);
        let disp = [
            bus.signal_index("xPC HC/measDsp/s1").unwrap(),
            bus.signal_index("xPC HC/measDsp/s2").unwrap(),
        ];
        let force = [bus.signal_index("xPC HC/measFrc/s2").unwrap()];
        let mut d = [0.0; 2];
        let mut f = [0.0; 1];
        bus.signals(&disp, &mut d).unwrap();
        bus.signals(&force, &mut f).unwrap();
        assert_eq!(d, [0.25, 0.5]);
        assert_eq!(f, [2.0]);
    }

    #[test]
    fn channel_naming_depends_on_count() {
        let mut single = SimulatedTarget::new("hc").with_channels(1, 1);
        assert!(single.signal_index("xPC HC/measDsp").is_ok());
        assert!(single.signal_index("xPC HC/measDsp/s1").is_err());

        let mut many = SimulatedTarget::new("hc").with_channels(2, 1);
        assert!(many.signal_index("xPC HC/measDsp").is_err());
        assert!(many.signal_index("xPC HC/measDsp/s2").is_ok());
        assert!(many.signal_index("xPC HC/measDsp/s3").is_err());
        assert!(many.signal_index("xPC HC/measFrc").is_ok());
    }

    #[test]
    fn injected_failure_surfaces_as_hardware_error() {
        let mut bus = SimulatedTarget::new("hc");
        let at_target = bus.signal_index("xPC HC/atTarget").unwrap();
        bus.fail_after_reads(1);
        assert!(bus.signal(at_target).is_ok());
        assert!(matches!(
            bus.signal(at_target),
            Err(TransportError::Hardware { code: 5, .. })
        ));
    }

    #[test]
    fn close_is_idempotent_and_blocks_further_calls() {
        let mut bus = SimulatedTarget::new("hc");
        bus.close();
        bus.close();
        assert_eq!(bus.events(), vec![TargetEvent::Closed]);
        assert!(bus.app_name().is_err());
    }
}
