//! Simulation adapter controller.
//!
//! Drives a remote adapter element over a [`VectorChannel`]. Each exchange is
//! one vector of `data_size` doubles with the opcode in slot 0; see
//! [`hsim_transport::protocol`] for the layout.
//!
//! Copies made with [`get_copy`](ExperimentalControl::get_copy) share the
//! physical link. The terminate opcode is sent once, when the last copy is
//! dropped.

use hsim_core::control::ControlCore;
use hsim_core::{
    ControlError, ControllerState, DaqResponse, ExperimentalControl, ResponseKind, ResponseQuery,
    SizeSpec, Tag, TransportError, TrialResponse,
};
use hsim_transport::protocol::{self, Opcode, DEFAULT_DATA_SIZE};
use hsim_transport::VectorChannel;
use parking_lot::Mutex;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Family name used in configuration.
pub const FAMILY: &str = "SimFEAdapter";

/// The physical link, shared between copies.
struct AdapterLink {
    channel: Mutex<Option<Box<dyn VectorChannel>>>,
    peer: String,
    data_size: usize,
}

impl AdapterLink {
    fn new(channel: Box<dyn VectorChannel>, data_size: usize) -> Self {
        Self {
            peer: channel.peer(),
            channel: Mutex::new(Some(channel)),
            data_size,
        }
    }

    fn with_channel<T>(
        &self,
        f: impl FnOnce(&mut dyn VectorChannel) -> Result<T, TransportError>,
    ) -> Result<T, TransportError> {
        let mut guard = self.channel.lock();
        let channel = guard.as_mut().ok_or(TransportError::Closed)?;
        f(&mut **channel)
    }

    /// Drop the channel without sending anything.
    fn release(&self) {
        if self.channel.lock().take().is_some() {
            debug!(peer = %self.peer, "adapter link released");
        }
    }

    fn is_open(&self) -> bool {
        self.channel.lock().is_some()
    }
}

impl Drop for AdapterLink {
    fn drop(&mut self) {
        if let Some(mut channel) = self.channel.get_mut().take() {
            let mut die = vec![0.0; self.data_size];
            if let Some(slot) = die.first_mut() {
                *slot = Opcode::Die.as_f64();
            }
            match channel.send_vector(&die) {
                Ok(()) => info!(peer = %self.peer, "sent terminate to adapter element"),
                Err(err) => warn!(peer = %self.peer, error = %err, "failed to send terminate"),
            }
        }
    }
}

impl fmt::Debug for AdapterLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterLink")
            .field("peer", &self.peer)
            .field("data_size", &self.data_size)
            .field("open", &self.is_open())
            .finish()
    }
}

/// Buffer offsets bound by `setup`.
#[derive(Debug, Clone)]
struct Layout {
    targ_disp: Range<usize>,
    targ_force: Range<usize>,
    meas_disp: Range<usize>,
    meas_force: Range<usize>,
}

impl Layout {
    fn new(trial: &SizeSpec, daq: &SizeSpec) -> Self {
        let td = trial.get(ResponseKind::Displacement);
        let tf = trial.get(ResponseKind::Force);
        let md = daq.get(ResponseKind::Displacement);
        let mf = daq.get(ResponseKind::Force);
        Self {
            targ_disp: 1..1 + td,
            targ_force: 1 + td..1 + td + tf,
            meas_disp: 0..md,
            meas_force: md..md + mf,
        }
    }

    fn target(&self, kind: ResponseKind) -> Option<Range<usize>> {
        match kind {
            ResponseKind::Displacement => Some(self.targ_disp.clone()),
            ResponseKind::Force => Some(self.targ_force.clone()),
            _ => None,
        }
    }

    fn measured(&self, kind: ResponseKind) -> Option<Range<usize>> {
        match kind {
            ResponseKind::Displacement => Some(self.meas_disp.clone()),
            ResponseKind::Force => Some(self.meas_force.clone()),
            _ => None,
        }
    }
}

/// Controller for a remote simulation adapter element.
#[derive(Debug)]
pub struct SimFeAdapter {
    core: ControlCore,
    link: Arc<AdapterLink>,
    send: Vec<f64>,
    recv: Vec<f64>,
    layout: Option<Layout>,
}

impl SimFeAdapter {
    /// Wrap a connected channel using the default message length.
    pub fn new(tag: Tag, channel: Box<dyn VectorChannel>) -> Self {
        Self::with_data_size(tag, channel, DEFAULT_DATA_SIZE)
    }

    /// Wrap a connected channel with a custom message length.
    pub fn with_data_size(tag: Tag, channel: Box<dyn VectorChannel>, data_size: usize) -> Self {
        let link = AdapterLink::new(channel, data_size);
        info!(tag, peer = %link.peer, data_size, "simulation adapter connected");
        Self {
            core: ControlCore::new(tag, FAMILY),
            link: Arc::new(link),
            send: vec![0.0; data_size],
            recv: vec![0.0; data_size],
            layout: None,
        }
    }

    /// Message length in doubles.
    #[must_use]
    pub fn data_size(&self) -> usize {
        self.link.data_size
    }

    /// Remote peer description.
    #[must_use]
    pub fn peer(&self) -> &str {
        &self.link.peer
    }

    /// Push the send buffer with the set-trial-response opcode.
    pub fn control(&mut self) -> Result<(), ControlError> {
        self.core.require_running("control")?;
        self.send[0] = Opcode::SetTrialResponse.as_f64();
        let send = &self.send;
        let result = self.link.with_channel(|ch| ch.send_vector(send));
        self.check("control", result)
    }

    /// Request and receive the measured buffer.
    pub fn acquire(&mut self) -> Result<(), ControlError> {
        self.core.require_running("acquire")?;
        self.send[0] = Opcode::GetForce.as_f64();
        let (send, recv) = (&self.send, &mut self.recv);
        let result = self.link.with_channel(|ch| {
            ch.send_vector(send)?;
            ch.recv_vector(recv)
        });
        self.check("acquire", result)
    }

    /// Map a link failure to a terminated controller.
    fn check<T>(&mut self, operation: &'static str, result: Result<T, TransportError>) -> Result<T, ControlError> {
        result.map_err(|source| {
            warn!(tag = self.core.tag(), operation, error = %source, "adapter link failed, releasing");
            self.link.release();
            self.core.set_state(ControllerState::Terminated);
            ControlError::Transport {
                family: FAMILY,
                operation,
                source,
            }
        })
    }
}

impl ExperimentalControl for SimFeAdapter {
    fn core(&self) -> &ControlCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ControlCore {
        &mut self.core
    }

    fn set_size(&mut self, trial: SizeSpec, daq: SizeSpec) -> Result<(), ControlError> {
        let data_size = self.link.data_size;
        self.core.accept_sizes(trial, daq, |trial, daq| {
            if !trial.has(ResponseKind::Displacement) && !trial.has(ResponseKind::Force) {
                return Err("trial sizes need displacement or force channels".to_string());
            }
            if !daq.has(ResponseKind::Displacement) || !daq.has(ResponseKind::Force) {
                return Err("daq sizes need both displacement and force channels".to_string());
            }
            let send = protocol::send_len(trial);
            let recv = protocol::recv_len(daq);
            if send > data_size || recv > data_size {
                return Err(format!(
                    "{send} trial and {recv} daq values do not fit a data size of {data_size}"
                ));
            }
            Ok(())
        })?;
        for kind in [ResponseKind::Velocity, ResponseKind::Acceleration, ResponseKind::Time] {
            if trial.has(kind) || daq.has(kind) {
                warn!(tag = self.core.tag(), %kind, "{FAMILY} ignores {kind} channels");
            }
        }
        Ok(())
    }

    fn setup(&mut self) -> Result<(), ControlError> {
        let (trial, daq) = self.core.require_sized("setup")?;
        let data_size = self.link.data_size;
        self.send = vec![0.0; data_size];
        self.recv = vec![0.0; data_size];
        self.layout = Some(Layout::new(&trial, &daq));

        let header = protocol::header(&trial, &daq, data_size);
        let result = self.link.with_channel(|ch| ch.send_id(&header));
        self.check("setup", result)?;

        self.core.set_state(ControllerState::Running);
        info!(tag = self.core.tag(), peer = %self.link.peer, %trial, %daq, "simulation adapter running");
        debug!("{}", self);
        Ok(())
    }

    fn set_trial_response(&mut self, trial: &TrialResponse<'_>) -> Result<(), ControlError> {
        self.core.require_running("set_trial_response")?;
        if let Some(layout) = &self.layout {
            for (kind, values) in trial.supplied() {
                match layout.target(kind) {
                    Some(range) if !range.is_empty() => {
                        self.core.write_trial(kind, values, &mut self.send[range])?;
                    }
                    _ => debug!(tag = self.core.tag(), %kind, "trial values not sent by {FAMILY}"),
                }
            }
        }
        self.control()
    }

    fn get_daq_response(&mut self, daq: &mut DaqResponse<'_>) -> Result<(), ControlError> {
        self.core.require_running("get_daq_response")?;
        self.acquire()?;
        let Some(layout) = &self.layout else {
            return Ok(());
        };
        for kind in [ResponseKind::Displacement, ResponseKind::Force] {
            if let Some(range) = layout.measured(kind) {
                self.core.filter_measured(kind, &mut self.recv[range]);
            }
        }
        let recv = &self.recv;
        self.core.read_daq(daq, |kind| {
            layout
                .measured(kind)
                .filter(|range| !range.is_empty())
                .map(|range| &recv[range])
        })
    }

    fn get_copy(&self) -> Box<dyn ExperimentalControl> {
        let data_size = self.link.data_size;
        Box::new(SimFeAdapter {
            core: self.core.for_copy(),
            link: Arc::clone(&self.link),
            send: vec![0.0; data_size],
            recv: vec![0.0; data_size],
            layout: None,
        })
    }

    fn response(&self, query: ResponseQuery) -> Option<Vec<f64>> {
        let layout = self.layout.as_ref()?;
        let values = match query {
            ResponseQuery::Target(kind) => &self.send[layout.target(kind)?],
            ResponseQuery::Measured(kind) => &self.recv[layout.measured(kind)?],
        };
        Some(values.to_vec())
    }
}

impl fmt::Display for SimFeAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.core.describe(f)?;
        writeln!(f, "  peer: {}", self.link.peer)?;
        writeln!(f, "  data size: {}", self.link.data_size)
    }
}
