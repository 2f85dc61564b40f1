//! Background adapter element that behaves like a linear elastic specimen.
//!
//! Runs the remote side of the adapter wire contract on its own thread:
//! reads the identification header, stores trial values on
//! `SetTrialResponse`, answers every measurement request with
//! `[disp..., force...]` where `force = stiffness * disp`, and exits on `Die`
//! or when the controller side goes away.

use super::channel::{self, Message, MockChannel, PeerHarness};
use crate::protocol::{self, Opcode, HEADER_LEN};
use hsim_core::{ResponseKind, SizeSpec};
use std::thread::{self, JoinHandle};

/// Handle to a running elastic adapter element.
#[derive(Debug)]
pub struct ElasticPeer {
    handle: JoinHandle<ElasticSummary>,
}

/// What the peer saw before it exited.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElasticSummary {
    /// Header received, if any.
    pub header: Option<[i32; HEADER_LEN]>,
    /// Number of trial vectors applied.
    pub trials: usize,
    /// Number of measurement requests answered.
    pub requests: usize,
    /// Whether the session ended with `Die`.
    pub terminated: bool,
}

impl ElasticPeer {
    /// Spawn the peer and return the controller end of its link.
    pub fn spawn(stiffness: f64) -> std::io::Result<(MockChannel, ElasticPeer)> {
        let (channel, harness) = channel::pair_labelled("elastic-peer");
        let handle = thread::Builder::new()
            .name("elastic-peer".into())
            .spawn(move || serve(&harness, stiffness))?;
        Ok((channel, ElasticPeer { handle }))
    }

    /// Wait for the session to end.
    #[must_use]
    pub fn join(self) -> Option<ElasticSummary> {
        self.handle.join().ok()
    }
}

fn serve(harness: &PeerHarness, stiffness: f64) -> ElasticSummary {
    let mut summary = ElasticSummary::default();
    let (mut trial, mut daq, mut data_size) = (SizeSpec::new(), SizeSpec::new(), 0);
    let mut disp = Vec::new();
    let mut force = Vec::new();

    while let Some(message) = harness.recv() {
        match message {
            Message::Id(ids) => {
                let Ok(header) = <[i32; HEADER_LEN]>::try_from(ids.as_slice()) else {
                    tracing::warn!(len = ids.len(), "elastic peer: malformed header");
                    break;
                };
                (trial, daq, data_size) = protocol::parse_header(&header);
                summary.header = Some(header);
                disp = vec![0.0; daq.get(ResponseKind::Displacement)];
                force = vec![0.0; daq.get(ResponseKind::Force)];
                tracing::debug!(%trial, %daq, data_size, "elastic peer: session header");
            }
            Message::Vector(data) => match data.first().copied().and_then(Opcode::from_f64) {
                Some(Opcode::SetTrialResponse) => {
                    summary.trials += 1;
                    apply_trial(&data, &trial, stiffness, &mut disp, &mut force);
                }
                Some(Opcode::GetForce | Opcode::GetDisp | Opcode::GetDaqResponse) => {
                    summary.requests += 1;
                    let mut reply = vec![0.0; data_size];
                    let n = disp.len().min(data_size);
                    reply[..n].copy_from_slice(&disp[..n]);
                    let m = force.len().min(data_size - n);
                    reply[n..n + m].copy_from_slice(&force[..m]);
                    if harness.reply(reply).is_err() {
                        break;
                    }
                }
                Some(Opcode::Die) => {
                    summary.terminated = true;
                    break;
                }
                other => tracing::trace!(?other, "elastic peer: ignored opcode"),
            },
        }
    }
    summary
}

fn apply_trial(data: &[f64], trial: &SizeSpec, stiffness: f64, disp: &mut [f64], force: &mut [f64]) {
    let n_disp = trial.get(ResponseKind::Displacement);
    let n_force = trial.get(ResponseKind::Force);
    let trial_disp = data.get(1..1 + n_disp).unwrap_or(&[]);
    let trial_force = data.get(1 + n_disp..1 + n_disp + n_force).unwrap_or(&[]);

    for (i, d) in disp.iter_mut().enumerate() {
        *d = match (trial_disp.get(i), trial_force.get(i)) {
            (Some(&u), _) => u,
            (None, Some(&p)) if stiffness != 0.0 => p / stiffness,
            _ => 0.0,
        };
    }
    for (i, f) in force.iter_mut().enumerate() {
        *f = match (trial_disp.get(i), trial_force.get(i)) {
            (Some(&u), _) => stiffness * u,
            (None, Some(&p)) => p,
            (None, None) => 0.0,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::VectorChannel;

    #[test]
    fn answers_with_spring_response_and_stops_on_die() {
        let (mut channel, peer) = ElasticPeer::spawn(10.0).unwrap();
        let trial = SizeSpec::new().with(ResponseKind::Displacement, 1);
        let daq = SizeSpec::new()
            .with(ResponseKind::Displacement, 1)
            .with(ResponseKind::Force, 1);
        channel.send_id(&protocol::header(&trial, &daq, 4)).unwrap();
        channel
            .send_vector(&[Opcode::SetTrialResponse.as_f64(), 0.5, 0.0, 0.0])
            .unwrap();
        channel
            .send_vector(&[Opcode::GetForce.as_f64(), 0.0, 0.0, 0.0])
            .unwrap();
        let mut reply = [0.0; 4];
        channel.recv_vector(&mut reply).unwrap();
        assert_eq!(reply, [0.5, 5.0, 0.0, 0.0]);

        channel
            .send_vector(&[Opcode::Die.as_f64(), 0.0, 0.0, 0.0])
            .unwrap();
        let summary = peer.join().unwrap();
        assert!(summary.terminated);
        assert_eq!(summary.trials, 1);
        assert_eq!(summary.requests, 1);
    }

    #[test]
    fn exits_when_controller_side_drops() {
        let (channel, peer) = ElasticPeer::spawn(1.0).unwrap();
        drop(channel);
        let summary = peer.join().unwrap();
        assert!(!summary.terminated);
        assert!(summary.header.is_none());
    }
}
