//! Simulation Adapter Test Suite
//!
//! Drives [`SimFeAdapter`] against scripted and live peers and checks the
//! exact wire traffic.
//!
//! | Test | Description |
//! |------|-------------|
//! | `test_round_trip_layout` | Header, trial vector and reply layout |
//! | `test_invalid_sizes_send_nothing` | Rejected sizes never reach the wire |
//! | `test_single_die_with_copies` | Shared link terminates once |
//! | `test_identity_filter_is_bit_exact` | Identity filters leave values unchanged |
//! | `test_link_failure_terminates` | Broken link leaves the controller terminated |
//! | `test_tcp_peer` | Same exchange over a real socket |

use hsim_control::SimFeAdapter;
use hsim_core::filter::Identity;
use hsim_core::{
    ControlError, ControllerState, DaqResponse, ExperimentalControl, ResponseKind, ResponseQuery,
    SharedFilter, SizeSpec, TransportError, TrialResponse,
};
use hsim_transport::mock::{self, ElasticPeer, Message};
use hsim_transport::{TcpChannel, VectorChannel};
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::Arc;
use std::thread;

// =============================================================================
// Helpers
// =============================================================================

fn disp_trial() -> SizeSpec {
    SizeSpec::new().with(ResponseKind::Displacement, 2)
}

fn disp_force_daq() -> SizeSpec {
    SizeSpec::new()
        .with(ResponseKind::Displacement, 1)
        .with(ResponseKind::Force, 2)
}

// =============================================================================
// Tests
// =============================================================================

#[test]
fn test_round_trip_layout() {
    let (channel, harness) = mock::pair();
    let mut control = SimFeAdapter::with_data_size(1, Box::new(channel), 3);

    control.set_size(disp_trial(), disp_force_daq()).unwrap();
    assert_eq!(control.state(), ControllerState::Configured);
    control.setup().unwrap();
    assert_eq!(control.state(), ControllerState::Running);
    assert_eq!(
        harness.try_next(),
        Some(Message::Id(vec![2, 0, 0, 0, 0, 1, 0, 0, 2, 0, 3]))
    );

    control
        .set_trial_response(&TrialResponse::new().disp(&[1.0, 2.0]))
        .unwrap();
    assert_eq!(harness.try_next(), Some(Message::Vector(vec![3.0, 1.0, 2.0])));

    harness.reply(vec![0.0, 5.0, 6.0]).unwrap();
    let mut force = [0.0; 2];
    control
        .get_daq_response(&mut DaqResponse::new().force(&mut force))
        .unwrap();
    assert_eq!(force, [5.0, 6.0]);
    assert_eq!(harness.try_next(), Some(Message::Vector(vec![10.0, 1.0, 2.0])));

    assert_eq!(
        control.response(ResponseQuery::Measured(ResponseKind::Force)),
        Some(vec![5.0, 6.0])
    );
    assert_eq!(
        control.response(ResponseQuery::Target(ResponseKind::Displacement)),
        Some(vec![1.0, 2.0])
    );
    assert_eq!(control.response(ResponseQuery::Target(ResponseKind::Velocity)), None);

    drop(control);
    assert_eq!(harness.try_next(), Some(Message::Vector(vec![99.0, 0.0, 0.0])));
    assert_eq!(harness.recv(), None);
}

#[test]
fn test_invalid_sizes_send_nothing() {
    let (channel, harness) = mock::pair();
    let mut control = SimFeAdapter::with_data_size(2, Box::new(channel), 3);

    let no_force = SizeSpec::new().with(ResponseKind::Displacement, 1);
    let err = control.set_size(disp_trial(), no_force).unwrap_err();
    assert!(matches!(err, ControlError::UnsupportedSize { .. }));

    let too_wide = SizeSpec::new().with(ResponseKind::Displacement, 3);
    assert!(control.set_size(too_wide, disp_force_daq()).is_err());

    assert_eq!(control.state(), ControllerState::Unconfigured);
    assert!(matches!(
        control.setup(),
        Err(ControlError::InvalidState { .. })
    ));
    assert!(harness.try_next().is_none());
}

#[test]
fn test_single_die_with_copies() {
    let (channel, harness) = mock::pair();
    let mut control = SimFeAdapter::with_data_size(3, Box::new(channel), 4);
    control.set_size(disp_trial(), disp_force_daq()).unwrap();
    control.setup().unwrap();
    let _header = harness.try_next();

    let copy = control.get_copy();
    assert_eq!(copy.tag(), 3);
    assert_eq!(copy.state(), ControllerState::Configured);
    let second = copy.get_copy();

    drop(control);
    drop(copy);
    assert!(harness.try_next().is_none());

    drop(second);
    let messages = harness.drain();
    let dies: Vec<_> = messages
        .iter()
        .filter(|m| m.opcode() == Some(99.0))
        .collect();
    assert_eq!(dies.len(), 1);
}

#[test]
fn test_identity_filter_is_bit_exact() {
    let (channel, harness) = mock::pair();
    let mut control = SimFeAdapter::with_data_size(4, Box::new(channel), 3);
    let identity: SharedFilter = Arc::new(Identity);
    control.set_ctrl_filter(ResponseKind::Displacement, Some(Arc::clone(&identity)));
    control.set_daq_filter(ResponseKind::Force, Some(identity));
    control.set_size(disp_trial(), disp_force_daq()).unwrap();
    control.setup().unwrap();
    let _header = harness.try_next();

    let trial = [0.1 + 0.2, -1.0e-300];
    control
        .set_trial_response(&TrialResponse::new().disp(&trial))
        .unwrap();
    assert_eq!(harness.try_next(), Some(Message::Vector(vec![3.0, trial[0], trial[1]])));

    let measured = [f64::MIN_POSITIVE, 1.0 / 3.0];
    harness.reply(vec![0.0, measured[0], measured[1]]).unwrap();
    let mut force = [0.0; 2];
    control
        .get_daq_response(&mut DaqResponse::new().force(&mut force))
        .unwrap();
    assert_eq!(force[0].to_bits(), measured[0].to_bits());
    assert_eq!(force[1].to_bits(), measured[1].to_bits());
}

#[test]
fn test_link_failure_terminates() {
    let (channel, harness) = mock::pair();
    let mut control = SimFeAdapter::with_data_size(5, Box::new(channel), 3);
    control.set_size(disp_trial(), disp_force_daq()).unwrap();
    control.setup().unwrap();
    drop(harness);

    let err = control
        .set_trial_response(&TrialResponse::new().disp(&[1.0, 2.0]))
        .unwrap_err();
    assert!(err.is_transport());
    assert!(matches!(
        err,
        ControlError::Transport {
            source: TransportError::Closed,
            ..
        }
    ));
    assert_eq!(control.state(), ControllerState::Terminated);

    let mut force = [0.0; 2];
    assert!(matches!(
        control.get_daq_response(&mut DaqResponse::new().force(&mut force)),
        Err(ControlError::InvalidState { .. })
    ));
}

#[test]
fn test_size_mismatch_is_reported() {
    let (channel, _harness) = mock::pair();
    let mut control = SimFeAdapter::with_data_size(6, Box::new(channel), 3);
    control.set_size(disp_trial(), disp_force_daq()).unwrap();
    control.setup().unwrap();
    let err = control
        .set_trial_response(&TrialResponse::new().disp(&[1.0]))
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
fn test_elastic_peer_session() {
    let (channel, peer) = ElasticPeer::spawn(4.0).unwrap();
    let mut control = SimFeAdapter::with_data_size(7, Box::new(channel), 8);
    let trial = SizeSpec::new().with(ResponseKind::Displacement, 2);
    let daq = trial.with(ResponseKind::Force, 2);
    control.set_size(trial, daq).unwrap();
    control.setup().unwrap();

    for step in 1..=3 {
        let u = [0.1 * f64::from(step), -0.2];
        control
            .set_trial_response(&TrialResponse::new().disp(&u))
            .unwrap();
        let mut disp = [0.0; 2];
        let mut force = [0.0; 2];
        control
            .get_daq_response(&mut DaqResponse::new().disp(&mut disp).force(&mut force))
            .unwrap();
        assert_eq!(disp, u);
        assert_eq!(force, [4.0 * u[0], 4.0 * u[1]]);
    }

    drop(control);
    let summary = peer.join().unwrap();
    assert!(summary.terminated);
    assert_eq!(summary.trials, 3);
    assert_eq!(summary.requests, 3);
}

#[test]
fn test_tcp_peer() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut header = [0u8; 11 * 4];
        stream.read_exact(&mut header).unwrap();
        let mut trial = [0u8; 3 * 8];
        stream.read_exact(&mut trial).unwrap();
        let mut request = [0u8; 3 * 8];
        stream.read_exact(&mut request).unwrap();
        let reply: Vec<u8> = [0.0f64, 5.0, 6.0]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        stream.write_all(&reply).unwrap();
        let mut die = [0u8; 3 * 8];
        stream.read_exact(&mut die).unwrap();
        (header, trial, die)
    });

    let channel = TcpChannel::connect("127.0.0.1", port).unwrap();
    assert!(channel.peer().contains(&port.to_string()));
    let mut control = SimFeAdapter::with_data_size(8, Box::new(channel), 3);
    control.set_size(disp_trial(), disp_force_daq()).unwrap();
    control.setup().unwrap();
    control
        .set_trial_response(&TrialResponse::new().disp(&[1.0, 2.0]))
        .unwrap();
    let mut force = [0.0; 2];
    control
        .get_daq_response(&mut DaqResponse::new().force(&mut force))
        .unwrap();
    assert_eq!(force, [5.0, 6.0]);
    drop(control);

    let (header, trial, die) = server.join().unwrap();
    assert_eq!(i32::from_le_bytes(header[40..44].try_into().unwrap()), 3);
    assert_eq!(f64::from_le_bytes(trial[0..8].try_into().unwrap()), 3.0);
    assert_eq!(f64::from_le_bytes(trial[16..24].try_into().unwrap()), 2.0);
    assert_eq!(f64::from_le_bytes(die[0..8].try_into().unwrap()), 99.0);
}
