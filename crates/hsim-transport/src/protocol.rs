//! Wire contract between a simulation adapter controller and its remote
//! adapter element.
//!
//! After connecting, the controller sends one identification header of
//! [`HEADER_LEN`] integers:
//!
//! ```text
//! [trial disp, vel, accel, force, time, daq disp, vel, accel, force, time, data_size]
//! ```
//!
//! Every later message is a vector of `data_size` doubles whose slot 0 holds
//! an [`Opcode`]. Trial values follow the opcode slot as
//! `[trial disp..., trial force...]`; replies carry
//! `[measured disp..., measured force...]` from slot 0.

use hsim_core::{ResponseKind, SizeSpec};

/// Default vector message length in doubles.
pub const DEFAULT_DATA_SIZE: usize = 256;

/// Length of the identification header.
pub const HEADER_LEN: usize = 2 * ResponseKind::COUNT + 1;

/// Operation codes carried in slot 0 of every outgoing vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Opcode {
    /// Open a session.
    Open = 1,
    /// Remote setup.
    Setup = 2,
    /// Deliver trial values.
    SetTrialResponse = 3,
    /// Execute the step.
    Execute = 4,
    /// Commit the step.
    CommitState = 5,
    /// Request all measured values.
    GetDaqResponse = 6,
    /// Request measured displacements.
    GetDisp = 7,
    /// Request measured velocities.
    GetVel = 8,
    /// Request measured accelerations.
    GetAccel = 9,
    /// Request measured forces (the adapter element replies with its full
    /// measured buffer).
    GetForce = 10,
    /// Request measured time.
    GetTime = 11,
    /// Terminate the session.
    Die = 99,
}

impl Opcode {
    /// Value placed in slot 0.
    #[must_use]
    pub fn as_f64(self) -> f64 {
        f64::from(self as i32)
    }

    /// Decode slot 0 of a received vector.
    #[must_use]
    pub fn from_f64(value: f64) -> Option<Self> {
        let code = value as i32;
        if f64::from(code) != value {
            return None;
        }
        let op = match code {
            1 => Opcode::Open,
            2 => Opcode::Setup,
            3 => Opcode::SetTrialResponse,
            4 => Opcode::Execute,
            5 => Opcode::CommitState,
            6 => Opcode::GetDaqResponse,
            7 => Opcode::GetDisp,
            8 => Opcode::GetVel,
            9 => Opcode::GetAccel,
            10 => Opcode::GetForce,
            11 => Opcode::GetTime,
            99 => Opcode::Die,
            _ => return None,
        };
        Some(op)
    }
}

/// Build the identification header.
#[must_use]
pub fn header(trial: &SizeSpec, daq: &SizeSpec, data_size: usize) -> [i32; HEADER_LEN] {
    let mut ids = [0i32; HEADER_LEN];
    for (i, n) in trial.counts().into_iter().enumerate() {
        ids[i] = clamp_i32(n);
    }
    for (i, n) in daq.counts().into_iter().enumerate() {
        ids[ResponseKind::COUNT + i] = clamp_i32(n);
    }
    ids[2 * ResponseKind::COUNT] = clamp_i32(data_size);
    ids
}

/// Split a received header back into `(trial, daq, data_size)`.
#[must_use]
pub fn parse_header(ids: &[i32; HEADER_LEN]) -> (SizeSpec, SizeSpec, usize) {
    let mut trial = SizeSpec::new();
    let mut daq = SizeSpec::new();
    for (i, kind) in ResponseKind::ALL.into_iter().enumerate() {
        trial = trial.with(kind, usize::try_from(ids[i]).unwrap_or(0));
        daq = daq.with(kind, usize::try_from(ids[ResponseKind::COUNT + i]).unwrap_or(0));
    }
    let data_size = usize::try_from(ids[2 * ResponseKind::COUNT]).unwrap_or(0);
    (trial, daq, data_size)
}

fn clamp_i32(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

/// Doubles needed on the send side: opcode slot plus trial disp and force.
#[must_use]
pub fn send_len(trial: &SizeSpec) -> usize {
    1 + trial.get(ResponseKind::Displacement) + trial.get(ResponseKind::Force)
}

/// Doubles needed on the receive side: measured disp and force.
#[must_use]
pub fn recv_len(daq: &SizeSpec) -> usize {
    daq.get(ResponseKind::Displacement) + daq.get(ResponseKind::Force)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcodes_round_trip_through_slot_zero() {
        for op in [Opcode::SetTrialResponse, Opcode::GetForce, Opcode::Die] {
            assert_eq!(Opcode::from_f64(op.as_f64()), Some(op));
        }
        assert_eq!(Opcode::from_f64(3.5), None);
        assert_eq!(Opcode::from_f64(42.0), None);
    }

    #[test]
    fn header_layout() {
        let trial = SizeSpec::new().with(ResponseKind::Displacement, 2);
        let daq = SizeSpec::new()
            .with(ResponseKind::Displacement, 1)
            .with(ResponseKind::Force, 2);
        let ids = header(&trial, &daq, 256);
        assert_eq!(ids, [2, 0, 0, 0, 0, 1, 0, 0, 2, 0, 256]);
        assert_eq!(parse_header(&ids), (trial, daq, 256));
    }

    #[test]
    fn buffer_lengths() {
        let trial = SizeSpec::new()
            .with(ResponseKind::Displacement, 2)
            .with(ResponseKind::Velocity, 2);
        let daq = SizeSpec::new()
            .with(ResponseKind::Displacement, 1)
            .with(ResponseKind::Force, 2);
        assert_eq!(send_len(&trial), 3);
        assert_eq!(recv_len(&daq), 3);
    }
}
