//! Blocking waits on boolean target signals.
//!
//! The target's handshake flags are polled until the expected value is
//! observed. There is no timeout: a target that never answers blocks the
//! caller, and only a read error ends the wait early.

use hsim_transport::{BusAddress, SignalBus, TransportError};
use serde::Deserialize;
use std::time::Duration;

/// What to do between two polls of a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollPolicy {
    /// Re-read immediately.
    Spin,
    /// Yield the thread between reads.
    #[default]
    Yield,
    /// Sleep between reads.
    Sleep(#[serde(with = "micros")] Duration),
}

impl PollPolicy {
    /// Pause once.
    pub fn pause(&self) {
        match self {
            PollPolicy::Spin => std::hint::spin_loop(),
            PollPolicy::Yield => std::thread::yield_now(),
            PollPolicy::Sleep(interval) => std::thread::sleep(*interval),
        }
    }
}

mod micros {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_micros)
    }
}

/// Block until the flag at `addr` reads as `expected`.
///
/// Signals are 0/1 doubles; anything at or above 0.5 counts as set.
pub fn wait_for_flag(
    bus: &mut dyn SignalBus,
    addr: BusAddress,
    expected: bool,
    policy: PollPolicy,
) -> Result<u64, TransportError> {
    let mut polls = 0u64;
    loop {
        polls += 1;
        let value = bus.signal(addr)?;
        if (value >= 0.5) == expected {
            return Ok(polls);
        }
        policy.pause();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hsim_transport::mock::SimulatedTarget;

    #[test]
    fn returns_once_flag_is_observed() {
        let mut bus = SimulatedTarget::new("hc").with_lag(3);
        bus.start_app().unwrap();
        let new_target = bus.param_index("xPC HC/newTarget", "Value").unwrap();
        let switch = bus.signal_index("xPC HC/switchPC").unwrap();
        bus.set_param(new_target, &[1.0]).unwrap();
        let polls = wait_for_flag(&mut bus, switch, true, PollPolicy::Spin).unwrap();
        assert_eq!(polls, 4);
    }

    #[test]
    fn read_error_ends_the_wait() {
        let mut bus = SimulatedTarget::new("hc");
        let switch = bus.signal_index("xPC HC/switchPC").unwrap();
        bus.fail_after_reads(2);
        let err = wait_for_flag(&mut bus, switch, true, PollPolicy::Yield).unwrap_err();
        assert!(matches!(err, TransportError::Hardware { .. }));
    }

    #[test]
    fn policy_deserializes_from_config() {
        #[derive(Deserialize)]
        struct Cfg {
            poll: PollPolicy,
        }
        let cfg: Cfg = toml::from_str("poll = \"spin\"").unwrap();
        assert_eq!(cfg.poll, PollPolicy::Spin);
        let cfg: Cfg = toml::from_str("poll = { sleep = 250 }").unwrap();
        assert_eq!(cfg.poll, PollPolicy::Sleep(Duration::from_micros(250)));
    }
}
