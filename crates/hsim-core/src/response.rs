//! Response kinds and the per-kind containers used to exchange them.
//!
//! Every value crossing the control boundary belongs to one of five
//! [`ResponseKind`]s. [`KindMap`] stores one value per kind and is the backing
//! type for sizing, filter tables and the optional argument sets passed to
//! [`ExperimentalControl`](crate::control::ExperimentalControl).

use serde::Deserialize;
use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

/// Category of a response vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResponseKind {
    /// Displacement.
    Displacement,
    /// Velocity.
    Velocity,
    /// Acceleration.
    Acceleration,
    /// Force.
    Force,
    /// Time.
    Time,
}

impl ResponseKind {
    /// Number of response kinds.
    pub const COUNT: usize = 5;

    /// All kinds in wire/header order.
    pub const ALL: [ResponseKind; Self::COUNT] = [
        ResponseKind::Displacement,
        ResponseKind::Velocity,
        ResponseKind::Acceleration,
        ResponseKind::Force,
        ResponseKind::Time,
    ];

    /// Position of this kind in [`ResponseKind::ALL`].
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            ResponseKind::Displacement => 0,
            ResponseKind::Velocity => 1,
            ResponseKind::Acceleration => 2,
            ResponseKind::Force => 3,
            ResponseKind::Time => 4,
        }
    }

    /// Short label used in logs and configuration keys.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            ResponseKind::Displacement => "disp",
            ResponseKind::Velocity => "vel",
            ResponseKind::Acceleration => "accel",
            ResponseKind::Force => "force",
            ResponseKind::Time => "time",
        }
    }
}

impl fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One value per [`ResponseKind`].
///
/// Deserializes from a table keyed by kind label (`disp`, `vel`, `accel`,
/// `force`, `time`); missing keys take `T::default()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(
    from = "KindFields<T>",
    bound(deserialize = "T: Deserialize<'de> + Default")
)]
pub struct KindMap<T>([T; ResponseKind::COUNT]);

impl<T> KindMap<T> {
    /// Build a map from values in [`ResponseKind::ALL`] order.
    pub fn from_array(values: [T; ResponseKind::COUNT]) -> Self {
        Self(values)
    }

    /// Iterate `(kind, value)` pairs in header order.
    pub fn iter(&self) -> impl Iterator<Item = (ResponseKind, &T)> {
        ResponseKind::ALL.into_iter().zip(self.0.iter())
    }

    /// Apply `f` to every entry.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> KindMap<U> {
        KindMap(self.0.map(f))
    }
}

impl<T> Index<ResponseKind> for KindMap<T> {
    type Output = T;

    fn index(&self, kind: ResponseKind) -> &T {
        &self.0[kind.index()]
    }
}

impl<T> IndexMut<ResponseKind> for KindMap<T> {
    fn index_mut(&mut self, kind: ResponseKind) -> &mut T {
        &mut self.0[kind.index()]
    }
}

#[derive(Deserialize, Default)]
#[serde(
    default,
    deny_unknown_fields,
    bound(deserialize = "T: Deserialize<'de> + Default")
)]
struct KindFields<T> {
    disp: T,
    vel: T,
    accel: T,
    force: T,
    time: T,
}

impl<T> From<KindFields<T>> for KindMap<T> {
    fn from(fields: KindFields<T>) -> Self {
        KindMap([
            fields.disp,
            fields.vel,
            fields.accel,
            fields.force,
            fields.time,
        ])
    }
}

/// Optional trial (command) vectors passed into a controller.
///
/// Absent kinds are left untouched by the controller.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrialResponse<'a> {
    values: KindMap<Option<&'a [f64]>>,
}

impl<'a> TrialResponse<'a> {
    /// Empty argument set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Supply the vector for `kind`.
    #[must_use]
    pub fn with(mut self, kind: ResponseKind, values: &'a [f64]) -> Self {
        self.values[kind] = Some(values);
        self
    }

    /// Supply trial displacements.
    #[must_use]
    pub fn disp(self, values: &'a [f64]) -> Self {
        self.with(ResponseKind::Displacement, values)
    }

    /// Supply trial velocities.
    #[must_use]
    pub fn vel(self, values: &'a [f64]) -> Self {
        self.with(ResponseKind::Velocity, values)
    }

    /// Supply trial accelerations.
    #[must_use]
    pub fn accel(self, values: &'a [f64]) -> Self {
        self.with(ResponseKind::Acceleration, values)
    }

    /// Supply trial forces.
    #[must_use]
    pub fn force(self, values: &'a [f64]) -> Self {
        self.with(ResponseKind::Force, values)
    }

    /// Supply trial time.
    #[must_use]
    pub fn time(self, values: &'a [f64]) -> Self {
        self.with(ResponseKind::Time, values)
    }

    /// Vector supplied for `kind`, if any.
    #[must_use]
    pub fn get(&self, kind: ResponseKind) -> Option<&'a [f64]> {
        self.values[kind]
    }

    /// Iterate the supplied kinds.
    pub fn supplied(&self) -> impl Iterator<Item = (ResponseKind, &'a [f64])> + '_ {
        self.values
            .iter()
            .filter_map(|(kind, values)| values.map(|v| (kind, v)))
    }
}

/// Optional output buffers a controller fills with measured data.
#[derive(Debug, Default)]
pub struct DaqResponse<'a> {
    values: KindMap<Option<&'a mut [f64]>>,
}

impl<'a> DaqResponse<'a> {
    /// Empty argument set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request measured values of `kind` into `out`.
    #[must_use]
    pub fn with(mut self, kind: ResponseKind, out: &'a mut [f64]) -> Self {
        self.values[kind] = Some(out);
        self
    }

    /// Request measured displacements.
    #[must_use]
    pub fn disp(self, out: &'a mut [f64]) -> Self {
        self.with(ResponseKind::Displacement, out)
    }

    /// Request measured velocities.
    #[must_use]
    pub fn vel(self, out: &'a mut [f64]) -> Self {
        self.with(ResponseKind::Velocity, out)
    }

    /// Request measured accelerations.
    #[must_use]
    pub fn accel(self, out: &'a mut [f64]) -> Self {
        self.with(ResponseKind::Acceleration, out)
    }

    /// Request measured forces.
    #[must_use]
    pub fn force(self, out: &'a mut [f64]) -> Self {
        self.with(ResponseKind::Force, out)
    }

    /// Request measured time.
    #[must_use]
    pub fn time(self, out: &'a mut [f64]) -> Self {
        self.with(ResponseKind::Time, out)
    }

    /// Whether the caller asked for `kind`.
    #[must_use]
    pub fn is_requested(&self, kind: ResponseKind) -> bool {
        self.values[kind].is_some()
    }

    /// Output buffer for `kind`, if requested.
    pub fn get_mut(&mut self, kind: ResponseKind) -> Option<&mut [f64]> {
        self.values[kind].as_deref_mut()
    }
}

/// Named response a controller can report for recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseQuery {
    /// Last commanded vector of a kind.
    Target(ResponseKind),
    /// Last measured vector of a kind.
    Measured(ResponseKind),
}

impl ResponseQuery {
    /// Prefix used for per-channel column labels.
    #[must_use]
    pub fn prefix(&self) -> &'static str {
        match self {
            ResponseQuery::Target(ResponseKind::Displacement) => "targDisp",
            ResponseQuery::Target(ResponseKind::Velocity) => "targVel",
            ResponseQuery::Target(ResponseKind::Acceleration) => "targAccel",
            ResponseQuery::Target(ResponseKind::Force) => "targForce",
            ResponseQuery::Target(ResponseKind::Time) => "targTime",
            ResponseQuery::Measured(ResponseKind::Displacement) => "measDisp",
            ResponseQuery::Measured(ResponseKind::Velocity) => "measVel",
            ResponseQuery::Measured(ResponseKind::Acceleration) => "measAccel",
            ResponseQuery::Measured(ResponseKind::Force) => "measForce",
            ResponseQuery::Measured(ResponseKind::Time) => "measTime",
        }
    }

    /// Column labels for `channels` values, numbered from 1.
    #[must_use]
    pub fn channel_labels(&self, channels: usize) -> Vec<String> {
        (1..=channels)
            .map(|i| format!("{}{}", self.prefix(), i))
            .collect()
    }
}

impl fmt::Display for ResponseQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Unknown response name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown response '{0}'")]
pub struct ParseResponseQueryError(pub String);

impl FromStr for ResponseQuery {
    type Err = ParseResponseQueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use ResponseKind::*;
        let query = match s {
            "targDisp" | "targetDisp" | "targetDisplacement" | "targetDisplacements" => {
                ResponseQuery::Target(Displacement)
            }
            "targVel" | "targetVel" | "targetVelocity" | "targetVelocities" => {
                ResponseQuery::Target(Velocity)
            }
            "targAccel" | "targetAccel" | "targetAcceleration" | "targetAccelerations" => {
                ResponseQuery::Target(Acceleration)
            }
            "targForce" | "targetForce" | "targetForces" => ResponseQuery::Target(Force),
            "measDisp" | "measuredDisp" | "measuredDisplacement" | "measuredDisplacements" => {
                ResponseQuery::Measured(Displacement)
            }
            "measVel" | "measuredVel" | "measuredVelocity" | "measuredVelocities" => {
                ResponseQuery::Measured(Velocity)
            }
            "measAccel" | "measuredAccel" | "measuredAcceleration" | "measuredAccelerations" => {
                ResponseQuery::Measured(Acceleration)
            }
            "measForce" | "measuredForce" | "measuredForces" => ResponseQuery::Measured(Force),
            other => return Err(ParseResponseQueryError(other.to_string())),
        };
        Ok(query)
    }
}
