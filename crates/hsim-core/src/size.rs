//! Channel counts per response kind.

use crate::response::{KindMap, ResponseKind};
use serde::Deserialize;
use std::fmt;

/// Number of channels for each [`ResponseKind`].
///
/// A count of zero means the kind is not exchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(transparent)]
pub struct SizeSpec(KindMap<usize>);

impl SizeSpec {
    /// All counts zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of `self` with `kind` set to `count`.
    #[must_use]
    pub fn with(mut self, kind: ResponseKind, count: usize) -> Self {
        self.0[kind] = count;
        self
    }

    /// Channel count for `kind`.
    #[must_use]
    pub fn get(&self, kind: ResponseKind) -> usize {
        self.0[kind]
    }

    /// Whether `kind` has at least one channel.
    #[must_use]
    pub fn has(&self, kind: ResponseKind) -> bool {
        self.0[kind] > 0
    }

    /// Sum of all counts.
    #[must_use]
    pub fn total(&self) -> usize {
        self.0.iter().map(|(_, n)| *n).sum()
    }

    /// Kinds with a non-zero count.
    pub fn active(&self) -> impl Iterator<Item = (ResponseKind, usize)> + '_ {
        self.0
            .iter()
            .filter(|(_, n)| **n > 0)
            .map(|(kind, n)| (kind, *n))
    }

    /// Counts in header order, as sent in a session identification header.
    #[must_use]
    pub fn counts(&self) -> [usize; ResponseKind::COUNT] {
        ResponseKind::ALL.map(|kind| self.0[kind])
    }
}

impl From<KindMap<usize>> for SizeSpec {
    fn from(map: KindMap<usize>) -> Self {
        Self(map)
    }
}

impl fmt::Display for SizeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (kind, n) in self.active() {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{kind}: {n}")?;
            first = false;
        }
        if first {
            f.write_str("none")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_individual_counts() {
        let size = SizeSpec::new()
            .with(ResponseKind::Displacement, 2)
            .with(ResponseKind::Force, 1);
        assert_eq!(size.get(ResponseKind::Displacement), 2);
        assert!(!size.has(ResponseKind::Velocity));
        assert_eq!(size.total(), 3);
        assert_eq!(size.counts(), [2, 0, 0, 1, 0]);
    }

    #[test]
    fn display_lists_active_kinds() {
        let size = SizeSpec::new().with(ResponseKind::Force, 3);
        assert_eq!(size.to_string(), "force: 3");
        assert_eq!(SizeSpec::new().to_string(), "none");
    }

    #[test]
    fn deserializes_from_kind_table() {
        let size: SizeSpec = toml::from_str("disp = 1\nforce = 2").unwrap();
        assert_eq!(size, SizeSpec::new().with(ResponseKind::Displacement, 1).with(ResponseKind::Force, 2));
    }
}
