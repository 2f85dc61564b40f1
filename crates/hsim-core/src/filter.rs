//! Scalar signal filters applied per channel.
//!
//! Filters are pure functions of one value. Controllers hold two
//! [`FilterTable`]s: one for outgoing (control) values, applied before they
//! are written into the target vector, and one for incoming (daq) values,
//! applied after acquisition.

use crate::response::{KindMap, ResponseKind};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;

/// A deterministic scalar transform.
pub trait SignalFilter: fmt::Debug + fmt::Display + Send + Sync {
    /// Filter a single value.
    fn filter(&self, value: f64) -> f64;
}

/// Shared filter handle. Filters are referenced, never owned, by controllers.
pub type SharedFilter = Arc<dyn SignalFilter>;

/// Optional filter per response kind.
pub type FilterTable = KindMap<Option<SharedFilter>>;

/// Apply the filter registered for `kind` to `values` in place, in array order.
pub fn apply(table: &FilterTable, kind: ResponseKind, values: &mut [f64]) {
    if let Some(filter) = &table[kind] {
        for value in values.iter_mut() {
            *value = filter.filter(*value);
        }
    }
}

/// Passes values through unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Identity;

impl SignalFilter for Identity {
    fn filter(&self, value: f64) -> f64 {
        value
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("identity")
    }
}

/// `gain * value + offset`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Linear {
    /// Multiplicative gain.
    pub gain: f64,
    /// Additive offset applied after the gain.
    pub offset: f64,
}

impl SignalFilter for Linear {
    fn filter(&self, value: f64) -> f64 {
        self.gain * value + self.offset
    }
}

impl fmt::Display for Linear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "linear (gain = {}, offset = {})", self.gain, self.offset)
    }
}

/// Clamps values into `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Saturation {
    /// Lower bound.
    pub min: f64,
    /// Upper bound.
    pub max: f64,
}

impl SignalFilter for Saturation {
    fn filter(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

impl fmt::Display for Saturation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "saturation [{}, {}]", self.min, self.max)
    }
}

/// Filter definition as it appears in configuration files.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterSpec {
    /// See [`Identity`].
    Identity,
    /// See [`Linear`].
    Linear {
        /// Multiplicative gain.
        #[serde(default = "default_gain")]
        gain: f64,
        /// Additive offset.
        #[serde(default)]
        offset: f64,
    },
    /// See [`Saturation`].
    Saturation {
        /// Lower bound.
        min: f64,
        /// Upper bound.
        max: f64,
    },
}

fn default_gain() -> f64 {
    1.0
}

impl FilterSpec {
    /// Check parameters that deserialization cannot.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            FilterSpec::Identity => Ok(()),
            FilterSpec::Linear { gain, offset } => {
                if gain.is_finite() && offset.is_finite() {
                    Ok(())
                } else {
                    Err("linear filter gain and offset must be finite".to_string())
                }
            }
            FilterSpec::Saturation { min, max } => {
                if min.is_nan() || max.is_nan() || min > max {
                    Err(format!("saturation bounds [{min}, {max}] are not ordered"))
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Instantiate the filter.
    pub fn build(&self) -> Result<SharedFilter, String> {
        self.validate()?;
        let filter: SharedFilter = match *self {
            FilterSpec::Identity => Arc::new(Identity),
            FilterSpec::Linear { gain, offset } => Arc::new(Linear { gain, offset }),
            FilterSpec::Saturation { min, max } => Arc::new(Saturation { min, max }),
        };
        Ok(filter)
    }
}

/// Render a filter table for `Display` output.
pub(crate) fn describe_table(f: &mut fmt::Formatter<'_>, label: &str, table: &FilterTable) -> fmt::Result {
    for (kind, filter) in table.iter() {
        if let Some(filter) = filter {
            writeln!(f, "  {label} filter {kind}: {filter}")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_bit_exact() {
        let mut table = FilterTable::default();
        table[ResponseKind::Force] = Some(Arc::new(Identity));
        let original = [0.1 + 0.2, -0.0, f64::MIN_POSITIVE, 1e308];
        let mut values = original;
        apply(&table, ResponseKind::Force, &mut values);
        for (a, b) in original.iter().zip(values.iter()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn apply_only_touches_the_given_kind() {
        let mut table = FilterTable::default();
        table[ResponseKind::Displacement] = Some(Arc::new(Linear { gain: 2.0, offset: 1.0 }));
        let mut disp = [1.0, 2.0];
        let mut force = [1.0, 2.0];
        apply(&table, ResponseKind::Displacement, &mut disp);
        apply(&table, ResponseKind::Force, &mut force);
        assert_eq!(disp, [3.0, 5.0]);
        assert_eq!(force, [1.0, 2.0]);
    }

    #[test]
    fn saturation_clamps() {
        let sat = Saturation { min: -1.0, max: 1.0 };
        assert_eq!(sat.filter(3.0), 1.0);
        assert_eq!(sat.filter(-3.0), -1.0);
        assert_eq!(sat.filter(0.5), 0.5);
    }

    #[test]
    fn filter_spec_parses_tagged_tables() {
        let spec: FilterSpec = toml::from_str("type = \"linear\"\ngain = 0.5").unwrap();
        assert_eq!(spec, FilterSpec::Linear { gain: 0.5, offset: 0.0 });
        let filter = spec.build().unwrap();
        assert_eq!(filter.filter(4.0), 2.0);
    }

    #[test]
    fn filter_spec_rejects_inverted_bounds() {
        let spec = FilterSpec::Saturation { min: 2.0, max: 1.0 };
        assert!(spec.build().is_err());
    }
}
