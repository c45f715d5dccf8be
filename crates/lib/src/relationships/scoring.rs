//! Signal records and the weighted average that turns them into a confidence.

use crate::constants::{
    DEFAULT_NAME_PATTERN_WEIGHT, DEFAULT_TYPE_COMPATIBILITY_WEIGHT, DEFAULT_VALUE_OVERLAP_WEIGHT,
};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    NamePattern,
    TypeCompatibility,
    ValueOverlap,
}

/// One piece of evidence. `value` is `None` when the signal could not be computed,
/// in which case its weight does not count.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Signal {
    pub kind: SignalKind,
    pub weight: f64,
    pub value: Option<f64>,
}

impl Signal {
    pub fn available(kind: SignalKind, weight: f64, value: f64) -> Self {
        Self {
            kind,
            weight,
            value: Some(value),
        }
    }

    pub fn unavailable(kind: SignalKind, weight: f64) -> Self {
        Self {
            kind,
            weight,
            value: None,
        }
    }
}

/// Weighted mean of the available signals, clamped to `[0, 1]`.
///
/// Returns `None` when no signal is available or every available weight is zero.
pub fn weighted_average(signals: &[Signal]) -> Option<f64> {
    let (sum, total_weight) = signals
        .iter()
        .filter_map(|s| s.value.map(|v| (v.clamp(0.0, 1.0), s.weight.max(0.0))))
        .fold((0.0, 0.0), |(sum, total), (v, w)| (sum + v * w, total + w));

    if total_weight <= 0.0 {
        return None;
    }
    Some((sum / total_weight).clamp(0.0, 1.0))
}

/// Relative weight of each signal kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalWeights {
    pub name: f64,
    #[serde(rename = "type")]
    pub type_compat: f64,
    pub overlap: f64,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME_PATTERN_WEIGHT,
            type_compat: DEFAULT_TYPE_COMPATIBILITY_WEIGHT,
            overlap: DEFAULT_VALUE_OVERLAP_WEIGHT,
        }
    }
}

impl SignalWeights {
    pub fn weight_of(&self, kind: SignalKind) -> f64 {
        match kind {
            SignalKind::NamePattern => self.name,
            SignalKind::TypeCompatibility => self.type_compat,
            SignalKind::ValueOverlap => self.overlap,
        }
    }
}

/// A signal that contributed to a candidate, as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "signal", content = "detail", rename_all = "snake_case")]
pub enum Evidence {
    /// A constraint declared in the warehouse catalog.
    DeclaredForeignKey,
    /// The rule that matched, e.g. `table-id-suffix`.
    NamePattern(String),
    TypeCompatible,
    ValueOverlapSampled,
}

impl fmt::Display for Evidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeclaredForeignKey => f.write_str("declared-foreign-key"),
            Self::NamePattern(rule) => write!(f, "name-pattern:{rule}"),
            Self::TypeCompatible => f.write_str("type-compatible"),
            Self::ValueOverlapSampled => f.write_str("value-overlap-sampled"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_signals_do_not_drag_the_average_down() {
        let signals = [
            Signal::available(SignalKind::NamePattern, 0.6, 0.9),
            Signal::available(SignalKind::TypeCompatibility, 0.1, 1.0),
            Signal::unavailable(SignalKind::ValueOverlap, 0.3),
        ];
        let score = weighted_average(&signals).unwrap();
        assert!((score - 0.64 / 0.7).abs() < 1e-9);
    }

    #[test]
    fn zero_valued_signals_do_count() {
        let signals = [
            Signal::available(SignalKind::NamePattern, 0.6, 0.0),
            Signal::available(SignalKind::TypeCompatibility, 0.1, 1.0),
        ];
        let score = weighted_average(&signals).unwrap();
        assert!((score - 0.1 / 0.7).abs() < 1e-9);
    }

    #[test]
    fn nothing_available_yields_none() {
        assert_eq!(weighted_average(&[]), None);
        assert_eq!(
            weighted_average(&[Signal::unavailable(SignalKind::ValueOverlap, 0.3)]),
            None
        );
        assert_eq!(
            weighted_average(&[Signal::available(SignalKind::NamePattern, 0.0, 1.0)]),
            None
        );
    }

    #[test]
    fn evidence_labels() {
        assert_eq!(
            Evidence::NamePattern("table-id-suffix".into()).to_string(),
            "name-pattern:table-id-suffix"
        );
        assert_eq!(Evidence::TypeCompatible.to_string(), "type-compatible");
        assert_eq!(Evidence::ValueOverlapSampled.to_string(), "value-overlap-sampled");
    }
}
