//! Value domains for angular quantities.

use serde::{Deserialize, Serialize};

/// How interpolated values are folded back into range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainType {
    /// No folding.
    #[default]
    Continuous,
    /// Reflect into `[-90, 90]`, for latitude-like values.
    #[serde(rename = "sawtooth_90")]
    Sawtooth90,
    /// Wrap into `[-180, 180)`, for longitudes.
    #[serde(rename = "wrap_180")]
    Wrap180,
    /// Wrap into `[0, 360)`, for headings and rotations.
    #[serde(rename = "wrap_360")]
    Wrap360,
}

impl DomainType {
    /// Parse from string (case-insensitive). Unknown names fall back to
    /// continuous.
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "sawtooth_90" | "sawtooth90" => Self::Sawtooth90,
            "wrap_180" | "wrap180" => Self::Wrap180,
            "wrap_360" | "wrap360" => Self::Wrap360,
            _ => Self::Continuous,
        }
    }

    /// Fold `value` into this domain.
    pub fn constrain(&self, value: f64) -> f64 {
        match self {
            Self::Continuous => value,
            Self::Sawtooth90 => {
                let mut t = (value + 90.0).rem_euclid(360.0);
                if t > 180.0 {
                    t = 360.0 - t;
                }
                t - 90.0
            }
            Self::Wrap180 => (value + 180.0).rem_euclid(360.0) - 180.0,
            Self::Wrap360 => value.rem_euclid(360.0),
        }
    }
}

impl std::fmt::Display for DomainType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Continuous => write!(f, "continuous"),
            Self::Sawtooth90 => write!(f, "sawtooth_90"),
            Self::Wrap180 => write!(f, "wrap_180"),
            Self::Wrap360 => write!(f, "wrap_360"),
        }
    }
}
