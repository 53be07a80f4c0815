//! Resampling kernel selection.

use serde::{Deserialize, Serialize};

/// Interpolation kernel used by a [`Resampler`](crate::Resampler).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResamplerType {
    /// No resampling: the input is copied through where it overlaps.
    None,
    /// Nearest neighbor (preserves exact values, including nulls).
    NearestNeighbor,
    /// Bilinear interpolation over a 2x2 neighborhood.
    #[default]
    Bilinear,
    /// Parametric cubic convolution over a 4x4 neighborhood.
    Bicubic,
}

impl ResamplerType {
    /// Parse from string (case-insensitive). Unknown names fall back to
    /// bilinear.
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "none" => Self::None,
            "nearest" | "nearest_neighbor" | "nearest-neighbor" => Self::NearestNeighbor,
            "cubic" | "bicubic" => Self::Bicubic,
            _ => Self::Bilinear,
        }
    }

    /// Number of source pixels the kernel spans per axis.
    pub fn kernel_width(&self) -> usize {
        match self {
            Self::None | Self::NearestNeighbor => 1,
            Self::Bilinear => 2,
            Self::Bicubic => 4,
        }
    }

    /// Whether the kernel convolves through a weight table.
    pub fn uses_weight_table(&self) -> bool {
        matches!(self, Self::Bilinear | Self::Bicubic)
    }
}

impl std::fmt::Display for ResamplerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::NearestNeighbor => write!(f, "nearest_neighbor"),
            Self::Bilinear => write!(f, "bilinear"),
            Self::Bicubic => write!(f, "bicubic"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str() {
        assert_eq!(ResamplerType::from_str("NEAREST"), ResamplerType::NearestNeighbor);
        assert_eq!(ResamplerType::from_str("bicubic"), ResamplerType::Bicubic);
        assert_eq!(ResamplerType::from_str("cubic"), ResamplerType::Bicubic);
        assert_eq!(ResamplerType::from_str("none"), ResamplerType::None);
        assert_eq!(ResamplerType::from_str("lanczos"), ResamplerType::Bilinear);
    }

    #[test]
    fn test_display_roundtrips() {
        for t in [
            ResamplerType::None,
            ResamplerType::NearestNeighbor,
            ResamplerType::Bilinear,
            ResamplerType::Bicubic,
        ] {
            assert_eq!(ResamplerType::from_str(&t.to_string()), t);
        }
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&ResamplerType::NearestNeighbor).unwrap();
        assert_eq!(json, "\"nearest_neighbor\"");
        let back: ResamplerType = serde_json::from_str("\"bicubic\"").unwrap();
        assert_eq!(back, ResamplerType::Bicubic);
    }
}
