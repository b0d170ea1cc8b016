use super::config;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpotBucket {
    Center,
    Edge,
    BreakUp,
    BreakDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GammaBucket {
    GammaUp,
    GammaNeutral,
    GammaDown,
}

/// Spot position against the DNZ combined with the gamma balance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Regime {
    pub spot: SpotBucket,
    pub gamma: GammaBucket,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLabel(pub String);

impl fmt::Display for UnknownLabel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "unknown label '{}'", self.0)
    }
}

impl std::error::Error for UnknownLabel {}

impl SpotBucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpotBucket::Center => "center",
            SpotBucket::Edge => "edge",
            SpotBucket::BreakUp => "break_up",
            SpotBucket::BreakDown => "break_down",
        }
    }
}

impl GammaBucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            GammaBucket::GammaUp => "gamma_up",
            GammaBucket::GammaNeutral => "gamma_neutral",
            GammaBucket::GammaDown => "gamma_down",
        }
    }
}

impl fmt::Display for SpotBucket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for GammaBucket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} | {}", self.spot, self.gamma)
    }
}

impl Serialize for Regime {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Regime {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl FromStr for SpotBucket {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "center" => Ok(SpotBucket::Center),
            "edge" => Ok(SpotBucket::Edge),
            "break_up" => Ok(SpotBucket::BreakUp),
            "break_down" => Ok(SpotBucket::BreakDown),
            other => Err(UnknownLabel(other.to_string())),
        }
    }
}

impl FromStr for GammaBucket {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "gamma_up" => Ok(GammaBucket::GammaUp),
            "gamma_neutral" => Ok(GammaBucket::GammaNeutral),
            "gamma_down" => Ok(GammaBucket::GammaDown),
            other => Err(UnknownLabel(other.to_string())),
        }
    }
}

impl FromStr for Regime {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (spot, gamma) = s.split_once(" | ").ok_or_else(|| UnknownLabel(s.to_string()))?;
        Ok(Regime { spot: spot.parse()?, gamma: gamma.parse()? })
    }
}

/// (spot - dnz_mid) / dnz_width, 0 for a collapsed band
pub fn spot_position(spot: f64, dnz_mid: f64, dnz_width: f64) -> f64 {
    if dnz_width == 0.0 {
        return 0.0;
    }
    let x = (spot - dnz_mid) / dnz_width;
    if x.is_finite() { x } else { 0.0 }
}

pub fn spot_bucket(x: f64) -> SpotBucket {
    if x.abs() < config::SPOT_CENTER_BAND {
        SpotBucket::Center
    } else if x > config::SPOT_BREAK_LEVEL {
        SpotBucket::BreakUp
    } else if x < -config::SPOT_BREAK_LEVEL {
        SpotBucket::BreakDown
    } else {
        SpotBucket::Edge
    }
}

pub fn gamma_bucket(ratio: f64) -> GammaBucket {
    if ratio > config::GAMMA_UP_RATIO {
        GammaBucket::GammaUp
    } else if ratio < config::GAMMA_DOWN_RATIO {
        GammaBucket::GammaDown
    } else {
        GammaBucket::GammaNeutral
    }
}

pub fn classify_regime(spot_position: f64, gamma_ratio: f64) -> Regime {
    Regime { spot: spot_bucket(spot_position), gamma: gamma_bucket(gamma_ratio) }
}

// -----------------------------------------------
// STRUCTURE TAGS
// -----------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DnzPosition {
    BreakAboveDnz,
    BreakBelowDnz,
    InsideDnz,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GammaAsymmetry {
    GammaBalanced,
    GammaAsymUp,
    GammaAsymDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EgpLevel {
    HighEgp,
    LowEgp,
}

impl fmt::Display for EgpLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EgpLevel::HighEgp => write!(f, "high_egp"),
            EgpLevel::LowEgp => write!(f, "low_egp"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureTags {
    pub dnz: DnzPosition,
    pub asymmetry: GammaAsymmetry,
    pub egp: EgpLevel,
}

impl fmt::Display for StructureTags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let dnz = match self.dnz {
            DnzPosition::BreakAboveDnz => "break_above_dnz",
            DnzPosition::BreakBelowDnz => "break_below_dnz",
            DnzPosition::InsideDnz => "inside_dnz",
        };
        let asym = match self.asymmetry {
            GammaAsymmetry::GammaBalanced => "gamma_balanced",
            GammaAsymmetry::GammaAsymUp => "gamma_asym_up",
            GammaAsymmetry::GammaAsymDown => "gamma_asym_down",
        };
        write!(f, "{} | {} | {}", dnz, asym, self.egp)
    }
}

pub fn structure_tags(
    spot: f64,
    dnz_low: f64,
    dnz_high: f64,
    gamma_above: f64,
    gamma_below: f64,
    effective_gamma_pressure: f64,
) -> StructureTags {
    let dnz = if spot > dnz_high {
        DnzPosition::BreakAboveDnz
    } else if spot < dnz_low {
        DnzPosition::BreakBelowDnz
    } else {
        DnzPosition::InsideDnz
    };

    let asymmetry = if (gamma_above - gamma_below).abs() < config::GAMMA_BALANCE_TOLERANCE {
        GammaAsymmetry::GammaBalanced
    } else if gamma_above > gamma_below {
        GammaAsymmetry::GammaAsymUp
    } else {
        GammaAsymmetry::GammaAsymDown
    };

    let egp = if effective_gamma_pressure > config::HIGH_EGP_LEVEL {
        EgpLevel::HighEgp
    } else {
        EgpLevel::LowEgp
    };

    StructureTags { dnz, asymmetry, egp }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spot_buckets() {
        assert_eq!(spot_bucket(0.0), SpotBucket::Center);
        assert_eq!(spot_bucket(-0.29), SpotBucket::Center);
        assert_eq!(spot_bucket(0.3), SpotBucket::Edge);
        assert_eq!(spot_bucket(1.0), SpotBucket::Edge);
        assert_eq!(spot_bucket(-1.0), SpotBucket::Edge);
        assert_eq!(spot_bucket(1.01), SpotBucket::BreakUp);
        assert_eq!(spot_bucket(-1.5), SpotBucket::BreakDown);
    }

    #[test]
    fn test_gamma_buckets() {
        assert_eq!(gamma_bucket(0.61), GammaBucket::GammaUp);
        assert_eq!(gamma_bucket(0.6), GammaBucket::GammaNeutral);
        assert_eq!(gamma_bucket(0.5), GammaBucket::GammaNeutral);
        assert_eq!(gamma_bucket(0.4), GammaBucket::GammaNeutral);
        assert_eq!(gamma_bucket(0.39), GammaBucket::GammaDown);
        assert_eq!(gamma_bucket(0.0), GammaBucket::GammaDown);
    }

    #[test]
    fn test_regime_string_is_stable() {
        let regime = classify_regime(1.2, 0.5);
        assert_eq!(regime.to_string(), "break_up | gamma_neutral");
        assert_eq!(format!("{} | {}", regime.spot, regime.gamma), regime.to_string());
        assert_eq!("break_up | gamma_neutral".parse::<Regime>().unwrap(), regime);
        assert!("center|gamma_up".parse::<Regime>().is_err());
    }

    #[test]
    fn test_spot_position() {
        assert_eq!(spot_position(101.0, 100.0, 0.0), 0.0);
        assert!((spot_position(101.0, 100.0, 1.0) - 1.0).abs() < 1e-12);
        assert!((spot_position(99.5, 100.0, 1.0) + 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_structure_tags() {
        let tags = structure_tags(101.0, 99.5, 100.5, 10.0, 10.0, 0.5);
        assert_eq!(tags.to_string(), "break_above_dnz | gamma_balanced | high_egp");

        let tags = structure_tags(100.0, 99.5, 100.5, 5.0, 8.0, 0.0);
        assert_eq!(tags.to_string(), "inside_dnz | gamma_asym_down | low_egp");

        let tags = structure_tags(99.0, 99.5, 100.5, 9.0, 8.0, 1e-5);
        assert_eq!(tags.dnz, DnzPosition::BreakBelowDnz);
        assert_eq!(tags.asymmetry, GammaAsymmetry::GammaAsymUp);
        assert_eq!(tags.egp, EgpLevel::LowEgp);
    }
}
