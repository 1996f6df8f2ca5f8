use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::spec::WindowType;

// ---------------------------------------------------------------------------
// Analysis configuration
// ---------------------------------------------------------------------------

/// The designated chromaticity coordinate columns of one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChromaticityColumns {
    pub u_column: String,
    pub v_column: String,
    /// Label shown instead of `u_column` in defect rankings.
    pub display_label: String,
}

impl ChromaticityColumns {
    pub fn default_for(window: WindowType) -> Self {
        let p = window.prefix();
        ChromaticityColumns {
            u_column: format!("{p}u'"),
            v_column: format!("{p}v'"),
            display_label: format!("{window} Color Point"),
        }
    }
}

/// Tunables for one analysis session. Every field has a default so a
/// partial JSON file is enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Minimum column-match score for a spec to bind to a column.
    pub match_threshold: i32,
    /// Relative tolerance of the approximate-equality check at a limit.
    pub rel_tol: f64,
    /// Absolute tolerance of the approximate-equality check at a limit.
    pub abs_tol: f64,
    pub white_chromaticity: ChromaticityColumns,
    pub mixed_chromaticity: ChromaticityColumns,
    /// Column carrying a verdict written by the test station, if any.
    pub fail_marker_column: Option<String>,
    /// Cell texts (case-insensitive) in the marker column that mean Fail.
    pub fail_marker_values: Vec<String>,
    /// Column used to break yield and defect tables down by group.
    pub group_column: Option<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            match_threshold: 9,
            rel_tol: 1e-9,
            abs_tol: 1e-9,
            white_chromaticity: ChromaticityColumns::default_for(WindowType::White),
            mixed_chromaticity: ChromaticityColumns::default_for(WindowType::Mixed),
            fail_marker_column: Some("Result".to_string()),
            fail_marker_values: vec!["FAIL".to_string(), "NG".to_string()],
            group_column: None,
        }
    }
}

impl AnalysisConfig {
    pub fn chromaticity(&self, window: WindowType) -> &ChromaticityColumns {
        match window {
            WindowType::White => &self.white_chromaticity,
            WindowType::Mixed => &self.mixed_chromaticity,
        }
    }

    /// Whether a marker-column cell text means the station already failed the unit.
    pub fn is_fail_marker(&self, text: &str) -> bool {
        let t = text.trim();
        self.fail_marker_values
            .iter()
            .any(|m| m.eq_ignore_ascii_case(t))
    }

    /// Check the numeric knobs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.match_threshold <= 0 {
            return Err(ConfigError::InvalidThreshold(self.match_threshold));
        }
        for (name, value) in [("rel_tol", self.rel_tol), ("abs_tol", self.abs_tol)] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidTolerance { name, value });
            }
        }
        Ok(())
    }
}

/// `math.isclose`-style comparison: `|a - b| <= max(rel_tol * max(|a|, |b|), abs_tol)`.
pub fn approx_eq(a: f64, b: f64, rel_tol: f64, abs_tol: f64) -> bool {
    if a == b {
        return true;
    }
    if !a.is_finite() || !b.is_finite() {
        return false;
    }
    let diff = (a - b).abs();
    diff <= (rel_tol * a.abs().max(b.abs())).max(abs_tol)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = AnalysisConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.match_threshold, 9);
        assert_eq!(cfg.chromaticity(WindowType::Mixed).u_column, "M_u'");
        assert_eq!(cfg.chromaticity(WindowType::White).display_label, "White Color Point");
    }

    #[test]
    fn partial_json_uses_defaults() {
        let cfg: AnalysisConfig =
            serde_json::from_str(r#"{ "match_threshold": 12, "group_column": "Config" }"#).unwrap();
        assert_eq!(cfg.match_threshold, 12);
        assert_eq!(cfg.group_column.as_deref(), Some("Config"));
        assert_eq!(cfg.rel_tol, 1e-9);
    }

    #[test]
    fn rejects_bad_knobs() {
        let cfg = AnalysisConfig {
            match_threshold: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
        let cfg = AnalysisConfig {
            abs_tol: f64::NAN,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn fail_marker_is_case_insensitive() {
        let cfg = AnalysisConfig::default();
        assert!(cfg.is_fail_marker(" fail "));
        assert!(cfg.is_fail_marker("NG"));
        assert!(!cfg.is_fail_marker("PASS"));
    }

    #[test]
    fn approx_eq_suppresses_float_noise() {
        assert!(approx_eq(10.00000000001, 10.0, 1e-9, 1e-9));
        assert!(!approx_eq(9.9, 10.0, 1e-9, 1e-9));
        assert!(approx_eq(f64::INFINITY, f64::INFINITY, 1e-9, 1e-9));
        assert!(!approx_eq(1.0, f64::INFINITY, 1e-9, 1e-9));
    }
}
